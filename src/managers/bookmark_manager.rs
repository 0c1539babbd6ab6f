//! Bookmark Manager for Tabs Aside.
//!
//! Implements `BookmarkStoreTrait`, the bookmark-store collaborator of the
//! session core, backed by SQLite via `rusqlite`. Folders and entries share
//! one table; positions inside a folder are kept contiguous from zero.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::connection::Database;
use crate::types::bookmark::{
    BookmarkChanges, BookmarkDestination, BookmarkNode, BookmarkTree, CreateBookmarkDetails,
};
use crate::types::errors::BookmarkError;

/// Bookmark store interface consumed by sessions.
///
/// `parent_id == None` addresses the top level of the tree.
#[async_trait]
pub trait BookmarkStoreTrait: Send + Sync {
    async fn get(&self, id: &str) -> Result<BookmarkNode, BookmarkError>;
    async fn get_children(&self, parent_id: Option<&str>) -> Result<Vec<BookmarkNode>, BookmarkError>;
    async fn get_subtree(&self, id: &str) -> Result<BookmarkTree, BookmarkError>;
    async fn create(&self, details: CreateBookmarkDetails) -> Result<BookmarkNode, BookmarkError>;
    async fn update(&self, id: &str, changes: BookmarkChanges) -> Result<BookmarkNode, BookmarkError>;
    /// Moves a node; `index` is the node's final position in the target folder.
    async fn move_node(&self, id: &str, destination: BookmarkDestination) -> Result<BookmarkNode, BookmarkError>;
    /// Removes an entry or an empty folder.
    async fn remove(&self, id: &str) -> Result<(), BookmarkError>;
    /// Removes a node with all of its descendants.
    async fn remove_tree(&self, id: &str) -> Result<(), BookmarkError>;
}

const NODE_COLUMNS: &str = "id, parent_id, position, title, url, metadata, created_at, updated_at";

/// Bookmark store backed by the shared SQLite database.
pub struct BookmarkManager {
    db: Arc<Database>,
}

impl BookmarkManager {
    /// Creates a new `BookmarkManager` using the provided database.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Returns the current UNIX timestamp in seconds.
    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Reads a single `BookmarkNode` row into a struct.
    fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<BookmarkNode> {
        let position: i64 = row.get(2)?;
        Ok(BookmarkNode {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            index: position.max(0) as usize,
            title: row.get(3)?,
            url: row.get(4)?,
            metadata: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn find(conn: &Connection, id: &str) -> Result<Option<BookmarkNode>, BookmarkError> {
        let node = conn
            .query_row(
                &format!("SELECT {} FROM bookmarks WHERE id = ?1", NODE_COLUMNS),
                params![id],
                Self::row_to_node,
            )
            .optional()?;
        Ok(node)
    }

    fn fetch(conn: &Connection, id: &str) -> Result<BookmarkNode, BookmarkError> {
        Self::find(conn, id)?.ok_or_else(|| BookmarkError::NotFound(id.to_string()))
    }

    fn children(conn: &Connection, parent_id: Option<&str>) -> Result<Vec<BookmarkNode>, BookmarkError> {
        let sql = match parent_id {
            Some(_) => format!(
                "SELECT {} FROM bookmarks WHERE parent_id = ?1 ORDER BY position",
                NODE_COLUMNS
            ),
            None => format!(
                "SELECT {} FROM bookmarks WHERE parent_id IS NULL ORDER BY position",
                NODE_COLUMNS
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = match parent_id {
            Some(pid) => stmt.query_map(params![pid], Self::row_to_node)?,
            None => stmt.query_map([], Self::row_to_node)?,
        };

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn child_count(conn: &Connection, parent_id: Option<&str>) -> Result<usize, BookmarkError> {
        let count: i64 = match parent_id {
            Some(pid) => conn.query_row(
                "SELECT COUNT(*) FROM bookmarks WHERE parent_id = ?1",
                params![pid],
                |row| row.get(0),
            ),
            None => conn.query_row(
                "SELECT COUNT(*) FROM bookmarks WHERE parent_id IS NULL",
                [],
                |row| row.get(0),
            ),
        }?;
        Ok(count as usize)
    }

    /// Shifts the positions of siblings at or after `from` by `delta`.
    fn shift_siblings(
        conn: &Connection,
        parent_id: Option<&str>,
        from: usize,
        delta: i64,
    ) -> Result<(), BookmarkError> {
        match parent_id {
            Some(pid) => conn.execute(
                "UPDATE bookmarks SET position = position + ?1 WHERE parent_id = ?2 AND position >= ?3",
                params![delta, pid, from as i64],
            ),
            None => conn.execute(
                "UPDATE bookmarks SET position = position + ?1 WHERE parent_id IS NULL AND position >= ?2",
                params![delta, from as i64],
            ),
        }?;
        Ok(())
    }

    fn ensure_folder(conn: &Connection, parent_id: Option<&str>) -> Result<(), BookmarkError> {
        if let Some(pid) = parent_id {
            match Self::find(conn, pid)? {
                Some(node) if node.is_folder() => {}
                _ => return Err(BookmarkError::FolderNotFound(pid.to_string())),
            }
        }
        Ok(())
    }

    fn create_sync(&self, details: CreateBookmarkDetails) -> Result<BookmarkNode, BookmarkError> {
        let mut conn = self.db.connection();
        let tx = conn.transaction()?;
        let parent = details.parent_id.as_deref();
        Self::ensure_folder(&tx, parent)?;

        let count = Self::child_count(&tx, parent)?;
        let position = details.index.map_or(count, |i| i.min(count));
        Self::shift_siblings(&tx, parent, position, 1)?;

        let id = Uuid::new_v4().to_string();
        let now = Self::now();
        tx.execute(
            "INSERT INTO bookmarks (id, parent_id, position, title, url, metadata, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                parent,
                position as i64,
                details.title,
                details.url,
                details.metadata,
                now,
                now
            ],
        )?;
        let node = Self::fetch(&tx, &id)?;
        tx.commit()?;
        Ok(node)
    }

    fn update_sync(&self, id: &str, changes: BookmarkChanges) -> Result<BookmarkNode, BookmarkError> {
        let conn = self.db.connection();
        let node = Self::fetch(&conn, id)?;
        if changes.is_empty() {
            return Ok(node);
        }

        let title = changes.title.unwrap_or(node.title);
        // Folders never gain a URL.
        let url = if node.url.is_some() { changes.url.or(node.url) } else { None };
        let metadata = changes.metadata.or(node.metadata);
        conn.execute(
            "UPDATE bookmarks SET title = ?1, url = ?2, metadata = ?3, updated_at = ?4 WHERE id = ?5",
            params![title, url, metadata, Self::now(), id],
        )?;
        Self::fetch(&conn, id)
    }

    fn move_sync(&self, id: &str, destination: BookmarkDestination) -> Result<BookmarkNode, BookmarkError> {
        let mut conn = self.db.connection();
        let tx = conn.transaction()?;
        let node = Self::fetch(&tx, id)?;
        let target = destination.parent_id.clone().or_else(|| node.parent_id.clone());
        Self::ensure_folder(&tx, target.as_deref())?;

        // Detach, then insert at the final position among the remaining siblings.
        Self::shift_siblings(&tx, node.parent_id.as_deref(), node.index + 1, -1)?;
        tx.execute(
            "UPDATE bookmarks SET position = -1 WHERE id = ?1",
            params![id],
        )?;
        let count = Self::child_count(&tx, target.as_deref())?.saturating_sub(
            usize::from(target == node.parent_id),
        );
        let position = destination.index.map_or(count, |i| i.min(count));
        Self::shift_siblings(&tx, target.as_deref(), position, 1)?;
        tx.execute(
            "UPDATE bookmarks SET parent_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
            params![target, position as i64, Self::now(), id],
        )?;
        let moved = Self::fetch(&tx, id)?;
        tx.commit()?;
        Ok(moved)
    }

    fn remove_sync(&self, id: &str, recursive: bool) -> Result<(), BookmarkError> {
        let mut conn = self.db.connection();
        let tx = conn.transaction()?;
        let node = Self::fetch(&tx, id)?;
        if node.is_folder() && !recursive && Self::child_count(&tx, Some(id))? > 0 {
            return Err(BookmarkError::FolderNotEmpty(id.to_string()));
        }

        let mut doomed = vec![node.id.clone()];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let children = Self::children(&tx, Some(&doomed[cursor]))?;
            doomed.extend(children.into_iter().map(|c| c.id));
            cursor += 1;
        }
        // Children first so the parent_id foreign key never dangles.
        for doomed_id in doomed.iter().rev() {
            tx.execute("DELETE FROM bookmarks WHERE id = ?1", params![doomed_id])?;
        }
        Self::shift_siblings(&tx, node.parent_id.as_deref(), node.index + 1, -1)?;
        tx.commit()?;
        Ok(())
    }

    fn subtree(conn: &Connection, node: BookmarkNode) -> Result<BookmarkTree, BookmarkError> {
        let mut children = Vec::new();
        for child in Self::children(conn, Some(&node.id))? {
            children.push(Self::subtree(conn, child)?);
        }
        Ok(BookmarkTree { node, children })
    }
}

#[async_trait]
impl BookmarkStoreTrait for BookmarkManager {
    async fn get(&self, id: &str) -> Result<BookmarkNode, BookmarkError> {
        Self::fetch(&self.db.connection(), id)
    }

    async fn get_children(&self, parent_id: Option<&str>) -> Result<Vec<BookmarkNode>, BookmarkError> {
        let conn = self.db.connection();
        Self::ensure_folder(&conn, parent_id)?;
        Self::children(&conn, parent_id)
    }

    async fn get_subtree(&self, id: &str) -> Result<BookmarkTree, BookmarkError> {
        let conn = self.db.connection();
        let node = Self::fetch(&conn, id)?;
        Self::subtree(&conn, node)
    }

    async fn create(&self, details: CreateBookmarkDetails) -> Result<BookmarkNode, BookmarkError> {
        self.create_sync(details)
    }

    async fn update(&self, id: &str, changes: BookmarkChanges) -> Result<BookmarkNode, BookmarkError> {
        self.update_sync(id, changes)
    }

    async fn move_node(&self, id: &str, destination: BookmarkDestination) -> Result<BookmarkNode, BookmarkError> {
        self.move_sync(id, destination)
    }

    async fn remove(&self, id: &str) -> Result<(), BookmarkError> {
        self.remove_sync(id, false)
    }

    async fn remove_tree(&self, id: &str) -> Result<(), BookmarkError> {
        self.remove_sync(id, true)
    }
}

use serde::{Deserialize, Serialize};

/// A node of the bookmark tree: either a folder (`url` is `None`) or an entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookmarkNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub index: usize,
    pub title: String,
    pub url: Option<String>,
    /// Structured metadata attached to an entry (encoded by the tab codec).
    pub metadata: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BookmarkNode {
    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}

/// A node together with its descendants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookmarkTree {
    pub node: BookmarkNode,
    pub children: Vec<BookmarkTree>,
}

/// Fields for creating a folder or an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateBookmarkDetails {
    pub parent_id: Option<String>,
    pub index: Option<usize>,
    pub title: String,
    pub url: Option<String>,
    pub metadata: Option<String>,
}

/// Partial update of an existing node; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookmarkChanges {
    pub title: Option<String>,
    pub url: Option<String>,
    pub metadata: Option<String>,
}

impl BookmarkChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.url.is_none() && self.metadata.is_none()
    }
}

/// Target of a move. A missing parent keeps the node in its current folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookmarkDestination {
    pub parent_id: Option<String>,
    pub index: Option<usize>,
}

//! Unit tests for the BookmarkManager public API.
//!
//! These tests exercise folder and entry operations through the
//! `BookmarkStoreTrait` interface, using an in-memory SQLite database.

use std::sync::Arc;

use tabs_aside::database::Database;
use tabs_aside::managers::bookmark_manager::{BookmarkManager, BookmarkStoreTrait};
use tabs_aside::types::bookmark::{BookmarkChanges, BookmarkDestination, CreateBookmarkDetails};
use tabs_aside::types::errors::BookmarkError;

/// Helper: create a BookmarkManager backed by a fresh in-memory database.
fn setup() -> BookmarkManager {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    BookmarkManager::new(Arc::new(db))
}

async fn folder(mgr: &BookmarkManager, title: &str, parent: Option<&str>) -> String {
    mgr.create(CreateBookmarkDetails {
        parent_id: parent.map(str::to_string),
        title: title.to_string(),
        ..Default::default()
    })
    .await
    .unwrap()
    .id
}

async fn entry(mgr: &BookmarkManager, parent: &str, title: &str, index: Option<usize>) -> String {
    mgr.create(CreateBookmarkDetails {
        parent_id: Some(parent.to_string()),
        index,
        title: title.to_string(),
        url: Some(format!("https://example.com/{}", title)),
        metadata: None,
    })
    .await
    .unwrap()
    .id
}

async fn titles(mgr: &BookmarkManager, parent: &str) -> Vec<String> {
    mgr.get_children(Some(parent))
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect()
}

/// Entries are appended and their positions stay contiguous.
#[tokio::test]
async fn test_children_positions_are_contiguous() {
    let mgr = setup();
    let parent = folder(&mgr, "Session", None).await;
    for title in ["a", "b", "c"] {
        entry(&mgr, &parent, title, None).await;
    }

    let children = mgr.get_children(Some(&parent)).await.unwrap();
    let indices: Vec<usize> = children.iter().map(|n| n.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(children.iter().all(|n| n.parent_id.as_deref() == Some(parent.as_str())));
    assert!(!children[0].is_folder());
}

#[tokio::test]
async fn test_create_at_index_shifts_siblings() {
    let mgr = setup();
    let parent = folder(&mgr, "Session", None).await;
    entry(&mgr, &parent, "a", None).await;
    entry(&mgr, &parent, "c", None).await;

    entry(&mgr, &parent, "b", Some(1)).await;
    // Out-of-range indices append.
    entry(&mgr, &parent, "d", Some(42)).await;

    assert_eq!(titles(&mgr, &parent).await, vec!["a", "b", "c", "d"]);
}

/// The destination index is the final position of the moved node.
#[tokio::test]
async fn test_move_within_folder_uses_final_index() {
    let mgr = setup();
    let parent = folder(&mgr, "Session", None).await;
    let a = entry(&mgr, &parent, "a", None).await;
    for title in ["b", "c", "d"] {
        entry(&mgr, &parent, title, None).await;
    }

    let moved = mgr
        .move_node(&a, BookmarkDestination { parent_id: None, index: Some(2) })
        .await
        .unwrap();
    assert_eq!(moved.index, 2);
    assert_eq!(titles(&mgr, &parent).await, vec!["b", "c", "a", "d"]);

    mgr.move_node(&a, BookmarkDestination { parent_id: None, index: Some(0) })
        .await
        .unwrap();
    assert_eq!(titles(&mgr, &parent).await, vec!["a", "b", "c", "d"]);

    mgr.move_node(&a, BookmarkDestination::default()).await.unwrap();
    assert_eq!(titles(&mgr, &parent).await, vec!["b", "c", "d", "a"]);
}

#[tokio::test]
async fn test_move_between_folders() {
    let mgr = setup();
    let source = folder(&mgr, "A", None).await;
    let target = folder(&mgr, "B", None).await;
    let x = entry(&mgr, &source, "x", None).await;
    entry(&mgr, &source, "y", None).await;
    entry(&mgr, &target, "z", None).await;

    let moved = mgr
        .move_node(
            &x,
            BookmarkDestination {
                parent_id: Some(target.clone()),
                index: Some(0),
            },
        )
        .await
        .unwrap();

    assert_eq!(moved.parent_id.as_deref(), Some(target.as_str()));
    assert_eq!(titles(&mgr, &target).await, vec!["x", "z"]);
    let rest = mgr.get_children(Some(&source)).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].index, 0);
}

#[tokio::test]
async fn test_remove_entry_compacts_positions() {
    let mgr = setup();
    let parent = folder(&mgr, "Session", None).await;
    entry(&mgr, &parent, "a", None).await;
    let b = entry(&mgr, &parent, "b", None).await;
    entry(&mgr, &parent, "c", None).await;

    mgr.remove(&b).await.unwrap();

    let children = mgr.get_children(Some(&parent)).await.unwrap();
    assert_eq!(children.iter().map(|n| n.index).collect::<Vec<_>>(), vec![0, 1]);
    assert!(matches!(mgr.get(&b).await, Err(BookmarkError::NotFound(_))));
    assert!(matches!(mgr.remove(&b).await, Err(BookmarkError::NotFound(_))));
}

#[tokio::test]
async fn test_remove_non_empty_folder_requires_tree_removal() {
    let mgr = setup();
    let root = folder(&mgr, "Root", None).await;
    let session = folder(&mgr, "Session", Some(&root)).await;
    let record = entry(&mgr, &session, "a", None).await;

    let err = mgr.remove(&session).await.unwrap_err();
    assert!(matches!(err, BookmarkError::FolderNotEmpty(_)));

    mgr.remove_tree(&session).await.unwrap();
    assert!(mgr.get(&session).await.is_err());
    assert!(mgr.get(&record).await.is_err());
    assert!(mgr.get_children(Some(&root)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_changes_only_given_fields() {
    let mgr = setup();
    let parent = folder(&mgr, "Session", None).await;
    let id = entry(&mgr, &parent, "a", None).await;

    let updated = mgr
        .update(
            &id,
            BookmarkChanges {
                title: Some("Renamed".to_string()),
                metadata: Some("{\"v\":1}".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.url.as_deref(), Some("https://example.com/a"));
    assert_eq!(updated.metadata.as_deref(), Some("{\"v\":1}"));

    // Folders never gain a URL.
    let renamed = mgr
        .update(
            &parent,
            BookmarkChanges {
                title: Some("Later".to_string()),
                url: Some("https://example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "Later");
    assert!(renamed.is_folder());
}

#[tokio::test]
async fn test_missing_folders_are_reported() {
    let mgr = setup();
    let parent = folder(&mgr, "Session", None).await;
    let id = entry(&mgr, &parent, "a", None).await;

    assert!(matches!(
        mgr.get_children(Some("missing")).await,
        Err(BookmarkError::FolderNotFound(_))
    ));
    assert!(matches!(
        mgr.get_children(Some(&id)).await,
        Err(BookmarkError::FolderNotFound(_))
    ));
    let err = mgr
        .create(CreateBookmarkDetails {
            parent_id: Some("missing".to_string()),
            title: "orphan".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BookmarkError::FolderNotFound(_)));
    assert!(matches!(
        mgr.update("missing", BookmarkChanges::default()).await,
        Err(BookmarkError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_get_subtree() {
    let mgr = setup();
    let root = folder(&mgr, "Root", None).await;
    let session = folder(&mgr, "Session", Some(&root)).await;
    entry(&mgr, &session, "a", None).await;
    entry(&mgr, &session, "b", None).await;

    let tree = mgr.get_subtree(&root).await.unwrap();

    assert_eq!(tree.node.id, root);
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].node.title, "Session");
    assert_eq!(tree.children[0].children.len(), 2);
}

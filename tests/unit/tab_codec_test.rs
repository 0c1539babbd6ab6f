//! Unit tests for the conversion between live tabs, tab records and tab
//! creation parameters.

use rstest::rstest;
use tabs_aside::services::tab_codec::{
    decode_restore_failed_url, is_restore_failed_url, restore_failed_url, TabSnapshot, METADATA_VERSION,
};
use tabs_aside::types::bookmark::BookmarkNode;
use tabs_aside::types::tab::{Tab, TabStatus, DEFAULT_COOKIE_STORE};

fn live_tab() -> Tab {
    Tab {
        id: 3,
        window_id: 1,
        index: 0,
        url: "https://example.com/docs".to_string(),
        title: "Docs".to_string(),
        fav_icon_url: Some("https://example.com/favicon.ico".to_string()),
        pinned: true,
        muted: true,
        active: false,
        discarded: false,
        status: TabStatus::Complete,
        opener_tab_id: None,
        cookie_store_id: Some("firefox-container-2".to_string()),
    }
}

fn record(url: Option<&str>, metadata: Option<&str>) -> BookmarkNode {
    BookmarkNode {
        id: "r-1".to_string(),
        parent_id: Some("s-1".to_string()),
        index: 0,
        title: "Stored".to_string(),
        url: url.map(str::to_string),
        metadata: metadata.map(str::to_string),
        created_at: 0,
        updated_at: 0,
    }
}

/// A live tab written as a record reads back unchanged.
#[test]
fn test_live_tab_survives_record_round_trip() {
    let snapshot = TabSnapshot::from_live_tab(&live_tab());
    let details = snapshot.to_bookmark_create_args("s-1", Some(4));

    assert_eq!(details.parent_id.as_deref(), Some("s-1"));
    assert_eq!(details.index, Some(4));
    assert_eq!(details.title, "Docs");

    let stored = BookmarkNode {
        url: details.url.clone(),
        title: details.title.clone(),
        metadata: details.metadata.clone(),
        ..record(None, None)
    };
    assert_eq!(TabSnapshot::from_record(&stored), Some(snapshot));
}

#[test]
fn test_metadata_is_versioned() {
    let snapshot = TabSnapshot::from_live_tab(&live_tab());
    let raw = snapshot.to_bookmark_update_args().metadata.unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(json["v"], serde_json::json!(METADATA_VERSION));
    assert_eq!(json["pinned"], serde_json::json!(true));
    assert_eq!(json["container"], serde_json::json!("firefox-container-2"));
}

/// Records without metadata, or with unreadable metadata, still decode.
#[rstest]
#[case(None)]
#[case(Some("not json"))]
#[case(Some("{}"))]
#[case(Some("{\"v\":1,\"container\":\"\"}"))]
fn test_legacy_records_decode_with_defaults(#[case] metadata: Option<&str>) {
    let snapshot = TabSnapshot::from_record(&record(Some("https://example.com"), metadata)).unwrap();

    assert_eq!(snapshot.url, "https://example.com");
    assert_eq!(snapshot.title, "Stored");
    assert!(!snapshot.pinned);
    assert!(!snapshot.muted);
    assert_eq!(snapshot.cookie_store_id, DEFAULT_COOKIE_STORE);
}

#[test]
fn test_folder_is_not_a_tab_record() {
    assert_eq!(TabSnapshot::from_record(&record(None, None)), None);
}

#[test]
fn test_tab_create_args() {
    let snapshot = TabSnapshot::from_live_tab(&live_tab());

    let eager = snapshot.to_tab_create_args(false);
    assert_eq!(eager.url.as_deref(), Some("https://example.com/docs"));
    assert!(eager.pinned);
    assert!(eager.muted);
    assert!(!eager.discarded);
    assert_eq!(eager.title, None);
    assert_eq!(eager.cookie_store_id.as_deref(), Some("firefox-container-2"));

    let lazy = snapshot.to_tab_create_args(true);
    assert!(lazy.discarded);
    assert_eq!(lazy.title.as_deref(), Some("Docs"));
}

#[test]
fn test_default_container_is_not_requested() {
    let tab = Tab {
        cookie_store_id: None,
        ..live_tab()
    };
    let snapshot = TabSnapshot::from_live_tab(&tab);

    assert_eq!(snapshot.cookie_store_id, DEFAULT_COOKIE_STORE);
    assert_eq!(snapshot.to_tab_create_args(false).cookie_store_id, None);
}

#[test]
fn test_restore_failed_url_carries_original() {
    let url = restore_failed_url("about:config?filter=a&b", "Config");

    assert!(is_restore_failed_url(&url));
    assert_eq!(
        decode_restore_failed_url(&url),
        Some(("about:config?filter=a&b".to_string(), "Config".to_string()))
    );
    assert_eq!(decode_restore_failed_url("ext+tabsaside://restore-failed?url=%%%"), None);
}

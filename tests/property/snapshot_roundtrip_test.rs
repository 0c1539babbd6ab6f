//! Property-based tests for the tab record codec.
//!
//! A tab written as a record and read back must restore to the same tab
//! state, and the restore-failed placeholder must carry any URL and title.

use proptest::prelude::*;
use tabs_aside::services::tab_codec::{decode_restore_failed_url, restore_failed_url, TabSnapshot};
use tabs_aside::types::bookmark::BookmarkNode;

fn arb_snapshot() -> impl Strategy<Value = TabSnapshot> {
    (
        "https://[a-z]{1,12}\\.example/[a-z0-9/]{0,16}",
        ".{0,32}",
        any::<bool>(),
        any::<bool>(),
        prop_oneof![
            Just("firefox-default".to_string()),
            "firefox-container-[0-9]{1,3}",
        ],
        prop::option::of("https://[a-z]{1,8}\\.example/favicon\\.ico"),
    )
        .prop_map(|(url, title, pinned, muted, cookie_store_id, fav_icon_url)| TabSnapshot {
            url,
            title,
            pinned,
            muted,
            cookie_store_id,
            fav_icon_url,
        })
}

// **Property 3: Record round-trip**
//
// *For any* tab snapshot, the record created from it SHALL decode to the
// same snapshot.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn snapshot_record_roundtrip(snapshot in arb_snapshot(), index in 0usize..50) {
        let details = snapshot.to_bookmark_create_args("session", Some(index));
        let stored = BookmarkNode {
            id: "record".to_string(),
            parent_id: details.parent_id.clone(),
            index,
            title: details.title.clone(),
            url: details.url.clone(),
            metadata: details.metadata.clone(),
            created_at: 0,
            updated_at: 0,
        };

        prop_assert_eq!(TabSnapshot::from_record(&stored), Some(snapshot.clone()));

        let reopened = snapshot.to_tab_create_args(true);
        prop_assert_eq!(reopened.url, Some(snapshot.url.clone()));
        prop_assert_eq!(reopened.pinned, snapshot.pinned);
        prop_assert_eq!(reopened.muted, snapshot.muted);
    }
}

// **Property 4: Placeholder URL round-trip**
//
// *For any* URL and title, the restore-failed page URL SHALL decode to
// exactly that URL and title.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn restore_failed_url_roundtrip(url in ".{1,64}", title in ".{0,64}") {
        let placeholder = restore_failed_url(&url, &title);
        prop_assert_eq!(decode_restore_failed_url(&placeholder), Some((url, title)));
    }
}

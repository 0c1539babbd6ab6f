//! Property-based tests for the in-memory host browser.
//!
//! These tests verify the tab strip invariants: for any sequence of tab
//! creations, closures, moves and pin changes, every window keeps a
//! contiguous strip with pinned tabs on the left and no window is left
//! empty.

use std::sync::Arc;

use proptest::prelude::*;
use tabs_aside::managers::tab_manager::{TabHostTrait, TabManager};
use tabs_aside::services::event_hub::EventHub;
use tabs_aside::types::tab::{TabCreateProperties, TabUpdateProperties, WindowCreateProperties};

/// Operations that can be performed on the host.
#[derive(Debug, Clone)]
enum TabOp {
    Create { pinned: bool },
    OpenWindow,
    Close(usize),
    Move { tab: usize, window: usize, index: Option<usize> },
    Pin { tab: usize, pinned: bool },
}

/// Strategy for generating a sequence of host operations.
/// Creates are weighted up to keep interesting state.
fn arb_tab_ops() -> impl Strategy<Value = Vec<TabOp>> {
    prop::collection::vec(
        prop_oneof![
            4 => any::<bool>().prop_map(|pinned| TabOp::Create { pinned }),
            1 => Just(TabOp::OpenWindow),
            2 => (0..20usize).prop_map(TabOp::Close),
            2 => (0..20usize, 0..4usize, prop::option::of(0..8usize))
                .prop_map(|(tab, window, index)| TabOp::Move { tab, window, index }),
            1 => (0..20usize, any::<bool>()).prop_map(|(tab, pinned)| TabOp::Pin { tab, pinned }),
        ],
        1..40,
    )
}

async fn apply(host: &TabManager, op: &TabOp) {
    let tabs = host.query_tabs(None).await.unwrap();
    let windows = host.get_all_windows().await.unwrap();
    match op {
        TabOp::Create { pinned } => {
            host.create_tab(TabCreateProperties {
                url: Some("https://example.com".to_string()),
                pinned: *pinned,
                ..Default::default()
            })
            .await
            .unwrap();
        }
        TabOp::OpenWindow => {
            host.create_window(WindowCreateProperties::default()).await.unwrap();
        }
        TabOp::Close(i) if !tabs.is_empty() => {
            host.remove_tabs(&[tabs[i % tabs.len()].id]).await.unwrap();
        }
        TabOp::Move { tab, window, index } if !tabs.is_empty() => {
            let window_id = windows[window % windows.len()].id;
            host.move_tabs(&[tabs[tab % tabs.len()].id], window_id, *index)
                .await
                .unwrap();
        }
        TabOp::Pin { tab, pinned } if !tabs.is_empty() => {
            host.update_tab(
                tabs[tab % tabs.len()].id,
                TabUpdateProperties {
                    pinned: Some(*pinned),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        _ => {}
    }
}

// **Property 5: Tab strip invariant**
//
// *For any* sequence of host operations, every window SHALL be non-empty,
// its tabs SHALL carry the indices 0..n in strip order, pinned tabs SHALL
// precede unpinned ones, and `tab_count()` SHALL equal the number of tabs
// across all windows.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn tab_strip_invariant(ops in arb_tab_ops()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let host = TabManager::new(Arc::new(EventHub::new()));

        runtime.block_on(async {
            for op in &ops {
                apply(&host, op).await;
            }
        });

        let windows = runtime.block_on(host.get_all_windows()).unwrap();
        let mut total = 0;
        for window in &windows {
            prop_assert!(!window.tabs.is_empty());
            for (i, tab) in window.tabs.iter().enumerate() {
                prop_assert_eq!(tab.index, i);
                prop_assert_eq!(tab.window_id, window.id);
            }
            let first_unpinned = window.tabs.iter().position(|t| !t.pinned).unwrap_or(window.tabs.len());
            prop_assert!(window.tabs[first_unpinned..].iter().all(|t| !t.pinned));
            total += window.tabs.len();
        }
        prop_assert_eq!(host.tab_count(), total);
        prop_assert_eq!(host.window_count(), windows.len());
    }
}

//! Property-based tests for the tab/record association and for sessions
//! losing arbitrary subsets of their tabs.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;

use common::*;
use proptest::prelude::*;
use tabs_aside::managers::tab_manager::{SessionValuesTrait, TabHostTrait};
use tabs_aside::types::options::{Options, TabClosingBehavior};
use tabs_aside::types::session::{SessionState, TabRecordMap, SESSION_ID_KEY};
use tabs_aside::types::tab::TabCreateProperties;

#[derive(Debug, Clone)]
enum MapOp {
    Insert(i64, u8),
    RemoveTab(i64),
    RemoveRecord(u8),
}

fn arb_map_ops() -> impl Strategy<Value = Vec<MapOp>> {
    prop::collection::vec(
        prop_oneof![
            3 => (0..8i64, 0..8u8).prop_map(|(t, r)| MapOp::Insert(t, r)),
            1 => (0..8i64).prop_map(MapOp::RemoveTab),
            1 => (0..8u8).prop_map(MapOp::RemoveRecord),
        ],
        1..60,
    )
}

fn record_name(r: u8) -> String {
    format!("record-{}", r)
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

// **Property 6: Tab/record association stays one-to-one**
//
// *For any* sequence of inserts and removals, the map SHALL agree with a
// simple model in both directions and never associate a record with two
// tabs.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn tab_record_map_matches_model(ops in arb_map_ops()) {
        let mut map = TabRecordMap::new();
        let mut model: BTreeMap<i64, String> = BTreeMap::new();

        for op in &ops {
            match op {
                MapOp::Insert(tab, r) => {
                    let record = record_name(*r);
                    let owner = model.iter().find(|(t, rec)| **rec == record && **t != *tab).map(|(t, _)| *t);
                    match owner {
                        Some(owner) => prop_assert_eq!(map.insert(*tab, &record), Err(owner)),
                        None => {
                            prop_assert_eq!(map.insert(*tab, &record), Ok(()));
                            model.insert(*tab, record);
                        }
                    }
                }
                MapOp::RemoveTab(tab) => {
                    prop_assert_eq!(map.remove_tab(*tab), model.remove(tab));
                }
                MapOp::RemoveRecord(r) => {
                    let record = record_name(*r);
                    let tab = model.iter().find(|(_, rec)| **rec == record).map(|(t, _)| *t);
                    if let Some(tab) = tab {
                        model.remove(&tab);
                    }
                    prop_assert_eq!(map.remove_record(&record), tab);
                }
            }

            prop_assert_eq!(map.len(), model.len());
            prop_assert_eq!(map.tab_ids(), model.keys().copied().collect::<Vec<_>>());
            for (tab, record) in &model {
                prop_assert_eq!(map.record_for(*tab), Some(record.as_str()));
                prop_assert_eq!(map.tab_for(record), Some(*tab));
            }
        }
    }
}

// **Property 7: Closing tabs under the keep-record policy**
//
// *For any* session of N tabs and any subset of them closed, every record
// SHALL remain, the session SHALL keep exactly the open tabs, and it SHALL
// become passive once no tab is left.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn keep_record_close_subset(closed in prop::collection::vec(any::<bool>(), 1..6)) {
        let runtime = paused_runtime();
        let (records_left, tabs_left, state, expected_open) = runtime.block_on(async {
            let f = fixture_with(Options {
                tab_closing: TabClosingBehavior::KeepRecord,
                ..Options::default()
            });
            let urls: Vec<String> = (0..closed.len()).map(url).collect();
            let tabs = open_tabs(&f.app, &urls).await;
            let session = f.app.sessions.create_session(tabs.clone(), "Subset").await.unwrap();
            let id = session.id().to_string();

            let doomed: Vec<_> = tabs.iter().zip(&closed).filter(|(_, c)| **c).map(|(t, _)| t.id).collect();
            if !doomed.is_empty() {
                f.app.tabs.remove_tabs(&doomed).await.unwrap();
            }
            past_removal_delay().await;

            (
                records(&f.app, &id).await.len(),
                session.tab_count(),
                f.app.sessions.state(&id),
                tabs.len() - doomed.len(),
            )
        });

        prop_assert_eq!(records_left, closed.len());
        prop_assert_eq!(tabs_left, expected_open);
        if expected_open == 0 {
            prop_assert_eq!(state, SessionState::Passive);
        } else {
            prop_assert_eq!(state, SessionState::Active);
        }
    }
}

// **Property 8: Closing tabs under the remove-record policy**
//
// *For any* session of N tabs and any subset of them closed one by one
// (never all), the records of exactly the closed tabs SHALL be removed and
// the remaining records SHALL keep their order.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn remove_record_close_subset(closed in prop::collection::vec(any::<bool>(), 2..6)) {
        prop_assume!(closed.iter().any(|c| !*c));
        let runtime = paused_runtime();
        let (remaining, expected) = runtime.block_on(async {
            let f = fixture();
            let urls: Vec<String> = (0..closed.len()).map(url).collect();
            let tabs = open_tabs(&f.app, &urls).await;
            let session = f.app.sessions.create_session(tabs.clone(), "Subset").await.unwrap();

            for (tab, close) in tabs.iter().zip(&closed) {
                if *close {
                    f.app.tabs.remove_tabs(&[tab.id]).await.unwrap();
                }
            }
            past_removal_delay().await;

            let expected: Vec<String> = urls
                .iter()
                .zip(&closed)
                .filter(|(_, c)| !**c)
                .map(|(u, _)| u.clone())
                .collect();
            (record_urls(&f.app, session.id()).await, expected)
        });

        prop_assert_eq!(remaining, expected);
    }
}

/// Host activity around a windowed session.
#[derive(Debug, Clone)]
enum WindowOp {
    OpenChild(usize),
    OpenOutside,
    Close(usize),
    DragIn(usize),
    DragOut(usize),
    SetAside(usize),
}

fn arb_window_ops() -> impl Strategy<Value = Vec<WindowOp>> {
    prop::collection::vec(
        prop_oneof![
            2 => (0..16usize).prop_map(WindowOp::OpenChild),
            1 => Just(WindowOp::OpenOutside),
            2 => (0..16usize).prop_map(WindowOp::Close),
            2 => (0..16usize).prop_map(WindowOp::DragIn),
            2 => (0..16usize).prop_map(WindowOp::DragOut),
            1 => (0..16usize).prop_map(WindowOp::SetAside),
        ],
        1..25,
    )
}

// **Property 9: The mapping matches the tabs marked for the session**
//
// *For any* sequence of child tabs, closures, drags into and out of the
// session window and single tabs set aside, once events have been handled
// the session's live tab ids SHALL be exactly the live tabs whose session
// value names the session.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn mapping_matches_session_values(ops in arb_window_ops()) {
        let runtime = paused_runtime();
        let (mapped, marked) = runtime.block_on(async {
            let f = fixture_with(windowed());
            let (session_window, _) = open_window(&f.app, &[url(0), url(1), url(2)]).await;
            let session = f.app.sessions.create_window_session(session_window, "Mapped").await.unwrap();
            let (outside_window, outside_tabs) = open_window(&f.app, &[url(10)]).await;
            let anchor = outside_tabs[0].id;

            for op in &ops {
                let session_tabs = session.tab_ids();
                let window_open = session.window_id().is_some()
                    && f.app.tabs.get_window(session_window).await.is_ok();
                let outside: Vec<_> = f
                    .app
                    .tabs
                    .query_tabs(Some(outside_window))
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|t| t.id)
                    .filter(|id| *id != anchor)
                    .collect();
                let every: Vec<_> = f
                    .app
                    .tabs
                    .query_tabs(None)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|t| t.id)
                    .filter(|id| *id != anchor)
                    .collect();

                match op {
                    WindowOp::OpenChild(i) if window_open && !session_tabs.is_empty() => {
                        let opener = session_tabs[i % session_tabs.len()];
                        f.app
                            .tabs
                            .create_tab(TabCreateProperties {
                                url: Some(url(20 + i)),
                                window_id: Some(session_window),
                                opener_tab_id: Some(opener),
                                ..Default::default()
                            })
                            .await
                            .unwrap();
                    }
                    WindowOp::OpenOutside => {
                        f.app
                            .tabs
                            .create_tab(TabCreateProperties {
                                url: Some(url(40)),
                                window_id: Some(outside_window),
                                ..Default::default()
                            })
                            .await
                            .unwrap();
                    }
                    WindowOp::Close(i) if !every.is_empty() => {
                        f.app.tabs.remove_tabs(&[every[i % every.len()]]).await.unwrap();
                    }
                    WindowOp::DragIn(i) if window_open && !outside.is_empty() => {
                        f.app
                            .tabs
                            .move_tabs(&[outside[i % outside.len()]], session_window, None)
                            .await
                            .unwrap();
                    }
                    WindowOp::DragOut(i) if window_open => {
                        let inside = f.app.tabs.query_tabs(Some(session_window)).await.unwrap();
                        if !inside.is_empty() {
                            let tab_id = inside[i % inside.len()].id;
                            f.app.tabs.move_tabs(&[tab_id], outside_window, None).await.unwrap();
                        }
                    }
                    WindowOp::SetAside(i) if !session_tabs.is_empty() => {
                        let _ = session.set_tab_aside(session_tabs[i % session_tabs.len()]).await;
                    }
                    _ => {}
                }
                settle().await;
            }
            past_removal_delay().await;

            let mut marked = Vec::new();
            for tab in f.app.tabs.query_tabs(None).await.unwrap() {
                let value = f.app.tabs.get_tab_value(tab.id, SESSION_ID_KEY).await.unwrap();
                if value.as_deref() == Some(session.id()) {
                    marked.push(tab.id);
                }
            }
            marked.sort_unstable();
            (session.tab_ids(), marked)
        });

        prop_assert_eq!(mapped, marked);
    }
}

//! DST: Search controller under simulation
//!
//! Single-flight, late-response discard and convergence of browse paging
//! while the simulated remote injects faults.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::json;

use portals_cache::dst::{FaultConfig, FaultType, SimConfig, SimEnvironment, Simulation};
use portals_cache::events::ChangeEvent;
use portals_cache::{EntityKind, EntityRef, ListScope, ScrollOutcome, ViewUpdate};

const RECORDS: usize = 25;

fn ids(handles: &[EntityRef]) -> Vec<String> {
    handles.iter().map(|h| h.read().id.clone()).collect()
}

fn seed_contents(env: &SimEnvironment) {
    env.source.extend(
        EntityKind::Content,
        (1..=RECORDS).map(|i| json!({"ID": format!("n{i:02}"), "Title": format!("News {i:02}"), "OrderIndex": i})),
    );
}

#[tokio::test]
async fn test_dst_browse_converges_under_fetch_faults() {
    for seed in 0..20 {
        let sim = Simulation::new(SimConfig::with_seed(seed)).with_fetch_faults(0.3);

        sim.run(|env| async move {
            seed_contents(&env);
            let mut view = env.controller(EntityKind::Content).with_page_size(10);

            view.open();
            let mut failures: u64 = 0;
            for update in view.settle().await {
                if matches!(update, ViewUpdate::Failed(_)) {
                    failures += 1;
                }
            }

            let mut exhausted = false;
            for _ in 0..200 {
                match view.load_more() {
                    ScrollOutcome::Exhausted => {
                        exhausted = true;
                        break;
                    }
                    ScrollOutcome::Fetching(_) | ScrollOutcome::Pending => {
                        for update in view.settle().await {
                            if let ViewUpdate::Failed(err) = update {
                                assert!(err.is_transient(), "seed {seed}: {err}");
                                failures += 1;
                            }
                        }
                    }
                    ScrollOutcome::Advanced | ScrollOutcome::Resumed | ScrollOutcome::Idle => {}
                }
            }

            assert!(exhausted, "seed {seed}: paging never finished");
            let visible = ids(view.visible());
            let unique: HashSet<&String> = visible.iter().collect();
            assert_eq!(visible.len(), RECORDS, "seed {seed}");
            assert_eq!(unique.len(), RECORDS, "seed {seed}");
            assert_eq!(visible.first().map(String::as_str), Some("n01"));
            assert_eq!(view.loaded_total(), RECORDS);
            assert!(failures <= env.faults.total_injections());
            Ok::<(), String>(())
        })
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn test_dst_scroll_never_double_fetches() {
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    seed_contents(&env);
    let mut view = env.controller(EntityKind::Content).with_page_size(5);

    view.open();
    for _ in 0..10 {
        assert_eq!(view.load_more(), ScrollOutcome::Pending);
    }
    view.settle().await;

    for expected_page in 2..=5 {
        assert!(matches!(view.load_more(), ScrollOutcome::Fetching(_)));
        assert_eq!(view.load_more(), ScrollOutcome::Pending);
        view.settle().await;
        assert_eq!(view.browse_cursor().unwrap().page_number, expected_page);
    }

    let pages: Vec<usize> = env
        .source
        .requests()
        .iter()
        .filter_map(|(_, request)| request.pagination.map(|page| page.page_number))
        .collect();
    assert_eq!(pages, vec![1, 2, 3, 4, 5]);
    assert_eq!(view.load_more(), ScrollOutcome::Exhausted);
}

#[tokio::test(start_paused = true)]
async fn test_dst_late_search_response_is_discarded() {
    let env = Simulation::new(SimConfig::with_seed(7)).build();
    seed_contents(&env);
    env.source
        .insert(EntityKind::Content, json!({"ID": "w1", "Title": "Weather", "OrderIndex": 0}));
    env.source.set_query_latency("news", Duration::from_millis(50));

    let mut view = env.controller(EntityKind::Content).with_page_size(10);
    view.start_search("news");
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The slow search already answered but was never applied
    view.start_search("weather");
    assert_eq!(view.pump().await, Some(ViewUpdate::Discarded));
    assert!(view.results().is_empty());

    let update = view.pump().await.unwrap();
    assert!(matches!(update, ViewUpdate::Search { page: 1, added: 1, .. }));
    assert_eq!(ids(view.results()), vec!["w1"]);

    assert!(!view.cancel());
    assert_eq!(view.pump().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_dst_cancelled_search_never_lands() {
    let env = Simulation::new(SimConfig::with_seed(8)).build();
    seed_contents(&env);
    env.source.set_query_latency("news", Duration::from_millis(50));

    let mut view = env.controller(EntityKind::Content);
    view.start_search("news");
    assert!(view.cancel());
    assert!(!view.cancel());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(view.try_pump().is_none());
    assert!(view.results().is_empty());
    assert!(env.registries.for_kind(EntityKind::Content).is_empty());
}

#[tokio::test]
async fn test_dst_failure_leaves_view_untouched() {
    let env = Simulation::new(SimConfig::with_seed(3)).with_fetch_faults(0.4).build();
    seed_contents(&env);
    let mut view = env.controller(EntityKind::Content).with_page_size(5);

    let mut failures_checked = 0;
    for _ in 0..100 {
        let visible_before = ids(view.visible());
        let cursor_before = view.browse_cursor();
        let cached_before = env.cursors.get_signature(&view.signature());

        match view.load_more() {
            ScrollOutcome::Exhausted => break,
            ScrollOutcome::Fetching(_) => {
                if let Some(ViewUpdate::Failed(_)) = view.pump().await {
                    assert_eq!(ids(view.visible()), visible_before);
                    assert_eq!(view.browse_cursor(), cursor_before);
                    assert_eq!(env.cursors.get_signature(&view.signature()), cached_before);
                    failures_checked += 1;
                }
            }
            _ => {}
        }
    }

    assert!(failures_checked > 0);
    assert_eq!(view.visible().len(), RECORDS);
}

#[tokio::test]
async fn test_dst_object_missing_id_is_skipped() {
    let env = Simulation::new(SimConfig::with_seed(5))
        .with_fault(FaultConfig::new(FaultType::ObjectMissingId, 1.0).with_max_injections(1))
        .build();
    seed_contents(&env);
    let mut view = env.controller(EntityKind::Content).with_page_size(10);

    view.open();
    let updates = view.settle().await;

    assert!(matches!(updates.as_slice(), [ViewUpdate::Browse { added: 9, .. }]));
    assert!(!env.registries.for_kind(EntityKind::Content).contains("n01"));
    assert_eq!(view.browse_cursor().unwrap().total_records, RECORDS);
}

#[tokio::test]
async fn test_dst_push_events_reach_scoped_view() {
    let env = Simulation::new(SimConfig::with_seed(11)).build();
    env.source.extend(
        EntityKind::Category,
        vec![
            json!({"ID": "x1", "Title": "Root"}),
            json!({"ID": "c1", "Title": "B", "OrderIndex": 1, "ParentID": "x1"}),
        ],
    );
    env.registries
        .for_kind(EntityKind::Category)
        .update(json!({"ID": "x1", "Title": "Root"}))
        .unwrap();
    let mut bridge = env.bridge();
    let mut view = env
        .controller(EntityKind::Category)
        .with_scope(ListScope::children("x1"));

    view.open();
    view.settle().await;
    assert_eq!(view.visible().len(), 1);

    env.bus.publish(
        ChangeEvent::created(EntityKind::Category, "c2")
            .with_parent("x1")
            .with_payload(json!({"Title": "A", "OrderIndex": 0})),
    );
    env.bus.publish(ChangeEvent::moved(EntityKind::Category, "c1", Some("x1".to_string()), None));

    for (event, _) in bridge.drain() {
        view.handle_change(&event);
    }

    assert_eq!(ids(view.visible()), vec!["c2"]);
    let c1 = env.registries.for_kind(EntityKind::Category).get("c1").unwrap();
    assert!(c1.read().is_root());
}

//! Twin resolution end-to-end: propagation of manual ratings across
//! duplicate recordings and convergence with the inheritance pass.

mod helpers;

use helpers::{album, artist, test_config, test_state, track, MemoryCatalog};
use rime_common::db::ownership;
use rime_engine::engine::phase::{Phase, PhaseRunner};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn no_interrupt() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

/// One artist with the same song on a studio album, a compilation, and
/// a box set. Only the studio copy is manually rated.
fn twin_library() -> MemoryCatalog {
    let artists = vec![artist("ar1", "Alpha", None)];
    let albums = vec![
        album("al1", "ar1", "Studio", None),
        album("al2", "ar1", "Hits", None),
        album("al3", "ar1", "Box Set", None),
    ];
    let tracks = vec![
        track("s1", "al1", "ar1", "Anthem", Some(4.0)),
        track("s2", "al2", "ar1", "Anthem", None),
        track("s3", "al3", "ar1", "Anthem", None),
        // A second manual rating so the prior is not degenerate
        track("s4", "al1", "ar1", "Deep Cut", Some(3.0)),
    ];
    MemoryCatalog::new(artists, albums, tracks)
}

#[tokio::test]
async fn manual_rating_propagates_to_twins() {
    let catalog = twin_library();
    let (pool, library_id) = test_state().await;
    let config = test_config();

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    runner.run(&[Phase::TwinSync]).await.expect("twin sync");

    // Both non-manual members receive the manual member's rating
    assert_eq!(catalog.rating_of("s2"), Some(4.0));
    assert_eq!(catalog.rating_of("s3"), Some(4.0));
    // The manual member is never written to
    assert_eq!(catalog.writes_for("s1"), 0);
    assert_eq!(catalog.rating_of("s1"), Some(4.0));

    // All three members are twin-linked in the shadow state, sharing
    // one group id
    let state = ownership::load_all(&pool, library_id).await.unwrap();
    let group = state["s1"].twin_group.expect("manual member tagged");
    assert_eq!(state["s2"].twin_group, Some(group));
    assert_eq!(state["s3"].twin_group, Some(group));
}

#[tokio::test]
async fn twin_mean_over_multiple_manual_members() {
    let catalog = twin_library();
    // Rate a second copy manually: group mean = (4.0 + 5.0) / 2 = 4.5
    catalog.human_rate("s3", Some(5.0));

    let (pool, library_id) = test_state().await;
    let config = test_config();

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    runner.run(&[Phase::TwinSync]).await.expect("twin sync");

    assert_eq!(catalog.rating_of("s2"), Some(4.5));
    // Manual members keep their own ratings
    assert_eq!(catalog.rating_of("s1"), Some(4.0));
    assert_eq!(catalog.rating_of("s3"), Some(5.0));
}

#[tokio::test]
async fn full_run_with_twins_is_idempotent() {
    let catalog = twin_library();
    let (pool, library_id) = test_state().await;
    let config = test_config();

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    runner.run(&Phase::ALL).await.expect("first run");

    // Twin consensus wins over inheritance for the duplicates
    assert_eq!(catalog.rating_of("s2"), Some(4.0));
    assert_eq!(catalog.rating_of("s3"), Some(4.0));

    let writes_after_first = catalog.write_count();
    let summary = runner.run(&Phase::ALL).await.expect("second run");
    assert_eq!(
        catalog.write_count(),
        writes_after_first,
        "twin-governed tracks must not ping-pong with inheritance"
    );
    let updated: u32 = summary.passes.iter().map(|p| p.counts.updated).sum();
    assert_eq!(updated, 0);
}

#[tokio::test]
async fn inferred_only_group_reaches_no_consensus() {
    let catalog = twin_library();
    // Withdraw the manual rating before any run: the group has no
    // human opinion at all
    catalog.human_rate("s1", None);

    let (pool, library_id) = test_state().await;
    let config = test_config();

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    runner.run(&[Phase::TwinSync]).await.expect("twin sync");

    // No synchronization happened
    assert_eq!(catalog.write_count(), 0);
    assert_eq!(catalog.rating_of("s2"), None);

    // And no twin governance was recorded, so inheritance stays free
    // to fill these tracks
    let state = ownership::load_all(&pool, library_id).await.unwrap();
    assert!(state.values().all(|r| r.twin_group.is_none()));
}

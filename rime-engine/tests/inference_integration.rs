//! End-to-end inference runs against an in-memory catalog:
//! posterior/inheritance values, idempotence, override permanence,
//! checkpointed interrupt/resume, and write retry behavior.

mod helpers;

use helpers::{standard_library, test_config, test_state};
use rime_common::db::{checkpoint, ownership, Classification};
use rime_engine::engine::phase::{Phase, PhaseRunner};
use rime_engine::EngineError;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn no_interrupt() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

#[tokio::test]
async fn full_run_produces_expected_ratings() {
    let catalog = standard_library();
    let (pool, library_id) = test_state().await;
    let config = test_config();

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    let summary = runner.run(&Phase::ALL).await.expect("run");
    assert!(!summary.interrupted);

    // Global prior = mean(5, 5, 2) = 4.0
    assert!((summary.prior_start - 4.0).abs() < 1e-5);

    // Album posteriors, C = 3:
    //   al1: (3*4.0 + 10) / 5 = 4.4
    //   al2: (3*4.0 + 2) / 4 = 3.5
    //   al3: no evidence -> prior exactly
    assert!((catalog.rating_of("al1").unwrap() - 4.4).abs() < 1e-5);
    assert!((catalog.rating_of("al2").unwrap() - 3.5).abs() < 1e-5);
    assert!((catalog.rating_of("al3").unwrap() - 4.0).abs() < 1e-5);

    // Artists have no manual album evidence -> prior exactly
    assert!((catalog.rating_of("ar1").unwrap() - 4.0).abs() < 1e-5);
    assert!((catalog.rating_of("ar2").unwrap() - 4.0).abs() < 1e-5);

    // Unrated tracks inherit their (inferred) album rating unchanged
    assert!((catalog.rating_of("t3").unwrap() - 4.4).abs() < 1e-5);
    assert!((catalog.rating_of("t4").unwrap() - 4.4).abs() < 1e-5);
    assert!((catalog.rating_of("t6").unwrap() - 3.5).abs() < 1e-5);
    assert!((catalog.rating_of("t7").unwrap() - 4.0).abs() < 1e-5);

    // Manual ratings are untouched
    assert_eq!(catalog.rating_of("t1"), Some(5.0));
    assert_eq!(catalog.rating_of("t5"), Some(2.0));

    // Engine-written items carry the marker tag; manual items do not
    assert!(catalog.tags_of("t3").contains(&"Rating_Inferred".to_string()));
    assert!(catalog.tags_of("al1").contains(&"Rating_Inferred".to_string()));
    assert!(!catalog.tags_of("t1").contains(&"Rating_Inferred".to_string()));

    // Ownership classifications
    let state = ownership::load_all(&pool, library_id).await.unwrap();
    assert_eq!(state["t1"].classification, Classification::Manual);
    assert_eq!(state["t3"].classification, Classification::Inferred);
    assert_eq!(state["al1"].classification, Classification::Inferred);

    // 3 albums + 2 artists + 5 unrated tracks
    assert_eq!(catalog.write_count(), 10);
}

#[tokio::test]
async fn second_run_writes_nothing() {
    let catalog = standard_library();
    let (pool, library_id) = test_state().await;
    let config = test_config();

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    runner.run(&Phase::ALL).await.expect("first run");
    let writes_after_first = catalog.write_count();

    let summary = runner.run(&Phase::ALL).await.expect("second run");
    assert_eq!(
        catalog.write_count(),
        writes_after_first,
        "an unchanged catalog must produce zero writes on the second run"
    );
    let updated: u32 = summary.passes.iter().map(|p| p.counts.updated).sum();
    assert_eq!(updated, 0);
}

#[tokio::test]
async fn human_override_is_permanent() {
    let catalog = standard_library();
    let (pool, library_id) = test_state().await;
    let config = test_config();

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    runner.run(&Phase::ALL).await.expect("first run");
    assert!((catalog.rating_of("t3").unwrap() - 4.4).abs() < 1e-5);

    // Human takes over t3
    catalog.human_rate("t3", Some(2.0));

    runner.run(&Phase::ALL).await.expect("second run");

    // The engine cedes ownership: value preserved, marker removed
    assert_eq!(catalog.rating_of("t3"), Some(2.0));
    assert!(!catalog.tags_of("t3").contains(&"Rating_Inferred".to_string()));
    let state = ownership::load_all(&pool, library_id).await.unwrap();
    assert_eq!(state["t3"].classification, Classification::Manual);

    // And never writes to it again
    runner.run(&Phase::ALL).await.expect("third run");
    assert_eq!(catalog.rating_of("t3"), Some(2.0));
    assert_eq!(catalog.writes_for("t3"), 1, "only the original inference write");
    let state = ownership::load_all(&pool, library_id).await.unwrap();
    assert_eq!(state["t3"].classification, Classification::Manual);
}

#[tokio::test]
async fn interrupted_phase_resumes_without_reprocessing() {
    let catalog = standard_library();
    let (pool, library_id) = test_state().await;
    let config = test_config();

    // Trip the interrupt flag as soon as the first write lands
    let flag = Arc::new(AtomicBool::new(false));
    catalog.interrupt_after_writes(1, flag.clone());

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, flag);
    let summary = runner.run(&[Phase::AlbumUp]).await.expect("interrupted run");
    assert!(summary.interrupted);

    // The checkpoint survived the interrupt
    let key = checkpoint::last_key(&pool, library_id, "album-up").await.unwrap();
    assert!(key.is_some(), "interrupt must leave the checkpoint intact");

    // Resume with a fresh interrupt flag
    let runner =
        PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    let summary = runner.run(&[Phase::AlbumUp]).await.expect("resumed run");
    assert!(!summary.interrupted);

    // Same final ratings as an uninterrupted control run
    let control = standard_library();
    let (control_pool, control_lib) = test_state().await;
    let control_runner = PhaseRunner::new(
        &control,
        &control,
        &control_pool,
        &config,
        control_lib,
        no_interrupt(),
    );
    control_runner.run(&[Phase::AlbumUp]).await.expect("control run");

    for id in ["al1", "al2", "al3"] {
        assert_eq!(catalog.rating_of(id), control.rating_of(id), "album {id}");
        // At-most-once write per item across interrupt + resume
        assert_eq!(catalog.writes_for(id), 1, "album {id} written once");
    }

    // Completion cleared the checkpoint
    let key = checkpoint::last_key(&pool, library_id, "album-up").await.unwrap();
    assert_eq!(key, None);
}

#[tokio::test]
async fn transient_write_failure_is_retried() {
    let catalog = standard_library();
    let (pool, library_id) = test_state().await;
    let config = test_config();

    catalog.fail_next_writes(1);

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    runner.run(&[Phase::AlbumUp]).await.expect("run succeeds after retry");

    // All three albums landed despite the transient failure
    assert!((catalog.rating_of("al1").unwrap() - 4.4).abs() < 1e-5);
    assert_eq!(catalog.write_count(), 3);
}

#[tokio::test]
async fn exhausted_retries_abort_at_last_commit() {
    let catalog = standard_library();
    let (pool, library_id) = test_state().await;
    let mut config = test_config();
    config.catalog.write_retries = 2;

    catalog.fail_next_writes(10);

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    let err = runner.run(&[Phase::AlbumUp]).await.expect_err("must abort");
    assert!(matches!(err, EngineError::CatalogWrite { .. }));

    // Nothing committed: no checkpoint, no ownership record
    let key = checkpoint::last_key(&pool, library_id, "album-up").await.unwrap();
    assert_eq!(key, None);
    let state = ownership::load_all(&pool, library_id).await.unwrap();
    assert!(state.values().all(|r| r.inferred_rating.is_none()));
}

#[tokio::test]
async fn dry_run_writes_nothing_anywhere() {
    let catalog = standard_library();
    let (pool, library_id) = test_state().await;
    let mut config = test_config();
    config.dry_run = true;

    let runner = PhaseRunner::new(&catalog, &catalog, &pool, &config, library_id, no_interrupt());
    let summary = runner.run(&Phase::ALL).await.expect("dry run");

    // Candidates were computed and counted...
    let updated: u32 = summary.passes.iter().map(|p| p.counts.updated).sum();
    assert!(updated > 0);

    // ...but nothing was touched
    assert_eq!(catalog.write_count(), 0);
    assert_eq!(catalog.rating_of("al1"), None);
    let state = ownership::load_all(&pool, library_id).await.unwrap();
    assert!(state.is_empty());
    let key = checkpoint::last_key(&pool, library_id, "album-up").await.unwrap();
    assert_eq!(key, None);
}

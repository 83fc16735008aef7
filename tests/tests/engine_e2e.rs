//! End-to-end engine behavior against in-memory stores: catch-up,
//! incremental runs, watermarks, reload, and run metadata.

use std::sync::Arc;

use etl_core::{RunMode, RunStatus};
use etl_engine::{processing_status, RunnerConfig, TransformRunner};
use integration_tests::fixtures::{date, raw_row, rows_for_date};
use integration_tests::memory::{MemoryProcessedStore, MemoryRawStore};

fn setup(
    batch_size: i64,
) -> (
    Arc<MemoryRawStore>,
    Arc<MemoryProcessedStore>,
    TransformRunner<MemoryRawStore, MemoryProcessedStore>,
) {
    let raw = Arc::new(MemoryRawStore::new());
    let processed = Arc::new(MemoryProcessedStore::new());
    let runner = TransformRunner::new(raw.clone(), processed.clone(), RunnerConfig { batch_size });
    (raw, processed, runner)
}

#[tokio::test]
async fn full_catchup_processes_every_row() {
    let (raw, processed, runner) = setup(1000);
    raw.seed(rows_for_date("2024-01-01", 5));
    raw.seed(rows_for_date("2024-01-02", 5));

    let report = runner.run_incremental().await.unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.processed, 10);
    assert_eq!(report.errors, 0);
    // each fixture row clamps to 8 impressions and 2 clicks
    assert_eq!(report.positions_created, 80);
    assert_eq!(report.clicks_created, 20);
    assert_eq!(processed.fact_count(), 10);

    let runs = processed.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].mode, RunMode::FullCatchup);
    assert_eq!(runs[0].rows_processed, 10);
    assert_eq!(runs[0].watermark_date, Some(date("2024-01-02")));
}

#[tokio::test]
async fn full_catchup_commits_in_fixed_size_batches() {
    let (raw, processed, runner) = setup(10);
    raw.seed(rows_for_date("2024-01-01", 35));

    let report = runner.run_incremental().await.unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.processed, 35);
    assert_eq!(processed.fact_count(), 35);
    // 35 rows in batches of 10 -> 4 group commits
    assert_eq!(processed.commit_count(), 4);
}

#[tokio::test]
async fn incremental_run_processes_only_new_dates() {
    let (raw, processed, runner) = setup(1000);
    raw.seed(rows_for_date("2024-01-01", 5));
    runner.run_incremental().await.unwrap();

    raw.seed(rows_for_date("2024-01-02", 3));
    let report = runner.run_incremental().await.unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.processed, 3);
    assert_eq!(processed.fact_count(), 8);

    let runs = processed.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1].mode, RunMode::Incremental);
    assert_eq!(runs[1].watermark_date, Some(date("2024-01-02")));
}

#[tokio::test]
async fn second_run_without_new_data_is_skipped() {
    let (raw, processed, runner) = setup(1000);
    raw.seed(rows_for_date("2024-01-01", 4));

    runner.run_incremental().await.unwrap();
    let report = runner.run_incremental().await.unwrap();

    assert_eq!(report.status, RunStatus::Skipped);
    assert_eq!(report.processed, 0);
    assert_eq!(report.errors, 0);
    assert_eq!(processed.fact_count(), 4);

    let status = processing_status(raw.as_ref(), processed.as_ref())
        .await
        .unwrap();
    assert!(!status.needs_processing);
    assert_eq!(status.unprocessed_count, 0);

    // skipped runs still leave an audit row
    let runs = processed.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1].status, RunStatus::Skipped);
}

#[tokio::test]
async fn empty_raw_layer_reports_nothing_to_do() {
    let (raw, processed, runner) = setup(1000);

    let status = processing_status(raw.as_ref(), processed.as_ref())
        .await
        .unwrap();
    assert!(!status.needs_processing);
    assert_eq!(status.unprocessed_count, 0);
    assert_eq!(status.last_raw_date, None);
    assert_eq!(status.last_processed_date, None);

    let report = runner.run_incremental().await.unwrap();
    assert_eq!(report.status, RunStatus::Skipped);
    assert_eq!(report.errors, 0);
}

#[tokio::test]
async fn clamped_counts_drive_event_expansion() {
    let (raw, processed, runner) = setup(1000);
    raw.seed(vec![raw_row(
        "2024-01-01",
        "/products",
        "widgets",
        "desktop",
        10,
        12,
        15,
        3.4,
    )]);

    let report = runner.run_incremental().await.unwrap();
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.processed, 1);
    assert_eq!(report.positions_created, 10);
    assert_eq!(report.clicks_created, 10);

    let facts = processed.facts();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].impressions, 10);
    assert_eq!(facts[0].clicks, 10);

    let fact_id = processed.fact_id_for("widgets").unwrap();
    let (positions, clicks) = processed.events_for(fact_id);

    let position_buckets: Vec<i32> = positions.iter().map(|e| e.position_bucket).collect();
    assert_eq!(position_buckets, vec![3, 3, 3, 3, 3, 3, 3, 2, 2, 4]);
    let position_seqs: Vec<i32> = positions.iter().map(|e| e.seq).collect();
    assert_eq!(position_seqs, (1..=10).collect::<Vec<i32>>());

    let click_buckets: Vec<i32> = clicks.iter().map(|e| e.position_bucket).collect();
    assert_eq!(click_buckets, vec![3, 3, 3, 3, 3, 3, 3, 3, 2, 2]);
    let click_seqs: Vec<i32> = clicks.iter().map(|e| e.seq).collect();
    assert_eq!(click_seqs, (1..=10).collect::<Vec<i32>>());
}

#[tokio::test]
async fn watermark_tracks_raw_layer_after_each_run() {
    let (raw, processed, runner) = setup(1000);

    raw.seed(rows_for_date("2024-01-01", 2));
    runner.run_incremental().await.unwrap();
    let status = processing_status(raw.as_ref(), processed.as_ref())
        .await
        .unwrap();
    assert_eq!(status.last_processed_date, Some(date("2024-01-01")));
    assert_eq!(status.last_processed_date, status.last_raw_date);

    raw.seed(rows_for_date("2024-01-02", 2));
    raw.seed(rows_for_date("2024-01-05", 2));
    runner.run_incremental().await.unwrap();
    let status = processing_status(raw.as_ref(), processed.as_ref())
        .await
        .unwrap();
    assert_eq!(status.last_processed_date, Some(date("2024-01-05")));
    assert_eq!(status.last_processed_date, status.last_raw_date);
}

#[tokio::test]
async fn full_reload_reproduces_the_catchup_row_count() {
    let (raw, processed, runner) = setup(1000);
    raw.seed(rows_for_date("2024-01-01", 6));
    raw.seed(rows_for_date("2024-01-02", 4));

    runner.run_incremental().await.unwrap();
    assert_eq!(processed.fact_count(), 10);

    let report = runner.run_full_reload().await.unwrap();
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.processed, 10);
    assert_eq!(processed.fact_count(), 10);

    // run history survives the reload and marks it explicitly
    let runs = processed.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].mode, RunMode::FullCatchup);
    assert_eq!(runs[1].mode, RunMode::FullReload);
}

#[tokio::test]
async fn full_reload_of_an_empty_raw_layer_is_skipped() {
    let (_raw, processed, runner) = setup(1000);

    let report = runner.run_full_reload().await.unwrap();
    assert_eq!(report.status, RunStatus::Skipped);
    assert_eq!(processed.fact_count(), 0);

    let runs = processed.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].mode, RunMode::FullReload);
    assert_eq!(runs[0].status, RunStatus::Skipped);
}

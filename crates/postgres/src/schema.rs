//! Table schemas for the raw (`rdl`) and processed (`ppl`) layers.
//!
//! All DDL is idempotent so `init-schema` can run against an existing
//! database.

/// SQL for creating the layer schemas.
pub const CREATE_SCHEMAS: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS rdl",
    "CREATE SCHEMA IF NOT EXISTS ppl",
];

/// SQL for creating the raw aggregate table.
///
/// Append-only, written by the collector. The key tuple is unique; the
/// surrogate id only exists to give batch reads a stable order.
pub const CREATE_RAW_AGGREGATES: &str = r#"
CREATE TABLE IF NOT EXISTS rdl.search_aggregates (
    id BIGSERIAL PRIMARY KEY,
    date DATE NOT NULL,
    page_path TEXT NOT NULL,
    query TEXT NOT NULL,
    device VARCHAR(20) NOT NULL,
    demand BIGINT NOT NULL,
    impressions BIGINT NOT NULL,
    clicks BIGINT NOT NULL,
    avg_position DOUBLE PRECISION NOT NULL,
    loaded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (date, page_path, query, device)
)
"#;

/// SQL for creating the normalized fact table.
pub const CREATE_FACT_AGGREGATES: &str = r#"
CREATE TABLE IF NOT EXISTS ppl.fact_aggregates (
    id BIGSERIAL PRIMARY KEY,
    date DATE NOT NULL,
    page_path TEXT NOT NULL,
    query TEXT NOT NULL,
    device VARCHAR(20) NOT NULL,
    demand BIGINT NOT NULL,
    impressions BIGINT NOT NULL,
    clicks BIGINT NOT NULL,
    avg_position DOUBLE PRECISION NOT NULL,
    UNIQUE (date, page_path, query, device)
)
"#;

/// SQL for creating the synthetic impression events table.
///
/// Rows are owned by their fact and disappear with it.
pub const CREATE_IMPRESSION_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS ppl.impression_events (
    fact_id BIGINT NOT NULL REFERENCES ppl.fact_aggregates(id) ON DELETE CASCADE,
    position_bucket INT NOT NULL,
    seq INT NOT NULL,
    PRIMARY KEY (fact_id, seq)
)
"#;

/// SQL for creating the synthetic click events table.
pub const CREATE_CLICK_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS ppl.click_events (
    fact_id BIGINT NOT NULL REFERENCES ppl.fact_aggregates(id) ON DELETE CASCADE,
    position_bucket INT NOT NULL,
    seq INT NOT NULL,
    PRIMARY KEY (fact_id, seq)
)
"#;

/// SQL for creating the run-metadata table. Append-only audit trail;
/// survives full reloads.
pub const CREATE_ETL_RUNS: &str = r#"
CREATE TABLE IF NOT EXISTS ppl.etl_runs (
    run_id UUID PRIMARY KEY,
    mode VARCHAR(20) NOT NULL,
    status VARCHAR(20) NOT NULL,
    watermark_date DATE,
    rows_processed BIGINT NOT NULL,
    positions_created BIGINT NOT NULL,
    clicks_created BIGINT NOT NULL,
    errors BIGINT NOT NULL,
    duration_ms BIGINT NOT NULL,
    started_at TIMESTAMPTZ NOT NULL
)
"#;

/// Supporting indexes for watermark and batch queries.
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_search_aggregates_date ON rdl.search_aggregates (date, id)",
    "CREATE INDEX IF NOT EXISTS idx_fact_aggregates_date ON ppl.fact_aggregates (date)",
];

/// All DDL statements in dependency order.
pub fn all_statements() -> Vec<&'static str> {
    let mut ddl: Vec<&'static str> = Vec::new();
    ddl.extend_from_slice(CREATE_SCHEMAS);
    ddl.push(CREATE_RAW_AGGREGATES);
    ddl.push(CREATE_FACT_AGGREGATES);
    ddl.push(CREATE_IMPRESSION_EVENTS);
    ddl.push(CREATE_CLICK_EVENTS);
    ddl.push(CREATE_ETL_RUNS);
    ddl.extend_from_slice(CREATE_INDEXES);
    ddl
}

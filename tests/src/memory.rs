//! In-memory store implementations mirroring the Postgres contracts,
//! including key-level dedup and commit-failure injection.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use etl_core::{
    ClickEvent, Error, NewRawAggregate, NormalizedFact, PositionEvent, ProcessedStore,
    ProcessedTx, RawAggregate, RawStore, Result, RunRecord,
};

fn same_key(a: &NormalizedFact, b: &NormalizedFact) -> bool {
    a.date == b.date && a.page_path == b.page_path && a.query == b.query && a.device == b.device
}

/// In-memory raw layer.
#[derive(Default)]
pub struct MemoryRawStore {
    rows: Mutex<Vec<RawAggregate>>,
    next_id: Mutex<i64>,
}

impl MemoryRawStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rows directly, without key dedup. Lets tests stage
    /// externally malformed data that `insert_aggregates` would reject.
    pub fn seed(&self, rows: Vec<NewRawAggregate>) {
        let mut stored = self.rows.lock();
        let mut next_id = self.next_id.lock();
        for row in rows {
            *next_id += 1;
            stored.push(RawAggregate {
                id: *next_id,
                date: row.date,
                page_path: row.page_path,
                query: row.query,
                device: row.device,
                demand: row.demand,
                impressions: row.impressions,
                clicks: row.clicks,
                position: row.position,
            });
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }
}

#[async_trait]
impl RawStore for MemoryRawStore {
    async fn max_date(&self) -> Result<Option<NaiveDate>> {
        Ok(self.rows.lock().iter().map(|r| r.date).max())
    }

    async fn count_all(&self) -> Result<i64> {
        Ok(self.rows.lock().len() as i64)
    }

    async fn count_since(&self, date: NaiveDate) -> Result<i64> {
        Ok(self.rows.lock().iter().filter(|r| r.date > date).count() as i64)
    }

    async fn distinct_dates_since(&self, since: Option<NaiveDate>) -> Result<Vec<NaiveDate>> {
        let dates: BTreeSet<NaiveDate> = self
            .rows
            .lock()
            .iter()
            .map(|r| r.date)
            .filter(|d| since.map_or(true, |s| *d > s))
            .collect();
        Ok(dates.into_iter().collect())
    }

    async fn read_batch(&self, offset: i64, limit: i64) -> Result<Vec<RawAggregate>> {
        let mut rows = self.rows.lock().clone();
        rows.sort_by(|a, b| (a.date, a.id).cmp(&(b.date, b.id)));
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn read_date(&self, date: NaiveDate) -> Result<Vec<RawAggregate>> {
        let mut rows: Vec<RawAggregate> = self
            .rows
            .lock()
            .iter()
            .filter(|r| r.date == date)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn insert_aggregates(&self, rows: &[NewRawAggregate]) -> Result<u64> {
        let mut inserted = 0u64;
        for row in rows {
            let exists = self.rows.lock().iter().any(|r| {
                r.date == row.date
                    && r.page_path == row.page_path
                    && r.query == row.query
                    && r.device == row.device
            });
            if !exists {
                self.seed(vec![row.clone()]);
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[derive(Debug, Clone)]
struct StoredFact {
    id: i64,
    fact: NormalizedFact,
}

#[derive(Default)]
struct ProcessedState {
    facts: Vec<StoredFact>,
    positions: Vec<(i64, PositionEvent)>,
    clicks: Vec<(i64, ClickEvent)>,
    runs: Vec<RunRecord>,
    next_id: i64,
    commits: u64,
    fail_commit_at: Option<u64>,
}

/// In-memory processed layer with transactional group buffering.
#[derive(Default)]
pub struct MemoryProcessedStore {
    state: Arc<Mutex<ProcessedState>>,
}

impl MemoryProcessedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `nth` commit (1-based, counted over the store's
    /// lifetime) fail with a store error.
    pub fn fail_commit_at(&self, nth: u64) {
        self.state.lock().fail_commit_at = Some(nth);
    }

    pub fn fact_count(&self) -> usize {
        self.state.lock().facts.len()
    }

    pub fn facts(&self) -> Vec<NormalizedFact> {
        self.state.lock().facts.iter().map(|s| s.fact.clone()).collect()
    }

    pub fn fact_id_for(&self, query: &str) -> Option<i64> {
        self.state
            .lock()
            .facts
            .iter()
            .find(|s| s.fact.query == query)
            .map(|s| s.id)
    }

    pub fn events_for(&self, fact_id: i64) -> (Vec<PositionEvent>, Vec<ClickEvent>) {
        let state = self.state.lock();
        let positions = state
            .positions
            .iter()
            .filter(|(id, _)| *id == fact_id)
            .map(|(_, e)| *e)
            .collect();
        let clicks = state
            .clicks
            .iter()
            .filter(|(id, _)| *id == fact_id)
            .map(|(_, e)| *e)
            .collect();
        (positions, clicks)
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.state.lock().runs.clone()
    }

    pub fn commit_count(&self) -> u64 {
        self.state.lock().commits
    }
}

struct MemoryTx {
    state: Arc<Mutex<ProcessedState>>,
    facts: Vec<StoredFact>,
    positions: Vec<(i64, PositionEvent)>,
    clicks: Vec<(i64, ClickEvent)>,
}

#[async_trait]
impl ProcessedTx for MemoryTx {
    async fn insert_fact(&mut self, fact: &NormalizedFact) -> Result<Option<i64>> {
        let mut state = self.state.lock();

        let exists = state
            .facts
            .iter()
            .chain(self.facts.iter())
            .any(|s| same_key(&s.fact, fact));
        if exists {
            return Ok(None);
        }

        state.next_id += 1;
        let id = state.next_id;
        self.facts.push(StoredFact {
            id,
            fact: fact.clone(),
        });
        Ok(Some(id))
    }

    async fn insert_events(
        &mut self,
        fact_id: i64,
        positions: &[PositionEvent],
        clicks: &[ClickEvent],
    ) -> Result<()> {
        self.positions
            .extend(positions.iter().map(|e| (fact_id, *e)));
        self.clicks.extend(clicks.iter().map(|e| (fact_id, *e)));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            state,
            facts,
            positions,
            clicks,
        } = *self;

        let mut state = state.lock();
        state.commits += 1;
        if state.fail_commit_at == Some(state.commits) {
            return Err(Error::store("injected commit failure"));
        }

        state.facts.extend(facts);
        state.positions.extend(positions);
        state.clicks.extend(clicks);
        Ok(())
    }
}

#[async_trait]
impl ProcessedStore for MemoryProcessedStore {
    async fn max_date(&self) -> Result<Option<NaiveDate>> {
        Ok(self.state.lock().facts.iter().map(|s| s.fact.date).max())
    }

    async fn count_facts(&self) -> Result<i64> {
        Ok(self.state.lock().facts.len() as i64)
    }

    async fn begin(&self) -> Result<Box<dyn ProcessedTx>> {
        Ok(Box::new(MemoryTx {
            state: self.state.clone(),
            facts: Vec::new(),
            positions: Vec::new(),
            clicks: Vec::new(),
        }))
    }

    async fn delete_all(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.facts.clear();
        state.positions.clear();
        state.clicks.clear();
        state.next_id = 0;
        Ok(())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        self.state.lock().runs.push(run.clone());
        Ok(())
    }
}

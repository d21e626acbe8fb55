//! In-memory knowledge index.
//!
//! Records live in a map behind a `tokio::sync::RwLock`: searches share the
//! read lock, mutations take the write lock, so a weight adjustment is
//! visible to every search that starts after it returns.

use async_trait::async_trait;
use answerdesk_core::error::IndexError;
use answerdesk_core::knowledge::{
    ImportReport, KnowledgeIndex, KnowledgeRecord, MatchCandidate, WeightBounds,
};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::text;

/// A matching key (the question or one variation) with its normalized terms.
#[derive(Debug, Clone)]
struct Key {
    text: String,
    terms: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct Entry {
    record: KnowledgeRecord,
    /// Insertion order; higher is more recent.
    seq: u64,
    keys: Vec<Key>,
}

impl Entry {
    fn new(record: KnowledgeRecord, seq: u64) -> Self {
        let keys = std::iter::once(&record.question_or_topic)
            .chain(record.variations.iter())
            .filter(|t| !t.trim().is_empty())
            .map(|t| Key {
                text: t.clone(),
                terms: text::terms(t),
            })
            .collect();
        Self { record, seq, keys }
    }

    /// Distinct terms across every key, counted once per record for document frequency.
    fn vocabulary(&self) -> BTreeSet<&String> {
        self.keys.iter().flat_map(|k| k.terms.iter()).collect()
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct State {
    entries: HashMap<String, Entry>,
    doc_freq: HashMap<String, usize>,
    next_seq: u64,
}

impl State {
    fn count_terms(&mut self, entry: &Entry) {
        for term in entry.vocabulary() {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
    }

    fn uncount_terms(&mut self, entry: &Entry) {
        for term in entry.vocabulary() {
            if let Some(n) = self.doc_freq.get_mut(term) {
                *n -= 1;
                if *n == 0 {
                    self.doc_freq.remove(term);
                }
            }
        }
    }

    fn insert(&mut self, record: KnowledgeRecord, overwrite: bool) -> Result<(), IndexError> {
        let seq = match self.entries.remove(&record.id) {
            Some(existing) if !overwrite => {
                let id = record.id.clone();
                self.entries.insert(id.clone(), existing);
                return Err(IndexError::DuplicateId(id));
            }
            Some(existing) => {
                self.uncount_terms(&existing);
                existing.seq
            }
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };

        let entry = Entry::new(record, seq);
        self.count_terms(&entry);
        self.entries.insert(entry.record.id.clone(), entry);
        Ok(())
    }

    fn ordered(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }

    /// Every record, oldest first.
    pub(crate) fn records(&self) -> Vec<KnowledgeRecord> {
        self.ordered().into_iter().map(|e| e.record.clone()).collect()
    }

    pub(crate) fn upsert(
        &mut self,
        record: KnowledgeRecord,
        overwrite: bool,
        bounds: &WeightBounds,
    ) -> Result<(), IndexError> {
        let mut record = prepare(record, bounds)?;
        if overwrite {
            if let Some(existing) = self.entries.get(&record.id) {
                record.created_at = existing.record.created_at;
                record.updated_at = Utc::now();
            }
        }
        let id = record.id.clone();
        self.insert(record, overwrite)?;
        debug!(record_id = %id, overwrite, "Record upserted");
        Ok(())
    }

    /// Upsert every record, counting duplicates and invalid records instead
    /// of failing on them.
    pub(crate) fn upsert_many(
        &mut self,
        records: Vec<KnowledgeRecord>,
        overwrite: bool,
        bounds: &WeightBounds,
    ) -> Result<ImportReport, IndexError> {
        let mut report = ImportReport::default();
        for record in records {
            match self.upsert(record, overwrite, bounds) {
                Ok(()) => report.inserted += 1,
                Err(IndexError::DuplicateId(id)) => {
                    debug!(record_id = %id, "Record already present");
                    report.duplicates += 1;
                }
                Err(IndexError::InvalidRecord(reason)) => {
                    warn!(%reason, "Skipping invalid record");
                    report.invalid += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    pub(crate) fn adjust_weight(
        &mut self,
        record_id: &str,
        delta: f32,
        bounds: &WeightBounds,
    ) -> Result<f32, IndexError> {
        let Some(entry) = self.entries.get_mut(record_id) else {
            warn!(record_id, "Weight adjustment for unknown record ignored");
            return Err(IndexError::UnknownId(record_id.to_string()));
        };
        let new_weight = bounds.clamp(entry.record.weight + delta);
        entry.record.weight = new_weight;
        entry.record.updated_at = Utc::now();
        debug!(record_id, delta, new_weight, "Weight adjusted");
        Ok(new_weight)
    }

    pub(crate) fn delete(&mut self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                self.uncount_terms(&entry);
                debug!(record_id = %id, "Record deleted");
                true
            }
            None => false,
        }
    }
}

/// A knowledge index held entirely in memory.
pub struct InMemoryIndex {
    state: RwLock<State>,
    bounds: WeightBounds,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::with_bounds(WeightBounds::default())
    }

    pub fn with_bounds(bounds: WeightBounds) -> Self {
        Self {
            state: RwLock::new(State::default()),
            bounds,
        }
    }

    /// Build an index from already-loaded records. Invalid and duplicate
    /// records are skipped with a warning.
    pub fn from_records(records: Vec<KnowledgeRecord>, bounds: WeightBounds) -> Self {
        let mut state = State::default();
        for record in records {
            match prepare(record, &bounds) {
                Ok(record) => {
                    if let Err(e) = state.insert(record, false) {
                        warn!(error = %e, "Skipping record");
                    }
                }
                Err(e) => warn!(error = %e, "Skipping record"),
            }
        }
        Self {
            state: RwLock::new(state),
            bounds,
        }
    }

    pub fn bounds(&self) -> WeightBounds {
        self.bounds
    }

    /// A private copy of the current state to stage a mutation on.
    pub(crate) async fn stage(&self) -> State {
        self.state.read().await.clone()
    }

    /// Replace the live state with a staged one.
    pub(crate) async fn install(&self, staged: State) {
        *self.state.write().await = staged;
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a record and clamp its weight into bounds.
fn prepare(
    mut record: KnowledgeRecord,
    bounds: &WeightBounds,
) -> Result<KnowledgeRecord, IndexError> {
    record.validate()?;
    record.weight = bounds.clamp(record.weight);
    Ok(record)
}

/// Ranking order: raw score, then weight, then most recently added.
fn rank(a: &(MatchCandidate, u64), b: &(MatchCandidate, u64)) -> Ordering {
    b.0.raw_score
        .total_cmp(&a.0.raw_score)
        .then_with(|| b.0.weight.total_cmp(&a.0.weight))
        .then_with(|| b.1.cmp(&a.1))
}

#[async_trait]
impl KnowledgeIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<MatchCandidate>, IndexError> {
        if query.trim().is_empty() {
            return Err(IndexError::InvalidQuery("query must not be empty".into()));
        }
        if k == 0 {
            return Err(IndexError::InvalidQuery("k must be at least 1".into()));
        }

        let query_terms = text::terms(query);
        if query_terms.is_empty() {
            debug!("Query has no searchable terms");
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let total = state.entries.len();

        let mut scored: Vec<(MatchCandidate, u64)> = state
            .entries
            .values()
            .filter_map(|entry| {
                let (key, score) = entry
                    .keys
                    .iter()
                    .map(|key| {
                        (key, text::idf_cosine(&query_terms, &key.terms, &state.doc_freq, total))
                    })
                    .max_by(|a, b| a.1.total_cmp(&b.1))?;
                if score <= 0.0 {
                    return None;
                }
                Some((
                    MatchCandidate {
                        record_id: entry.record.id.clone(),
                        raw_score: score,
                        normalized_confidence: 0.0,
                        matched_text: key.text.clone(),
                        query_terms: query_terms.len(),
                        matched_terms: key.terms.len(),
                        answer_text: entry.record.answer_text.clone(),
                        category: entry.record.category.clone(),
                        weight: entry.record.weight,
                    },
                    entry.seq,
                ))
            })
            .collect();

        scored.sort_by(rank);
        scored.truncate(k);

        Ok(scored.into_iter().map(|(c, _)| c).collect())
    }

    async fn upsert(&self, record: KnowledgeRecord, overwrite: bool) -> Result<(), IndexError> {
        self.state
            .write()
            .await
            .upsert(record, overwrite, &self.bounds)
    }

    async fn upsert_many(
        &self,
        records: Vec<KnowledgeRecord>,
        overwrite: bool,
    ) -> Result<ImportReport, IndexError> {
        self.state
            .write()
            .await
            .upsert_many(records, overwrite, &self.bounds)
    }

    async fn adjust_weight(&self, record_id: &str, delta: f32) -> Result<f32, IndexError> {
        self.state
            .write()
            .await
            .adjust_weight(record_id, delta, &self.bounds)
    }

    async fn get(&self, id: &str) -> Option<KnowledgeRecord> {
        let state = self.state.read().await;
        state.entries.get(id).map(|e| e.record.clone())
    }

    async fn find_by_answer(&self, answer_text: &str) -> Option<KnowledgeRecord> {
        let wanted = answer_text.trim();
        if wanted.is_empty() {
            return None;
        }
        let state = self.state.read().await;
        state
            .ordered()
            .into_iter()
            .rev()
            .find(|e| e.record.answer_text.trim() == wanted)
            .map(|e| e.record.clone())
    }

    async fn list(&self, category: Option<&str>) -> Vec<KnowledgeRecord> {
        let state = self.state.read().await;
        state
            .ordered()
            .into_iter()
            .filter(|e| category.is_none_or(|c| e.record.category.eq_ignore_ascii_case(c)))
            .map(|e| e.record.clone())
            .collect()
    }

    async fn delete(&self, id: &str) -> Result<bool, IndexError> {
        Ok(self.state.write().await.delete(id))
    }

    async fn count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

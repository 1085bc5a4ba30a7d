use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use pcodex_core::config::RetrievalConfig;
use pcodex_core::types::l2_normalize;
use pcodex_core::{Embedder, Error, Result};
use pcodex_vector::Index;

use crate::result::{Confidence, RetrievalResult, RetrievedChunk};

const KEYWORD_STEP: f32 = 0.1;
const KEYWORD_CAP: f32 = 0.3;

/// Query-time half of the pipeline. Holds the embedder and policy; the index
/// is passed in by whoever owns it.
pub struct Retriever {
    embedder: Box<dyn Embedder>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(embedder: Box<dyn Embedder>, config: RetrievalConfig) -> Self {
        Self { embedder, config }
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve with the configured `top_k` and `min_score`.
    pub fn retrieve_default(&self, index: &Index, query: &str) -> Result<RetrievalResult> {
        self.retrieve(index, query, self.config.top_k, self.config.min_score)
    }

    /// Rank up to `k` chunks for `query`. The result is weak when nothing
    /// matched, the best raw similarity is below `min_score`, or the mean is
    /// below `min_mean_score` when one is configured.
    pub fn retrieve(&self, index: &Index, query: &str, k: usize, min_score: f32) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query is empty".into()));
        }
        if index.is_empty() || k == 0 {
            debug!(k, "nothing to retrieve");
            return Ok(RetrievalResult::empty(self.suggestions(index)));
        }
        if self.embedder.id() != index.embedder_id() || self.embedder.dim() != index.dim() {
            return Err(Error::index_missing(format!(
                "index was built with {} ({} dims), querying with {} ({} dims)",
                index.embedder_id(),
                index.dim(),
                self.embedder.id(),
                self.embedder.dim()
            )));
        }

        let mut q = self.embedder.embed(query)?;
        if q.len() != index.dim() {
            return Err(Error::ModelUnavailable(format!("query vector has {} dimensions, expected {}", q.len(), index.dim())));
        }
        l2_normalize(&mut q);

        let candidates = index.query(&q, k.saturating_mul(self.config.oversample.max(1)))?;
        let query_terms = keywords(query);
        let mut ranked: Vec<RetrievedChunk> = candidates
            .into_iter()
            .filter_map(|hit| {
                let chunk = index.record(hit.position)?.clone();
                let score = self.boost(hit.score, &query_terms, &chunk.source, &chunk.text);
                Some(RetrievedChunk { position: hit.position, chunk, similarity: hit.score, score })
            })
            .collect();
        // candidates arrive in similarity order, so the first is the raw best
        let best_raw = ranked.first().map(|h| h.position);
        // stable: equal boosted scores keep similarity order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        // boosts reorder, but the cap must never drop the strongest evidence
        if let Some(i) = best_raw.and_then(|pos| ranked.iter().position(|h| h.position == pos)) {
            let best = ranked.remove(i);
            ranked.insert(0, best);
        }

        let mut hits = self.cap_per_source(ranked, k);
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        let confidence = Confidence::of(&hits);
        let weak = hits.is_empty()
            || confidence.top < min_score
            || self.config.min_mean_score.is_some_and(|floor| confidence.mean < floor);
        let suggestions = if weak { self.suggestions(index) } else { Vec::new() };

        info!(hits = hits.len(), top = confidence.top, mean = confidence.mean, weak, "retrieved");
        Ok(RetrievalResult { hits, confidence, weak, suggestions })
    }

    fn boost(&self, similarity: f32, query_terms: &BTreeSet<String>, source: &str, text: &str) -> f32 {
        if similarity <= 0.0 {
            return similarity;
        }
        let mut score = similarity;
        if self.config.keyword_boost && !query_terms.is_empty() {
            let shared = keywords(text).intersection(query_terms).count();
            score *= 1.0 + (KEYWORD_STEP * shared as f32).min(KEYWORD_CAP);
        }
        if let Some(priority) = self.config.priority_source.as_deref() {
            if !priority.is_empty() && source.to_lowercase().contains(&priority.to_lowercase()) {
                score *= self.config.priority_boost;
            }
        }
        score
    }

    fn cap_per_source(&self, ranked: Vec<RetrievedChunk>, k: usize) -> Vec<RetrievedChunk> {
        let limit = self.config.per_source_limit;
        let mut per_source: HashMap<String, usize> = HashMap::new();
        let mut hits = Vec::with_capacity(k.min(ranked.len()));
        for hit in ranked {
            if hits.len() >= k {
                break;
            }
            let seen = per_source.entry(hit.chunk.source.clone()).or_default();
            if limit > 0 && *seen >= limit {
                continue;
            }
            *seen += 1;
            hits.push(hit);
        }
        hits
    }

    /// Documents with the fewest chunks, fewest first, ties by name.
    fn suggestions(&self, index: &Index) -> Vec<String> {
        let mut counts: Vec<(usize, &str)> = index.chunk_counts().into_iter().map(|(name, n)| (n, name)).collect();
        counts.sort();
        counts.into_iter().take(self.config.max_suggestions).map(|(_, name)| name.to_string()).collect()
    }
}

/// Lowercased alphanumeric words longer than two characters.
fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

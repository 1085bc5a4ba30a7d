//! Model-free embedder based on signed feature hashing of word tokens.
//!
//! Vectors are bag-of-words with sublinear term frequency, so cosine
//! similarity tracks vocabulary overlap. Deterministic across runs and
//! platforms; used for tests and for machines without model weights.
use std::collections::BTreeMap;
use std::hash::Hasher;

use twox_hash::XxHash64;

use pcodex_core::types::l2_normalize;
use pcodex_core::{Embedder, Error, Result};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "did", "do", "does", "for", "from", "had", "has",
    "have", "how", "in", "into", "is", "it", "its", "me", "my", "of", "on", "or", "so", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "to", "was", "were", "what", "when", "where", "which",
    "who", "whom", "why", "will", "with", "you", "your",
];

pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("hash embedder dimension must be > 0".into()));
        }
        Ok(Self { dim, id: format!("hash:xxh64:d{dim}") })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for token in terms(text) {
            *counts.entry(token).or_default() += 1;
        }
        if counts.is_empty() {
            // still a unit vector, keyed on the raw text
            counts.insert(text.trim().to_lowercase(), 1);
        }
        let mut v = vec![0f32; self.dim];
        for (token, tf) in &counts {
            let h = hash_token(token);
            let idx = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
            v[idx] += sign * (1.0 + (*tf as f32).ln());
        }
        if l2_normalize(&mut v) == 0.0 {
            // opposite-signed collisions cancelled out exactly
            v[0] = 1.0;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Lowercased alphanumeric terms, stopwords and single characters dropped.
pub fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}

fn hash_token(token: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(token.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcodex_core::types::dot;

    #[test]
    fn terms_drop_stopwords_and_punctuation() {
        let t: Vec<String> = terms("What programming languages does the candidate's team know?").collect();
        assert_eq!(t, vec!["programming", "languages", "candidate", "team", "know"]);
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let e = HashEmbedder::new(384).unwrap();
        let q = e.embed("rust programming").unwrap();
        let near = e.embed("I enjoy rust programming every day").unwrap();
        let far = e.embed("baking sourdough bread at weekends").unwrap();
        assert!(dot(&q, &near) > dot(&q, &far));
        assert!(dot(&q, &near) > 0.4);
    }

    #[test]
    fn stopword_only_text_still_normalized() {
        let e = HashEmbedder::new(64).unwrap();
        for text in ["", "the and of", "?"] {
            let v = e.embed(text).unwrap();
            let norm = dot(&v, &v).sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "{text:?} norm={norm}");
        }
    }

    #[test]
    fn zero_dimension_rejected() {
        assert!(HashEmbedder::new(0).is_err());
    }
}

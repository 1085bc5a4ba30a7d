use std::collections::BTreeSet;

use serde::Serialize;

use pcodex_core::Chunk;

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    /// Position of the chunk in the index it came from.
    pub position: usize,
    pub chunk: Chunk,
    /// Raw cosine similarity with the query.
    pub similarity: f32,
    /// Similarity after keyword and priority boosts; used for ranking only.
    pub score: f32,
}

impl RetrievedChunk {
    pub fn text(&self) -> &str {
        &self.chunk.text
    }

    pub fn source(&self) -> &str {
        &self.chunk.source
    }

    pub fn heading(&self) -> &str {
        &self.chunk.heading
    }

    pub fn label(&self) -> String {
        self.chunk.label()
    }
}

/// Aggregate over the raw similarities of the returned hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Confidence {
    pub top: f32,
    pub mean: f32,
}

impl Confidence {
    pub fn of(hits: &[RetrievedChunk]) -> Self {
        if hits.is_empty() {
            return Self::default();
        }
        let top = hits.iter().map(|h| h.similarity).fold(f32::NEG_INFINITY, f32::max);
        let mean = hits.iter().map(|h| h.similarity).sum::<f32>() / hits.len() as f32;
        Self { top, mean }
    }
}

/// Ranked evidence for one query. A weak result is a normal outcome: the
/// caller should answer "not enough information" rather than guess.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievedChunk>,
    pub confidence: Confidence,
    pub weak: bool,
    /// Under-represented documents, populated only when `weak`. Advisory.
    pub suggestions: Vec<String>,
}

impl RetrievalResult {
    pub fn empty(suggestions: Vec<String>) -> Self {
        Self { hits: Vec::new(), confidence: Confidence::default(), weak: true, suggestions }
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// `[Source: file#heading]` followed by the chunk text, one block per hit.
    pub fn context_block(&self) -> String {
        self.hits
            .iter()
            .map(|h| format!("[Source: {}]\n{}", h.label(), h.text().trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// One `[Doc: file#heading]` line per distinct label, in rank order.
    pub fn sources_footer(&self) -> String {
        let mut seen = BTreeSet::new();
        self.hits
            .iter()
            .map(RetrievedChunk::label)
            .filter(|label| seen.insert(label.clone()))
            .map(|label| format!("[Doc: {label}]"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Guidance for the answer composer when the evidence is thin.
    pub fn missing_hint(&self) -> Option<String> {
        if !self.weak {
            return None;
        }
        let mut hint = String::from(
            "Context appears thin. If the question cannot be answered strictly from the context, \
             say what is missing instead of guessing",
        );
        if self.suggestions.is_empty() {
            hint.push_str(" and suggest adding a relevant document.");
        } else {
            hint.push_str(&format!(
                ". Sparsely covered documents that could be expanded: {}.",
                self.suggestions.join(", ")
            ));
        }
        Some(hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, heading: &str, text: &str, similarity: f32) -> RetrievedChunk {
        RetrievedChunk {
            position: 0,
            chunk: Chunk {
                id: format!("{source}#0"),
                source: source.into(),
                heading: heading.into(),
                heading_path: heading.into(),
                start: 0,
                end: text.len(),
                chunk_index: 0,
                content_hash: String::new(),
                text: text.into(),
            },
            similarity,
            score: similarity,
        }
    }

    fn result(hits: Vec<RetrievedChunk>, weak: bool) -> RetrievalResult {
        let confidence = Confidence::of(&hits);
        RetrievalResult { hits, confidence, weak, suggestions: vec!["background.md".into()] }
    }

    #[test]
    fn confidence_uses_raw_similarity() {
        let mut a = hit("cv.md", "SKILLS", "x", 0.6);
        a.score = 0.9;
        let c = Confidence::of(&[a, hit("cv.md", "", "y", 0.2)]);
        assert!((c.top - 0.6).abs() < 1e-6);
        assert!((c.mean - 0.4).abs() < 1e-6);
        assert_eq!(Confidence::of(&[]), Confidence::default());
    }

    #[test]
    fn context_and_footer_cite_labels() {
        let r = result(
            vec![hit("cv.md", "SKILLS", "Rust\n", 0.7), hit("cv.md", "SKILLS", "SQL", 0.5), hit("notes.txt", "", "n", 0.4)],
            false,
        );
        assert_eq!(r.context_block(), "[Source: cv.md#SKILLS]\nRust\n\n[Source: cv.md#SKILLS]\nSQL\n\n[Source: notes.txt]\nn");
        assert_eq!(r.sources_footer(), "[Doc: cv.md#SKILLS]\n[Doc: notes.txt]");
        assert_eq!(r.missing_hint(), None);
    }

    #[test]
    fn weak_hint_names_suggestions() {
        let r = result(Vec::new(), true);
        let hint = r.missing_hint().unwrap();
        assert!(hint.contains("background.md"), "{hint}");
    }
}

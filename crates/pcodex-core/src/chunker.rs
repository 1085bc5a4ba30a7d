//! Markdown-aware chunking.
//!
//! Documents are first cut into sections at heading lines, then each section
//! is packed into windows of `target_words` words. Consecutive windows of the
//! same section share `overlap_words` words. Chunk spans tile the document:
//! the first starts at byte 0, the last ends at the document length, and no
//! chunk starts after its predecessor ends.

use tracing::debug;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Document};

const NO_HEADING_PATH: &str = "Document";

#[derive(Debug, Clone, Default)]
pub struct MarkdownChunker {
    config: ChunkingConfig,
}

/// A heading-delimited byte range with the labels in force inside it.
#[derive(Debug)]
struct Section {
    start: usize,
    end: usize,
    heading: String,
    heading_path: String,
}

impl MarkdownChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn chunk_corpus(&self, docs: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = docs.iter().flat_map(|d| self.chunk_document(d)).collect();
        debug!(documents = docs.len(), chunks = chunks.len(), "chunked corpus");
        chunks
    }

    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.chunk_text(&doc.name, &doc.text)
    }

    pub fn chunk_text(&self, source: &str, text: &str) -> Vec<Chunk> {
        let target = self.config.target_words.max(1);
        let step = target.saturating_sub(self.config.overlap_words).max(1);

        let mut chunks = Vec::new();
        let mut pending_start: Option<usize> = None;
        for section in self.sections(text) {
            let words = word_spans(&text[section.start..section.end], section.start);
            if words.is_empty() {
                // fold blank stretches into the next section so spans stay contiguous
                pending_start.get_or_insert(section.start);
                continue;
            }
            let section_start = pending_start.take().unwrap_or(section.start);
            let n = words.len();
            let mut wstart = 0;
            loop {
                let wend = (wstart + target).min(n);
                let start = if wstart == 0 { section_start } else { words[wstart].0 };
                let end = if wend == n { section.end } else { words[wend].0 };
                let chunk_index = chunks.len();
                chunks.push(make_chunk(source, chunk_index, &section, start, end, text));
                if wend == n {
                    break;
                }
                wstart += step;
            }
        }

        // trailing blank section: extend the last chunk to the end of the text
        if let (Some(_), Some(last)) = (pending_start, chunks.last_mut()) {
            last.end = text.len();
            last.text = text[last.start..last.end].to_string();
            last.content_hash = content_hash(&last.text);
        }
        chunks
    }

    fn sections(&self, text: &str) -> Vec<Section> {
        let max_level = self.config.max_heading_level.clamp(1, 6);
        let mut levels: Vec<Option<String>> = vec![None; max_level];
        let mut sections = Vec::new();
        let mut current = Section {
            start: 0,
            end: text.len(),
            heading: String::new(),
            heading_path: NO_HEADING_PATH.to_string(),
        };
        let mut in_fence = false;
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            let Some((level, title)) = parse_heading(line, max_level) else { continue };

            levels[level - 1] = Some(title.clone());
            for deeper in levels.iter_mut().skip(level) {
                *deeper = None;
            }
            if line_start > current.start {
                current.end = line_start;
                sections.push(current);
            }
            current = Section {
                start: line_start,
                end: text.len(),
                heading: title,
                heading_path: heading_path(&levels),
            };
        }
        if current.start < text.len() {
            sections.push(current);
        }
        sections
    }
}

fn make_chunk(source: &str, chunk_index: usize, section: &Section, start: usize, end: usize, text: &str) -> Chunk {
    let body = text[start..end].to_string();
    Chunk {
        id: format!("{source}#{chunk_index}"),
        source: source.to_string(),
        heading: section.heading.clone(),
        heading_path: section.heading_path.clone(),
        start,
        end,
        chunk_index,
        content_hash: content_hash(&body),
        text: body,
    }
}

pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// `# Title` style ATX heading up to `max_level`; returns level and title.
fn parse_heading(line: &str, max_level: usize) -> Option<(usize, String)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > max_level {
        return None;
    }
    let rest = &line[level..];
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')) {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim_end();
    Some((level, title.to_string()))
}

fn heading_path(levels: &[Option<String>]) -> String {
    let parts: Vec<&str> = levels.iter().flatten().map(String::as_str).filter(|s| !s.is_empty()).collect();
    if parts.is_empty() { NO_HEADING_PATH.to_string() } else { parts.join(" > ") }
}

/// Byte spans of whitespace-separated words, shifted by `base`.
fn word_spans(text: &str, base: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((base + s, base + i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((base + s, base + text.len()));
    }
    spans
}

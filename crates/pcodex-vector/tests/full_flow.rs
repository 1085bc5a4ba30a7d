use std::fs;

use pcodex_core::{Chunk, Document, Embedder, Error, MarkdownChunker};
use pcodex_embed::HashEmbedder;
use pcodex_vector::schema::{CURRENT_FILE, META_FILE, VECTORS_FILE};
use pcodex_vector::{IndexMeta, IndexStore};
use tempfile::TempDir;

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "cv.md",
            "# SKILLS\nProgramming languages I know: Rust, Python, TypeScript, SQL.\n\n# EXPERIENCE\nBuilt data pipelines and search services at a logistics company.\n",
        ),
        Document::new("background.md", "# Family\nGrew up on a farm with two sisters and a dog.\n"),
        Document::new("empty.md", "\n\n"),
    ]
}

fn build_default(dir: &TempDir) -> (IndexStore, HashEmbedder, pcodex_vector::Index) {
    let store = IndexStore::new(dir.path().join("index"));
    let embedder = HashEmbedder::new(256).unwrap();
    let index = store.build_corpus(&embedder, &MarkdownChunker::default(), &corpus()).unwrap();
    (store, embedder, index)
}

struct BrokenEmbedder {
    dim: usize,
    emit: usize,
}

impl Embedder for BrokenEmbedder {
    fn id(&self) -> &str {
        "broken"
    }
    fn dim(&self) -> usize {
        self.dim
    }
    fn embed_batch(&self, texts: &[String]) -> pcodex_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; self.emit]).collect())
    }
}

#[test]
fn build_pairs_every_vector_with_a_record() {
    let dir = TempDir::new().unwrap();
    let (store, _, built) = build_default(&dir);
    assert_eq!(built.len(), 3);
    let loaded = store.load().unwrap();
    assert_eq!(loaded.len(), built.len());
    assert_eq!(loaded.records(), built.records());
    for pos in 0..loaded.len() {
        assert_eq!(loaded.vector(pos), built.vector(pos));
    }
    assert_eq!(loaded.generation(), built.generation());
}

#[test]
fn documents_without_chunks_are_recorded() {
    let dir = TempDir::new().unwrap();
    let (_, _, index) = build_default(&dir);
    let counts = index.chunk_counts();
    assert_eq!(counts.get("cv.md"), Some(&2));
    assert_eq!(counts.get("background.md"), Some(&1));
    assert_eq!(counts.get("empty.md"), Some(&0));
}

#[test]
fn stored_chunk_vector_ranks_itself_first() {
    let dir = TempDir::new().unwrap();
    let (store, embedder, _) = build_default(&dir);
    let index = store.load().unwrap();
    let family = index.records().iter().position(|c| c.heading == "Family").unwrap();
    let q = embedder.embed(&index.records()[family].text).unwrap();
    let hits = index.query(&q, 3).unwrap();
    assert_eq!(hits[0].position, family);
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn empty_build_loads_as_empty_index() {
    let dir = TempDir::new().unwrap();
    let store = IndexStore::new(dir.path());
    let embedder = HashEmbedder::new(64).unwrap();
    store.build(&embedder, &[]).unwrap();
    let index = store.load().unwrap();
    assert!(index.is_empty());
    assert_eq!(index.dim(), 64);
    assert!(index.query(&embedder.embed("anything").unwrap(), 5).unwrap().is_empty());
}

#[test]
fn load_without_build_is_index_missing() {
    let dir = TempDir::new().unwrap();
    let err = IndexStore::new(dir.path()).load().unwrap_err();
    assert!(err.needs_rebuild(), "{err}");
    assert!(matches!(IndexStore::new(dir.path()).status(), Err(Error::IndexMissing(_))));
}

#[test]
fn count_mismatch_is_index_missing() {
    let dir = TempDir::new().unwrap();
    let (store, _, index) = build_default(&dir);
    let meta_path = store.root().join("generations").join(index.generation().unwrap()).join(META_FILE);
    let mut meta: IndexMeta = serde_json::from_slice(&fs::read(&meta_path).unwrap()).unwrap();
    meta.records.pop();
    meta.count -= 1;
    fs::write(&meta_path, serde_json::to_vec(&meta).unwrap()).unwrap();
    assert!(matches!(store.load(), Err(Error::IndexMissing(_))));
}

#[test]
fn corrupt_or_missing_vectors_are_index_missing() {
    let dir = TempDir::new().unwrap();
    let (store, _, index) = build_default(&dir);
    let vectors = store.root().join("generations").join(index.generation().unwrap()).join(VECTORS_FILE);
    let bytes = fs::read(&vectors).unwrap();
    fs::write(&vectors, &bytes[..bytes.len() - 3]).unwrap();
    assert!(matches!(store.load(), Err(Error::IndexMissing(_))));
    fs::remove_file(&vectors).unwrap();
    assert!(matches!(store.load(), Err(Error::IndexMissing(_))));
}

#[test]
fn dangling_current_is_index_missing() {
    let dir = TempDir::new().unwrap();
    let (store, _, _) = build_default(&dir);
    fs::write(store.root().join(CURRENT_FILE), "no-such-generation\n").unwrap();
    assert!(matches!(store.load(), Err(Error::IndexMissing(_))));
}

#[test]
fn rebuild_replaces_and_prunes() {
    let dir = TempDir::new().unwrap();
    let store = IndexStore::new(dir.path()).with_keep_generations(2).with_batch_size(1);
    let embedder = HashEmbedder::new(128).unwrap();
    let chunker = MarkdownChunker::default();
    let docs = corpus();
    for i in 0..3 {
        store.build_corpus(&embedder, &chunker, &docs[..=i]).unwrap();
    }
    let index = store.load().unwrap();
    assert_eq!(index.documents().len(), 3);
    let gens = store.generations().unwrap();
    assert_eq!(gens.len(), 2);
    let status = store.status().unwrap();
    assert_eq!(gens.last().map(String::as_str), Some(status.generation.as_str()));
    assert_eq!(status.count, index.len());
    assert_eq!(status.embedder_id, "hash:xxh64:d128");

    // an earlier, smaller corpus fully replaces the larger one
    store.build_corpus(&embedder, &chunker, &docs[1..2]).unwrap();
    let index = store.load().unwrap();
    assert_eq!(index.len(), 1);
    assert!(index.records().iter().all(|c| c.source == "background.md"));
}

#[test]
fn build_from_chunks_derives_documents_in_order() {
    let dir = TempDir::new().unwrap();
    let store = IndexStore::new(dir.path());
    let chunker = MarkdownChunker::default();
    let mut chunks: Vec<Chunk> = chunker.chunk_document(&corpus()[1]);
    chunks.extend(chunker.chunk_document(&corpus()[0]));
    let index = store.build(&HashEmbedder::new(32).unwrap(), &chunks).unwrap();
    let names: Vec<&str> = index.documents().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["background.md", "cv.md"]);
}

#[test]
fn bad_embedder_output_fails_build_and_keeps_previous_index() {
    let dir = TempDir::new().unwrap();
    let (store, _, before) = build_default(&dir);
    let chunks = before.records().to_vec();

    let wrong_dim = BrokenEmbedder { dim: 8, emit: 4 };
    assert!(matches!(store.build(&wrong_dim, &chunks), Err(Error::ModelUnavailable(_))));
    let zeros = BrokenEmbedder { dim: 8, emit: 8 };
    assert!(matches!(store.build(&zeros, &chunks), Err(Error::ModelUnavailable(_))));

    let after = store.load().unwrap();
    assert_eq!(after.generation(), before.generation());
}

/// Emits vectors of norm well above one, scaled differently per text.
struct UnnormalizedEmbedder;

impl Embedder for UnnormalizedEmbedder {
    fn id(&self) -> &str {
        "unnormalized"
    }
    fn dim(&self) -> usize {
        2
    }
    fn embed_batch(&self, texts: &[String]) -> pcodex_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![3.0, 4.0 + t.len() as f32]).collect())
    }
}

#[test]
fn stored_vectors_are_unit_length() {
    let dir = TempDir::new().unwrap();
    let store = IndexStore::new(dir.path());
    store.build_corpus(&UnnormalizedEmbedder, &MarkdownChunker::default(), &corpus()).unwrap();
    let index = store.load().unwrap();
    assert_eq!(index.len(), 3);
    for pos in 0..index.len() {
        let v = index.vector(pos).unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "row {pos} has norm {norm}");
    }

    let (_, _, hashed) = build_default(&TempDir::new().unwrap());
    for pos in 0..hashed.len() {
        let norm = hashed.vector(pos).unwrap().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}

#[test]
fn unpublished_build_does_not_affect_readers() {
    let dir = TempDir::new().unwrap();
    let (store, _, published) = build_default(&dir);

    // a build that staged files but never reached the CURRENT flip
    let staging = store.root().join(".staging-inflight");
    fs::create_dir(&staging).unwrap();
    fs::write(staging.join(VECTORS_FILE), b"PCXV").unwrap();
    let unpublished = store.root().join("generations").join("000002-20990101T000000000Z-deadbeef");
    fs::create_dir(&unpublished).unwrap();
    fs::write(unpublished.join(VECTORS_FILE), b"PCXV").unwrap();
    fs::write(unpublished.join(META_FILE), b"{}").unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.generation(), published.generation());
    assert_eq!(loaded.records(), published.records());
    assert_eq!(store.status().unwrap().generation, published.generation().unwrap());
}

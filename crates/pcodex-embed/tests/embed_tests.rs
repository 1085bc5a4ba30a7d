use pcodex_core::config::{EmbeddingBackend, EmbeddingConfig};
use pcodex_core::{Embedder, Error};
use pcodex_embed::{embedder_from_config, BertEmbedder};

fn hash_config() -> EmbeddingConfig {
    EmbeddingConfig { backend: EmbeddingBackend::Hash, ..EmbeddingConfig::default() }
}

#[test]
fn hash_embedder_shapes_and_determinism() {
    let embedder = embedder_from_config(&hash_config()).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string(), "something else".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 3, "one vector per input, in order");

    let v1 = &embs[0];
    let v2 = &embs[1];
    assert_eq!(v1.len(), 384, "embedding dim is 384");
    assert_eq!(embedder.dim(), 384);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // bit-identical for the same input
    assert_eq!(v1, v2);
    assert_ne!(v1, &embs[2]);
}

#[test]
fn single_embed_matches_batch() {
    let embedder = embedder_from_config(&hash_config()).expect("embedder");
    let single = embedder.embed("grounded answers").expect("embed");
    let batch = embedder.embed_batch(&["grounded answers".to_string()]).expect("batch");
    assert_eq!(single, batch[0]);
}

#[test]
fn empty_batch_is_empty() {
    let embedder = embedder_from_config(&hash_config()).expect("embedder");
    assert!(embedder.embed_batch(&[]).expect("batch").is_empty());
}

#[test]
fn missing_model_is_model_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let config = EmbeddingConfig {
        backend: EmbeddingBackend::Bert,
        model_dir: tmp.path().join("absent").to_string_lossy().to_string(),
        cpu_only: true,
        ..EmbeddingConfig::default()
    };
    let err = BertEmbedder::load(&config).err().expect("load must fail");
    assert!(matches!(err, Error::ModelUnavailable(_)), "got {err:?}");
}

#[test]
fn incomplete_model_dir_is_model_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("config.json"), r#"{"hidden_size": 384}"#).unwrap();
    let config = EmbeddingConfig {
        model_dir: tmp.path().to_string_lossy().to_string(),
        cpu_only: true,
        ..EmbeddingConfig::default()
    };
    assert!(matches!(embedder_from_config(&config), Err(Error::ModelUnavailable(_))));
}

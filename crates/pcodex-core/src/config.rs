//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, so
//! `APP_RETRIEVAL__MIN_SCORE=0.3` sets `retrieval.min_score`). The resulting
//! [`Settings`] record is built once at startup and its sections are handed to
//! the chunker, embedder, index store and retriever.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the source documents.
    pub data_dir: String,
    /// Directory holding persisted index generations.
    pub index_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { data_dir: "data".to_string(), index_dir: ".pcodex/index".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per chunk (~800-1200 tokens at 0.75 words/token).
    pub target_words: usize,
    /// Words repeated at the start of the next chunk of the same section.
    pub overlap_words: usize,
    /// Deepest `#` level treated as a section boundary.
    pub max_heading_level: usize,
    /// File extensions picked up by the corpus loader.
    pub extensions: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_words: 950,
            overlap_words: 120,
            max_heading_level: 3,
            extensions: vec!["md".to_string(), "markdown".to_string(), "txt".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Pretrained BERT sentence encoder run through candle.
    Bert,
    /// Deterministic feature hashing, no model files required.
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model_dir: String,
    pub max_len: usize,
    pub batch_size: usize,
    /// Output dimension of the hash backend. The BERT backend reads its own.
    pub dim: usize,
    pub cpu_only: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Bert,
            model_dir: "models/all-MiniLM-L6-v2".to_string(),
            max_len: 256,
            batch_size: 32,
            dim: 384,
            cpu_only: false,
        }
    }
}

/// Retrieval policy. The thresholds are tunable heuristics, not calibrated
/// probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Minimum cosine similarity of the best hit for a result to be strong.
    pub min_score: f32,
    /// Optional floor on the mean similarity of the returned hits.
    pub min_mean_score: Option<f32>,
    /// Candidates fetched per requested hit before boosting and capping.
    pub oversample: usize,
    /// Max hits per source document; `0` disables the cap.
    pub per_source_limit: usize,
    pub keyword_boost: bool,
    /// Substring of a source name whose chunks get `priority_boost`.
    pub priority_source: Option<String>,
    pub priority_boost: f32,
    pub max_suggestions: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_score: 0.20,
            min_mean_score: None,
            oversample: 3,
            per_source_limit: 2,
            keyword_boost: true,
            priority_source: None,
            priority_boost: 1.3,
            max_suggestions: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Generations kept on disk after a flip, the active one included.
    pub keep_generations: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { keep_generations: 2 }
    }
}

impl Settings {
    /// Load settings for the environment named by `RUST_ENV` (default `dev`).
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let settings: Settings = Self::figment(env_name)
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.target_words == 0 {
            return Err(Error::InvalidConfig("chunking.target_words must be > 0".into()));
        }
        if c.overlap_words >= c.target_words {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap_words ({}) must be smaller than target_words ({})",
                c.overlap_words, c.target_words
            )));
        }
        if !(1..=6).contains(&c.max_heading_level) {
            return Err(Error::InvalidConfig("chunking.max_heading_level must be within 1..=6".into()));
        }
        let e = &self.embedding;
        if e.batch_size == 0 || e.dim == 0 || e.max_len == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size, dim and max_len must be > 0".into()));
        }
        let r = &self.retrieval;
        if r.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be > 0".into()));
        }
        if !(-1.0..=1.0).contains(&r.min_score) {
            return Err(Error::InvalidConfig(format!("retrieval.min_score {} is outside [-1, 1]", r.min_score)));
        }
        if r.oversample == 0 {
            return Err(Error::InvalidConfig("retrieval.oversample must be > 0".into()));
        }
        if self.index.keep_generations == 0 {
            return Err(Error::InvalidConfig("index.keep_generations must be > 0".into()));
        }
        Ok(())
    }

    pub fn data_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.paths.data_dir)
    }

    pub fn index_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.paths.index_dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        s.validate().expect("defaults validate");
        assert_eq!(s.chunking.target_words, 950);
        assert_eq!(s.chunking.overlap_words, 120);
        assert_eq!(s.embedding.dim, 384);
    }

    #[test]
    fn toml_and_env_layers_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [retrieval]
                top_k = 6
                min_score = 0.25

                [embedding]
                backend = "hash"
                "#,
            )?;
            jail.create_file("config.test.toml", "[chunking]\ntarget_words = 400\n")?;
            jail.set_env("APP_RETRIEVAL__MIN_SCORE", "0.3");

            let s = Settings::load_for_env("test").expect("load");
            assert_eq!(s.retrieval.top_k, 6);
            assert!((s.retrieval.min_score - 0.3).abs() < 1e-6);
            assert_eq!(s.embedding.backend, EmbeddingBackend::Hash);
            assert_eq!(s.chunking.target_words, 400);
            assert_eq!(s.chunking.overlap_words, 120);
            Ok(())
        });
    }

    #[test]
    fn overlap_not_smaller_than_target_is_rejected() {
        let mut s = Settings::default();
        s.chunking.overlap_words = s.chunking.target_words;
        assert!(matches!(s.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/codex");
        assert_eq!(resolve_with_base(base, "data"), PathBuf::from("/srv/codex/data"));
        assert_eq!(resolve_with_base(base, "/abs/idx"), PathBuf::from("/abs/idx"));
    }
}

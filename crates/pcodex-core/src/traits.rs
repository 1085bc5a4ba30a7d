use crate::error::{Error, Result};

/// Narrow capability over a sentence-embedding model.
///
/// Implementations must be deterministic for a fixed model and return
/// L2-normalized vectors of length [`Embedder::dim`], in input order.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model/backend (e.g. `bert:all-MiniLM-L6-v2:d384`).
    /// Vectors from different ids do not share a space.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::ModelUnavailable(format!("{} returned no vector", self.id())))
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn id(&self) -> &str { (**self).id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
    fn embed(&self, text: &str) -> Result<Vec<f32>> { (**self).embed(text) }
}

use pcodex_core::Settings;
use pcodex_embed::embedder_from_config;

fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    let embedder = embedder_from_config(&settings.embedding)?;
    let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("{}: B={} dim={}", embedder.id(), embs.len(), embedder.dim());
    Ok(())
}

use candle_core::{Device, Tensor};
use pcodex_core::{Error, Result};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Put the tokenizer in batch mode: pad to the longest input, cut at `max_len`.
pub fn configure(tokenizer: &mut Tokenizer, max_len: usize) -> Result<()> {
    tokenizer.with_padding(Some(PaddingParams { strategy: PaddingStrategy::BatchLongest, ..Default::default() }));
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| Error::model(format!("tokenizer truncation: {e}")))?;
    Ok(())
}

/// Encode `texts` into `(input_ids, attention_mask)`, both `[B, T]` u32.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], device: &Device) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| Error::model(format!("tokenization failed: {e}")))?;
    let batch = encodings.len();
    let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
    let mut ids = Vec::with_capacity(batch * seq_len);
    let mut mask = Vec::with_capacity(batch * seq_len);
    for enc in &encodings {
        if enc.get_ids().len() != seq_len {
            return Err(Error::model("tokenizer produced ragged batch"));
        }
        ids.extend_from_slice(enc.get_ids());
        mask.extend_from_slice(enc.get_attention_mask());
    }
    let input_ids = Tensor::from_vec(ids, (batch, seq_len), device).map_err(Error::model)?;
    let attention_mask = Tensor::from_vec(mask, (batch, seq_len), device).map_err(Error::model)?;
    Ok((input_ids, attention_mask))
}

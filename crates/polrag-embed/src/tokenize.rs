use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Token id BERT-family vocabularies reserve for padding.
pub const PAD_ID: u32 = 0;

/// Encoded batch: `input_ids`, `attention_mask`, `token_type_ids`, all `[B, T]`.
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Tokenize, truncate to `max_len` and right-pad to the longest row.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<EncodedBatch> {
    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        ids.truncate(max_len);
        mask.truncate(max_len);
        rows.push((ids, mask));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut flat_ids = Vec::with_capacity(rows.len() * width);
    let mut flat_mask = Vec::with_capacity(rows.len() * width);
    for (mut ids, mut mask) in rows {
        ids.resize(width, PAD_ID);
        mask.resize(width, 0);
        flat_ids.extend(ids);
        flat_mask.extend(mask);
    }
    let shape = (texts.len(), width);
    let input_ids = Tensor::from_vec(flat_ids, shape, device)?;
    let attention_mask = Tensor::from_vec(flat_mask, shape, device)?;
    let token_type_ids = input_ids.zeros_like()?;
    Ok(EncodedBatch { input_ids, attention_mask, token_type_ids })
}

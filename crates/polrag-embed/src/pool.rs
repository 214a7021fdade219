use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

/// Mean-pool token states under the attention mask, then L2-normalize.
///
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]` (any numeric dtype).
/// Returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    ensure!(dims.len() == 3, "hidden shape must be [B,T,H], got {:?}", dims);
    let (batch, hidden_dim) = (dims[0], dims[2]);

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let masked = hidden.broadcast_mul(&mask.unsqueeze(2)?)?;
    let sum = masked.sum(1)?;
    // all-padding rows would divide by zero
    let lengths = mask.sum_keepdim(1)?.maximum(1.0)?;
    let mean = sum.broadcast_div(&lengths)?;

    let eps = match hidden.dtype() { DType::F16 | DType::BF16 => 1e-6, _ => 1e-12 };
    let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    let out = mean.broadcast_div(&norm)?;
    ensure!(out.dims() == [batch, hidden_dim], "pooled shape mismatch: {:?}", out.dims());
    Ok(out)
}

//! Int8 quantization primitives.
//!
//! Weights are stored as signed 8-bit integers with one float scale per
//! tensor block:
//!
//! - Dequantize: `f = q * scale`
//! - Quantize: `q = round(f / scale)`, clamped to `[-128, 127]`
//!
//! The dense products below keep the accumulation in `f32` and apply the
//! block scale once per output element.

/// Largest magnitude representable by a symmetric int8 code.
pub const I8_MAX: f32 = 127.0;

/// Smallest scale produced by [`quantize_slice`], so an all-zero tensor
/// still gets a usable (non-zero) scale.
pub const MIN_SCALE: f32 = 1e-10;

/// Convert a stored weight to a float.
#[inline]
pub fn dequantize(value: i8, scale: f32) -> f32 {
    value as f32 * scale
}

/// Convert a float to the nearest int8 code under `scale`.
#[inline]
pub fn quantize(value: f32, scale: f32) -> i8 {
    (value / scale).round().clamp(-128.0, I8_MAX) as i8
}

/// Symmetric per-tensor quantization: `scale = max(|x|) / 127`.
pub fn quantize_slice(values: &[f32]) -> (Vec<i8>, f32) {
    let max_abs = values.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
    let scale = (max_abs / I8_MAX).max(MIN_SCALE);
    let quantized = values.iter().map(|&v| quantize(v, scale)).collect();
    (quantized, scale)
}

/// Dequantize `values` into `output` element by element.
pub fn dequantize_into(values: &[i8], scale: f32, output: &mut [f32]) {
    debug_assert_eq!(values.len(), output.len());
    for (out, &q) in output.iter_mut().zip(values) {
        *out = dequantize(q, scale);
    }
}

/// Row-major matrix-vector product.
///
/// `weights` is `[output.len() × input.len()]`; computes
/// `output[i] = Σ_j dequantize(weights[i][j]) * input[j]`.
pub fn matvec(weights: &[i8], scale: f32, input: &[f32], output: &mut [f32]) {
    let cols = input.len();
    debug_assert_eq!(weights.len(), cols * output.len());

    for (out, row) in output.iter_mut().zip(weights.chunks_exact(cols)) {
        let sum: f32 = row
            .iter()
            .zip(input)
            .map(|(&w, &x)| w as f32 * x)
            .sum();
        *out = sum * scale;
    }
}

/// Vector-matrix product against a `[input.len() × output.len()]` block.
///
/// Computes `output[j] = Σ_k input[k] * dequantize(weights[k][j])`. This is
/// the layout of the vocabulary projection, which is stored hidden-major.
pub fn vecmat(input: &[f32], weights: &[i8], scale: f32, output: &mut [f32]) {
    let cols = output.len();
    debug_assert_eq!(weights.len(), input.len() * cols);

    output.fill(0.0);
    for (&x, row) in input.iter().zip(weights.chunks_exact(cols)) {
        if x == 0.0 {
            continue;
        }
        for (out, &w) in output.iter_mut().zip(row) {
            *out += x * w as f32;
        }
    }
    for out in output.iter_mut() {
        *out *= scale;
    }
}

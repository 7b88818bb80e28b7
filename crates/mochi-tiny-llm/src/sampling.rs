//! Temperature sampling over the full vocabulary distribution.

use rand::Rng;

/// Numerically stable in-place softmax.
pub fn softmax(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

/// Index of the largest logit; the first one wins ties.
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0
}

/// Draw a token index from `logits`.
///
/// Logits are divided by `temperature`, normalized with softmax, and a
/// uniform draw in `[0, 1)` walks the cumulative distribution. A
/// non-positive temperature means greedy decoding. `logits` is overwritten
/// with the probabilities.
pub fn sample<R: Rng + ?Sized>(logits: &mut [f32], temperature: f32, rng: &mut R) -> usize {
    if logits.is_empty() {
        return 0;
    }
    if temperature.is_nan() || temperature <= 0.0 {
        return argmax(logits);
    }

    for v in logits.iter_mut() {
        *v /= temperature;
    }
    softmax(logits);

    let r: f32 = rng.gen();
    let mut cumulative = 0.0f32;
    for (i, &p) in logits.iter().enumerate() {
        cumulative += p;
        if cumulative >= r {
            return i;
        }
    }

    // Rounding left the total just under `r`.
    logits.len() - 1
}

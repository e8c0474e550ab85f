// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Next-token selection from raw logits

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::GenerationConfig;

/// Index of the largest finite logit
pub fn argmax(logits: &[f32]) -> Option<usize> {
    logits
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

/// Pick the next token id.
///
/// Greedy when sampling is off or the temperature is not positive. Otherwise
/// temperature-scaled softmax over the `top_k` largest logits (`0` keeps all).
pub fn select_token<R: Rng + ?Sized>(
    logits: &[f32],
    config: &GenerationConfig,
    rng: &mut R,
) -> Option<usize> {
    if !config.do_sample || config.temperature <= 0.0 {
        return argmax(logits);
    }

    let mut candidates: Vec<(usize, f32)> = logits
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (i, v / config.temperature))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    if config.top_k > 0 {
        candidates.truncate(config.top_k);
    }

    let max = candidates[0].1;
    let weights: Vec<f32> = candidates.iter().map(|(_, v)| (v - max).exp()).collect();

    match WeightedIndex::new(&weights) {
        Ok(dist) => Some(candidates[dist.sample(rng)].0),
        Err(_) => Some(candidates[0].0),
    }
}

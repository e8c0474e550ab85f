// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! GPT-2 style causal LM on ONNX Runtime
//!
//! Expects a decoder export without past key values: inputs `input_ids`,
//! `attention_mask` and optionally `position_ids`, output logits
//! `[1, seq_len, vocab]`. Every step reruns the whole sequence.

use anyhow::{Context, Result};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Value;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::sampling::select_token;
use super::{GenerationConfig, TextGenerator};
use crate::inference::onnx::open_session;

const END_OF_TEXT: &str = "<|endoftext|>";

pub struct OnnxTextGenerator {
    session: Session,
    tokenizer: Tokenizer,
    eos_token_id: Option<u32>,
    wants_position_ids: bool,
}

impl std::fmt::Debug for OnnxTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxTextGenerator")
            .field("eos_token_id", &self.eos_token_id)
            .field("wants_position_ids", &self.wants_position_ids)
            .finish_non_exhaustive()
    }
}

impl OnnxTextGenerator {
    /// Load the decoder graph and its `tokenizer.json`
    pub fn open<P: AsRef<Path>>(model_path: P, tokenizer_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer not found: {}", tokenizer_path.display());
        }

        info!("Loading ONNX text generator from {}", model_path.display());
        let session = open_session(model_path, intra_threads)?;

        let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        for required in ["input_ids", "attention_mask"] {
            if !input_names.contains(&required) {
                anyhow::bail!(
                    "Text generator graph has no '{}' input (found {:?})",
                    required,
                    input_names
                );
            }
        }
        let wants_position_ids = input_names.contains(&"position_ids");

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        let eos_token_id = tokenizer.token_to_id(END_OF_TEXT);

        info!(
            "✅ ONNX text generator loaded ({} tokens in vocabulary)",
            tokenizer.get_vocab_size(true)
        );

        Ok(Self {
            session,
            tokenizer,
            eos_token_id,
            wants_position_ids,
        })
    }

    /// Logits for the position after `tokens`
    fn next_logits(&mut self, tokens: &[u32]) -> Result<Vec<f32>> {
        let len = tokens.len();
        let input_ids = Array2::from_shape_fn((1, len), |(_, i)| tokens[i] as i64);
        let attention_mask = Array2::<i64>::ones((1, len));

        let result = if self.wants_position_ids {
            let position_ids = Array2::from_shape_fn((1, len), |(_, i)| i as i64);
            self.session.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids)?,
                "attention_mask" => Value::from_array(attention_mask)?,
                "position_ids" => Value::from_array(position_ids)?
            ])
        } else {
            self.session.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids)?,
                "attention_mask" => Value::from_array(attention_mask)?
            ])
        };
        let outputs = result.context("Text generator inference failed")?;

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract logits")?;

        let shape = logits.shape().to_vec();
        let vocab = match shape.as_slice() {
            [1, seq, vocab] if *seq == len => *vocab,
            other => anyhow::bail!("Unexpected logits shape {:?} for {} tokens", other, len),
        };

        Ok(logits
            .iter()
            .skip((len - 1) * vocab)
            .take(vocab)
            .copied()
            .collect())
    }
}

impl TextGenerator for OnnxTextGenerator {
    fn generate(&mut self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
        let mut tokens = encoding.get_ids().to_vec();
        let prompt_len = tokens.len();

        if prompt_len == 0 {
            anyhow::bail!("Prompt tokenized to zero tokens");
        }
        if prompt_len >= config.max_length {
            anyhow::bail!(
                "Prompt is {} tokens but max_length is {}",
                prompt_len,
                config.max_length
            );
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        while tokens.len() < config.max_length {
            let logits = self.next_logits(&tokens)?;
            let next = select_token(&logits, config, &mut rng)
                .context("Model produced no usable logits")? as u32;

            if Some(next) == self.eos_token_id {
                debug!("Stopped at end-of-text after {} tokens", tokens.len());
                break;
            }
            tokens.push(next);
        }

        let ids = if config.return_full_text {
            &tokens[..]
        } else {
            &tokens[prompt_len..]
        };

        let text = self
            .tokenizer
            .decode(ids, true)
            .map_err(|e| anyhow::anyhow!("Decoding failed: {}", e))?;

        debug!(
            "Generated {} new tokens ({} total)",
            tokens.len() - prompt_len,
            tokens.len()
        );
        Ok(text)
    }
}

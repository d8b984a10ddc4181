// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt tokenisation for Grounding DINO
//!
//! A prompt such as `"cat . remote control ."` is split by the special tokens
//! (`[CLS]`, `[SEP]`, `.`, `?`) into phrases. Tokens may only attend to tokens
//! of the same phrase, and position ids restart at every phrase.

use anyhow::{Context, Result};
use ndarray::{s, Array2};
use tokenizers::Tokenizer;

/// Maximum number of text tokens the network accepts
pub const MAX_TEXT_LEN: usize = 256;

/// Tokens that delimit phrases inside a prompt
pub const SPECIAL_TOKENS: &[&str] = &["[CLS]", "[SEP]", ".", "?"];

/// Normalise a free-text prompt the way the model was trained
///
/// Lowercased, trimmed and terminated with a `.` separator.
pub fn preprocess_caption(prompt: &str) -> String {
    let caption = prompt.trim().to_lowercase();
    if caption.ends_with('.') {
        caption
    } else {
        format!("{}.", caption)
    }
}

/// Tokenised prompt with every tensor the text encoder needs
#[derive(Debug, Clone)]
pub struct TextInputs {
    pub input_ids: Vec<i64>,
    /// Padding mask: true for real tokens
    pub token_mask: Vec<bool>,
    pub token_type_ids: Vec<i64>,
    /// Phrase-local position ids
    pub position_ids: Vec<i64>,
    /// `[len, len]` block-diagonal attention mask
    pub self_attention_mask: Array2<bool>,
}

impl TextInputs {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Look up the ids of [`SPECIAL_TOKENS`] in a tokenizer vocabulary
pub fn special_token_ids(tokenizer: &Tokenizer) -> Vec<i64> {
    SPECIAL_TOKENS
        .iter()
        .filter_map(|token| tokenizer.token_to_id(token))
        .map(|id| id as i64)
        .collect()
}

/// Tokenise a caption and derive the phrase masks
pub fn encode_caption(
    tokenizer: &Tokenizer,
    caption: &str,
    special_ids: &[i64],
    max_len: usize,
) -> Result<TextInputs> {
    let encoding = tokenizer
        .encode(caption, true)
        .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        .context("Failed to tokenize prompt")?;

    let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
    let token_mask: Vec<bool> = encoding
        .get_attention_mask()
        .iter()
        .map(|&m| m != 0)
        .collect();

    Ok(build_text_inputs(input_ids, token_mask, special_ids, max_len))
}

/// Assemble [`TextInputs`] from token ids, truncating to `max_len`
pub fn build_text_inputs(
    mut input_ids: Vec<i64>,
    mut token_mask: Vec<bool>,
    special_ids: &[i64],
    max_len: usize,
) -> TextInputs {
    let (mut self_attention_mask, mut position_ids) =
        generate_phrase_masks(&input_ids, special_ids);

    if input_ids.len() > max_len {
        input_ids.truncate(max_len);
        token_mask.truncate(max_len);
        position_ids.truncate(max_len);
        self_attention_mask = self_attention_mask.slice(s![..max_len, ..max_len]).to_owned();
    }

    let token_type_ids = vec![0i64; input_ids.len()];

    TextInputs {
        input_ids,
        token_mask,
        token_type_ids,
        position_ids,
        self_attention_mask,
    }
}

/// Build the block-diagonal attention mask and phrase-local position ids
///
/// Every token attends to itself. A special token at position `col` closes
/// the phrase that began after the previous special token; all tokens of
/// that phrase (including the closing delimiter) attend to each other and
/// get positions `0..`. Leading and trailing special tokens stay isolated
/// with position 0.
pub fn generate_phrase_masks(input_ids: &[i64], special_ids: &[i64]) -> (Array2<bool>, Vec<i64>) {
    let num_tokens = input_ids.len();
    let mut mask = Array2::from_elem((num_tokens, num_tokens), false);
    for i in 0..num_tokens {
        mask[[i, i]] = true;
    }
    let mut position_ids = vec![0i64; num_tokens];

    let mut previous_col = 0usize;
    for (col, id) in input_ids.iter().enumerate() {
        if !special_ids.contains(id) {
            continue;
        }

        if col == 0 || col == num_tokens - 1 {
            mask[[col, col]] = true;
            position_ids[col] = 0;
        } else {
            let start = previous_col + 1;
            mask.slice_mut(s![start..=col, start..=col]).fill(true);
            for (offset, position) in position_ids[start..=col].iter_mut().enumerate() {
                *position = offset as i64;
            }
        }
        previous_col = col;
    }

    (mask, position_ids)
}

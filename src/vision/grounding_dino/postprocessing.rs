// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Turning raw query logits and boxes into grounded detections

use ndarray::ArrayView2;

/// Default minimum score for a query box to be kept
pub const DEFAULT_BOX_THRESHOLD: f32 = 0.35;

/// Default minimum token score for a token to join the phrase
pub const DEFAULT_TEXT_THRESHOLD: f32 = 0.25;

/// Highest token position considered when reading phrases
const MAX_PHRASE_POSITION: usize = 255;

/// A query that passed the box threshold, before label decoding
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    /// Best token score of the query
    pub score: f32,
    /// Normalised `(cx, cy, w, h)` box
    pub cxcywh: [f32; 4],
    /// Prompt token ids whose score passed the text threshold
    pub phrase_token_ids: Vec<i64>,
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Select queries and the prompt tokens they are grounded to
///
/// `logits` is `[num_queries, max_text_len]` of raw (pre-sigmoid) scores and
/// `boxes` is `[num_queries, 4]`. Token position 0 (`[CLS]`) and positions
/// past the prompt are never part of a phrase. Results are ordered by
/// descending score.
pub fn select_queries(
    logits: ArrayView2<f32>,
    boxes: ArrayView2<f32>,
    input_ids: &[i64],
    box_threshold: f32,
    text_threshold: f32,
) -> Vec<QueryMatch> {
    let num_queries = logits.nrows().min(boxes.nrows());
    let last_position = input_ids.len().min(MAX_PHRASE_POSITION);

    let mut matches = Vec::new();
    for q in 0..num_queries {
        let scores: Vec<f32> = logits.row(q).iter().map(|&v| sigmoid(v)).collect();
        let best = scores.iter().copied().fold(f32::MIN, f32::max);
        if best <= box_threshold {
            continue;
        }

        let phrase_token_ids = scores
            .iter()
            .enumerate()
            .take(last_position)
            .skip(1)
            .filter(|(_, score)| **score > text_threshold)
            .map(|(position, _)| input_ids[position])
            .collect();

        let b = boxes.row(q);
        matches.push(QueryMatch {
            score: best,
            cxcywh: [b[0], b[1], b[2], b[3]],
            phrase_token_ids,
        });
    }

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches
}

/// Clean a decoded phrase: separators removed, whitespace collapsed
pub fn clean_phrase(decoded: &str) -> String {
    decoded
        .replace('.', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

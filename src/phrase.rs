//! Phrase occurrence scanning over multi-line lyrics.
//!
//! Line matching is a case-insensitive substring test. Each matching line
//! gets a context window of up to `radius` lines on either side, joined with
//! single spaces; the window is what the encoder sees.

use std::collections::BTreeSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::snapshot::AttentionSnapshot;

/// A line that contains the target phrase, before any model work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    /// 0-based index of the line in the lyrics.
    pub sentence_index: usize,
    pub sentence: String,
    pub context: String,
}

/// Case-insensitive substring test.
pub fn contains_phrase(line: &str, phrase: &str) -> bool {
    line.to_lowercase().contains(&phrase.to_lowercase())
}

/// Lines `[max(0, i - radius), min(len, i + radius + 1))`.
pub fn context_range(index: usize, len: usize, radius: usize) -> Range<usize> {
    let start = index.saturating_sub(radius);
    let end = index.saturating_add(radius).saturating_add(1).min(len);
    start..end
}

/// Every line of `lyrics` containing `phrase`, in line order.
///
/// Lines are split on `'\n'` only; nothing is trimmed and empty lines count
/// towards indices and context windows.
pub fn scan_lines(lyrics: &str, phrase: &str, radius: usize) -> Vec<LineMatch> {
    let lines: Vec<&str> = lyrics.split('\n').collect();
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| contains_phrase(line, phrase))
        .map(|(i, line)| LineMatch {
            sentence_index: i,
            sentence: line.to_string(),
            context: lines[context_range(i, lines.len(), radius)].join(" "),
        })
        .collect()
}

/// Token indices of every contiguous occurrence of `phrase_tokens` in `tokens`.
///
/// Each match at offset `i` contributes `i..i + phrase_tokens.len()`. Matches
/// are neither merged nor deduplicated, so self-overlapping phrases report
/// some indices more than once (`[a, a, a]` / `[a, a]` gives `[0, 1, 1, 2]`).
/// Consumers that need a set must deduplicate themselves.
pub fn find_phrase_positions<T: PartialEq>(tokens: &[T], phrase_tokens: &[T]) -> Vec<usize> {
    let n = phrase_tokens.len();
    if n == 0 || n > tokens.len() {
        return Vec::new();
    }
    tokens
        .windows(n)
        .enumerate()
        .filter(|(_, window)| *window == phrase_tokens)
        .flat_map(|(i, _)| i..i + n)
        .collect()
}

/// One matched line with the attention computed over its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseOccurrence {
    /// 1-based ordinal among the matches.
    pub occurrence: usize,
    pub sentence_index: usize,
    pub context: String,
    pub attention_data: AttentionSnapshot,
    /// Raw output of [`find_phrase_positions`] on the context tokens.
    pub phrase_positions: Vec<usize>,
    pub sentence: String,
}

impl PhraseOccurrence {
    /// Average attention each context token sends to the phrase in `layer`.
    ///
    /// `None` when the layer does not exist or the phrase tokens were not
    /// found in the context.
    pub fn attention_strength(&self, layer: usize) -> Option<f32> {
        let positions: Vec<usize> = self
            .phrase_positions
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.attention_data.layer(layer)?.attention_into(&positions)
    }
}

/// All occurrences of one phrase across a lyric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseEvolution {
    pub target_phrase: String,
    pub occurrences: Vec<PhraseOccurrence>,
    pub total_occurrences: usize,
}

impl PhraseEvolution {
    pub fn new(target_phrase: impl Into<String>) -> Self {
        Self {
            target_phrase: target_phrase.into(),
            occurrences: Vec::new(),
            total_occurrences: 0,
        }
    }

    /// Append an occurrence, keeping `total_occurrences` in step.
    pub fn push(&mut self, occurrence: PhraseOccurrence) {
        self.occurrences.push(occurrence);
        self.total_occurrences = self.occurrences.len();
    }

    /// [`PhraseOccurrence::attention_strength`] for each occurrence, in order.
    pub fn attention_trend(&self, layer: usize) -> Vec<Option<f32>> {
        self.occurrences
            .iter()
            .map(|o| o.attention_strength(layer))
            .collect()
    }
}

//! Sliding token windows with optional boundary-aware overlap.
//!
//! Windows are measured in tokens but cut out of the original text by byte offset, so chunk
//! boundaries always fall on whole characters.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use crate::processing::tokenizer::Tokenizer;
use crate::processing::types::{ChunkingConfiguration, OverlapStrategy};

/// Text alongside the byte offset of every token boundary.
pub(crate) struct Encoded<'a> {
    text: &'a str,
    offsets: Vec<usize>,
}

impl<'a> Encoded<'a> {
    /// Encode `text`; `None` when the token bytes do not line up with the text.
    pub(crate) fn new(text: &'a str, tokenizer: &Tokenizer) -> Option<Self> {
        let offsets = tokenizer.byte_offsets(&tokenizer.encode(text));
        (offsets.last() == Some(&text.len())).then_some(Self { text, offsets })
    }

    /// Number of tokens.
    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// First token index at or after `index` that starts on a character boundary.
    fn align_forward(&self, index: usize) -> usize {
        let mut index = index.min(self.len());
        while index < self.len() && !self.text.is_char_boundary(self.offsets[index]) {
            index += 1;
        }
        index
    }

    /// First token index whose start is at or after byte `offset`.
    fn token_at_byte(&self, offset: usize) -> usize {
        self.offsets.partition_point(|start| *start < offset).min(self.len())
    }

    /// Text covered by tokens `0..index`; `index` must be aligned.
    fn prefix(&self, index: usize) -> &'a str {
        &self.text[..self.offsets[index]]
    }

    /// Text covered by an aligned token range.
    fn slice(&self, range: Range<usize>) -> &'a str {
        &self.text[self.offsets[range.start]..self.offsets[range.end]]
    }
}

/// Split `text` into windows of `fixed_token_count` tokens.
pub(crate) fn chunk(
    text: &str,
    config: &ChunkingConfiguration,
    tokenizer: &Tokenizer,
) -> Vec<String> {
    let Some(encoded) = Encoded::new(text, tokenizer) else {
        tracing::warn!(
            bytes = text.len(),
            "Token bytes do not match input text; decoding windows instead"
        );
        let tokens = tokenizer.encode(text);
        let size = config.fixed_token_count.max(1);
        return tokens
            .chunks(size)
            .map(|window| tokenizer.decode(window))
            .filter(|chunk| !chunk.is_empty())
            .collect();
    };

    windows(&encoded, config)
        .into_iter()
        .map(|range| encoded.slice(range).to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Token ranges of every window, in order.
///
/// The next window starts `fixed_token_count - overlap` tokens after the current one (at least
/// one token later). Boundary-aware strategies may pull that start back to a sentence or
/// paragraph boundary, but never past the naive start and never onto or before the current one.
/// Every range edge is moved forward until it sits on a character boundary, so a window can run
/// a few tokens long when it would otherwise end inside a multi-byte character.
pub(crate) fn windows(encoded: &Encoded<'_>, config: &ChunkingConfiguration) -> Vec<Range<usize>> {
    let total = encoded.len();
    if total == 0 {
        return Vec::new();
    }

    let size = config.fixed_token_count.max(1);
    let overlap = config.overlap_tokens();
    let advance = size.saturating_sub(overlap).max(1);

    let mut ranges = Vec::new();
    let mut start = 0;
    while start < total {
        let end = encoded.align_forward(start + size);
        ranges.push(start..end);
        if end >= total {
            break;
        }

        let naive = encoded.align_forward(start + advance);
        start = match (overlap > 0, config.overlap_strategy) {
            (true, OverlapStrategy::SentenceBoundaryAware) => {
                snap_to_boundary(encoded, start, naive, Boundary::Sentence)
            }
            (true, OverlapStrategy::SemanticBoundaryAware) => {
                snap_to_boundary(encoded, start, naive, Boundary::Paragraph)
            }
            _ => naive,
        };
    }
    ranges
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    Sentence,
    Paragraph,
}

impl Boundary {
    /// Byte offset just past the last boundary in `text`, if one exists past offset 0.
    fn last_end(self, text: &str) -> Option<usize> {
        match self {
            Self::Sentence => sentence_end_pattern()
                .find_iter(text)
                .last()
                .map(|found| found.start() + 1),
            Self::Paragraph => text
                .rfind("\n\n")
                .filter(|index| *index > 0)
                .map(|index| index + 2),
        }
    }
}

fn sentence_end_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]\s").expect("sentence terminator pattern compiles"))
}

fn snap_to_boundary(
    encoded: &Encoded<'_>,
    current: usize,
    naive: usize,
    boundary: Boundary,
) -> usize {
    let Some(cut) = boundary.last_end(encoded.prefix(naive)) else {
        return naive;
    };
    let snapped = encoded.align_forward(encoded.token_at_byte(cut));
    if snapped > current && snapped <= naive {
        snapped
    } else {
        naive
    }
}

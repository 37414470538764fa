//! Sentence- and paragraph-packing chunkers.

use regex::Regex;
use std::sync::OnceLock;

use crate::processing::tokenizer::Tokenizer;
use crate::processing::types::ChunkingConfiguration;

// Paragraph overlap derived from a percentage assumes roughly five paragraphs per budget.
const PARAGRAPHS_PER_PERCENT_UNIT: f64 = 5.0;

fn sentence_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence break pattern compiles"))
}

/// Pack whole sentences into chunks of at most `fixed_token_count` tokens.
pub(crate) fn by_sentence(
    text: &str,
    config: &ChunkingConfiguration,
    tokenizer: &Tokenizer,
) -> Vec<String> {
    let sentences = split_sentences(text);
    let overlap = match config.overlap_percentage {
        Some(_) => 1,
        None => config.overlap_count,
    };
    pack(&sentences, " ", config.fixed_token_count, overlap, tokenizer)
}

/// Pack whole paragraphs into chunks of at most `fixed_token_count` tokens.
pub(crate) fn by_paragraph(
    text: &str,
    config: &ChunkingConfiguration,
    tokenizer: &Tokenizer,
) -> Vec<String> {
    let paragraphs = split_paragraphs(text);
    let overlap = match config.overlap_percentage {
        Some(percentage) => ((percentage * PARAGRAPHS_PER_PERCENT_UNIT) as usize).max(1),
        None => config.overlap_count,
    };
    pack(&paragraphs, "\n\n", config.fixed_token_count, overlap, tokenizer)
}

/// Sentences end at `.`, `!` or `?` followed by whitespace; the terminator stays with its sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut from = 0;
    for found in sentence_break().find_iter(text) {
        sentences.push(&text[from..found.start() + 1]);
        from = found.end();
    }
    sentences.push(&text[from..]);
    sentences
        .into_iter()
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .map(String::from)
        .collect()
}

fn split_paragraphs(text: &str) -> Vec<String> {
    text.replace("\r\n\r\n", "\n\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(String::from)
        .collect()
}

/// Greedy accumulation: every chunk holds at least one unit, further units join while the running
/// token count fits the budget. After a chunk closes the cursor backs up by `overlap` units, but
/// never onto the chunk's first unit, so every step makes progress.
fn pack(
    units: &[String],
    separator: &str,
    budget: usize,
    overlap: usize,
    tokenizer: &Tokenizer,
) -> Vec<String> {
    let counts: Vec<usize> = units.iter().map(|unit| tokenizer.count(unit)).collect();
    let mut chunks = Vec::new();
    let mut index = 0;

    while index < units.len() {
        let begin = index;
        let mut used = 0;
        while index < units.len() {
            if index > begin && used + counts[index] > budget {
                break;
            }
            used += counts[index];
            index += 1;
        }
        chunks.push(units[begin..index].join(separator));

        if overlap > 0 && index < units.len() {
            index -= overlap.min(index - begin - 1);
        }
    }

    chunks
}

//! User-supplied regular expression splitting.

use regex::RegexBuilder;

use crate::processing::types::{ChunkingConfiguration, ChunkingError};

// Caps compiled program and lazy DFA size. The engine matches in linear time, so bounding the
// automaton bounds the work for any pattern.
const REGEX_SIZE_LIMIT: usize = 1 << 20;
const REGEX_DFA_SIZE_LIMIT: usize = 1 << 22;

/// Split `text` on the configured pattern; each non-blank trimmed segment becomes one chunk.
///
/// Patterns compile in multi-line mode so `^` and `$` anchor at line boundaries. When every
/// segment is blank the text is returned whole.
pub(crate) fn chunk(
    text: &str,
    config: &ChunkingConfiguration,
) -> Result<Vec<String>, ChunkingError> {
    let pattern = config
        .regex_pattern
        .as_deref()
        .filter(|pattern| !pattern.is_empty())
        .ok_or(ChunkingError::MissingRegexPattern)?;

    let regex = RegexBuilder::new(pattern)
        .multi_line(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .dfa_size_limit(REGEX_DFA_SIZE_LIMIT)
        .build()
        .map_err(|source| ChunkingError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;

    let segments: Vec<String> = regex
        .split(text)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect();

    if segments.is_empty() {
        return Ok(vec![text.to_string()]);
    }
    Ok(segments)
}

//! BPE tokenizer used to measure and window cell content.
//!
//! Encodings come from `tiktoken-rs`. The configured name is resolved as a model identifier
//! first (`gpt-4o`, `text-embedding-3-small`, ...), then as an encoding name, and finally falls
//! back to `cl100k_base` so chunking never stalls on an unfamiliar name.

use anyhow::Error as TokenizerError;
use tiktoken_rs::{
    CoreBPE, Rank, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

use super::types::ChunkingError;

/// Encoding used when nothing else is configured.
pub const DEFAULT_ENCODING: &str = "cl100k_base";

/// Deterministic text <-> token conversion under a fixed vocabulary.
pub struct Tokenizer {
    encoding: String,
    bpe: CoreBPE,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

impl Tokenizer {
    /// Load the tokenizer for an encoding or model name.
    pub fn new(name: &str) -> Result<Self, ChunkingError> {
        let normalized = name.trim();
        let target = if normalized.is_empty() {
            DEFAULT_ENCODING
        } else {
            normalized
        };
        let bpe = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
            encoding: target.to_string(),
            source,
        })?;
        Ok(Self {
            encoding: target.to_string(),
            bpe,
        })
    }

    /// Load the default `cl100k_base` tokenizer.
    pub fn cl100k() -> Result<Self, ChunkingError> {
        Self::new(DEFAULT_ENCODING)
    }

    /// Name the tokenizer was resolved from.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Encode text into tokens, treating special-token markers as plain text.
    pub fn encode(&self, text: &str) -> Vec<Rank> {
        self.bpe.encode_ordinary(text)
    }

    /// Number of tokens in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// Decode tokens back into text.
    ///
    /// A slice cut out of a longer sequence may start or end inside a multi-byte character;
    /// those partial bytes decode as U+FFFD instead of failing.
    pub fn decode(&self, tokens: &[Rank]) -> String {
        match self.bpe.decode_bytes(tokens) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(error) => {
                tracing::debug!(
                    tokens = tokens.len(),
                    error = ?error,
                    "Token window could not be decoded"
                );
                String::new()
            }
        }
    }

    /// Byte offset of every token boundary in the text `tokens` was encoded from.
    ///
    /// `offsets[i]` is where token `i` starts; the last entry is the total byte length. A token
    /// holding part of a multi-byte character yields an offset inside that character.
    pub fn byte_offsets(&self, tokens: &[Rank]) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(tokens.len() + 1);
        let mut position = 0;
        offsets.push(position);
        for token in tokens {
            position += self
                .bpe
                .decode_bytes(std::slice::from_ref(token))
                .map(|bytes| bytes.len())
                .unwrap_or_default();
            offsets.push(position);
        }
        offsets
    }
}

fn resolve_encoding(name: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(name) {
        Ok(encoding) => Ok(encoding.clone()),
        Err(model_err) => {
            tracing::debug!(
                name,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            if let Some(candidate) = encoding_from_name(name) {
                candidate
            } else {
                tracing::warn!(name, "Falling back to 'cl100k_base' encoding for token counting");
                cl100k_base()
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn shared() -> std::sync::Arc<Tokenizer> {
    use std::sync::{Arc, OnceLock};

    static SHARED: OnceLock<Arc<Tokenizer>> = OnceLock::new();
    SHARED
        .get_or_init(|| Arc::new(Tokenizer::cl100k().expect("cl100k_base loads")))
        .clone()
}

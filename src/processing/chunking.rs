//! Chunking engine: turns a cell's content into token-bounded segments ready for embedding.
//!
//! The engine dispatches once per cell on its [`CellType`] and [`ChunkStrategy`]:
//!
//! - Text-like cells (`Text`, `Code`, `Hyperlink`, `Meta`, `Summary`) run the text strategy.
//! - Lists honor `WholeList` and `ListEntry`; any other strategy chunks the rendered list as text.
//! - Tables honor the row strategies and `WholeTable`; any other strategy chunks the pipe-joined
//!   rows as text.
//! - `Binary`, `Image` and `Unknown` cells are chunked through their `Text` fallback when present.
//!
//! Each raw segment becomes a [`ChunkResult`]; `ContextPrefix` only ever touches `ChunkedText`.

mod boundary;
mod fixed;
mod list;
mod pattern;
mod table;

use std::sync::Arc;

use super::tokenizer::Tokenizer;
use super::types::{
    CellType, ChunkResult, ChunkStrategy, ChunkingConfiguration, ChunkingError, SemanticCell,
};

/// Stateless chunker bound to one tokenizer.
#[derive(Debug, Clone)]
pub struct ChunkingEngine {
    tokenizer: Arc<Tokenizer>,
}

impl ChunkingEngine {
    /// Build an engine over a shared tokenizer.
    pub fn new(tokenizer: Arc<Tokenizer>) -> Self {
        Self { tokenizer }
    }

    /// Tokenizer used for measuring and windowing.
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Chunk a single cell (children are not visited).
    ///
    /// Returns an empty vector when the cell has no content. Fails only on configuration
    /// problems: out-of-range numbers, or a regex strategy without a usable pattern.
    pub fn chunk(&self, cell: &SemanticCell) -> Result<Vec<ChunkResult>, ChunkingError> {
        let config = &cell.chunking_configuration;
        config.validate()?;

        let raw = self.raw_chunks(cell, config)?;
        tracing::debug!(
            cell_id = %cell.id,
            cell_type = ?cell.cell_type,
            strategy = ?config.strategy,
            chunks = raw.len(),
            "Chunked cell"
        );

        let prefix = config
            .context_prefix
            .as_deref()
            .filter(|prefix| !prefix.is_empty());
        Ok(raw
            .into_iter()
            .map(|text| ChunkResult {
                chunked_text: match prefix {
                    Some(prefix) => format!("{prefix}{text}"),
                    None => text.clone(),
                },
                text,
            })
            .collect())
    }

    fn raw_chunks(
        &self,
        cell: &SemanticCell,
        config: &ChunkingConfiguration,
    ) -> Result<Vec<String>, ChunkingError> {
        match cell.cell_type {
            CellType::List => self.chunk_list(cell, config),
            CellType::Table => self.chunk_table(cell, config),
            CellType::Text
            | CellType::Code
            | CellType::Hyperlink
            | CellType::Meta
            | CellType::Summary
            | CellType::Binary
            | CellType::Image
            | CellType::Unknown => self.chunk_text(cell.text.as_deref().unwrap_or_default(), config),
        }
    }

    fn chunk_text(
        &self,
        text: &str,
        config: &ChunkingConfiguration,
    ) -> Result<Vec<String>, ChunkingError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let chunks = match config.strategy {
            ChunkStrategy::SentenceBased => boundary::by_sentence(text, config, &self.tokenizer),
            ChunkStrategy::ParagraphBased => boundary::by_paragraph(text, config, &self.tokenizer),
            ChunkStrategy::RegexBased => pattern::chunk(text, config)?,
            ChunkStrategy::WholeList => vec![text.to_string()],
            ChunkStrategy::ListEntry => text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(String::from)
                .collect(),
            ChunkStrategy::FixedTokenCount
            | ChunkStrategy::Row
            | ChunkStrategy::RowWithHeaders
            | ChunkStrategy::RowGroupWithHeaders
            | ChunkStrategy::KeyValuePairs
            | ChunkStrategy::WholeTable => fixed::chunk(text, config, &self.tokenizer),
        };
        Ok(chunks)
    }

    fn chunk_list(
        &self,
        cell: &SemanticCell,
        config: &ChunkingConfiguration,
    ) -> Result<Vec<String>, ChunkingError> {
        let Some((items, ordered)) = cell.list_items() else {
            return Ok(Vec::new());
        };
        match config.strategy {
            ChunkStrategy::WholeList => Ok(list::whole(items, ordered)),
            ChunkStrategy::ListEntry => Ok(list::entries(items)),
            _ => self.chunk_text(&list::serialize(items, ordered), config),
        }
    }

    fn chunk_table(
        &self,
        cell: &SemanticCell,
        config: &ChunkingConfiguration,
    ) -> Result<Vec<String>, ChunkingError> {
        let Some(rows) = cell.table.as_deref().filter(|rows| !rows.is_empty()) else {
            return Ok(Vec::new());
        };
        match config.strategy {
            ChunkStrategy::Row => Ok(table::by_row(rows)),
            ChunkStrategy::RowWithHeaders => Ok(table::by_row_with_headers(rows)),
            ChunkStrategy::RowGroupWithHeaders => {
                Ok(table::by_row_group(rows, config.row_group_size))
            }
            ChunkStrategy::KeyValuePairs => Ok(table::by_key_value(rows)),
            ChunkStrategy::WholeTable => Ok(table::whole(rows)),
            _ => self.chunk_text(&table::serialize(rows), config),
        }
    }
}

/// Serialized input text of a cell as reported back to callers.
///
/// Lists render as numbered or bulleted lines, tables as pipe-joined rows; every other type
/// reports its `Text` field.
pub fn input_text(cell: &SemanticCell) -> String {
    match cell.cell_type {
        CellType::List => cell
            .list_items()
            .map(|(items, ordered)| list::serialize(items, ordered))
            .unwrap_or_default(),
        CellType::Table => cell
            .table
            .as_deref()
            .map(table::serialize)
            .unwrap_or_default(),
        _ => cell.text.clone().unwrap_or_default(),
    }
}

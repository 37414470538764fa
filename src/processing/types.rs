//! Core data types and error definitions for the processing pipeline.

use anyhow::Error as TokenizerError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while turning a cell into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// The chunking configuration violated one of its bounds.
    #[error("invalid chunking configuration: {0}")]
    InvalidConfiguration(String),
    /// `RegexBased` chunking was requested without a pattern.
    #[error("RegexPattern is required when using the RegexBased strategy")]
    MissingRegexPattern,
    /// The supplied pattern did not compile.
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        /// Pattern exactly as supplied by the caller.
        pattern: String,
        /// Compilation error raised by the regex engine.
        #[source]
        source: regex::Error,
    },
    /// Tokenizer resources were unavailable for the configured encoding.
    #[error("failed to initialize tokenizer '{encoding}': {source}")]
    Tokenizer {
        /// Encoding or model name we attempted to load.
        encoding: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted by the processing service.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Chunking step failed for a cell.
    #[error("Failed to chunk cell: {0}")]
    Chunking(#[from] ChunkingError),
    /// Summarization run aborted.
    #[error("Failed to summarize cells: {0}")]
    Summarization(#[from] crate::processing::summarize::SummarizationError),
    /// Summarization was requested but no completion client and model are configured.
    #[error("Summarization unavailable: {0}")]
    SummarizationUnavailable(String),
}

/// Content variant carried by a [`SemanticCell`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum CellType {
    /// Prose.
    #[default]
    Text,
    /// Ordered or unordered list; which one is decided by the populated field.
    List,
    /// Opaque bytes.
    Binary,
    /// Rows of cells, row 0 being the header.
    Table,
    /// Anything the producer could not classify.
    Unknown,
    /// Image payload, optionally with alt text in `text`.
    Image,
    /// Link text.
    Hyperlink,
    /// Source code.
    Code,
    /// Document metadata.
    Meta,
    /// Synthetic summary injected by the summarization engine.
    Summary,
}

impl From<String> for CellType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Self::Text,
            "list" => Self::List,
            "binary" => Self::Binary,
            "table" => Self::Table,
            "image" => Self::Image,
            "hyperlink" => Self::Hyperlink,
            "code" => Self::Code,
            "meta" => Self::Meta,
            "summary" => Self::Summary,
            _ => Self::Unknown,
        }
    }
}

/// Strategy used to split a cell into chunks.
///
/// Text strategies apply to prose; list and table strategies apply to structured cells and
/// fall back to the text path (after serialization) when they do not match the cell shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum ChunkStrategy {
    /// Sliding token windows of `FixedTokenCount` tokens.
    #[default]
    FixedTokenCount,
    /// Greedy sentence packing under the token budget.
    SentenceBased,
    /// Greedy paragraph packing under the token budget.
    ParagraphBased,
    /// One chunk per segment between matches of `RegexPattern`.
    RegexBased,
    /// Entire list as one chunk.
    WholeList,
    /// One chunk per list item.
    ListEntry,
    /// One chunk per table data row, cells space-joined.
    Row,
    /// One markdown table per data row.
    RowWithHeaders,
    /// One markdown table per group of `RowGroupSize` data rows.
    RowGroupWithHeaders,
    /// One `header: value` line per data row.
    KeyValuePairs,
    /// Entire table as one markdown chunk.
    WholeTable,
}

impl From<String> for ChunkStrategy {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixedtokencount" => Self::FixedTokenCount,
            "sentencebased" => Self::SentenceBased,
            "paragraphbased" => Self::ParagraphBased,
            "regexbased" => Self::RegexBased,
            "wholelist" => Self::WholeList,
            "listentry" => Self::ListEntry,
            "row" => Self::Row,
            "rowwithheaders" => Self::RowWithHeaders,
            "rowgroupwithheaders" => Self::RowGroupWithHeaders,
            "keyvaluepairs" => Self::KeyValuePairs,
            "wholetable" => Self::WholeTable,
            other => {
                tracing::debug!(strategy = other, "Unknown chunk strategy; using FixedTokenCount");
                Self::FixedTokenCount
            }
        }
    }
}

/// How the start of the next fixed-token window is chosen when overlap is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlapStrategy {
    /// Advance by exactly `FixedTokenCount - overlap` tokens.
    #[default]
    SlidingWindow,
    /// Snap the next start back to the last sentence terminator.
    SentenceBoundaryAware,
    /// Snap the next start back to the last paragraph break.
    SemanticBoundaryAware,
}

/// Chunking parameters attached to every cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChunkingConfiguration {
    /// Strategy used to split the cell.
    pub strategy: ChunkStrategy,
    /// Target token budget per chunk.
    pub fixed_token_count: usize,
    /// Overlap expressed in units of the active strategy (tokens, sentences, paragraphs).
    pub overlap_count: usize,
    /// Overlap expressed as a fraction of `fixed_token_count`; wins over `overlap_count`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_percentage: Option<f64>,
    /// Boundary snapping applied by the fixed-token strategy.
    pub overlap_strategy: OverlapStrategy,
    /// Rows per chunk for `RowGroupWithHeaders`.
    pub row_group_size: usize,
    /// Prepended to the embedded form of every chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_prefix: Option<String>,
    /// Split pattern for `RegexBased`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_pattern: Option<String>,
}

impl Default for ChunkingConfiguration {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::FixedTokenCount,
            fixed_token_count: 256,
            overlap_count: 0,
            overlap_percentage: None,
            overlap_strategy: OverlapStrategy::SlidingWindow,
            row_group_size: 5,
            context_prefix: None,
            regex_pattern: None,
        }
    }
}

impl ChunkingConfiguration {
    /// Reject configurations no strategy can honor.
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.fixed_token_count == 0 {
            return Err(ChunkingError::InvalidConfiguration(
                "FixedTokenCount must be at least 1".into(),
            ));
        }
        if let Some(percentage) = self.overlap_percentage {
            if !(0.0..=1.0).contains(&percentage) {
                return Err(ChunkingError::InvalidConfiguration(format!(
                    "OverlapPercentage must be between 0.0 and 1.0, got {percentage}"
                )));
            }
        }
        if self.row_group_size == 0 {
            return Err(ChunkingError::InvalidConfiguration(
                "RowGroupSize must be at least 1".into(),
            ));
        }
        let has_pattern = self
            .regex_pattern
            .as_deref()
            .is_some_and(|pattern| !pattern.is_empty());
        if self.strategy == ChunkStrategy::RegexBased && !has_pattern {
            return Err(ChunkingError::MissingRegexPattern);
        }
        Ok(())
    }

    /// Token overlap between adjacent fixed-token windows.
    pub fn overlap_tokens(&self) -> usize {
        match self.overlap_percentage {
            Some(percentage) => (self.fixed_token_count as f64 * percentage) as usize,
            None => self.overlap_count,
        }
    }
}

/// Embedding parameters carried alongside a cell; interpreted by the embedding layer only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EmbeddingConfiguration {
    /// Identifier of the embedding endpoint to use.
    pub embedding_endpoint_id: String,
    /// Optional model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Whether vectors should be L2-normalized after embedding.
    #[serde(rename = "L2Normalization")]
    pub l2_normalization: bool,
}

/// One unit of document content, optionally heading a subtree of child cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SemanticCell {
    /// Process-local unique identifier.
    #[serde(rename = "GUID", alias = "Id", default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Declared parent; only consulted while normalizing a flat list.
    #[serde(
        rename = "ParentGUID",
        alias = "ParentId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<Uuid>,
    /// Content variant.
    #[serde(rename = "Type", default)]
    pub cell_type: CellType,
    /// Text content, or the fallback text of binary/image cells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Items of a numbered list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered_list: Option<Vec<String>>,
    /// Items of a bulleted list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unordered_list: Option<Vec<String>>,
    /// Table rows; row 0 is the header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<Vec<String>>>,
    /// Raw bytes, base64 on the wire.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub binary: Option<Vec<u8>>,
    /// Owned child cells in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SemanticCell>,
    /// Chunking parameters for this cell.
    #[serde(default)]
    pub chunking_configuration: ChunkingConfiguration,
    /// Embedding parameters for this cell.
    #[serde(default)]
    pub embedding_configuration: EmbeddingConfiguration,
    /// Free-form labels copied onto the processed response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Free-form tags copied onto the processed response.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl Default for SemanticCell {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            cell_type: CellType::Text,
            text: None,
            ordered_list: None,
            unordered_list: None,
            table: None,
            binary: None,
            children: Vec::new(),
            chunking_configuration: ChunkingConfiguration::default(),
            embedding_configuration: EmbeddingConfiguration::default(),
            labels: Vec::new(),
            tags: BTreeMap::new(),
        }
    }
}

impl SemanticCell {
    /// Text cell with a fresh identifier.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Numbered list cell.
    pub fn ordered_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cell_type: CellType::List,
            ordered_list: Some(items.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Bulleted list cell.
    pub fn unordered_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cell_type: CellType::List,
            unordered_list: Some(items.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Table cell; the first row is the header.
    pub fn table(rows: Vec<Vec<String>>) -> Self {
        Self {
            cell_type: CellType::Table,
            table: Some(rows),
            ..Self::default()
        }
    }

    /// Set the cell type.
    pub fn with_type(mut self, cell_type: CellType) -> Self {
        self.cell_type = cell_type;
        self
    }

    /// Set the declared parent.
    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Append owned children.
    pub fn with_children(mut self, children: Vec<SemanticCell>) -> Self {
        self.children.extend(children);
        self
    }

    /// Replace the chunking configuration.
    pub fn with_chunking(mut self, configuration: ChunkingConfiguration) -> Self {
        self.chunking_configuration = configuration;
        self
    }

    /// Items of whichever list field is populated, and whether the list is ordered.
    pub fn list_items(&self) -> Option<(&[String], bool)> {
        match (&self.ordered_list, &self.unordered_list) {
            (Some(items), _) if !items.is_empty() => Some((items, true)),
            (_, Some(items)) if !items.is_empty() => Some((items, false)),
            _ => None,
        }
    }

    /// Read-only textual projection used to measure and prompt with a cell.
    ///
    /// Returns the first non-empty of: text, list items joined by newline, table rows
    /// (cells pipe-joined) joined by newline, base64 of the binary payload.
    pub fn content(&self) -> String {
        if let Some(text) = self.text.as_deref().filter(|text| !text.is_empty()) {
            return text.to_string();
        }
        if let Some(items) = self.unordered_list.as_ref().filter(|items| !items.is_empty()) {
            return items.join("\n");
        }
        if let Some(items) = self.ordered_list.as_ref().filter(|items| !items.is_empty()) {
            return items.join("\n");
        }
        if let Some(rows) = self.table.as_ref().filter(|rows| !rows.is_empty()) {
            return rows
                .iter()
                .map(|row| row.join(" | "))
                .collect::<Vec<_>>()
                .join("\n");
        }
        if let Some(bytes) = self.binary.as_ref().filter(|bytes| !bytes.is_empty()) {
            return BASE64.encode(bytes);
        }
        String::new()
    }

    /// Synthetic summary child of `self`, inheriting its configuration blocks.
    pub(crate) fn summary_child(&self, summary: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            cell_type: CellType::Summary,
            text: Some(summary),
            chunking_configuration: self.chunking_configuration.clone(),
            embedding_configuration: self.embedding_configuration.clone(),
            ..Self::default()
        }
    }
}

/// One chunk produced from a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChunkResult {
    /// Canonical chunk content used for display and storage.
    pub text: String,
    /// Content handed to the embedding model (`ContextPrefix` + text).
    pub chunked_text: String,
}

/// Processed view of a cell: its serialized text, its chunks, and its processed children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CellResponse {
    /// Identifier of the source cell.
    #[serde(rename = "GUID")]
    pub id: Uuid,
    /// Identifier of the structural parent, if any.
    #[serde(rename = "ParentGUID", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Content variant of the source cell.
    #[serde(rename = "Type")]
    pub cell_type: CellType,
    /// Serialized input text of the cell.
    pub text: String,
    /// Chunks produced for the cell.
    pub chunks: Vec<ChunkResult>,
    /// Labels copied from the request cell.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Tags copied from the request cell.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Processed children in forest order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CellResponse>,
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|value| BASE64.decode(value.trim()).map_err(D::Error::custom))
            .transpose()
    }
}

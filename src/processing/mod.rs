//! Cell preparation pipeline: hierarchy normalization, summarization, and chunking.

pub mod chunking;
pub mod hierarchy;
mod service;
pub mod summarize;
pub mod tokenizer;
pub mod types;

pub use chunking::ChunkingEngine;
pub use service::{ProcessingApi, ProcessingService};
pub use summarize::{
    DEFAULT_SYSTEM_PROMPT, SummarizationConfiguration, SummarizationEngine, SummarizationError,
    SummarizationOrder,
};
pub use tokenizer::Tokenizer;
pub use types::{
    CellResponse, CellType, ChunkResult, ChunkStrategy, ChunkingConfiguration, ChunkingError,
    EmbeddingConfiguration, OverlapStrategy, ProcessingError, SemanticCell,
};

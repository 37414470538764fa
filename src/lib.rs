#![deny(missing_docs)]

//! Core library for Semcell: token-aware chunking and hierarchical summarization of semantic
//! document cells.

/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Cell processing pipeline.
pub mod processing;
/// Completion client abstraction and adapters.
pub mod summarization;

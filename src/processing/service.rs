//! Processing service coordinating hierarchy normalization, summarization, and chunking.

use crate::{
    config::Config,
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::{ChunkingEngine, input_text},
        hierarchy,
        summarize::{SummarizationConfiguration, SummarizationEngine},
        tokenizer::Tokenizer,
        types::{CellResponse, ChunkResult, ChunkingConfiguration, ProcessingError, SemanticCell},
    },
    summarization::build_completion_client,
};
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Coordinates the cell pipeline: normalize, optionally summarize, then chunk every cell.
///
/// The service owns the tokenizer-backed chunking engine, the optional summarization engine, and
/// the metrics registry. Construct it once near process start and share it through an `Arc`.
#[derive(Debug)]
pub struct ProcessingService {
    chunker: ChunkingEngine,
    summarizer: Option<SummarizationEngine>,
    metrics: Arc<PipelineMetrics>,
    max_chunk_tokens: Option<usize>,
}

/// Abstraction over the processing pipeline used by external surfaces (CLI, embedding hosts).
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Chunk a single cell, ignoring its children.
    fn chunk_cell(&self, cell: &SemanticCell) -> Result<Vec<ChunkResult>, ProcessingError>;

    /// Normalize and summarize a cell list, returning the forest with injected summaries.
    async fn summarize_cells(
        &self,
        cells: Vec<SemanticCell>,
        config: &SummarizationConfiguration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SemanticCell>, ProcessingError>;

    /// Run the full pipeline and return processed cell trees.
    async fn process_cells(
        &self,
        cells: Vec<SemanticCell>,
        summarization: Option<&SummarizationConfiguration>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CellResponse>, ProcessingError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl ProcessingService {
    /// Build a service from configuration: load the tokenizer and, when a provider and model
    /// are configured, a summarization engine.
    pub fn new(config: &Config) -> Result<Self, ProcessingError> {
        let tokenizer = Tokenizer::new(&config.tokenizer)?;
        tracing::info!(encoding = tokenizer.encoding(), "Tokenizer initialized");
        let metrics = Arc::new(PipelineMetrics::new());

        let summarizer = match (build_completion_client(config), config.completion_model.as_deref()) {
            (Some(client), Some(model)) => {
                tracing::info!(
                    provider = ?config.completion_provider,
                    model,
                    "Completion client initialized"
                );
                Some(SummarizationEngine::new(client, model).with_metrics(metrics.clone()))
            }
            (Some(_), None) => {
                tracing::warn!(
                    provider = ?config.completion_provider,
                    "No completion model configured; summarization disabled"
                );
                None
            }
            (None, _) => None,
        };

        Ok(Self {
            chunker: ChunkingEngine::new(Arc::new(tokenizer)),
            summarizer,
            metrics,
            max_chunk_tokens: config.max_chunk_tokens,
        })
    }

    /// Assemble a service from prebuilt engines.
    pub fn from_parts(chunker: ChunkingEngine, summarizer: Option<SummarizationEngine>) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        Self {
            chunker,
            summarizer: summarizer.map(|engine| engine.with_metrics(metrics.clone())),
            metrics,
            max_chunk_tokens: None,
        }
    }

    /// Cap every cell's `FixedTokenCount` at `max_chunk_tokens`.
    pub fn with_max_chunk_tokens(mut self, max_chunk_tokens: Option<usize>) -> Self {
        self.max_chunk_tokens = max_chunk_tokens;
        self
    }

    /// Replace the summarization engine, reporting into this service's metrics.
    pub fn with_summarizer(mut self, summarizer: SummarizationEngine) -> Self {
        self.summarizer = Some(summarizer.with_metrics(self.metrics.clone()));
        self
    }

    /// Whether summarization requests can be served.
    pub fn can_summarize(&self) -> bool {
        self.summarizer.is_some()
    }

    /// Chunk a single cell after applying the configured token cap.
    pub fn chunk_cell(&self, cell: &SemanticCell) -> Result<Vec<ChunkResult>, ProcessingError> {
        let cell = self.capped(cell);
        let chunks = self.chunker.chunk(&cell)?;
        self.metrics.record_cell(chunks.len() as u64);
        Ok(chunks)
    }

    /// Normalize and summarize `cells`.
    pub async fn summarize_cells(
        &self,
        cells: Vec<SemanticCell>,
        config: &SummarizationConfiguration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SemanticCell>, ProcessingError> {
        let engine = self.summarizer.as_ref().ok_or_else(|| {
            ProcessingError::SummarizationUnavailable(
                "no completion provider and model configured".into(),
            )
        })?;
        Ok(engine.summarize(cells, config, cancel).await?)
    }

    /// Normalize `cells`, summarize when requested, then chunk every cell of the forest.
    ///
    /// Summary cells are chunked like any other cell. When summarization is requested but no
    /// engine is configured the request degrades to chunking only.
    pub async fn process_cells(
        &self,
        cells: Vec<SemanticCell>,
        summarization: Option<&SummarizationConfiguration>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CellResponse>, ProcessingError> {
        let forest = match (summarization, self.summarizer.as_ref()) {
            (Some(config), Some(engine)) => engine.summarize(cells, config, cancel).await?,
            (Some(_), None) => {
                tracing::warn!("Summarization requested without a completion client; chunking only");
                hierarchy::normalize(cells)
            }
            (None, _) => hierarchy::normalize(cells),
        };

        let responses = forest
            .iter()
            .map(|cell| self.respond(cell, None))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            roots = responses.len(),
            cells = hierarchy::flatten(&forest).len(),
            "Processed cells"
        );
        Ok(responses)
    }

    /// Retrieve the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn respond(
        &self,
        cell: &SemanticCell,
        parent_id: Option<Uuid>,
    ) -> Result<CellResponse, ProcessingError> {
        let chunks = self.chunk_cell(cell)?;
        let children = cell
            .children
            .iter()
            .map(|child| self.respond(child, Some(cell.id)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CellResponse {
            id: cell.id,
            parent_id,
            cell_type: cell.cell_type,
            text: input_text(cell),
            chunks,
            labels: cell.labels.clone(),
            tags: cell.tags.clone(),
            children,
        })
    }

    fn capped<'a>(&self, cell: &'a SemanticCell) -> Cow<'a, SemanticCell> {
        let Some(max) = self.max_chunk_tokens else {
            return Cow::Borrowed(cell);
        };
        let requested = cell.chunking_configuration.fixed_token_count;
        if requested <= max {
            return Cow::Borrowed(cell);
        }

        tracing::info!(
            cell_id = %cell.id,
            requested,
            max,
            "Capping FixedTokenCount to configured maximum"
        );
        let mut capped = SemanticCell {
            chunking_configuration: ChunkingConfiguration {
                fixed_token_count: max,
                ..cell.chunking_configuration.clone()
            },
            ..cell.clone()
        };
        capped.children = Vec::new();
        Cow::Owned(capped)
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    fn chunk_cell(&self, cell: &SemanticCell) -> Result<Vec<ChunkResult>, ProcessingError> {
        ProcessingService::chunk_cell(self, cell)
    }

    async fn summarize_cells(
        &self,
        cells: Vec<SemanticCell>,
        config: &SummarizationConfiguration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SemanticCell>, ProcessingError> {
        ProcessingService::summarize_cells(self, cells, config, cancel).await
    }

    async fn process_cells(
        &self,
        cells: Vec<SemanticCell>,
        summarization: Option<&SummarizationConfiguration>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CellResponse>, ProcessingError> {
        ProcessingService::process_cells(self, cells, summarization, cancel).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ProcessingService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::tokenizer::shared;
    use crate::processing::types::{CellType, ChunkStrategy};
    use crate::summarization::{CompletionClient, CompletionClientError, CompletionRequest};

    struct EchoClient;

    #[async_trait]
    impl CompletionClient for EchoClient {
        async fn generate_completion(
            &self,
            _request: CompletionRequest,
        ) -> Result<String, CompletionClientError> {
            Ok("Here is a summary: Condensed.".into())
        }
    }

    fn service() -> ProcessingService {
        ProcessingService::from_parts(ChunkingEngine::new(shared()), None)
    }

    #[test]
    fn token_cap_clamps_fixed_windows() {
        let service = service().with_max_chunk_tokens(Some(4));
        let cell = SemanticCell::text("one two three four five six seven eight");
        let chunks = service.chunk_cell(&cell).expect("chunks");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "one two three four");
        assert_eq!(service.metrics_snapshot().cells_chunked, 1);
        assert_eq!(service.metrics_snapshot().chunks_produced, 2);
    }

    #[test]
    fn configuration_errors_surface_as_processing_errors() {
        let cell = SemanticCell::text("abc").with_chunking(ChunkingConfiguration {
            strategy: ChunkStrategy::RegexBased,
            ..ChunkingConfiguration::default()
        });
        assert!(matches!(
            service().chunk_cell(&cell),
            Err(ProcessingError::Chunking(_))
        ));
    }

    #[tokio::test]
    async fn process_cells_builds_response_tree() {
        let root = SemanticCell::text("Root text.");
        let mut child = SemanticCell::unordered_list(["alpha", "beta"]).with_parent(root.id);
        child.labels.push("list".into());
        child.tags.insert("source".into(), "doc-1".into());
        let child_id = child.id;

        let responses = service()
            .process_cells(vec![child, root.clone()], None, &CancellationToken::new())
            .await
            .expect("processed");

        assert_eq!(responses.len(), 1);
        let root_response = &responses[0];
        assert_eq!(root_response.id, root.id);
        assert_eq!(root_response.parent_id, None);
        assert_eq!(root_response.chunks[0].text, "Root text.");

        let child_response = &root_response.children[0];
        assert_eq!(child_response.id, child_id);
        assert_eq!(child_response.parent_id, Some(root.id));
        assert_eq!(child_response.cell_type, CellType::List);
        assert_eq!(child_response.text, "- alpha\n- beta");
        assert_eq!(child_response.labels, vec!["list".to_string()]);
        assert_eq!(child_response.tags.get("source").map(String::as_str), Some("doc-1"));
    }

    #[tokio::test]
    async fn process_cells_chunks_injected_summaries() {
        let engine = SummarizationEngine::new(Arc::new(EchoClient), "echo");
        let service = service().with_summarizer(engine);
        let config = SummarizationConfiguration {
            min_cell_length: 5,
            max_summary_tokens: 128,
            ..SummarizationConfiguration::default()
        };

        let responses = service
            .process_cells(
                vec![SemanticCell::text("A body long enough to summarize.")],
                Some(&config),
                &CancellationToken::new(),
            )
            .await
            .expect("processed");

        let summary = &responses[0].children[0];
        assert_eq!(summary.cell_type, CellType::Summary);
        assert_eq!(summary.text, "Condensed.");
        assert_eq!(summary.chunks[0].text, "Condensed.");
        assert_eq!(summary.parent_id, Some(responses[0].id));
        assert_eq!(service.metrics_snapshot().summaries_generated, 1);
        assert_eq!(service.metrics_snapshot().cells_chunked, 2);
    }

    #[tokio::test]
    async fn summarize_without_engine_is_unavailable() {
        let error = service()
            .summarize_cells(
                vec![SemanticCell::text("body")],
                &SummarizationConfiguration::default(),
                &CancellationToken::new(),
            )
            .await
            .expect_err("no engine");
        assert!(matches!(error, ProcessingError::SummarizationUnavailable(_)));
    }

    #[test]
    fn new_without_provider_has_no_summarizer() {
        let service = ProcessingService::new(&Config::default()).expect("service");
        assert!(!service.can_summarize());
    }
}

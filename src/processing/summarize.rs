//! Hierarchical summarization of a cell forest.
//!
//! A run normalizes the input into a forest, buckets it by depth and walks the buckets one at a
//! time: deepest first for [`SummarizationOrder::BottomUp`], roots first for
//! [`SummarizationOrder::TopDown`]. A bucket is fully summarized, and its summaries attached,
//! before the next bucket starts, so every node sees its already-summarized neighbors.
//!
//! Within a bucket, node tasks run concurrently behind a semaphore of `MaxParallelTasks`
//! permits. Each node task gets `MaxRetriesPerSummary + 1` attempts; every failed attempt also
//! counts against the run-wide `MaxRetries` budget, and exceeding that budget aborts the run.
//! A node that exhausts only its own attempts is abandoned and the run moves on.

mod budget;
mod cleanup;
mod context;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use self::budget::FailureBudget;
use super::hierarchy;
use super::types::{CellType, SemanticCell};
use crate::metrics::PipelineMetrics;
use crate::summarization::{CompletionClient, CompletionClientError, CompletionRequest};

/// System prompt sent with every completion call.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a summarization engine. Output ONLY the summary text. \
Never start with preamble such as \"Here's a summary\", \"Sure\", \"Summary:\", or similar. \
Never end with follow-up offers or commentary. Start directly with the first substantive word. \
If the content cannot be summarized, output exactly: None";

/// Prompt template used when none is configured.
pub const DEFAULT_SUMMARIZATION_PROMPT: &str = "Summarize the following content in at most {tokens} tokens.\n\nContent:\n{content}\n\nContext:\n{context}";

const MIN_SUMMARY_TOKENS: usize = 128;
const MIN_TIMEOUT_MS: u64 = 100;

/// Errors that abort a whole summarization run.
#[derive(Debug, Error)]
pub enum SummarizationError {
    /// Configuration values out of range.
    #[error("Invalid summarization configuration: {0}")]
    InvalidConfiguration(String),
    /// Too many completion failures across the run.
    #[error("Summarization aborted after {failures} failed completion attempts (limit {limit})")]
    FailureBudgetExhausted {
        /// Configured `MaxRetries`.
        limit: usize,
        /// Failures recorded when the run aborted.
        failures: usize,
    },
    /// The run was cancelled by the caller.
    #[error("Summarization cancelled")]
    Cancelled,
    /// A node task panicked or was aborted.
    #[error("Summarization task failed: {0}")]
    Task(String),
}

/// Direction of the depth traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummarizationOrder {
    /// Roots first; each node sees its parent and the parent's summaries.
    TopDown,
    /// Deepest cells first; each node sees its children and their summaries.
    #[default]
    BottomUp,
}

impl std::str::FromStr for SummarizationOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "topdown" => Ok(Self::TopDown),
            "bottomup" => Ok(Self::BottomUp),
            other => Err(format!("unknown summarization order '{other}'")),
        }
    }
}

/// Per-run summarization parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SummarizationConfiguration {
    /// Traversal direction.
    pub order: SummarizationOrder,
    /// Template with `{tokens}`, `{content}` and `{context}` placeholders.
    pub summarization_prompt: String,
    /// Token ceiling requested from the model.
    pub max_summary_tokens: usize,
    /// Cells whose content has fewer characters are not summarized.
    pub min_cell_length: usize,
    /// Concurrent node summarizations per depth bucket.
    pub max_parallel_tasks: usize,
    /// Retries per node after its first failed attempt.
    pub max_retries_per_summary: usize,
    /// Failed attempts tolerated across the whole run.
    pub max_retries: usize,
    /// Per-call time limit in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SummarizationConfiguration {
    fn default() -> Self {
        Self {
            order: SummarizationOrder::BottomUp,
            summarization_prompt: DEFAULT_SUMMARIZATION_PROMPT.to_string(),
            max_summary_tokens: 1024,
            min_cell_length: 128,
            max_parallel_tasks: 4,
            max_retries_per_summary: 3,
            max_retries: 9,
            timeout_ms: 30_000,
        }
    }
}

impl SummarizationConfiguration {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), SummarizationError> {
        if self.max_parallel_tasks == 0 {
            return Err(SummarizationError::InvalidConfiguration(
                "MaxParallelTasks must be at least 1".into(),
            ));
        }
        if self.max_summary_tokens < MIN_SUMMARY_TOKENS {
            return Err(SummarizationError::InvalidConfiguration(format!(
                "MaxSummaryTokens must be at least {MIN_SUMMARY_TOKENS}"
            )));
        }
        if self.timeout_ms < MIN_TIMEOUT_MS {
            return Err(SummarizationError::InvalidConfiguration(format!(
                "TimeoutMs must be at least {MIN_TIMEOUT_MS}"
            )));
        }
        if self.summarization_prompt.trim().is_empty() {
            return Err(SummarizationError::InvalidConfiguration(
                "SummarizationPrompt must not be blank".into(),
            ));
        }
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Result of one node task that did not abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeOutcome {
    /// Usable summary text.
    Summarized(String),
    /// The model had nothing to say; no child is created.
    Empty,
    /// Every attempt for this node failed.
    Abandoned,
}

/// Prompt prepared for one eligible node, captured from the bucket snapshot.
#[derive(Debug)]
struct NodeJob {
    cell_id: Uuid,
    prompt: String,
}

/// Everything a spawned node task needs, owned.
struct NodeTask {
    client: Arc<dyn CompletionClient>,
    model: String,
    max_tokens: usize,
    timeout: Duration,
    attempts: usize,
    gate: Arc<Semaphore>,
    budget: Arc<FailureBudget>,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
}

/// Generates `Summary` children for a cell forest through a completion client.
#[derive(Clone)]
pub struct SummarizationEngine {
    client: Arc<dyn CompletionClient>,
    model: String,
    metrics: Arc<PipelineMetrics>,
}

impl std::fmt::Debug for SummarizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizationEngine")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl SummarizationEngine {
    /// Engine calling `client` with `model`.
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Report summaries and failures into shared metrics.
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Model passed to the completion client.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Normalize `cells` and append a `Summary` child to every node that gets a usable summary.
    ///
    /// Nothing else about the forest changes. Fails only when the configuration is invalid,
    /// the run-wide failure budget is exceeded, or `cancel` fires.
    pub async fn summarize(
        &self,
        cells: Vec<SemanticCell>,
        config: &SummarizationConfiguration,
        cancel: &CancellationToken,
    ) -> Result<Vec<SemanticCell>, SummarizationError> {
        config.validate()?;

        let mut forest = hierarchy::normalize(cells);
        let mut depths: Vec<usize> = hierarchy::group_by_depth(&forest).into_keys().collect();
        if config.order == SummarizationOrder::BottomUp {
            depths.reverse();
        }

        tracing::info!(
            order = ?config.order,
            roots = forest.len(),
            depths = depths.len(),
            model = %self.model,
            "Starting summarization run"
        );

        let gate = Arc::new(Semaphore::new(config.max_parallel_tasks));
        let budget = Arc::new(FailureBudget::new(config.max_retries));
        let mut generated = 0usize;

        for depth in depths {
            if cancel.is_cancelled() {
                return Err(SummarizationError::Cancelled);
            }

            let jobs = plan_bucket(&forest, depth, config);
            if jobs.is_empty() {
                continue;
            }
            tracing::debug!(depth, nodes = jobs.len(), "Summarizing depth bucket");

            let summaries = self.run_bucket(jobs, config, &gate, &budget, cancel).await?;
            for (cell_id, summary) in summaries {
                if let Some(cell) = hierarchy::find_by_id_mut(&mut forest, cell_id) {
                    let child = cell.summary_child(summary);
                    tracing::debug!(cell_id = %cell_id, summary_id = %child.id, "Attached summary");
                    cell.children.push(child);
                    self.metrics.record_summary();
                    generated += 1;
                }
            }
        }

        tracing::info!(
            summaries = generated,
            failures = budget.failures(),
            "Summarization run finished"
        );
        Ok(forest)
    }

    async fn run_bucket(
        &self,
        jobs: Vec<NodeJob>,
        config: &SummarizationConfiguration,
        gate: &Arc<Semaphore>,
        budget: &Arc<FailureBudget>,
        cancel: &CancellationToken,
    ) -> Result<Vec<(Uuid, String)>, SummarizationError> {
        let mut tasks = JoinSet::new();
        for (index, job) in jobs.into_iter().enumerate() {
            let task = NodeTask {
                client: self.client.clone(),
                model: self.model.clone(),
                max_tokens: config.max_summary_tokens,
                timeout: config.timeout(),
                attempts: config.max_retries_per_summary + 1,
                gate: gate.clone(),
                budget: budget.clone(),
                metrics: self.metrics.clone(),
                cancel: cancel.clone(),
            };
            tasks.spawn(async move {
                let outcome = summarize_node(&task, &job).await;
                (index, job.cell_id, outcome)
            });
        }

        let mut summaries = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, cell_id, Ok(NodeOutcome::Summarized(text)))) => {
                    summaries.push((index, cell_id, text));
                }
                Ok((_, _, Ok(_))) => {}
                Ok((_, _, Err(error))) => {
                    tasks.shutdown().await;
                    return Err(error);
                }
                Err(join_error) => {
                    tasks.shutdown().await;
                    return Err(SummarizationError::Task(join_error.to_string()));
                }
            }
        }

        summaries.sort_by_key(|(index, _, _)| *index);
        Ok(summaries
            .into_iter()
            .map(|(_, cell_id, text)| (cell_id, text))
            .collect())
    }
}

/// Build prompts for every eligible node at `depth` from the current forest.
fn plan_bucket(
    forest: &[SemanticCell],
    depth: usize,
    config: &SummarizationConfiguration,
) -> Vec<NodeJob> {
    let buckets = hierarchy::group_by_depth(forest);
    let Some(bucket) = buckets.get(&depth) else {
        return Vec::new();
    };
    // Parents come from the normalized tree, not `ParentGUID`, so nested input without
    // declared parents still gets parent context.
    let parents = match config.order {
        SummarizationOrder::TopDown => Some(hierarchy::parent_index(forest)),
        SummarizationOrder::BottomUp => None,
    };

    bucket
        .iter()
        .filter(|cell| cell.cell_type != CellType::Summary)
        .filter_map(|cell| {
            let content = cell.content();
            if content.chars().count() < config.min_cell_length {
                tracing::debug!(
                    cell_id = %cell.id,
                    length = content.chars().count(),
                    min = config.min_cell_length,
                    "Skipping short cell"
                );
                return None;
            }

            let neighbor_context = match &parents {
                Some(parents) => context::from_parent(
                    parents
                        .get(&cell.id)
                        .and_then(|parent_id| hierarchy::find_by_id(forest, *parent_id)),
                ),
                None => context::from_children(cell),
            };
            let prompt = context::render_prompt(
                &config.summarization_prompt,
                config.max_summary_tokens,
                &content,
                &neighbor_context,
            );
            Some(NodeJob {
                cell_id: cell.id,
                prompt,
            })
        })
        .collect()
}

/// Summarize one node, holding an admission permit for the whole retry loop.
async fn summarize_node(
    task: &NodeTask,
    job: &NodeJob,
) -> Result<NodeOutcome, SummarizationError> {
    let _permit = tokio::select! {
        _ = task.cancel.cancelled() => return Err(SummarizationError::Cancelled),
        permit = task.gate.clone().acquire_owned() => permit
            .map_err(|_| SummarizationError::Task("admission gate closed".into()))?,
    };

    for attempt in 1..=task.attempts {
        if task.cancel.is_cancelled() {
            return Err(SummarizationError::Cancelled);
        }
        task.budget.ensure_available()?;

        let request = CompletionRequest {
            prompt: job.prompt.clone(),
            model: task.model.clone(),
            max_tokens: task.max_tokens,
            timeout: task.timeout,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        };
        let result = tokio::select! {
            _ = task.cancel.cancelled() => return Err(SummarizationError::Cancelled),
            outcome = tokio::time::timeout(task.timeout, task.client.generate_completion(request)) => {
                outcome.unwrap_or(Err(CompletionClientError::Timeout(task.timeout)))
            }
        };

        match result {
            Ok(raw) => {
                return Ok(match cleanup::accept(&raw) {
                    Some(summary) => NodeOutcome::Summarized(summary),
                    None => {
                        tracing::debug!(cell_id = %job.cell_id, attempt, "Model returned no summary");
                        NodeOutcome::Empty
                    }
                });
            }
            Err(error) => {
                task.metrics.record_summary_failure();
                let failures = task.budget.record_failure()?;
                tracing::warn!(
                    cell_id = %job.cell_id,
                    attempt,
                    attempts = task.attempts,
                    failures,
                    error = %error,
                    "Summary attempt failed"
                );
            }
        }
    }

    tracing::warn!(
        cell_id = %job.cell_id,
        attempts = task.attempts,
        "Giving up on cell after exhausting retries"
    );
    Ok(NodeOutcome::Abandoned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LONG: &str = "This cell carries enough content to clear the minimum length threshold.";

    fn config() -> SummarizationConfiguration {
        SummarizationConfiguration {
            min_cell_length: 10,
            max_summary_tokens: 128,
            ..SummarizationConfiguration::default()
        }
    }

    /// Replies with a fixed string and records every prompt.
    struct FixedClient {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl CompletionClient for FixedClient {
        async fn generate_completion(
            &self,
            request: CompletionRequest,
        ) -> Result<String, CompletionClientError> {
            assert_eq!(request.system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
            self.prompts.lock().expect("lock").push(request.prompt);
            Ok(self.reply.clone())
        }
    }

    struct FailingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for FailingClient {
        async fn generate_completion(
            &self,
            _request: CompletionRequest,
        ) -> Result<String, CompletionClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CompletionClientError::GenerationFailed("backend down".into()))
        }
    }

    struct SlowClient {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl SlowClient {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for SlowClient {
        async fn generate_completion(
            &self,
            _request: CompletionRequest,
        ) -> Result<String, CompletionClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("A compact summary.".into())
        }
    }

    fn summaries(forest: &[SemanticCell]) -> Vec<&SemanticCell> {
        hierarchy::flatten(forest)
            .into_iter()
            .filter(|cell| cell.cell_type == CellType::Summary)
            .collect()
    }

    #[tokio::test]
    async fn none_responses_inject_no_summaries() {
        let client = Arc::new(FixedClient::new("None"));
        let engine = SummarizationEngine::new(client.clone(), "test-model");
        let root = SemanticCell::text(LONG).with_children(vec![
            SemanticCell::text(LONG),
            SemanticCell::text(LONG).with_children(vec![SemanticCell::text(LONG)]),
        ]);

        let forest = engine
            .summarize(vec![root], &config(), &CancellationToken::new())
            .await
            .expect("run completes");

        assert!(summaries(&forest).is_empty());
        assert_eq!(client.prompts().len(), 4);
    }

    #[tokio::test]
    async fn summaries_attach_to_their_cells_with_inherited_config() {
        let client = Arc::new(FixedClient::new("Summary: Rust is fast."));
        let metrics = Arc::new(PipelineMetrics::new());
        let engine = SummarizationEngine::new(client, "test-model").with_metrics(metrics.clone());
        let leaf = SemanticCell::text(LONG);
        let short = SemanticCell::text("tiny");
        let root = SemanticCell::text(LONG).with_children(vec![leaf.clone(), short.clone()]);
        let root_id = root.id;

        let forest = engine
            .summarize(vec![root], &config(), &CancellationToken::new())
            .await
            .expect("run completes");

        let injected = summaries(&forest);
        assert_eq!(injected.len(), 2);
        for summary in &injected {
            assert_eq!(summary.text.as_deref(), Some("Rust is fast."));
        }
        let root = &forest[0];
        assert_eq!(root.id, root_id);
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[2].cell_type, CellType::Summary);
        assert_eq!(root.children[2].parent_id, Some(root_id));
        assert_eq!(root.children[0].children[0].parent_id, Some(leaf.id));
        assert!(root.children[1].children.is_empty());
        assert_eq!(metrics.snapshot().summaries_generated, 2);
    }

    #[tokio::test]
    async fn bottom_up_context_sees_child_summaries() {
        let client = Arc::new(FixedClient::new("Child gist."));
        let engine = SummarizationEngine::new(client.clone(), "test-model");
        let root = SemanticCell::text(format!("ROOT {LONG}"))
            .with_children(vec![SemanticCell::text(format!("CHILD {LONG}"))]);

        engine
            .summarize(vec![root], &config(), &CancellationToken::new())
            .await
            .expect("run completes");

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("CHILD"));
        assert!(prompts[0].ends_with("Context:\n(none)"));
        assert!(prompts[1].contains("Content:\nROOT"));
        assert!(prompts[1].contains("Child content: CHILD"));
        assert!(prompts[1].contains("Child summary: Child gist."));
    }

    #[tokio::test]
    async fn top_down_context_sees_parent_and_parent_summary() {
        let client = Arc::new(FixedClient::new("Parent gist."));
        let engine = SummarizationEngine::new(client.clone(), "test-model");
        let root = SemanticCell::text(format!("ROOT {LONG}"));
        let child = SemanticCell::text(format!("CHILD {LONG}")).with_parent(root.id);
        let config = SummarizationConfiguration {
            order: SummarizationOrder::TopDown,
            ..config()
        };

        let forest = engine
            .summarize(vec![child, root], &config, &CancellationToken::new())
            .await
            .expect("run completes");

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Content:\nROOT"));
        assert!(prompts[0].ends_with("Context:\n(none)"));
        assert!(prompts[1].contains("Content:\nCHILD"));
        assert!(prompts[1].contains("Parent content: ROOT"));
        assert!(prompts[1].contains("Parent summary: Parent gist."));
        assert_eq!(summaries(&forest).len(), 2);
    }

    #[tokio::test]
    async fn top_down_nested_child_without_declared_parent_sees_parent() {
        let client = Arc::new(FixedClient::new("Parent gist."));
        let engine = SummarizationEngine::new(client.clone(), "test-model");
        let root = SemanticCell::text(format!("ROOT {LONG}"))
            .with_children(vec![SemanticCell::text(format!("CHILD {LONG}"))]);
        assert!(root.children[0].parent_id.is_none());
        let config = SummarizationConfiguration {
            order: SummarizationOrder::TopDown,
            ..config()
        };

        engine
            .summarize(vec![root], &config, &CancellationToken::new())
            .await
            .expect("run completes");

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Parent content: ROOT"));
    }

    #[tokio::test]
    async fn failure_budget_aborts_on_fourth_failure() {
        let client = Arc::new(FailingClient {
            calls: AtomicUsize::new(0),
        });
        let engine = SummarizationEngine::new(client.clone(), "test-model");
        let cells = (0..3).map(|_| SemanticCell::text(LONG)).collect();
        let config = SummarizationConfiguration {
            max_retries: 3,
            max_retries_per_summary: 1,
            max_parallel_tasks: 1,
            ..config()
        };

        let error = engine
            .summarize(cells, &config, &CancellationToken::new())
            .await
            .expect_err("budget exceeded");

        assert!(matches!(
            error,
            SummarizationError::FailureBudgetExhausted { limit: 3, failures: 4 }
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn node_failures_within_budget_only_skip_the_node() {
        let client = Arc::new(FailingClient {
            calls: AtomicUsize::new(0),
        });
        let metrics = Arc::new(PipelineMetrics::new());
        let engine = SummarizationEngine::new(client.clone(), "test-model").with_metrics(metrics.clone());
        let config = SummarizationConfiguration {
            max_retries: 3,
            max_retries_per_summary: 2,
            ..config()
        };

        let forest = engine
            .summarize(vec![SemanticCell::text(LONG)], &config, &CancellationToken::new())
            .await
            .expect("node abandoned, run succeeds");

        assert!(summaries(&forest).is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.snapshot().summary_failures, 3);
    }

    #[tokio::test]
    async fn admission_gate_bounds_in_flight_calls() {
        let client = Arc::new(SlowClient::new(Duration::from_millis(40)));
        let engine = SummarizationEngine::new(client.clone(), "test-model");
        let cells = (0..5).map(|_| SemanticCell::text(LONG)).collect();
        let config = SummarizationConfiguration {
            max_parallel_tasks: 2,
            ..config()
        };

        let forest = engine
            .summarize(cells, &config, &CancellationToken::new())
            .await
            .expect("run completes");

        assert_eq!(client.calls.load(Ordering::SeqCst), 5);
        assert!(client.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(summaries(&forest).len(), 5);
    }

    #[tokio::test]
    async fn slow_calls_time_out_and_count_as_failures() {
        let client = Arc::new(SlowClient::new(Duration::from_millis(500)));
        let metrics = Arc::new(PipelineMetrics::new());
        let engine = SummarizationEngine::new(client, "test-model").with_metrics(metrics.clone());
        let config = SummarizationConfiguration {
            timeout_ms: 100,
            max_retries_per_summary: 0,
            max_retries: 5,
            ..config()
        };

        let forest = engine
            .summarize(vec![SemanticCell::text(LONG)], &config, &CancellationToken::new())
            .await
            .expect("timeout is node-local");

        assert!(summaries(&forest).is_empty());
        assert_eq!(metrics.snapshot().summary_failures, 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_run() {
        let client = Arc::new(SlowClient::new(Duration::from_secs(10)));
        let engine = SummarizationEngine::new(client, "test-model");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let error = engine
            .summarize(vec![SemanticCell::text(LONG)], &config(), &cancel)
            .await
            .expect_err("cancelled");

        assert!(matches!(error, SummarizationError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn invalid_configuration_is_rejected_before_any_call() {
        let client = Arc::new(FixedClient::new("unused"));
        let engine = SummarizationEngine::new(client.clone(), "test-model");
        let config = SummarizationConfiguration {
            max_parallel_tasks: 0,
            ..config()
        };
        let error = engine
            .summarize(vec![SemanticCell::text(LONG)], &config, &CancellationToken::new())
            .await
            .expect_err("invalid");
        assert!(matches!(error, SummarizationError::InvalidConfiguration(_)));
        assert!(client.prompts().is_empty());
    }

    #[test]
    fn configuration_defaults_and_wire_names() {
        let config: SummarizationConfiguration =
            serde_json::from_str(r#"{"Order":"TopDown","MaxParallelTasks":2}"#).expect("parses");
        assert_eq!(config.order, SummarizationOrder::TopDown);
        assert_eq!(config.max_parallel_tasks, 2);
        assert_eq!(config.max_retries, 9);
        assert_eq!(config.max_retries_per_summary, 3);
        assert_eq!(config.min_cell_length, 128);
        assert_eq!(config.timeout_ms, 30_000);
        assert!(config.validate().is_ok());
        assert_eq!("top-down".parse::<SummarizationOrder>(), Ok(SummarizationOrder::TopDown));
    }

    #[test]
    fn summary_cells_are_never_planned() {
        let base = SemanticCell::text(LONG);
        let summary = base.summary_child(LONG.to_string());
        let forest = vec![base.with_children(vec![summary])];
        let jobs = plan_bucket(&forest, 1, &config());
        assert!(jobs.is_empty());
    }
}

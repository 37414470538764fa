use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use semcell::{
    config, logging,
    processing::{
        ChunkResult, ProcessingService, SemanticCell, SummarizationConfiguration,
        SummarizationEngine, SummarizationOrder, hierarchy,
    },
    summarization::build_completion_client,
};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "semcell",
    version,
    about = "Chunk and summarize semantic document cells"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk every cell and print the chunks per cell.
    Chunk {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Summarize the cell forest and print it with injected summary cells.
    Summarize {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        summary: SummaryArgs,
    },
    /// Normalize, optionally summarize, and chunk; print the processed cell tree.
    Process {
        #[command(flatten)]
        input: InputArgs,
        /// Generate summaries before chunking.
        #[arg(long)]
        summarize: bool,
        #[command(flatten)]
        summary: SummaryArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// JSON file holding one cell or an array of cells; stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Args)]
struct SummaryArgs {
    /// Traversal order: bottom-up or top-down.
    #[arg(long)]
    order: Option<SummarizationOrder>,
    /// Concurrent summarizations per depth level.
    #[arg(long)]
    max_parallel: Option<usize>,
    /// Completion model; overrides SEMCELL_COMPLETION_MODEL.
    #[arg(long)]
    model: Option<String>,
    /// Cells with fewer content characters are not summarized.
    #[arg(long)]
    min_cell_length: Option<usize>,
}

impl SummaryArgs {
    fn configuration(&self) -> SummarizationConfiguration {
        let mut configuration = SummarizationConfiguration::default();
        if let Some(order) = self.order {
            configuration.order = order;
        }
        if let Some(max_parallel) = self.max_parallel {
            configuration.max_parallel_tasks = max_parallel;
        }
        if let Some(min_cell_length) = self.min_cell_length {
            configuration.min_cell_length = min_cell_length;
        }
        configuration
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CellChunks {
    #[serde(rename = "GUID")]
    id: Uuid,
    chunks: Vec<ChunkResult>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing(config.log_file.as_deref());
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; cancelling");
            trigger.cancel();
        }
    });

    let service = ProcessingService::new(config)?;
    let service = match cli.command {
        Command::Chunk { input } => {
            let cells = hierarchy::normalize(read_cells(&input)?);
            let results = hierarchy::flatten(&cells)
                .into_iter()
                .map(|cell| {
                    service.chunk_cell(cell).map(|chunks| CellChunks {
                        id: cell.id,
                        chunks,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            write_json(&results)?;
            service
        }
        Command::Summarize { input, summary } => {
            let service = with_model_override(service, &summary)?;
            let cells = read_cells(&input)?;
            let forest = service
                .summarize_cells(cells, &summary.configuration(), &cancel)
                .await?;
            write_json(&forest)?;
            service
        }
        Command::Process {
            input,
            summarize,
            summary,
        } => {
            let service = with_model_override(service, &summary)?;
            let cells = read_cells(&input)?;
            let configuration = summary.configuration();
            let responses = service
                .process_cells(cells, summarize.then_some(&configuration), &cancel)
                .await?;
            write_json(&responses)?;
            service
        }
    };

    let metrics = service.metrics_snapshot();
    tracing::info!(
        cells = metrics.cells_chunked,
        chunks = metrics.chunks_produced,
        summaries = metrics.summaries_generated,
        failures = metrics.summary_failures,
        "Run complete"
    );
    Ok(())
}

fn with_model_override(
    service: ProcessingService,
    args: &SummaryArgs,
) -> Result<ProcessingService> {
    let Some(model) = args.model.as_deref() else {
        return Ok(service);
    };
    let client = build_completion_client(config::get_config())
        .ok_or_else(|| anyhow!("--model requires SEMCELL_COMPLETION_PROVIDER to be set"))?;
    Ok(service.with_summarizer(SummarizationEngine::new(client, model)))
}

fn read_cells(args: &InputArgs) -> Result<Vec<SemanticCell>> {
    let raw = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };

    let value: Value = serde_json::from_str(&raw).context("input is not valid JSON")?;
    let cells = match value {
        Value::Array(_) => serde_json::from_value(value),
        other => serde_json::from_value(other).map(|cell: SemanticCell| vec![cell]),
    }
    .context("input does not describe semantic cells")?;
    Ok(cells)
}

fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value).context("failed to write output")?;
    writeln!(handle)?;
    Ok(())
}

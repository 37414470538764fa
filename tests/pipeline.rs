use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use semcell::{
    processing::{
        CellResponse, CellType, ChunkingEngine, ProcessingApi, ProcessingService, SemanticCell,
        SummarizationConfiguration, SummarizationEngine, SummarizationOrder, Tokenizer,
    },
    summarization::{CompletionClient, CompletionClientError, CompletionRequest},
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const ROOT: &str = "6d1f6c4e-1b7a-4f43-9a3c-0c1e2f3a4b5c";
const TABLE: &str = "0b8e3d52-7c1f-4e2a-8d9b-5a6c7e8f9012";
const LIST: &str = "a3c9e1f2-4b5d-4e6f-8a7b-9c0d1e2f3a4b";

#[derive(Default)]
struct RecordingClient {
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionClient for RecordingClient {
    async fn generate_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<String, CompletionClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt);
        Ok("Here is a summary: A short summary.".to_string())
    }
}

fn flat_document() -> Vec<SemanticCell> {
    serde_json::from_value(json!([
        {
            "GUID": TABLE,
            "ParentGUID": ROOT,
            "Type": "Table",
            "Table": [["name", "role"], ["Ada", "engineer"], ["Grace", "admiral"]],
            "ChunkingConfiguration": { "Strategy": "RowWithHeaders" },
            "Labels": ["people"]
        },
        {
            "GUID": ROOT,
            "Type": "Text",
            "Text": "First paragraph.\n\nSecond paragraph.",
            "ChunkingConfiguration": { "Strategy": "ParagraphBased", "FixedTokenCount": 5 },
            "Tags": { "source": "handbook" }
        },
        {
            "GUID": LIST,
            "ParentGUID": ROOT,
            "Type": "List",
            "UnorderedList": ["alpha", "", "beta"],
            "ChunkingConfiguration": { "Strategy": "ListEntry", "ContextPrefix": "Items: " }
        }
    ]))
    .expect("document parses")
}

fn service() -> ProcessingService {
    let tokenizer = Tokenizer::cl100k().expect("cl100k loads");
    ProcessingService::from_parts(ChunkingEngine::new(Arc::new(tokenizer)), None)
}

fn child<'a>(response: &'a CellResponse, cell_type: CellType) -> &'a CellResponse {
    response
        .children
        .iter()
        .find(|child| child.cell_type == cell_type)
        .unwrap_or_else(|| panic!("no {cell_type:?} child"))
}

#[tokio::test]
async fn flat_document_is_nested_and_chunked_per_strategy() {
    let responses = service()
        .process_cells(flat_document(), None, &CancellationToken::new())
        .await
        .expect("processing succeeds");

    assert_eq!(responses.len(), 1);
    let root = &responses[0];
    assert_eq!(root.id.to_string(), ROOT);
    assert_eq!(root.parent_id, None);
    assert_eq!(root.tags.get("source").map(String::as_str), Some("handbook"));
    let paragraphs: Vec<&str> = root.chunks.iter().map(|chunk| chunk.text.as_str()).collect();
    assert_eq!(paragraphs, vec!["First paragraph.", "Second paragraph."]);

    let table = child(root, CellType::Table);
    assert_eq!(table.parent_id.map(|id| id.to_string()).as_deref(), Some(ROOT));
    assert_eq!(table.labels, vec!["people"]);
    assert_eq!(table.text, "name | role\nAda | engineer\nGrace | admiral");
    assert_eq!(table.chunks.len(), 2);
    assert_eq!(
        table.chunks[0].text,
        "| name | role |\n|---|---|\n| Ada | engineer |"
    );

    let list = child(root, CellType::List);
    let entries: Vec<(&str, &str)> = list
        .chunks
        .iter()
        .map(|chunk| (chunk.text.as_str(), chunk.chunked_text.as_str()))
        .collect();
    assert_eq!(entries, vec![("alpha", "Items: alpha"), ("beta", "Items: beta")]);
}

#[tokio::test]
async fn summaries_are_injected_and_chunked() {
    let client = Arc::new(RecordingClient::default());
    let service = service().with_summarizer(SummarizationEngine::new(client.clone(), "test-model"));
    let config = SummarizationConfiguration {
        order: SummarizationOrder::BottomUp,
        min_cell_length: 1,
        ..SummarizationConfiguration::default()
    };

    let responses = service
        .process_cells(flat_document(), Some(&config), &CancellationToken::new())
        .await
        .expect("processing succeeds");

    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    let root = &responses[0];
    let summary = child(root, CellType::Summary);
    assert_eq!(summary.parent_id, Some(root.id));
    assert_eq!(summary.chunks[0].text, "A short summary.");
    for cell_type in [CellType::Table, CellType::List] {
        let summarized = child(root, cell_type);
        assert_eq!(child(summarized, CellType::Summary).text, "A short summary.");
    }

    let prompts = client.prompts.lock().unwrap();
    let root_prompt = prompts
        .iter()
        .find(|prompt| prompt.contains("First paragraph."))
        .expect("root was summarized");
    assert!(root_prompt.contains("Child summary: A short summary."));

    let metrics = service.metrics_snapshot();
    assert_eq!(metrics.summaries_generated, 3);
    assert_eq!(metrics.summary_failures, 0);
}

#[tokio::test]
async fn service_is_usable_behind_the_api_trait() {
    let api: Arc<dyn ProcessingApi> = Arc::new(service());
    let cell = SemanticCell::text("One sentence here. Another one follows.");

    let chunks = api.chunk_cell(&cell).expect("chunking succeeds");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "One sentence here. Another one follows.");

    let error = api
        .summarize_cells(vec![cell], &SummarizationConfiguration::default(), &CancellationToken::new())
        .await
        .expect_err("no summarizer configured");
    assert!(error.to_string().contains("unavailable"));
    assert_eq!(api.metrics_snapshot().cells_chunked, 1);
}

//! Driver-level integration tests.
//!
//! A scripted [`ChatProvider`] and a fake [`PageRenderer`] stand in for the
//! hosted model and pdfium, so these run offline and without libpdfium.

use async_trait::async_trait;
use medchart_extract::{
    extract_directory, run, transform_directory, ChatProvider, JsonRequest, MedExtractError,
    PageImage, PageRenderer, PipelineConfig, PipelineProgress, TransformUnit,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test doubles ─────────────────────────────────────────────────────────────

fn page_record() -> Value {
    json!({
        "medical_diagnosis": ["Hypertension"],
        "surgical_history": [],
        "allergies": {"has_allergies": false, "allergy_list": []},
        "physical_examination": {
            "height": "170 cm",
            "weight": "70 kg",
            "blood_pressure": "130/85",
            "pulse": "76",
            "respiratory_rate": "14",
            "temperature": "36.8",
            "overall_health": "good"
        }
    })
}

fn transformed_record() -> Value {
    json!({"patient": {"diagnoses": ["Hypertension"]}})
}

/// Answers image requests with [`page_record`] and text requests with
/// [`transformed_record`]. Can be told to fail or misbehave on call `n`.
#[derive(Default)]
struct ScriptedProvider {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
    garbage_on_call: Option<usize>,
    fenced: bool,
}

impl ScriptedProvider {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn complete_json(&self, request: &JsonRequest) -> Result<String, MedExtractError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(n) {
            return Err(MedExtractError::LlmApiError {
                provider: "scripted".into(),
                status: Some(500),
                message: "upstream exploded".into(),
            });
        }
        if self.garbage_on_call == Some(n) {
            return Ok("I'm sorry, I can't help with that.".into());
        }
        let body = if request.image.is_some() {
            page_record()
        } else {
            transformed_record()
        };
        Ok(if self.fenced {
            format!("```json\n{body}\n```")
        } else {
            body.to_string()
        })
    }
}

/// Returns `pages` placeholder images for any file, except names starting
/// with `broken`, which fail the way an unreadable PDF does.
struct FakeRenderer {
    pages: usize,
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, pdf_path: &Path) -> Result<Vec<PageImage>, MedExtractError> {
        let name = pdf_path.file_name().unwrap().to_string_lossy();
        if name.starts_with("broken") {
            return Err(MedExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: "xref table missing".into(),
            });
        }
        Ok((1..=self.pages).map(|n| PageImage::png(n, "iVBORw0KGgo=")).collect())
    }
}

struct Workspace {
    _root: TempDir,
    input: PathBuf,
    extract: PathBuf,
    schema: PathBuf,
    output: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("medchart_extract=debug")
            .with_test_writer()
            .try_init();
        let root = TempDir::new().unwrap();
        let input = root.path().join("data");
        std::fs::create_dir(&input).unwrap();
        Self {
            extract: root.path().join("extracted"),
            schema: root.path().join("medical_schema.json"),
            output: root.path().join("final_medical.json"),
            input,
            _root: root,
        }
    }

    fn add_pdf(&self, name: &str) {
        std::fs::write(self.input.join(name), b"%PDF-1.4\n").unwrap();
    }

    fn write_schema(&self) {
        let schema = json!({
            "type": "object",
            "properties": {"patient": {"type": "object"}}
        });
        std::fs::write(&self.schema, schema.to_string()).unwrap();
    }

    fn config(&self, provider: &Arc<ScriptedProvider>, pages: usize) -> PipelineConfig {
        PipelineConfig::builder()
            .input_dir(&self.input)
            .extract_dir(&self.extract)
            .schema_path(&self.schema)
            .transform_dir(&self.output)
            .provider(provider.clone())
            .renderer(Arc::new(FakeRenderer { pages }))
            .build()
            .unwrap()
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_page_pdf_gives_three_record_report() {
    let ws = Workspace::new();
    ws.add_pdf("X.pdf");
    let provider = Arc::new(ScriptedProvider::default());

    let summary = extract_directory(&ws.config(&provider, 3)).await.unwrap();

    assert_eq!(provider.calls(), 3);
    assert_eq!(summary.extracted.len(), 1);
    assert_eq!(summary.total_pages, 3);

    let report = read_json(&ws.extract.join("X_extracted.json"));
    assert_eq!(report, json!([page_record(), page_record(), page_record()]));
}

#[tokio::test]
async fn fenced_replies_are_unwrapped_before_saving() {
    let ws = Workspace::new();
    ws.add_pdf("visit.pdf");
    let provider = Arc::new(ScriptedProvider {
        fenced: true,
        ..Default::default()
    });

    extract_directory(&ws.config(&provider, 1)).await.unwrap();

    assert_eq!(read_json(&ws.extract.join("visit_extracted.json")), json!([page_record()]));
}

#[tokio::test]
async fn files_are_processed_in_name_order() {
    let ws = Workspace::new();
    ws.add_pdf("b.pdf");
    ws.add_pdf("a.PDF");
    ws.add_pdf("notes.txt");
    let provider = Arc::new(ScriptedProvider::default());

    let summary = extract_directory(&ws.config(&provider, 2)).await.unwrap();

    let names: Vec<_> = summary
        .extracted
        .iter()
        .map(|f| f.output.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a_extracted.json", "b_extracted.json"]);
    assert_eq!(provider.calls(), 4);
}

#[tokio::test]
async fn unreadable_pdf_is_skipped_and_the_rest_continue() {
    let ws = Workspace::new();
    ws.add_pdf("a.pdf");
    ws.add_pdf("broken.pdf");
    ws.add_pdf("c.pdf");
    let provider = Arc::new(ScriptedProvider::default());

    let summary = extract_directory(&ws.config(&provider, 1)).await.unwrap();

    assert_eq!(summary.extracted.len(), 2);
    assert_eq!(summary.skipped.len(), 1);
    assert!(summary.skipped[0].source.ends_with("broken.pdf"));
    assert!(summary.skipped[0].reason.contains("xref table missing"));
    assert!(!ws.extract.join("broken_extracted.json").exists());
    assert!(ws.extract.join("c_extracted.json").exists());
}

#[tokio::test]
async fn remote_failure_halts_and_leaves_no_partial_report() {
    let ws = Workspace::new();
    ws.add_pdf("a.pdf");
    ws.add_pdf("b.pdf");
    let provider = Arc::new(ScriptedProvider {
        fail_on_call: Some(2),
        ..Default::default()
    });

    let err = extract_directory(&ws.config(&provider, 3)).await.unwrap_err();

    assert!(matches!(err, MedExtractError::LlmApiError { status: Some(500), .. }));
    assert_eq!(provider.calls(), 2, "no calls after the failure");
    assert!(!ws.extract.join("a_extracted.json").exists());
    assert!(!ws.extract.join("b_extracted.json").exists());
}

#[tokio::test]
async fn non_json_reply_is_malformed() {
    let ws = Workspace::new();
    ws.add_pdf("scan.pdf");
    let provider = Arc::new(ScriptedProvider {
        garbage_on_call: Some(2),
        ..Default::default()
    });

    match extract_directory(&ws.config(&provider, 2)).await.unwrap_err() {
        MedExtractError::MalformedReply { context, .. } => assert_eq!(context, "scan.pdf page 2"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ws.extract.join("scan_extracted.json").exists());
}

#[tokio::test]
async fn empty_input_dir_writes_nothing() {
    let ws = Workspace::new();
    let provider = Arc::new(ScriptedProvider::default());

    let summary = extract_directory(&ws.config(&provider, 3)).await.unwrap();

    assert!(summary.extracted.is_empty());
    assert_eq!(provider.calls(), 0);
    assert!(!ws.extract.exists(), "output dir is created lazily");
}

#[tokio::test]
async fn earlier_report_is_overwritten() {
    let ws = Workspace::new();
    ws.add_pdf("X.pdf");
    std::fs::create_dir_all(&ws.extract).unwrap();
    std::fs::write(ws.extract.join("X_extracted.json"), "[\"stale\"]").unwrap();
    let provider = Arc::new(ScriptedProvider::default());

    extract_directory(&ws.config(&provider, 1)).await.unwrap();

    assert_eq!(read_json(&ws.extract.join("X_extracted.json")), json!([page_record()]));
}

// ── Transformation ───────────────────────────────────────────────────────────

fn seed_extraction(ws: &Workspace, name: &str, records: Value) {
    std::fs::create_dir_all(&ws.extract).unwrap();
    std::fs::write(ws.extract.join(name), records.to_string()).unwrap();
}

#[tokio::test]
async fn missing_schema_fails_before_any_call() {
    let ws = Workspace::new();
    seed_extraction(&ws, "X_extracted.json", json!([page_record()]));
    let provider = Arc::new(ScriptedProvider::default());

    let err = transform_directory(&ws.config(&provider, 1)).await.unwrap_err();

    assert!(matches!(err, MedExtractError::SchemaUnreadable { .. }));
    assert_eq!(provider.calls(), 0);
    assert!(!ws.output.exists());
}

#[tokio::test]
async fn malformed_schema_fails_before_any_call() {
    let ws = Workspace::new();
    seed_extraction(&ws, "X_extracted.json", json!([page_record()]));
    std::fs::write(&ws.schema, "{\"type\": ").unwrap();
    let provider = Arc::new(ScriptedProvider::default());

    let err = transform_directory(&ws.config(&provider, 1)).await.unwrap_err();

    assert!(matches!(err, MedExtractError::SchemaInvalid { .. }));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn report_unit_makes_one_call_per_file() {
    let ws = Workspace::new();
    ws.write_schema();
    seed_extraction(&ws, "X_extracted.json", json!([page_record(), page_record()]));
    let provider = Arc::new(ScriptedProvider::default());

    let summary = transform_directory(&ws.config(&provider, 1)).await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(summary.transformed[0].calls, 1);
    assert_eq!(
        read_json(&ws.output.join("transformed_X_extracted.json")),
        transformed_record()
    );
}

#[tokio::test]
async fn per_record_unit_makes_one_call_per_page() {
    let ws = Workspace::new();
    ws.write_schema();
    seed_extraction(
        &ws,
        "X_extracted.json",
        json!([page_record(), page_record(), page_record()]),
    );
    let provider = Arc::new(ScriptedProvider::default());
    let mut config = ws.config(&provider, 1);
    config.transform_unit = TransformUnit::PerRecord;

    transform_directory(&config).await.unwrap();

    assert_eq!(provider.calls(), 3);
    assert_eq!(
        read_json(&ws.output.join("transformed_X_extracted.json")),
        json!([transformed_record(), transformed_record(), transformed_record()])
    );
}

#[tokio::test]
async fn unparseable_extraction_is_fatal() {
    let ws = Workspace::new();
    ws.write_schema();
    std::fs::create_dir_all(&ws.extract).unwrap();
    std::fs::write(ws.extract.join("X_extracted.json"), "not json").unwrap();
    let provider = Arc::new(ScriptedProvider::default());

    let err = transform_directory(&ws.config(&provider, 1)).await.unwrap_err();

    assert!(matches!(err, MedExtractError::ExtractionUnreadable { .. }));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn empty_extract_dir_writes_nothing() {
    let ws = Workspace::new();
    ws.write_schema();
    std::fs::create_dir_all(&ws.extract).unwrap();
    let provider = Arc::new(ScriptedProvider::default());

    let summary = transform_directory(&ws.config(&provider, 1)).await.unwrap();

    assert!(summary.transformed.is_empty());
    assert!(!ws.output.exists());
}

// ── Full run ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_chains_both_stages_with_derived_names() {
    let ws = Workspace::new();
    ws.write_schema();
    ws.add_pdf("X.pdf");
    let provider = Arc::new(ScriptedProvider::default());

    let summary = run(&ws.config(&provider, 3)).await.unwrap();

    assert_eq!(provider.calls(), 3 + 1);
    assert_eq!(summary.extraction.extracted[0].output, ws.extract.join("X_extracted.json"));
    assert_eq!(
        summary.transformation.transformed[0].output,
        ws.output.join("transformed_X_extracted.json")
    );
    assert_eq!(
        read_json(&ws.output.join("transformed_X_extracted.json")),
        transformed_record()
    );
}

#[tokio::test]
async fn run_with_missing_schema_makes_no_calls() {
    let ws = Workspace::new();
    ws.add_pdf("X.pdf");
    let provider = Arc::new(ScriptedProvider::default());

    let err = run(&ws.config(&provider, 3)).await.unwrap_err();

    assert!(matches!(err, MedExtractError::SchemaUnreadable { .. }));
    assert_eq!(provider.calls(), 0);
    assert!(!ws.extract.exists(), "no report written before the schema check");
}

#[tokio::test]
async fn run_over_empty_input_with_absent_extract_dir_succeeds() {
    let ws = Workspace::new();
    ws.write_schema();
    let provider = Arc::new(ScriptedProvider::default());
    assert!(!ws.extract.exists());

    let summary = run(&ws.config(&provider, 1)).await.unwrap();

    assert!(summary.extraction.extracted.is_empty());
    assert!(summary.transformation.transformed.is_empty());
    assert_eq!(provider.calls(), 0);
    assert!(!ws.extract.exists());
    assert!(!ws.output.exists());
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl PipelineProgress for EventLog {
    fn on_extraction_start(&self, total_files: usize) {
        self.0.lock().unwrap().push(format!("extract {total_files}"));
    }
    fn on_file_start(&self, file: &str, total_pages: usize) {
        self.0.lock().unwrap().push(format!("file {file} {total_pages}"));
    }
    fn on_page_complete(&self, _file: &str, page_num: usize, _total_pages: usize) {
        self.0.lock().unwrap().push(format!("page {page_num}"));
    }
    fn on_file_complete(&self, file: &str, _output: &Path) {
        self.0.lock().unwrap().push(format!("done {file}"));
    }
    fn on_file_skipped(&self, file: &str, _error: &str) {
        self.0.lock().unwrap().push(format!("skip {file}"));
    }
    fn on_transform_start(&self, total_files: usize) {
        self.0.lock().unwrap().push(format!("transform {total_files}"));
    }
    fn on_transform_file_complete(&self, file: &str, _output: &Path) {
        self.0.lock().unwrap().push(format!("transformed {file}"));
    }
}

#[tokio::test]
async fn progress_events_arrive_in_order() {
    let ws = Workspace::new();
    ws.write_schema();
    ws.add_pdf("a.pdf");
    ws.add_pdf("broken.pdf");
    let provider = Arc::new(ScriptedProvider::default());
    let log = Arc::new(EventLog::default());
    let mut config = ws.config(&provider, 2);
    config.progress_callback = Some(log.clone());

    run(&config).await.unwrap();

    assert_eq!(
        *log.0.lock().unwrap(),
        vec![
            "extract 2",
            "file a.pdf 2",
            "page 1",
            "page 2",
            "done a.pdf",
            "skip broken.pdf",
            "transform 1",
            "transformed a_extracted.json",
        ]
    );
}

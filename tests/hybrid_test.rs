//! Integration tests for hybrid processing with a mock backend.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde_json::json;

use pdfstruct::hybrid::{
    HybridClient, HybridConfig, HybridOrchestrator, HybridRequest, HybridResponse, ProcessingEvent,
    TriageDecision, TRIAGE_LOG_FILENAME,
};
use pdfstruct::{DocumentInput, Error, SemanticNode};

enum Behaviour {
    Answer(serde_json::Value),
    Fail,
    Hang,
}

/// Backend double that records the pages it was asked for.
struct MockBackend {
    behaviour: Behaviour,
    requests: Mutex<Vec<BTreeSet<u32>>>,
}

impl MockBackend {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requested(&self) -> Vec<BTreeSet<u32>> {
        self.requests.lock().unwrap().clone()
    }
}

impl HybridClient for MockBackend {
    fn name(&self) -> &str {
        "docling"
    }

    fn convert_async<'a>(&'a self, request: &'a HybridRequest) -> BoxFuture<'a, pdfstruct::Result<HybridResponse>> {
        async move {
            self.requests.lock().unwrap().push(request.pages.clone());
            match &self.behaviour {
                Behaviour::Answer(json) => Ok(HybridResponse::from_json(json.clone())),
                Behaviour::Fail => Err(Error::Backend {
                    backend: "docling".to_string(),
                    message: "conversion failed".to_string(),
                }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(HybridResponse::default())
                }
            }
        }
        .boxed()
    }
}

/// Page 1 is plain text, page 2 carries a table grid.
fn two_page_input() -> DocumentInput {
    DocumentInput::from_json(
        r#"{
        "pages": [
            {"width": 595, "height": 842, "primitives": [
                {"type": "text_run", "bbox": {"page": 0, "left": 50, "bottom": 700, "right": 250, "top": 710}, "text": "Local paragraph text"}
            ]},
            {"width": 595, "height": 842, "primitives": [
                {"type": "text_run", "bbox": {"page": 1, "left": 60, "bottom": 680, "right": 80, "top": 690}, "text": "Name"},
                {"type": "text_run", "bbox": {"page": 1, "left": 160, "bottom": 680, "right": 175, "top": 690}, "text": "Age"}
            ]}
        ],
        "table_borders": [{
            "bbox": {"page": 1, "left": 50, "bottom": 600, "right": 250, "top": 700},
            "rows": [700, 650, 600],
            "cols": [50, 150, 250]
        }]
    }"#,
    )
    .unwrap()
}

fn docling_answer() -> serde_json::Value {
    json!({
        "texts": [{
            "label": "text",
            "text": "Backend paragraph",
            "prov": [{"page_no": 2, "bbox": {"l": 50, "t": 300, "r": 300, "b": 320, "coord_origin": "TOPLEFT"}}]
        }],
        "tables": [{
            "prov": [{"page_no": 2, "bbox": {"l": 50, "t": 142, "r": 250, "b": 242, "coord_origin": "TOPLEFT"}}],
            "data": {
                "num_rows": 2,
                "num_cols": 2,
                "table_cells": [
                    {"start_row_offset_idx": 0, "start_col_offset_idx": 0, "text": "Name"},
                    {"start_row_offset_idx": 0, "start_col_offset_idx": 1, "text": "Age"}
                ]
            }
        }]
    })
}

fn pdf() -> Arc<Vec<u8>> {
    Arc::new(b"%PDF-1.4".to_vec())
}

fn kinds(page: &pdfstruct::Page) -> Vec<&'static str> {
    page.nodes().map(SemanticNode::kind_name).collect()
}

#[tokio::test]
async fn test_backend_pages_come_from_backend() {
    let backend = MockBackend::new(Behaviour::Answer(docling_answer()));
    let orchestrator = HybridOrchestrator::new(HybridConfig::new("docling"), backend.clone()).unwrap();
    let output = orchestrator.process(two_page_input(), pdf()).await.unwrap();

    assert_eq!(backend.requested(), vec![BTreeSet::from([2])]);
    assert_eq!(output.backend_pages, vec![1]);
    assert!(!output.fallback_engaged);
    assert_eq!(output.triage[0].decision, TriageDecision::Java);
    assert_eq!(output.triage[1].decision, TriageDecision::Backend);

    let doc = &output.document;
    assert_eq!(doc.page_count(), 2);
    assert_eq!(kinds(&doc.pages[0]), vec!["paragraph"]);
    assert!(kinds(&doc.pages[1]).contains(&"table"));
    assert!(doc.plain_text().contains("Backend paragraph"));
    assert!(doc.nodes().all(|node| node.id().is_some()));
}

#[tokio::test]
async fn test_backend_failure_falls_back_to_local() {
    let backend = MockBackend::new(Behaviour::Fail);
    let (sender, receiver) = crossbeam_channel::unbounded();
    let orchestrator = HybridOrchestrator::new(HybridConfig::new("docling").with_fallback(true), backend.clone())
        .unwrap()
        .with_events(sender);
    let output = orchestrator.process(two_page_input(), pdf()).await.unwrap();
    drop(orchestrator);

    assert!(output.fallback_engaged);
    assert!(output.backend_pages.is_empty());
    assert_eq!(kinds(&output.document.pages[1]), vec!["table"]);

    let events: Vec<ProcessingEvent> = receiver.iter().collect();
    assert!(events
        .iter()
        .any(|e| matches!(e, ProcessingEvent::FallbackEngaged { .. })));
    let processed = events
        .iter()
        .filter(|e| matches!(e, ProcessingEvent::PageProcessed { .. }))
        .count();
    assert_eq!(processed, 2);
}

#[tokio::test]
async fn test_backend_failure_without_fallback() {
    let backend = MockBackend::new(Behaviour::Fail);
    let orchestrator =
        HybridOrchestrator::new(HybridConfig::new("docling").with_fallback(false), backend).unwrap();
    let err = orchestrator.process(two_page_input(), pdf()).await.unwrap_err();
    let Error::BackendFailed(inner) = err else {
        panic!("backend failure expected");
    };
    assert!(inner.is_backend_error());
}

#[tokio::test]
async fn test_backend_timeout() {
    let backend = MockBackend::new(Behaviour::Hang);
    let config = HybridConfig::new("docling").with_timeout_ms(50).with_fallback(false);
    let orchestrator = HybridOrchestrator::new(config, backend).unwrap();
    let err = orchestrator.process(two_page_input(), pdf()).await.unwrap_err();
    let Error::BackendFailed(inner) = err else {
        panic!("backend failure expected");
    };
    assert!(matches!(*inner, Error::BackendTimeout(50)));
}

#[tokio::test]
async fn test_text_only_document_skips_backend() {
    let backend = MockBackend::new(Behaviour::Fail);
    let input = DocumentInput::from_json(
        r#"{"pages": [{"width": 595, "height": 842, "primitives": [
            {"type": "text_run", "bbox": {"page": 0, "left": 50, "bottom": 700, "right": 250, "top": 710}, "text": "Only text"}
        ]}]}"#,
    )
    .unwrap();
    let orchestrator = HybridOrchestrator::new(HybridConfig::new("docling"), backend.clone()).unwrap();
    let output = orchestrator.process(input, pdf()).await.unwrap();
    assert!(backend.requested().is_empty());
    assert!(!output.fallback_engaged);
    assert_eq!(kinds(&output.document.pages[0]), vec!["paragraph"]);
}

#[tokio::test]
async fn test_triage_log_written_to_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::new(Behaviour::Answer(docling_answer()));
    let config = HybridConfig::new("docling").with_output_dir(dir.path());
    let orchestrator = HybridOrchestrator::new(config, backend)
        .unwrap()
        .with_document_name("report.pdf");
    orchestrator.process(two_page_input(), pdf()).await.unwrap();

    let log = std::fs::read_to_string(dir.path().join(TRIAGE_LOG_FILENAME)).unwrap();
    let log: serde_json::Value = serde_json::from_str(&log).unwrap();
    assert_eq!(log["document"], "report.pdf");
    assert_eq!(log["hybrid"], "docling");
    assert_eq!(log["summary"]["totalPages"], 2);
    assert_eq!(log["summary"]["backendPages"], 1);
    assert_eq!(log["triage"][1]["page"], 2);
    assert_eq!(log["triage"][1]["decision"], "BACKEND");
}

#[tokio::test]
async fn test_unwritable_triage_log_does_not_abort() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let backend = MockBackend::new(Behaviour::Answer(docling_answer()));
    let config = HybridConfig::new("docling").with_output_dir(blocker.path());
    let orchestrator = HybridOrchestrator::new(config, backend).unwrap();
    let output = orchestrator.process(two_page_input(), pdf()).await.unwrap();
    assert_eq!(output.document.page_count(), 2);
    assert_eq!(output.backend_pages, vec![1]);
}

#[tokio::test]
async fn test_malformed_answer_falls_back_to_local() {
    let answer = json!({
        "texts": [{"label": "text", "text": "Stray",
                   "prov": [{"page_no": u64::MAX, "bbox": {"l": 0, "t": 10, "r": 50, "b": 20}}]}],
        "tables": [{
            "prov": [{"page_no": 2, "bbox": {"l": 50, "t": 142, "r": 250, "b": 242, "coord_origin": "TOPLEFT"}}],
            "data": {"num_rows": 2, "num_cols": 2,
                     "table_cells": [{"start_row_offset_idx": u64::MAX, "start_col_offset_idx": 0, "text": "x"}]}
        }]
    });
    let backend = MockBackend::new(Behaviour::Answer(answer));
    let orchestrator =
        HybridOrchestrator::new(HybridConfig::new("docling").with_fallback(true), backend).unwrap();
    let output = orchestrator.process(two_page_input(), pdf()).await.unwrap();
    assert!(output.fallback_engaged);
    assert!(output.backend_pages.is_empty());
    assert_eq!(kinds(&output.document.pages[1]), vec!["table"]);
}

#[tokio::test]
async fn test_malformed_answer_without_fallback() {
    let answer = json!({"texts": [{"label": "text", "text": "Stray",
                                   "prov": [{"page_no": 7, "bbox": {"l": 0, "t": 10, "r": 50, "b": 20}}]}]});
    let backend = MockBackend::new(Behaviour::Answer(answer));
    let orchestrator =
        HybridOrchestrator::new(HybridConfig::new("docling").with_fallback(false), backend).unwrap();
    let err = orchestrator.process(two_page_input(), pdf()).await.unwrap_err();
    let Error::BackendFailed(inner) = err else {
        panic!("backend failure expected");
    };
    assert!(matches!(*inner, Error::InvalidResponse(_)));
}

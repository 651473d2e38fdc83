//! Hybrid processing: triage, backend clients, schema transformers and the
//! orchestrator that combines them with the local pipeline.

mod client;
mod config;
mod orchestrator;
pub mod transform;
mod triage;
mod triage_log;

#[cfg(feature = "http")]
mod docling_client;
#[cfg(feature = "http")]
mod hancom_client;

pub use client::{HybridClient, HybridRequest, HybridResponse, OutputFormat};
pub use config::{
    HybridConfig, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_TIMEOUT_MS, DOCLING_DEFAULT_URL, DOCLING_FAST_DEFAULT_URL,
    HANCOM_DEFAULT_URL, KNOWN_BACKENDS,
};
pub use orchestrator::{HybridOrchestrator, HybridOutput, ProcessingEvent};
pub use transform::{DoclingTransformer, HancomTransformer, SchemaTransformer, TransformerRegistry};
pub use triage::{classify_page, extract_signals, triage_pages, TriageDecision, TriageResult, TriageSignals, TriageThresholds};
pub use triage_log::{TriageEntry, TriageLog, TriageSummary, TRIAGE_LOG_FILENAME};

#[cfg(feature = "http")]
pub use client::create_client;
#[cfg(feature = "http")]
pub use docling_client::DoclingClient;
#[cfg(feature = "http")]
pub use hancom_client::HancomClient;

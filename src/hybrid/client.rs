//! Backend client interface.
//!
//! A [`HybridClient`] sends a PDF to a document-AI backend and returns its
//! raw JSON answer. Mapping that answer onto the node model is the job of a
//! [`SchemaTransformer`](super::transform::SchemaTransformer).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::Result;

/// Output formats a backend can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputFormat {
    Json,
    Markdown,
    Html,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Json, OutputFormat::Markdown, OutputFormat::Html];

    /// Value used in backend API parameters.
    pub fn api_value(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
        }
    }
}

/// A conversion request.
#[derive(Debug, Clone)]
pub struct HybridRequest {
    pub pdf_bytes: Arc<Vec<u8>>,
    /// One-based page numbers; empty means every page
    pub pages: BTreeSet<u32>,
    pub output_formats: BTreeSet<OutputFormat>,
    pub do_ocr: bool,
    pub do_table_structure: bool,
}

impl HybridRequest {
    /// Request every page in every format.
    pub fn all_pages(pdf_bytes: Arc<Vec<u8>>) -> Self {
        Self::for_pages(pdf_bytes, BTreeSet::new())
    }

    /// Request the one-based `pages` in every format.
    pub fn for_pages(pdf_bytes: Arc<Vec<u8>>, pages: BTreeSet<u32>) -> Self {
        Self {
            pdf_bytes,
            pages,
            output_formats: OutputFormat::ALL.into_iter().collect(),
            do_ocr: true,
            do_table_structure: true,
        }
    }

    /// Restrict the requested formats; an empty set keeps every format.
    pub fn with_formats(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        let formats: BTreeSet<OutputFormat> = formats.into_iter().collect();
        if !formats.is_empty() {
            self.output_formats = formats;
        }
        self
    }

    pub fn with_ocr(mut self, do_ocr: bool) -> Self {
        self.do_ocr = do_ocr;
        self
    }

    pub fn with_table_structure(mut self, do_table_structure: bool) -> Self {
        self.do_table_structure = do_table_structure;
        self
    }

    pub fn wants(&self, format: OutputFormat) -> bool {
        self.output_formats.contains(&format)
    }
}

/// A backend answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridResponse {
    pub markdown: String,
    pub html: String,
    /// Structured document tree
    pub json: Option<Value>,
    /// Per-page JSON keyed by one-based page number
    pub page_contents: BTreeMap<u32, Value>,
}

impl HybridResponse {
    /// Response carrying only a JSON tree.
    pub fn from_json(json: Value) -> Self {
        Self {
            json: Some(json),
            ..Self::default()
        }
    }
}

/// A document-AI backend.
pub trait HybridClient: Send + Sync {
    /// Backend name, as used in configuration.
    fn name(&self) -> &str;

    /// Convert asynchronously.
    fn convert_async<'a>(&'a self, request: &'a HybridRequest) -> BoxFuture<'a, Result<HybridResponse>>;

    /// Convert, blocking the current thread.
    ///
    /// Must not be called from inside an async runtime.
    fn convert(&self, request: &HybridRequest) -> Result<HybridResponse> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        runtime.block_on(self.convert_async(request))
    }

    /// Whether the backend answers health checks.
    fn is_available(&self) -> BoxFuture<'_, bool> {
        futures::future::ready(true).boxed()
    }
}

/// Creates the HTTP client for the configured backend.
#[cfg(feature = "http")]
pub fn create_client(config: &super::HybridConfig) -> Result<Arc<dyn HybridClient>> {
    config.validate()?;
    match config.backend.to_lowercase().as_str() {
        "docling" | "docling-fast" => Ok(Arc::new(super::DoclingClient::new(config)?)),
        "hancom" => Ok(Arc::new(super::HancomClient::new(config)?)),
        other => Err(crate::error::Error::InvalidConfig(format!("unknown backend '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl HybridClient for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn convert_async<'a>(&'a self, request: &'a HybridRequest) -> BoxFuture<'a, Result<HybridResponse>> {
            let pages: Vec<u32> = request.pages.iter().copied().collect();
            async move { Ok(HybridResponse::from_json(serde_json::json!({ "pages": pages }))) }.boxed()
        }
    }

    // ==== Client Tests ====

    #[test]
    fn test_request_defaults_to_all_formats() {
        let request = HybridRequest::all_pages(Arc::new(Vec::new()));
        assert!(request.wants(OutputFormat::Json));
        assert!(request.wants(OutputFormat::Markdown));
        assert!(request.wants(OutputFormat::Html));
        let request = request.with_formats([]);
        assert_eq!(request.output_formats.len(), 3);
    }

    #[test]
    fn test_with_formats_restricts() {
        let request = HybridRequest::all_pages(Arc::new(Vec::new())).with_formats([OutputFormat::Json]);
        assert!(request.wants(OutputFormat::Json));
        assert!(!request.wants(OutputFormat::Html));
    }

    #[test]
    fn test_blocking_convert_uses_async_path() {
        let request = HybridRequest::for_pages(Arc::new(Vec::new()), [2, 5].into_iter().collect());
        let response = Echo.convert(&request).unwrap();
        assert_eq!(response.json.unwrap()["pages"], serde_json::json!([2, 5]));
    }

    #[test]
    fn test_default_availability() {
        assert!(futures::executor::block_on(Echo.is_available()));
    }
}

//! Hybrid mode configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default backend request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of concurrent backend requests.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Default docling-serve URL.
pub const DOCLING_DEFAULT_URL: &str = "http://localhost:5001";

/// Default docling-fast URL.
pub const DOCLING_FAST_DEFAULT_URL: &str = "http://localhost:5002";

/// Default Hancom document AI URL.
pub const HANCOM_DEFAULT_URL: &str = "https://dataloader.cloud.hancom.com/studio-lite/api";

/// Backends the orchestrator knows how to reach.
pub const KNOWN_BACKENDS: &[&str] = &["docling", "docling-fast", "hancom"];

/// Settings for routing pages to a document-AI backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Backend name (`docling`, `docling-fast` or `hancom`)
    pub backend: String,

    /// Explicit backend URL; the backend default is used when unset
    pub url: Option<String>,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Process backend pages locally when the backend fails
    pub fallback: bool,

    /// Maximum concurrent backend requests
    pub max_concurrent_requests: usize,

    /// Ask the backend to run OCR
    pub do_ocr: bool,

    /// Ask the backend to recognise table structure
    pub do_table_structure: bool,

    /// Directory the triage log is written to
    pub output_dir: Option<PathBuf>,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            backend: "docling".to_string(),
            url: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            fallback: true,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            do_ocr: true,
            do_table_structure: true,
            output_dir: None,
        }
    }
}

impl HybridConfig {
    /// Create a configuration for `backend` with default settings.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }

    /// Set the backend URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Enable or disable the local fallback.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Set the maximum number of concurrent requests.
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    /// Set the OCR flag.
    pub fn with_ocr(mut self, do_ocr: bool) -> Self {
        self.do_ocr = do_ocr;
        self
    }

    /// Set the table structure flag.
    pub fn with_table_structure(mut self, do_table_structure: bool) -> Self {
        self.do_table_structure = do_table_structure;
        self
    }

    /// Set the triage log directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Default URL of a backend, if it has one.
    pub fn default_url(backend: &str) -> Option<&'static str> {
        match backend.to_lowercase().as_str() {
            "docling" => Some(DOCLING_DEFAULT_URL),
            "docling-fast" => Some(DOCLING_FAST_DEFAULT_URL),
            "hancom" => Some(HANCOM_DEFAULT_URL),
            _ => None,
        }
    }

    /// The configured URL, or the backend default.
    pub fn effective_url(&self) -> Option<String> {
        match self.url.as_deref() {
            Some(url) if !url.is_empty() => Some(url.trim_end_matches('/').to_string()),
            _ => Self::default_url(&self.backend).map(str::to_string),
        }
    }

    /// Reject unusable settings.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout must be positive".to_string()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(Error::InvalidConfig(
                "max concurrent requests must be positive".to_string(),
            ));
        }
        let backend = self.backend.to_lowercase();
        if !KNOWN_BACKENDS.contains(&backend.as_str()) {
            return Err(Error::InvalidConfig(format!(
                "unknown backend '{}' (expected one of: {})",
                self.backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }
        Ok(())
    }
}

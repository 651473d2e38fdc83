//! docling-serve client.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::client::{HybridClient, HybridRequest, HybridResponse};
use super::config::{HybridConfig, DOCLING_DEFAULT_URL};
use crate::error::{Error, Result};

const CONVERT_ENDPOINT: &str = "/v1/convert/file";
const HEALTH_ENDPOINT: &str = "/health";
const DEFAULT_FILENAME: &str = "document.pdf";
const HEALTH_TIMEOUT_MS: u64 = 5_000;

/// Client for a docling-serve instance.
#[derive(Debug, Clone)]
pub struct DoclingClient {
    base_url: String,
    timeout_ms: u64,
    http: reqwest::Client,
}

impl DoclingClient {
    pub fn new(config: &HybridConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: config.effective_url().unwrap_or_else(|| DOCLING_DEFAULT_URL.to_string()),
            timeout_ms: config.timeout_ms,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn form(request: &HybridRequest) -> Result<Form> {
        let file = Part::bytes(request.pdf_bytes.as_ref().clone())
            .file_name(DEFAULT_FILENAME)
            .mime_str("application/pdf")?;
        let mut form = Form::new().part("files", file);
        for format in &request.output_formats {
            form = form.text("to_formats", format.api_value());
        }
        form = form
            .text("do_table_structure", request.do_table_structure.to_string())
            .text("do_ocr", request.do_ocr.to_string());
        if let (Some(first), Some(last)) = (request.pages.first(), request.pages.last()) {
            form = form.text("page_range", format!("[{},{}]", first, last));
        }
        Ok(form)
    }

    async fn send(&self, request: &HybridRequest) -> Result<HybridResponse> {
        let url = format!("{}{}", self.base_url, CONVERT_ENDPOINT);
        log::debug!("POST {} ({} pages)", url, request.pages.len());
        let response = self.http.post(&url).multipart(Self::form(request)?).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Backend {
                backend: "docling".to_string(),
                message: format!("request failed with status {}: {}", status.as_u16(), body),
            });
        }
        parse_response(&body)
    }
}

/// Decode a docling-serve convert answer.
pub(crate) fn parse_response(body: &str) -> Result<HybridResponse> {
    let root: Value = serde_json::from_str(body)?;
    if root.get("status").and_then(Value::as_str) == Some("failure") {
        let errors = root.get("errors").map(Value::to_string).unwrap_or_else(|| "unknown error".to_string());
        return Err(Error::Backend {
            backend: "docling".to_string(),
            message: format!("processing failed: {}", errors),
        });
    }
    let document = root
        .get("document")
        .ok_or_else(|| Error::InvalidResponse("missing 'document' field".to_string()))?;
    let text = |field: &str| document.get(field).and_then(Value::as_str).unwrap_or_default().to_string();
    let json = document.get("json_content").filter(|v| !v.is_null()).cloned();
    Ok(HybridResponse {
        markdown: text("md_content"),
        html: text("html_content"),
        page_contents: json.as_ref().map(page_contents).unwrap_or_default(),
        json,
    })
}

/// Per-page entries of `json_content.pages`, keyed by page number.
fn page_contents(json: &Value) -> BTreeMap<u32, Value> {
    json.get("pages")
        .and_then(Value::as_object)
        .map(|pages| {
            pages
                .iter()
                .filter_map(|(key, value)| key.parse::<u32>().ok().map(|n| (n, value.clone())))
                .collect()
        })
        .unwrap_or_default()
}

impl HybridClient for DoclingClient {
    fn name(&self) -> &str {
        "docling"
    }

    fn convert_async<'a>(&'a self, request: &'a HybridRequest) -> BoxFuture<'a, Result<HybridResponse>> {
        self.send(request).boxed()
    }

    fn is_available(&self) -> BoxFuture<'_, bool> {
        async move {
            let url = format!("{}{}", self.base_url, HEALTH_ENDPOINT);
            let timeout = Duration::from_millis(self.timeout_ms.min(HEALTH_TIMEOUT_MS));
            match self.http.get(&url).timeout(timeout).send().await {
                Ok(response) => response.status().as_u16() == 200,
                Err(err) => {
                    log::debug!("Health check of {} failed: {}", url, err);
                    false
                }
            }
        }
        .boxed()
    }
}

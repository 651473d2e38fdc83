//! Hancom document AI client.
//!
//! A conversion uploads the PDF, fetches its visual info and deletes the
//! upload again. A failed delete is logged and otherwise ignored.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::client::{HybridClient, HybridRequest, HybridResponse};
use super::config::{HybridConfig, HANCOM_DEFAULT_URL};
use crate::error::{Error, Result};

const UPLOAD_ENDPOINT: &str = "/v1/dl/files/upload";
const DEFAULT_FILENAME: &str = "document.pdf";
const ENGINE: &str = "pdf_ai_dl";
const DLA_MODE: &str = "ENABLED";
const OCR_MODE: &str = "FORCE";

/// Client for the Hancom studio API.
#[derive(Debug, Clone)]
pub struct HancomClient {
    base_url: String,
    http: reqwest::Client,
}

fn backend_error(message: String) -> Error {
    Error::Backend {
        backend: "hancom".to_string(),
        message,
    }
}

impl HancomClient {
    pub fn new(config: &HybridConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: config.effective_url().unwrap_or_else(|| HANCOM_DEFAULT_URL.to_string()),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn upload(&self, pdf: &[u8]) -> Result<String> {
        let file = Part::bytes(pdf.to_vec())
            .file_name(DEFAULT_FILENAME)
            .mime_str("application/pdf")?;
        let response = self
            .http
            .post(format!("{}{}", self.base_url, UPLOAD_ENDPOINT))
            .multipart(Form::new().part("file", file))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(backend_error(format!("upload failed with status {}: {}", status.as_u16(), body)));
        }
        parse_file_id(&body)
    }

    async fn visual_info(&self, file_id: &str) -> Result<Value> {
        let url = format!("{}/v1/dl/files/{}/visualinfo", self.base_url, file_id);
        let response = self
            .http
            .get(url)
            .query(&[("engine", ENGINE), ("dlaMode", DLA_MODE), ("ocrMode", OCR_MODE)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(backend_error(format!(
                "visualinfo failed with status {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete(&self, file_id: &str) {
        let url = format!("{}/v1/dl/files/{}", self.base_url, file_id);
        match self.http.delete(url).send().await {
            Ok(response) if response.status().is_success() => log::debug!("Deleted file {}", file_id),
            Ok(response) => log::warn!("Failed to delete file {}: status {}", file_id, response.status().as_u16()),
            Err(err) => log::warn!("Error deleting file {}: {}", file_id, err),
        }
    }

    async fn send(&self, request: &HybridRequest) -> Result<HybridResponse> {
        let file_id = self.upload(&request.pdf_bytes).await?;
        log::debug!("Uploaded file with ID {}", file_id);
        let info = self.visual_info(&file_id).await;
        self.delete(&file_id).await;
        Ok(HybridResponse::from_json(info?))
    }
}

/// `data.fileId` of an upload answer.
pub(crate) fn parse_file_id(body: &str) -> Result<String> {
    let root: Value = serde_json::from_str(body)?;
    let data = root
        .get("data")
        .ok_or_else(|| Error::InvalidResponse("upload response is missing 'data'".to_string()))?;
    data.get("fileId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidResponse("upload response is missing 'data.fileId'".to_string()))
}

impl HybridClient for HancomClient {
    fn name(&self) -> &str {
        "hancom"
    }

    fn convert_async<'a>(&'a self, request: &'a HybridRequest) -> BoxFuture<'a, Result<HybridResponse>> {
        self.send(request).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==== Upload Tests ====

    #[test]
    fn test_parse_file_id() {
        let body = r#"{"codeNum":0,"code":"file.upload.success","data":{"fileId":"abc-123"}}"#;
        assert_eq!(parse_file_id(body).unwrap(), "abc-123");
    }

    #[test]
    fn test_parse_file_id_missing() {
        assert!(matches!(parse_file_id(r#"{"codeNum":1}"#), Err(Error::InvalidResponse(_))));
        assert!(matches!(parse_file_id(r#"{"data":{"fileId":7}}"#), Err(Error::InvalidResponse(_))));
    }

    #[test]
    fn test_url_override() {
        let client = HancomClient::new(&HybridConfig::new("hancom").with_url("http://localhost:9000/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }
}

//! JSON log of triage decisions.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::triage::{TriageDecision, TriageResult, TriageSignals};
use crate::error::Result;

/// File name of the triage log inside the output directory.
pub const TRIAGE_LOG_FILENAME: &str = "triage.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageLog {
    pub document: String,
    pub hybrid: String,
    pub triage: Vec<TriageEntry>,
    pub summary: TriageSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageEntry {
    /// One-based page number
    pub page: u32,
    pub decision: TriageDecision,
    pub confidence: f64,
    pub signals: TriageSignals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageSummary {
    pub total_pages: usize,
    pub java_pages: usize,
    pub backend_pages: usize,
}

impl TriageLog {
    /// Build the log for `results`, sorted by page.
    pub fn new(document: impl Into<String>, hybrid: impl Into<String>, results: &[TriageResult]) -> Self {
        let mut triage: Vec<TriageEntry> = results
            .iter()
            .map(|r| TriageEntry {
                page: r.page + 1,
                decision: r.decision,
                confidence: r.confidence,
                signals: r.signals.clone(),
            })
            .collect();
        triage.sort_by_key(|e| e.page);
        let backend_pages = triage.iter().filter(|e| e.decision == TriageDecision::Backend).count();
        Self {
            document: document.into(),
            hybrid: hybrid.into(),
            summary: TriageSummary {
                total_pages: triage.len(),
                java_pages: triage.len() - backend_pages,
                backend_pages,
            },
            triage,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the log to `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Write `triage.json` into `dir`, creating the directory if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(TRIAGE_LOG_FILENAME);
        let file = fs::File::create(&path)?;
        self.write_to(std::io::BufWriter::new(file))?;
        log::info!("Triage log written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(page: u32, decision: TriageDecision) -> TriageResult {
        TriageResult {
            page,
            decision,
            confidence: 0.9,
            signals: TriageSignals::default(),
        }
    }

    // ==== Triage Log Tests ====

    #[test]
    fn test_pages_one_based_and_sorted() {
        let log = TriageLog::new(
            "report.pdf",
            "docling",
            &[result(2, TriageDecision::Backend), result(0, TriageDecision::Java)],
        );
        let pages: Vec<u32> = log.triage.iter().map(|e| e.page).collect();
        assert_eq!(pages, vec![1, 3]);
        assert_eq!(
            log.summary,
            TriageSummary {
                total_pages: 2,
                java_pages: 1,
                backend_pages: 1
            }
        );
    }

    #[test]
    fn test_json_field_names() {
        let log = TriageLog::new("a.pdf", "hancom", &[result(0, TriageDecision::Java)]);
        let value: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(value["triage"][0]["decision"], "JAVA");
        assert_eq!(value["triage"][0]["signals"]["lineChunkCount"], 0);
        assert_eq!(value["triage"][0]["signals"]["hasTableBorder"], false);
        assert_eq!(value["summary"]["totalPages"], 1);
        assert_eq!(value["hybrid"], "hancom");
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");
        let log = TriageLog::new("a.pdf", "docling", &[result(0, TriageDecision::Backend)]);
        let path = log.write_to_dir(&target).unwrap();
        assert_eq!(path.file_name().unwrap(), TRIAGE_LOG_FILENAME);
        let read: TriageLog = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(read, log);
    }
}

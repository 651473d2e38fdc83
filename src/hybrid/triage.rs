//! Per-page routing between the local pipeline and the backend.
//!
//! Triage looks only at the filtered primitives of a page and at whether the
//! page has a table border. Pages that look tabular go to the backend, which
//! recognises table structure better; plain text stays local.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{ContentPrimitive, Page, TextRun};
use crate::processors::cluster_table::has_suspicious_runs;

/// Where a page is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriageDecision {
    /// Local pipeline
    Java,
    /// External backend
    Backend,
}

/// Measurements a decision is based on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageSignals {
    pub line_chunk_count: usize,
    pub text_chunk_count: usize,
    pub line_to_text_ratio: f64,
    pub aligned_line_groups: usize,
    pub has_table_border: bool,
    pub has_suspicious_pattern: bool,
}

/// Decision for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    /// Zero-based page index
    pub page: u32,
    pub decision: TriageDecision,
    pub confidence: f64,
    pub signals: TriageSignals,
}

impl TriageResult {
    fn java(page: u32, confidence: f64, signals: TriageSignals) -> Self {
        Self {
            page,
            decision: TriageDecision::Java,
            confidence,
            signals,
        }
    }

    fn backend(page: u32, confidence: f64, signals: TriageSignals) -> Self {
        Self {
            page,
            decision: TriageDecision::Backend,
            confidence,
            signals,
        }
    }

    pub fn is_backend(&self) -> bool {
        self.decision == TriageDecision::Backend
    }
}

/// Triage tuning values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageThresholds {
    /// Line segments over all primitives above which a page is tabular
    pub line_ratio: f64,
    /// Aligned baseline groups at which a page is tabular
    pub aligned_line_groups: usize,
    /// Gap inside an aligned group, in multiples of the text height
    pub grid_gap_multiplier: f64,
    /// Same-baseline tolerance, as a fraction of the text height
    pub baseline_epsilon: f64,
    /// Same-baseline gap that makes a run pair suspicious, in multiples of
    /// the text height
    pub suspicious_gap_multiplier: f64,
}

impl Default for TriageThresholds {
    fn default() -> Self {
        Self {
            line_ratio: 0.3,
            aligned_line_groups: 3,
            grid_gap_multiplier: 3.0,
            baseline_epsilon: 0.1,
            suspicious_gap_multiplier: 3.0,
        }
    }
}

impl TriageThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.line_ratio) {
            return Err(Error::InvalidConfig(format!(
                "triage line ratio must be within [0, 1]: {}",
                self.line_ratio
            )));
        }
        if self.grid_gap_multiplier < 0.0 || self.baseline_epsilon < 0.0 || self.suspicious_gap_multiplier < 0.0 {
            return Err(Error::InvalidConfig(
                "triage multipliers must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Classify one page.
///
/// The first matching rule wins: a table border, a suspicious text pattern,
/// a high line ratio, then many aligned groups. Everything else stays local.
pub fn classify_page(page: &Page, has_table_border: bool, thresholds: &TriageThresholds) -> TriageResult {
    let signals = extract_signals(page, has_table_border, thresholds);
    let number = page.number;
    if signals.has_table_border {
        TriageResult::backend(number, 1.0, signals)
    } else if signals.has_suspicious_pattern {
        TriageResult::backend(number, 0.9, signals)
    } else if signals.line_to_text_ratio > thresholds.line_ratio {
        TriageResult::backend(number, 0.8, signals)
    } else if signals.aligned_line_groups >= thresholds.aligned_line_groups {
        TriageResult::backend(number, 0.7, signals)
    } else {
        TriageResult::java(number, 0.9, signals)
    }
}

/// Measure the triage signals of `page`.
pub fn extract_signals(page: &Page, has_table_border: bool, thresholds: &TriageThresholds) -> TriageSignals {
    let mut total = 0usize;
    let mut lines = 0usize;
    let mut runs: Vec<&TextRun> = Vec::new();
    for primitive in page.primitives() {
        total += 1;
        match primitive {
            ContentPrimitive::LineSegment(_) => lines += 1,
            ContentPrimitive::TextRun(run) => runs.push(run),
            _ => {}
        }
    }
    if total == 0 {
        return TriageSignals {
            has_table_border,
            ..TriageSignals::default()
        };
    }
    let text: Vec<&TextRun> = runs.iter().copied().filter(|r| !r.is_whitespace()).collect();
    TriageSignals {
        line_chunk_count: lines,
        text_chunk_count: runs.len(),
        line_to_text_ratio: lines as f64 / total as f64,
        aligned_line_groups: aligned_line_groups(&text, thresholds),
        has_table_border,
        has_suspicious_pattern: has_suspicious_runs(
            text.iter().copied(),
            thresholds.baseline_epsilon,
            thresholds.suspicious_gap_multiplier,
        ),
    }
}

fn average_height(a: &TextRun, b: &TextRun) -> f64 {
    (a.height() + b.height()) / 2.0
}

/// Number of baseline groups with an internal gap wider than the grid gap.
fn aligned_line_groups(runs: &[&TextRun], thresholds: &TriageThresholds) -> usize {
    let mut groups: Vec<(f64, Vec<&TextRun>)> = Vec::new();
    for &run in runs {
        let baseline = (run.baseline() * 10.0).round() / 10.0;
        let tolerance = run.height() * thresholds.baseline_epsilon;
        match groups.iter_mut().find(|(key, _)| (key - baseline).abs() < tolerance) {
            Some((_, group)) => group.push(run),
            None => groups.push((baseline, vec![run])),
        }
    }
    groups
        .into_iter()
        .filter(|(_, group)| group.len() >= 2)
        .filter(|(_, group)| {
            let mut group = group.clone();
            group.sort_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left));
            group.windows(2).any(|pair| {
                pair[1].bbox.left - pair[0].bbox.right
                    > average_height(pair[0], pair[1]) * thresholds.grid_gap_multiplier
            })
        })
        .count()
}

/// Classify every page; `has_border(page)` reports table border presence.
pub fn triage_pages(
    pages: &[Page],
    has_border: impl Fn(u32) -> bool,
    thresholds: &TriageThresholds,
) -> Vec<TriageResult> {
    let results: Vec<TriageResult> = pages
        .iter()
        .map(|page| classify_page(page, has_border(page.number), thresholds))
        .collect();
    let backend = results.iter().filter(|r| r.is_backend()).count();
    log::info!(
        "Triage: {} pages, {} local, {} backend",
        results.len(),
        results.len() - backend,
        backend
    );
    results
}

//! Hybrid document processing.
//!
//! Pages are triaged, then the local pipeline and one batched backend
//! request run concurrently: local pages on a bounded rayon pool inside
//! `spawn_blocking`, backend pages as a single future under a timeout. The
//! results are merged in page order and the document-wide passes run once
//! over the merged pages.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use rayon::prelude::*;

use super::client::{HybridClient, HybridRequest};
use super::config::HybridConfig;
use super::transform::{PageHeights, SchemaTransformer, TransformerRegistry};
use super::triage::{triage_pages, TriageDecision, TriageResult, TriageThresholds};
use super::triage_log::TriageLog;
use crate::context::{commit, PageScope, ProcessingContext};
use crate::error::{Error, Result};
use crate::model::{Document, DocumentInput, Page};
use crate::probability::{GeometricModel, ProbabilityModel};
use crate::processors::{content_filter, finalize, process_page, ProcessOptions};

/// Progress notifications of a hybrid run. Pages are zero-based.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingEvent {
    PageTriaged { page: u32, decision: TriageDecision },
    PageProcessed { page: u32 },
    BackendStarted { pages: usize },
    BackendFinished { pages: usize },
    FallbackEngaged { reason: String },
}

/// Result of a hybrid run.
#[derive(Debug, Clone)]
pub struct HybridOutput {
    pub document: Document,
    pub triage: Vec<TriageResult>,
    /// Pages whose content came from the backend
    pub backend_pages: Vec<u32>,
    /// Whether backend pages were processed locally after a backend failure
    pub fallback_engaged: bool,
}

/// Routes pages between the local pipeline and a backend.
pub struct HybridOrchestrator {
    config: HybridConfig,
    options: ProcessOptions,
    triage_thresholds: TriageThresholds,
    client: Arc<dyn HybridClient>,
    transformer: Arc<dyn SchemaTransformer>,
    model: Arc<dyn ProbabilityModel>,
    events: Option<Sender<ProcessingEvent>>,
    document_name: String,
}

impl HybridOrchestrator {
    /// Create an orchestrator for the configured backend.
    ///
    /// Fails when the configuration is invalid or no transformer knows the
    /// backend's schema.
    pub fn new(config: HybridConfig, client: Arc<dyn HybridClient>) -> Result<Self> {
        config.validate()?;
        let transformer = TransformerRegistry::with_defaults().require(&config.backend)?;
        Ok(Self {
            config,
            options: ProcessOptions::default(),
            triage_thresholds: TriageThresholds::default(),
            client,
            transformer,
            model: Arc::new(GeometricModel::default()),
            events: None,
            document_name: "document".to_string(),
        })
    }

    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_triage_thresholds(mut self, thresholds: TriageThresholds) -> Self {
        self.triage_thresholds = thresholds;
        self
    }

    pub fn with_model(mut self, model: Arc<dyn ProbabilityModel>) -> Self {
        self.model = model;
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn SchemaTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Stream progress events to `sender`.
    pub fn with_events(mut self, sender: Sender<ProcessingEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Name recorded in the triage log.
    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    fn emit(&self, event: ProcessingEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Process `input`, sending backend pages of `pdf_bytes` to the backend.
    pub async fn process(&self, input: DocumentInput, pdf_bytes: Arc<Vec<u8>>) -> Result<HybridOutput> {
        self.options.validate()?;
        self.triage_thresholds.validate()?;

        let (pages, borders) = input.into_parts();
        let selected = self.options.pages.resolve(pages.len() as u32)?;
        let mut pages: Vec<Page> = pages
            .into_iter()
            .filter(|p| selected.contains(&(p.number + 1)))
            .collect();
        for page in &mut pages {
            content_filter::filter_page(page, &self.options);
        }

        let mut ctx = ProcessingContext::with_model(self.options.thresholds.clone(), Arc::clone(&self.model));
        ctx.add_borders(borders);

        // ==== triage ====
        let triage = triage_pages(&pages, |p| ctx.has_borders(p), &self.triage_thresholds);
        for result in &triage {
            self.emit(ProcessingEvent::PageTriaged {
                page: result.page,
                decision: result.decision,
            });
        }
        if let Some(dir) = &self.config.output_dir {
            if let Err(e) = TriageLog::new(&self.document_name, &self.config.backend, &triage).write_to_dir(dir) {
                log::warn!("Failed to write triage log to {}: {}", dir.display(), e);
            }
        }

        let mut local = Vec::new();
        let mut remote = Vec::new();
        for (page, result) in pages.into_iter().zip(&triage) {
            if result.is_backend() {
                remote.push(page);
            } else {
                let scope = ctx.scope(page.number);
                local.push((page, scope));
            }
        }
        log::info!(
            "Hybrid processing via {}: {} local pages, {} backend pages",
            self.config.backend,
            local.len(),
            remote.len()
        );

        // ==== local and backend paths concurrently ====
        let local_task = {
            let options = self.options.clone();
            let events = self.events.clone();
            tokio::task::spawn_blocking(move || run_local(local, &options, events.as_ref()))
        };
        let (local_result, backend_result) = tokio::join!(local_task, self.run_backend(&pdf_bytes, &remote));
        let local_done = match local_result {
            Ok(result) => result?,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => return Err(Error::Other(format!("local processing task failed: {}", err))),
        };

        // ==== merge ====
        let mut merged: Vec<Page> = Vec::with_capacity(local_done.len() + remote.len());
        for (page, scope) in local_done {
            ctx.finish_scope(scope);
            merged.push(page);
        }
        let mut backend_pages = Vec::new();
        let mut fallback_engaged = false;
        match backend_result {
            Ok(mut transformed) => {
                for mut page in remote {
                    let index = page.number as usize;
                    page.slots = match transformed.get_mut(index) {
                        Some(result) => std::mem::take(&mut result.slots),
                        None => {
                            log::warn!("Backend returned no content for page {}", page.number + 1);
                            Vec::new()
                        }
                    };
                    commit(&ctx, &mut page.slots);
                    backend_pages.push(page.number);
                    merged.push(page);
                }
            }
            Err(err) => {
                if !self.config.fallback {
                    return Err(Error::BackendFailed(Box::new(err)));
                }
                log::warn!("Backend failed, processing {} pages locally: {}", remote.len(), err);
                self.emit(ProcessingEvent::FallbackEngaged {
                    reason: err.to_string(),
                });
                fallback_engaged = true;
                let fallback: Vec<(Page, PageScope)> = remote
                    .into_iter()
                    .map(|page| {
                        let scope = ctx.scope(page.number);
                        (page, scope)
                    })
                    .collect();
                let options = self.options.clone();
                let events = self.events.clone();
                let done = tokio::task::spawn_blocking(move || run_local(fallback, &options, events.as_ref()))
                    .await
                    .map_err(|err| match err.try_into_panic() {
                        Ok(panic) => std::panic::resume_unwind(panic),
                        Err(err) => Error::Other(format!("fallback task failed: {}", err)),
                    })??;
                for (page, scope) in done {
                    ctx.finish_scope(scope);
                    merged.push(page);
                }
            }
        }
        merged.sort_by_key(|p| p.number);

        // ==== document-wide passes ====
        finalize(&mut ctx, &mut merged);
        log::info!("Hybrid processing finished: {} pages", merged.len());
        Ok(HybridOutput {
            document: Document::from_pages(merged),
            triage,
            backend_pages,
            fallback_engaged,
        })
    }

    /// Blocking variant of [`process`](Self::process).
    ///
    /// Must not be called from inside an async runtime.
    pub fn process_blocking(&self, input: DocumentInput, pdf_bytes: Arc<Vec<u8>>) -> Result<HybridOutput> {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
        runtime.block_on(self.process(input, pdf_bytes))
    }

    /// One batched request for `pages`, transformed into pages indexed by
    /// page number.
    async fn run_backend(&self, pdf_bytes: &Arc<Vec<u8>>, pages: &[Page]) -> Result<Vec<Page>> {
        if pages.is_empty() {
            return Ok(Vec::new());
        }
        if !self.client.is_available().await {
            return Err(Error::BackendUnavailable(self.client.name().to_string()));
        }
        let numbers: BTreeSet<u32> = pages.iter().map(|p| p.number + 1).collect();
        let heights: PageHeights = pages.iter().map(|p| (p.number + 1, p.height)).collect();
        let request = HybridRequest::for_pages(Arc::clone(pdf_bytes), numbers)
            .with_ocr(self.config.do_ocr)
            .with_table_structure(self.config.do_table_structure);

        self.emit(ProcessingEvent::BackendStarted { pages: pages.len() });
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let response = tokio::time::timeout(timeout, self.client.convert_async(&request))
            .await
            .map_err(|_| Error::BackendTimeout(self.config.timeout_ms))??;
        let transformed = self.transformer.transform(&response, &heights)?;
        self.emit(ProcessingEvent::BackendFinished { pages: pages.len() });
        Ok(transformed)
    }
}

/// Run the per-page pipeline over `pages` on a pool sized to the work.
///
/// A page whose pipeline returns an error keeps its filtered primitives.
fn run_local(
    mut pages: Vec<(Page, PageScope)>,
    options: &ProcessOptions,
    events: Option<&Sender<ProcessingEvent>>,
) -> Result<Vec<(Page, PageScope)>> {
    if pages.is_empty() {
        return Ok(pages);
    }
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let threads = if options.parallel { pages.len().min(cores) } else { 1 };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Other(format!("failed to build worker pool: {}", e)))?;
    pool.install(|| {
        pages.par_iter_mut().for_each(|(page, scope)| {
            if let Err(err) = process_page(scope, page, options) {
                log::warn!("Page {}: processing failed, keeping primitives: {}", page.number + 1, err);
            }
            if let Some(sender) = events {
                let _ = sender.send(ProcessingEvent::PageProcessed { page: page.number });
            }
        });
    });
    Ok(pages)
}

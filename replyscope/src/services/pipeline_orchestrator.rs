//! Pipeline orchestrator
//!
//! Runs one reply analysis end to end:
//! FETCHING → PERSISTING → NORMALIZING → RENDERING → DONE
//!
//! Each stage starts only after the previous one has committed its files.
//! Any stage failure moves the run to FAILED, is reported once through the
//! observer, and ends the run. Nothing is retried.

use crate::cloud::WordCloud;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{image_path_for, PipelineRun, RunReport, RunRequest};
use crate::services::reply_fetcher::ReplyFetcher;
use crate::services::{tabular_store, text_normalizer};
use replyscope_common::config::TomlConfig;
use replyscope_common::events::{PipelineObserver, RunState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

const STATUS_DISPATCHED: &str = "Task dispatched";
const STATUS_RENDERING: &str = "Generating word cloud...";
const STATUS_DONE: &str = "Task complete! \u{2705}";
const STATUS_FAILED: &str = "Task failed \u{274C}";

/// Clears the single-run flag when a run ends, however it ends
struct ActiveRunGuard<'a>(&'a AtomicBool);

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sequences fetch → persist → normalize → render
pub struct PipelineOrchestrator {
    fetcher: ReplyFetcher,
    cloud: Arc<WordCloud>,
    page_size: u32,
    observer: Arc<dyn PipelineObserver>,
    active: AtomicBool,
}

impl PipelineOrchestrator {
    /// Build an orchestrator from validated configuration
    pub fn new(config: &TomlConfig, observer: Arc<dyn PipelineObserver>) -> PipelineResult<Self> {
        config.validate()?;
        let fetcher = ReplyFetcher::new(&config.api)?;
        let cloud = WordCloud::new(config.cloud.clone())?;
        Ok(Self::from_parts(fetcher, cloud, config.api.page_size, observer))
    }

    pub fn from_parts(
        fetcher: ReplyFetcher,
        cloud: WordCloud,
        page_size: u32,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            fetcher,
            cloud: Arc::new(cloud),
            page_size,
            observer,
            active: AtomicBool::new(false),
        }
    }

    /// Whether a run is currently in flight
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start `request` on a dedicated worker task
    pub fn spawn(self: &Arc<Self>, request: RunRequest) -> JoinHandle<PipelineResult<RunReport>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.run(request).await })
    }

    /// Execute one complete run
    ///
    /// Returns [`PipelineError::AlreadyRunning`] without touching anything if
    /// another run of this orchestrator is in flight.
    pub async fn run(&self, request: RunRequest) -> PipelineResult<RunReport> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(uid = %request.identifier, "Rejected run: another run is active");
            return Err(PipelineError::AlreadyRunning);
        }
        let _guard = ActiveRunGuard(&self.active);

        let mut run = PipelineRun::new(request);
        let run_id = run.run_id;

        tracing::info!(
            run_id = %run_id,
            uid = %run.request.identifier,
            output_dir = %run.request.output_dir.display(),
            "Starting pipeline run"
        );
        self.observer.log(run_id, "Connected to server, starting query...");
        self.observer.progress(run_id, STATUS_DISPATCHED);
        self.advance(&mut run, RunState::Fetching);

        match self.execute(&mut run).await {
            Ok(term_count) => {
                self.advance(&mut run, RunState::Done);
                self.observer.progress(run_id, STATUS_DONE);
                self.observer.log(run_id, "Task complete!");

                let report = RunReport {
                    run_id,
                    record_count: run.record_count,
                    table_path: run.request.table_path(),
                    image_path: run.request.image_path(),
                    term_count,
                    elapsed_seconds: run.elapsed_seconds(),
                };
                tracing::info!(
                    run_id = %run_id,
                    records = report.record_count,
                    terms = report.term_count,
                    elapsed_seconds = report.elapsed_seconds,
                    "Pipeline run completed"
                );
                Ok(report)
            }
            Err(e) => {
                let failed_in = run.state;
                if let Some(transition) = run.fail(e.to_string()) {
                    self.observer
                        .state_changed(run_id, transition.old_state, transition.new_state);
                }
                tracing::error!(run_id = %run_id, stage = %failed_in, error = %e, "Pipeline run failed");

                self.observer.progress(run_id, STATUS_FAILED);
                if e.is_fetch_failure() {
                    self.observer.log(run_id, "Query failed!");
                }
                self.observer.log(run_id, &format!("Error: {e}"));
                Err(e)
            }
        }
    }

    /// Stages after the run entered FETCHING; returns the drawn term count
    async fn execute(&self, run: &mut PipelineRun) -> PipelineResult<usize> {
        let run_id = run.run_id;
        let identifier = run.request.identifier.clone();

        // FETCHING
        let records = self
            .fetcher
            .fetch_all(&identifier, self.page_size, |message| {
                self.observer.progress(run_id, message)
            })
            .await?;
        if records.is_empty() {
            return Err(PipelineError::NoRecords(identifier));
        }
        run.record_count = records.len();
        self.observer
            .log(run_id, &format!("Collected {} replies", records.len()));

        // PERSISTING
        self.advance(run, RunState::Persisting);
        let table_path = run.request.table_path();
        let write_path = table_path.clone();
        tokio::task::spawn_blocking(move || tabular_store::write_records(&write_path, &records))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))??;
        self.observer.log(
            run_id,
            &format!("Reply data saved to {}", table_path.display()),
        );

        // NORMALIZING
        self.advance(run, RunState::Normalizing);
        self.observer.log(run_id, "Analyzing...");
        let read_path = table_path.clone();
        let corpus = tokio::task::spawn_blocking(move || {
            tabular_store::read_messages(&read_path).map(text_normalizer::normalize_messages)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))??;
        tracing::debug!(run_id = %run_id, corpus_bytes = corpus.len(), "Corpus normalized");

        // RENDERING
        self.advance(run, RunState::Rendering);
        self.observer.progress(run_id, STATUS_RENDERING);
        self.observer.log(run_id, STATUS_RENDERING);
        let image_path = image_path_for(&table_path);
        let cloud = Arc::clone(&self.cloud);
        let render_path = image_path.clone();
        let rendered = tokio::task::spawn_blocking(move || cloud.render(&corpus, &render_path))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))??;
        self.observer.log(
            run_id,
            &format!("Word cloud saved to {}", image_path.display()),
        );

        Ok(rendered.terms.len())
    }

    fn advance(&self, run: &mut PipelineRun, next: RunState) {
        if let Some(transition) = run.transition_to(next) {
            tracing::debug!(
                run_id = %run.run_id,
                from = %transition.old_state,
                to = %transition.new_state,
                "Run state changed"
            );
            self.observer
                .state_changed(run.run_id, transition.old_state, transition.new_state);
        }
    }
}

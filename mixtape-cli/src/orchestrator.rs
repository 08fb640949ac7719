//! End-to-end pipeline orchestration
//!
//! Owns the composed services (store, analysis queue, planner, renderer)
//! and drives one request through them: ensure every library track has a
//! fresh analysis, plan the set, render it to WAV. Cancellation is
//! cooperative at stage boundaries; a render in progress runs to
//! completion.

use crate::library::scan_audio_files;
use anyhow::{bail, Context};
use mixtape_analysis::{
    AnalysisKind, AnalysisQueue, Enqueued, LibraryStore, TaskStatus, TrackAnalyzer,
};
use mixtape_common::config::Config;
use mixtape_common::events::EventBus;
use mixtape_common::set::DJSet;
use mixtape_planner::{HttpOracle, OracleClient, PlanRequest, SetPlanner};
use mixtape_render::SetRenderer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Priority used for freshness analyses kicked off by a set request
const REFRESH_PRIORITY: i32 = 5;

/// Poll interval while waiting for queued analyses
const ANALYSIS_POLL: Duration = Duration::from_millis(200);

/// Result of one end-to-end request
#[derive(Debug)]
pub struct GeneratedSet {
    pub dj_set: DJSet,
    pub output_path: PathBuf,
}

/// The composition root owning every pipeline service.
pub struct Orchestrator<O: OracleClient> {
    config: Config,
    store: Arc<LibraryStore>,
    analyzer: TrackAnalyzer,
    queue: AnalysisQueue,
    planner: SetPlanner<O>,
    event_bus: EventBus,
}

impl Orchestrator<HttpOracle> {
    /// Build the full production pipeline from configuration.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let oracle = HttpOracle::new(
            config.oracle.endpoint.clone(),
            config.oracle.api_key.clone(),
            Duration::from_secs(config.oracle.timeout_secs),
            config.oracle.max_retries,
        )
        .context("failed to build oracle client")?;
        Self::with_oracle(config, oracle).await
    }
}

impl<O: OracleClient> Orchestrator<O> {
    /// Build the pipeline with a caller-supplied oracle.
    pub async fn with_oracle(config: Config, oracle: O) -> anyhow::Result<Self> {
        let event_bus = EventBus::new(256);
        let store = Arc::new(
            LibraryStore::open(&config.database_path)
                .await
                .context("failed to open library store")?,
        );
        let analyzer = TrackAnalyzer::new();
        let queue = AnalysisQueue::new(
            store.clone(),
            analyzer.clone(),
            config.analysis.workers,
            Duration::from_secs(config.analysis.shutdown_grace_secs),
            event_bus.clone(),
        );
        let planner = SetPlanner::new(oracle, store.clone(), event_bus.clone());

        Ok(Self {
            config,
            store,
            analyzer,
            queue,
            planner,
            event_bus,
        })
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn store(&self) -> &Arc<LibraryStore> {
        &self.store
    }

    /// Scan the library roots and re-analyze everything missing or stale.
    ///
    /// Returns once every enqueued task reaches a terminal state.
    pub async fn ensure_library_analyzed(
        &self,
        cancel: &CancellationToken,
    ) -> anyhow::Result<usize> {
        let files = scan_audio_files(&self.config.library_roots);
        info!(files = files.len(), "Library scanned");

        self.queue.start().await;

        let mut waiting = Vec::new();
        for file in &files {
            let filepath = file.display().to_string();
            let stored = self.store.get(&filepath).await.ok().flatten();
            if self.analyzer.needs_analysis(file, stored.as_ref()) {
                if let Enqueued::Queued(task_id) =
                    self.queue
                        .enqueue(&filepath, REFRESH_PRIORITY, None, AnalysisKind::Full)
                {
                    waiting.push(task_id);
                }
            }
        }
        info!(queued = waiting.len(), "Freshness analyses queued");

        // Candidate selection must not start until these are done
        let mut completed = 0usize;
        while !waiting.is_empty() {
            if cancel.is_cancelled() {
                bail!("cancelled while waiting for analyses");
            }
            waiting.retain(|&task_id| match self.queue.status(task_id) {
                Some(task) => match task.status {
                    TaskStatus::Completed => {
                        completed += 1;
                        false
                    }
                    TaskStatus::Failed | TaskStatus::Cancelled => {
                        warn!(filepath = %task.filepath, error = ?task.error, "Analysis did not complete");
                        false
                    }
                    TaskStatus::Pending | TaskStatus::Processing => true,
                },
                None => false,
            });
            if !waiting.is_empty() {
                tokio::time::sleep(ANALYSIS_POLL).await;
            }
        }

        Ok(completed)
    }

    /// Run one full request: analyze → plan → render.
    pub async fn generate_set(
        &self,
        request: &PlanRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<GeneratedSet> {
        self.ensure_library_analyzed(cancel).await?;

        let dj_set = self
            .planner
            .plan_cancellable(request, cancel)
            .await
            .context("planning failed")?;

        // Last cancellation point; the render itself is not interruptible
        if cancel.is_cancelled() {
            bail!("cancelled before rendering");
        }

        let output_path = self.output_path(dj_set.id)?;
        info!(set_id = %dj_set.id, path = %output_path.display(), "Rendering set");

        let render_set = dj_set.clone();
        let render_path = output_path.clone();
        let render_bus = self.event_bus.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            SetRenderer::with_event_bus(render_bus).render_to_wav(&render_set, &render_path)
        })
        .await
        .context("render task panicked")?
        .context("rendering failed")?;

        if !rendered.skipped_tracks.is_empty() {
            warn!(
                skipped = ?rendered.skipped_tracks,
                "Some tracks were skipped during rendering"
            );
        }

        Ok(GeneratedSet {
            dj_set,
            output_path,
        })
    }

    /// Cooperative shutdown of background services.
    pub async fn shutdown(&self) {
        self.queue.stop().await;
    }

    fn output_path(&self, set_id: Uuid) -> anyhow::Result<PathBuf> {
        let dir = self.config.resolve_output_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create output dir {}", dir.display()))?;
        let unix_ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(dir.join(format!("djset_{set_id}_{unix_ts}.wav")))
    }
}

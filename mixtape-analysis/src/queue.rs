//! Background analysis queue
//!
//! Schedules track analyses with bounded parallelism and per-filepath
//! deduplication. Tasks drain from a priority min-heap keyed on
//! `(priority, enqueue ordinal)`: lower priority numbers run first, ties
//! run FIFO. A fixed pool of workers polls the heap with a timeout so
//! `stop()` is observed within one interval; the CPU-bound analysis itself
//! runs on the blocking thread pool.

use crate::analyzer::TrackAnalyzer;
use crate::store::LibraryStore;
use chrono::{DateTime, Utc};
use mixtape_common::events::{EventBus, PipelineEvent};
use mixtape_common::set::DeckId;
use mixtape_common::track::Track;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// How long an idle worker waits before re-checking the running flag
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Analysis depth requested for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Full,
    Realtime,
}

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// One scheduled analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub task_id: Uuid,
    pub filepath: String,
    /// Lower numbers run first
    pub priority: i32,
    pub deck_hint: Option<DeckId>,
    pub kind: AnalysisKind,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Outcome of an enqueue call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// A task was queued (or an identical one was already pending)
    Queued(Uuid),
    /// The cache already holds a fresh result; nothing was queued
    Cached,
}

impl Enqueued {
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            Enqueued::Queued(id) => Some(*id),
            Enqueued::Cached => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeapEntry {
    priority: i32,
    ordinal: u64,
    task_id: Uuid,
    filepath: String,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority, self.ordinal).cmp(&(other.priority, other.ordinal))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    next_ordinal: u64,
    /// Filepaths currently queued (not yet claimed), for deduplication
    pending: HashMap<String, Uuid>,
}

struct Inner {
    state: Mutex<QueueState>,
    notify: Notify,
    tasks: RwLock<HashMap<Uuid, AnalysisTask>>,
    cache: RwLock<HashMap<String, Arc<Track>>>,
    running: AtomicBool,
    analyzer: TrackAnalyzer,
    store: Arc<LibraryStore>,
    event_bus: EventBus,
}

/// The background analysis queue.
pub struct AnalysisQueue {
    inner: Arc<Inner>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    shutdown_grace: Duration,
}

impl AnalysisQueue {
    pub fn new(
        store: Arc<LibraryStore>,
        analyzer: TrackAnalyzer,
        worker_count: usize,
        shutdown_grace: Duration,
        event_bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                tasks: RwLock::new(HashMap::new()),
                cache: RwLock::new(HashMap::new()),
                running: AtomicBool::new(false),
                analyzer,
                store,
                event_bus,
            }),
            workers: tokio::sync::Mutex::new(Vec::new()),
            worker_count: worker_count.max(1),
            shutdown_grace,
        }
    }

    /// Queue a filepath for analysis.
    ///
    /// Returns [`Enqueued::Cached`] when the in-memory cache already holds
    /// a result for this path; an already-pending path returns its
    /// existing task id instead of queuing a duplicate.
    pub fn enqueue(
        &self,
        filepath: &str,
        priority: i32,
        deck_hint: Option<DeckId>,
        kind: AnalysisKind,
    ) -> Enqueued {
        if self.inner.cache.read().unwrap().contains_key(filepath) {
            return Enqueued::Cached;
        }

        let mut state = self.inner.state.lock().unwrap();
        if let Some(&existing) = state.pending.get(filepath) {
            return Enqueued::Queued(existing);
        }

        let task = AnalysisTask {
            task_id: Uuid::new_v4(),
            filepath: filepath.to_string(),
            priority,
            deck_hint,
            kind,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        };

        let ordinal = state.next_ordinal;
        state.next_ordinal += 1;
        state.heap.push(Reverse(HeapEntry {
            priority,
            ordinal,
            task_id: task.task_id,
            filepath: task.filepath.clone(),
        }));
        state.pending.insert(task.filepath.clone(), task.task_id);
        drop(state);

        let task_id = task.task_id;
        self.inner.tasks.write().unwrap().insert(task_id, task);
        self.inner.notify.notify_one();
        Enqueued::Queued(task_id)
    }

    /// Snapshot of a task's current state.
    pub fn status(&self, task_id: Uuid) -> Option<AnalysisTask> {
        self.inner.tasks.read().unwrap().get(&task_id).cloned()
    }

    /// Cache-then-store lookup for an analyzed record.
    pub async fn get_cached_analysis(&self, filepath: &str) -> Option<Arc<Track>> {
        if let Some(track) = self.inner.cache.read().unwrap().get(filepath) {
            return Some(track.clone());
        }
        match self.inner.store.get(filepath).await {
            Ok(Some(track)) => {
                let track = Arc::new(track);
                self.inner
                    .cache
                    .write()
                    .unwrap()
                    .insert(filepath.to_string(), track.clone());
                Some(track)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(filepath, error = %e, "Store lookup failed");
                None
            }
        }
    }

    /// Start the worker pool. Idempotent.
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut workers = self.workers.lock().await;
        for idx in 0..self.worker_count {
            let inner = self.inner.clone();
            workers.push(tokio::spawn(worker_loop(inner, idx)));
        }
        info!(workers = self.worker_count, "Analysis queue started");
    }

    /// Stop the worker pool. Idempotent.
    ///
    /// Workers observe the flag within one poll interval; in-flight
    /// analyses run to completion. Still-queued tasks are discarded as
    /// cancelled. Waits up to the shutdown grace period per worker, then
    /// logs and proceeds.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.notify.notify_waiters();

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if tokio::time::timeout(self.shutdown_grace, handle)
                .await
                .is_err()
            {
                warn!("Analysis worker did not stop within grace period");
            }
        }

        // Discard whatever never got claimed
        let drained: Vec<HeapEntry> = {
            let mut state = self.inner.state.lock().unwrap();
            state.pending.clear();
            state.heap.drain().map(|Reverse(entry)| entry).collect()
        };
        if !drained.is_empty() {
            let mut tasks = self.inner.tasks.write().unwrap();
            for entry in &drained {
                if let Some(task) = tasks.get_mut(&entry.task_id) {
                    task.status = TaskStatus::Cancelled;
                    task.completed_at = Some(Utc::now());
                }
            }
            info!(cancelled = drained.len(), "Discarded pending analyses");
        }
        info!("Analysis queue stopped");
    }
}

async fn worker_loop(inner: Arc<Inner>, worker_idx: usize) {
    info!(worker = worker_idx, "Analysis worker started");

    while inner.running.load(Ordering::SeqCst) {
        let entry = {
            let mut state = inner.state.lock().unwrap();
            let entry = state.heap.pop().map(|Reverse(entry)| entry);
            if let Some(claimed) = &entry {
                state.pending.remove(&claimed.filepath);
            }
            entry
        };

        match entry {
            Some(entry) => process_task(&inner, entry, worker_idx).await,
            None => {
                // Timeout keeps shutdown cooperative even with no traffic
                let _ = tokio::time::timeout(POLL_INTERVAL, inner.notify.notified()).await;
            }
        }
    }

    info!(worker = worker_idx, "Analysis worker stopped");
}

async fn process_task(inner: &Arc<Inner>, entry: HeapEntry, worker_idx: usize) {
    {
        let mut tasks = inner.tasks.write().unwrap();
        if let Some(task) = tasks.get_mut(&entry.task_id) {
            task.status = TaskStatus::Processing;
            task.started_at = Some(Utc::now());
        }
    }
    inner.event_bus.emit(PipelineEvent::AnalysisStarted {
        task_id: entry.task_id,
        filepath: entry.filepath.clone(),
        timestamp: Utc::now(),
    });
    info!(worker = worker_idx, filepath = %entry.filepath, "Analyzing");

    // CPU-bound work moves off the async runtime
    let analyzer = inner.analyzer.clone();
    let filepath = entry.filepath.clone();
    let analysis = tokio::task::spawn_blocking(move || analyzer.analyze(Path::new(&filepath)))
        .await
        .map_err(|e| format!("analysis task panicked: {e}"));

    let outcome = match analysis {
        Ok(Ok(track)) => match inner.store.upsert(&track).await {
            Ok(()) => {
                inner
                    .cache
                    .write()
                    .unwrap()
                    .insert(entry.filepath.clone(), Arc::new(track));
                Ok(())
            }
            Err(e) => Err(format!("failed to store analysis: {e}")),
        },
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(e),
    };

    let mut tasks = inner.tasks.write().unwrap();
    let task = tasks.get_mut(&entry.task_id);
    match outcome {
        Ok(()) => {
            if let Some(task) = task {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(Utc::now());
            }
            drop(tasks);
            inner.event_bus.emit(PipelineEvent::AnalysisCompleted {
                task_id: entry.task_id,
                filepath: entry.filepath.clone(),
                timestamp: Utc::now(),
            });
            info!(worker = worker_idx, filepath = %entry.filepath, "Analysis completed");
        }
        Err(error) => {
            if let Some(task) = task {
                task.status = TaskStatus::Failed;
                task.completed_at = Some(Utc::now());
                task.error = Some(error.clone());
            }
            drop(tasks);
            inner.event_bus.emit(PipelineEvent::AnalysisFailed {
                task_id: entry.task_id,
                filepath: entry.filepath.clone(),
                error: error.clone(),
                timestamp: Utc::now(),
            });
            warn!(worker = worker_idx, filepath = %entry.filepath, error, "Analysis failed");
        }
    }
}

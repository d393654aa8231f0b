//! Task orchestrator implementation.
//!
//! Tasks run strictly one at a time in FIFO order. Every record change is a
//! whole-record replace under the queue lock followed by a broadcast.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, oneshot, watch, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capabilities::{CapabilityProbe, CapabilityProvider, EncoderSelection};
use crate::command::{output_file_name, synthesize, CommandError, FfmpegCommand};
use crate::manifest::{remove_manifest, write_concat_manifest};
use crate::process::{ProcessError, ProcessExit, ProcessSpawner, RunningProcess};
use crate::progress::ProgressTracker;
use crate::registry::FileRegistry;
use crate::request::{Operation, ProcessingRequest};

use super::config::{EngineAvailability, OrchestratorConfig};
use super::types::{
    EngineErrorCode, EnqueueError, OrchestratorError, QueueStatus, TaskEvent, TaskRecord,
    TaskStatus,
};

struct ActiveTask {
    id: String,
    /// Asks the runner to stop; taken by the first canceller.
    cancel_tx: Option<oneshot::Sender<()>>,
    /// Flips to `true` once the run has settled.
    settled: watch::Sender<bool>,
}

impl ActiveTask {
    /// Requests a stop, if nobody has yet, and returns a settle waiter.
    fn request_stop(&mut self) -> watch::Receiver<bool> {
        if let Some(tx) = self.cancel_tx.take() {
            if tx.send(()).is_err() {
                debug!("Runner for task {} already gone", self.id);
            }
        }
        self.settled.subscribe()
    }
}

#[derive(Default)]
struct QueueState {
    /// All records in creation order.
    tasks: Vec<TaskRecord>,
    /// Ids of pending tasks, oldest first.
    queue: VecDeque<String>,
    running: Option<ActiveTask>,
    shutdown: bool,
}

impl QueueState {
    fn find(&self, id: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut TaskRecord> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    fn is_running(&self, id: &str) -> bool {
        self.running.as_ref().is_some_and(|r| r.id == id)
    }
}

/// Everything a runner needs once the task has been prepared.
struct PreparedRun {
    command: FfmpegCommand,
    output_path: PathBuf,
    manifest: Option<PathBuf>,
}

impl PreparedRun {
    async fn discard_manifest(&self) {
        if let Some(manifest) = &self.manifest {
            remove_manifest(manifest).await;
        }
    }
}

/// Why a run ended.
enum RunEnd {
    Exited(ProcessExit),
    WaitFailed(ProcessError),
    Cancelled,
    TimedOut,
}

struct Inner {
    config: OrchestratorConfig,
    availability: EngineAvailability,
    probe: CapabilityProbe,
    spawner: Arc<dyn ProcessSpawner>,
    registry: Arc<dyn FileRegistry>,
    state: RwLock<QueueState>,
    events: broadcast::Sender<TaskEvent>,
}

/// Serial media task queue.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct TaskOrchestrator {
    inner: Arc<Inner>,
}

impl TaskOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        availability: EngineAvailability,
        capabilities: Arc<dyn CapabilityProvider>,
        spawner: Arc<dyn ProcessSpawner>,
        registry: Arc<dyn FileRegistry>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        Self {
            inner: Arc::new(Inner {
                config,
                availability,
                probe: CapabilityProbe::new(capabilities),
                spawner,
                registry,
                state: RwLock::new(QueueState::default()),
                events,
            }),
        }
    }

    /// Validates and queues a request, returning the new task id.
    ///
    /// Runs immediately when the queue is idle; never waits for the encoder.
    pub async fn enqueue(&self, request: ProcessingRequest) -> Result<String, EnqueueError> {
        request.validate()?;

        if !self.inner.availability.enabled {
            let reason = self.inner.availability.refusal();
            warn!("Refusing {} request: {}", request.operation.name(), reason);
            return Err(EnqueueError::EngineUnavailable(reason));
        }

        if let Some(codec) = request.operation.requested_codec(request.profile) {
            if self.inner.probe.resolve(codec).await.is_none() {
                let reason = format!(
                    "no {} encoder available on {}",
                    codec,
                    self.inner.probe.platform()
                );
                warn!("Refusing {} request: {}", request.operation.name(), reason);
                return Err(EnqueueError::EngineUnavailable(reason));
            }
        }

        let id = Uuid::new_v4().to_string();
        let record = TaskRecord::new(id.clone(), request);

        let mut state = self.inner.state.write().await;
        if state.shutdown {
            return Err(EnqueueError::EngineUnavailable(
                "media engine is shutting down".to_string(),
            ));
        }

        info!(
            "Enqueued task {} ({} of {})",
            id,
            record.request.operation.name(),
            record.request.source_filename
        );
        self.inner.publish(TaskEvent::Updated(record.clone()));
        state.tasks.push(record);
        state.queue.push_back(id.clone());
        self.inner.schedule(&mut state);

        Ok(id)
    }

    /// Stops a running task; it settles as failed with code `cancelled`.
    ///
    /// Returns after the task has settled, also for concurrent callers. A task
    /// that finishes on its own while the request is in flight keeps its own
    /// outcome.
    pub async fn cancel_task(&self, id: &str) -> Result<(), OrchestratorError> {
        let mut settled = {
            let mut state = self.inner.state.write().await;
            let status = state
                .find(id)
                .map(|t| t.status)
                .ok_or_else(|| OrchestratorError::TaskNotFound(id.to_string()))?;
            if status != TaskStatus::Running {
                return Err(OrchestratorError::invalid_state("running", status));
            }

            match state.running.as_mut().filter(|r| r.id == id) {
                Some(active) => active.request_stop(),
                None => return Err(OrchestratorError::invalid_state("running", status)),
            }
        };

        info!("Cancelling task {}", id);
        // A dropped sender also means the run is over.
        let _ = settled.wait_for(|done| *done).await;
        Ok(())
    }

    /// Puts a failed task back at the end of the queue.
    pub async fn retry_task(&self, id: &str) -> Result<(), OrchestratorError> {
        let mut state = self.inner.state.write().await;
        let config = &self.inner.config;

        let record = state
            .find_mut(id)
            .ok_or_else(|| OrchestratorError::TaskNotFound(id.to_string()))?;
        if record.status != TaskStatus::Failed {
            return Err(OrchestratorError::invalid_state("failed", record.status));
        }

        if let Some(max) = config.max_retries {
            if record.retries >= max {
                return Err(OrchestratorError::RetryLimitReached {
                    id: id.to_string(),
                    max,
                });
            }
        }

        if let Some(finished_at) = record.finished_at {
            let elapsed = (Utc::now() - finished_at).to_std().unwrap_or_default();
            if elapsed < config.retry_cooldown {
                return Err(OrchestratorError::RetryTooSoon {
                    id: id.to_string(),
                    remaining_ms: (config.retry_cooldown - elapsed).as_millis() as u64,
                });
            }
        }

        record.reset_for_retry();
        info!("Retrying task {} (attempt {})", id, record.retries + 1);
        let snapshot = record.clone();

        self.inner.publish(TaskEvent::Updated(snapshot));
        state.queue.push_back(id.to_string());
        self.inner.schedule(&mut state);
        Ok(())
    }

    /// Deletes a task that is not running.
    pub async fn remove_task(&self, id: &str) -> Result<(), OrchestratorError> {
        let mut state = self.inner.state.write().await;
        let status = state
            .find(id)
            .map(|t| t.status)
            .ok_or_else(|| OrchestratorError::TaskNotFound(id.to_string()))?;
        if status == TaskStatus::Running {
            return Err(OrchestratorError::invalid_state(
                "pending, completed or failed",
                status,
            ));
        }

        state.tasks.retain(|t| t.id != id);
        state.queue.retain(|queued| queued != id);
        debug!("Removed task {}", id);
        self.inner.publish(TaskEvent::Removed { id: id.to_string() });
        Ok(())
    }

    /// Deletes every completed or failed task; returns how many were removed.
    pub async fn clear_finished(&self) -> usize {
        let mut state = self.inner.state.write().await;
        let (finished, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.tasks)
            .into_iter()
            .partition(|t| t.status.is_terminal());
        state.tasks = kept;

        for task in &finished {
            self.inner.publish(TaskEvent::Removed {
                id: task.id.clone(),
            });
        }
        if !finished.is_empty() {
            info!("Cleared {} finished tasks", finished.len());
        }
        finished.len()
    }

    /// Snapshot of all tasks in creation order.
    pub async fn tasks(&self) -> Vec<TaskRecord> {
        self.inner.state.read().await.tasks.clone()
    }

    pub async fn task(&self, id: &str) -> Option<TaskRecord> {
        self.inner.state.read().await.find(id).cloned()
    }

    /// Receives every record replacement and removal from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    pub async fn status(&self) -> QueueStatus {
        let state = self.inner.state.read().await;
        let count = |status: TaskStatus| state.tasks.iter().filter(|t| t.status == status).count();

        QueueStatus {
            accepting: self.inner.availability.enabled && !state.shutdown,
            pending_count: count(TaskStatus::Pending),
            running_count: count(TaskStatus::Running),
            completed_count: count(TaskStatus::Completed),
            failed_count: count(TaskStatus::Failed),
            current_task: state.running.as_ref().map(|r| r.id.clone()),
        }
    }

    /// Stops scheduling and cancels the running task. Pending tasks stay pending.
    pub async fn shutdown(&self) {
        let settled = {
            let mut state = self.inner.state.write().await;
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            info!("Shutting down media task orchestrator");

            state.running.as_mut().map(ActiveTask::request_stop)
        };

        if let Some(mut settled) = settled {
            let _ = settled.wait_for(|done| *done).await;
        }
    }
}

impl Inner {
    fn publish(&self, event: TaskEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Replaces a record in place and publishes the result.
    fn update<F>(&self, state: &mut QueueState, id: &str, f: F) -> Option<TaskRecord>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let record = state.find_mut(id)?;
        f(record);
        let snapshot = record.clone();
        self.publish(TaskEvent::Updated(snapshot.clone()));
        Some(snapshot)
    }

    /// Promotes the oldest pending task when nothing is running.
    fn schedule(self: &Arc<Self>, state: &mut QueueState) {
        if state.shutdown || state.running.is_some() {
            return;
        }

        while let Some(id) = state.queue.pop_front() {
            let pending = state
                .find(&id)
                .is_some_and(|t| t.status == TaskStatus::Pending);
            if !pending {
                continue;
            }

            let (cancel_tx, cancel_rx) = oneshot::channel();
            let (settled, _) = watch::channel(false);
            state.running = Some(ActiveTask {
                id: id.clone(),
                cancel_tx: Some(cancel_tx),
                settled,
            });
            self.update(state, &id, TaskRecord::mark_running);
            info!("Starting task {}", id);

            tokio::spawn(Arc::clone(self).run_task(id, cancel_rx));
            return;
        }
    }

    /// Moves the running task to a terminal state. Only the first call for a
    /// given run has any effect.
    async fn settle<F>(self: &Arc<Self>, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut state = self.state.write().await;
        if !state.is_running(id) {
            return false;
        }

        if let Some(active) = state.running.take() {
            active.settled.send_replace(true);
        }
        if let Some(record) = self.update(&mut state, id, f) {
            match record.status {
                TaskStatus::Completed => info!("Task {} completed", id),
                _ => warn!(
                    "Task {} failed ({}): {}",
                    id,
                    record.engine_error_code.as_deref().unwrap_or("unknown"),
                    record.error.as_deref().unwrap_or("")
                ),
            }
        }
        self.schedule(&mut state);
        true
    }

    async fn fail(self: &Arc<Self>, id: &str, code: EngineErrorCode, message: String) -> bool {
        self.settle(id, |t| t.fail(code, message)).await
    }

    async fn append_log(&self, id: &str, line: String) {
        let mut state = self.state.write().await;
        let max = self.config.max_log_lines;
        self.update(&mut state, id, |t| t.push_log(line, max));
    }

    async fn run_task(self: Arc<Self>, id: String, mut cancel_rx: oneshot::Receiver<()>) {
        let Some(request) = self.state.read().await.find(&id).map(|t| t.request.clone()) else {
            return;
        };

        // Preparation is never interrupted; a cancel sent meanwhile is
        // honored once it is done.
        let Some(prepared) = self.prepare(&id, &request).await else {
            return;
        };

        if cancel_rx.try_recv().is_ok() {
            prepared.discard_manifest().await;
            self.fail(&id, EngineErrorCode::Cancelled, "cancelled".to_string())
                .await;
            return;
        }

        self.execute(&id, &request, &prepared, &mut cancel_rx).await;
    }

    /// Resolves the encoder, writes the manifest and synthesizes the command.
    /// On error the task has already been failed.
    async fn prepare(self: &Arc<Self>, id: &str, request: &ProcessingRequest) -> Option<PreparedRun> {
        let selection = match request.operation.requested_codec(request.profile) {
            Some(codec) => match self.probe.resolve(codec).await {
                Some(selection) => Some(selection),
                None => {
                    let platform = self.probe.platform();
                    self.fail(
                        id,
                        EngineErrorCode::EncoderUnavailable,
                        format!("no {} encoder available on {}", codec, platform),
                    )
                    .await;
                    return None;
                }
            },
            None => None,
        };
        self.record_selection(id, selection.as_ref()).await;

        if let Err(e) = tokio::fs::create_dir_all(&self.config.output_dir).await {
            self.fail(
                id,
                EngineErrorCode::SpawnFailed,
                format!("cannot create output directory {:?}: {}", self.config.output_dir, e),
            )
            .await;
            return None;
        }
        let output_path = self.config.output_dir.join(output_file_name(request, id));

        let manifest = match &request.operation {
            Operation::Merge { input_uris } => {
                match write_concat_manifest(&self.config.cache_dir, id, input_uris).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        self.fail(
                            id,
                            EngineErrorCode::ManifestFailed,
                            format!("cannot write concat manifest: {}", e),
                        )
                        .await;
                        return None;
                    }
                }
            }
            _ => None,
        };

        let command = match synthesize(
            request,
            selection.as_ref(),
            &output_path,
            manifest.as_deref(),
            &self.config.command,
        ) {
            Ok(command) => command,
            Err(e) => {
                let code = match e {
                    CommandError::MissingEncoder { .. } => EngineErrorCode::EncoderUnavailable,
                    CommandError::MissingConcatList => EngineErrorCode::ManifestFailed,
                };
                if let Some(path) = &manifest {
                    remove_manifest(path).await;
                }
                self.fail(id, code, e.to_string()).await;
                return None;
            }
        };

        let rendered = command.render(&self.spawner.program());
        debug!("Task {} command: {}", id, rendered);
        self.append_log(id, format!("command: {}", rendered)).await;

        Some(PreparedRun {
            command,
            output_path,
            manifest,
        })
    }

    async fn record_selection(&self, id: &str, selection: Option<&EncoderSelection>) {
        let Some(selection) = selection else {
            return;
        };
        let mut state = self.state.write().await;
        let max = self.config.max_log_lines;
        self.update(&mut state, id, |t| {
            t.push_log(format!("encoder: {}", selection.video_encoder), max);
            if let Some(reason) = &selection.fallback_reason {
                t.push_log(format!("encoder fallback: {}", reason), max);
            }
            t.encoder = Some(selection.clone());
        });
    }

    /// Spawns the encoder and supervises it until the task settles.
    async fn execute(
        self: &Arc<Self>,
        id: &str,
        request: &ProcessingRequest,
        prepared: &PreparedRun,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) {
        let mut process = match self.spawner.spawn(prepared.command.argv()).await {
            Ok(process) => process,
            Err(e) => {
                error!("Failed to start encoder for task {}: {}", id, e);
                let code = match e {
                    ProcessError::NotFound { .. } => EngineErrorCode::ExecutorUnavailable,
                    _ => EngineErrorCode::SpawnFailed,
                };
                prepared.discard_manifest().await;
                self.fail(id, code, e.to_string()).await;
                return;
            }
        };

        let duration_ms = self.state.read().await.find(id).and_then(|t| t.duration_ms);
        let mut tracker = ProgressTracker::new(duration_ms);

        let deadline = self.config.max_task_duration;
        let timeout = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timeout);

        // Stream stderr until it closes, then wait for the exit. Cancel and
        // timeout stay armed in both phases.
        let interrupted = loop {
            tokio::select! {
                biased;
                _ = &mut *cancel_rx => break Some(RunEnd::Cancelled),
                _ = &mut timeout => break Some(RunEnd::TimedOut),
                line = process.next_line() => match line {
                    Some(line) => self.on_line(id, &mut tracker, line).await,
                    None => break None,
                },
            }
        };
        let end = match interrupted {
            Some(end) => end,
            None => tokio::select! {
                biased;
                _ = &mut *cancel_rx => RunEnd::Cancelled,
                _ = &mut timeout => RunEnd::TimedOut,
                exit = process.wait() => match exit {
                    Ok(exit) => RunEnd::Exited(exit),
                    Err(e) => RunEnd::WaitFailed(e),
                },
            },
        };
        if matches!(end, RunEnd::Cancelled | RunEnd::TimedOut) {
            stop(process.as_mut(), id).await;
        }

        // Leftovers go before the task settles.
        prepared.discard_manifest().await;
        if !matches!(&end, RunEnd::Exited(exit) if exit.success()) {
            discard_output(&prepared.output_path).await;
        }

        match end {
            RunEnd::Exited(exit) if exit.success() => {
                self.finish(id, request, &prepared.output_path).await;
            }
            RunEnd::Exited(exit) => {
                let message = match exit.code {
                    Some(code) => format!("ffmpeg exited with code {}", code),
                    None => "ffmpeg was terminated by a signal".to_string(),
                };
                self.fail(id, EngineErrorCode::Exit(exit.code), message).await;
            }
            RunEnd::WaitFailed(e) => {
                self.fail(id, EngineErrorCode::SpawnFailed, e.to_string()).await;
            }
            RunEnd::TimedOut => {
                let limit = deadline.unwrap_or_default();
                self.fail(
                    id,
                    EngineErrorCode::Timeout,
                    format!("task exceeded {} s", limit.as_secs()),
                )
                .await;
            }
            RunEnd::Cancelled => {
                self.fail(id, EngineErrorCode::Cancelled, "cancelled".to_string())
                    .await;
            }
        }
    }

    async fn on_line(&self, id: &str, tracker: &mut ProgressTracker, line: String) {
        let advanced = tracker.observe(&line);
        let max = self.config.max_log_lines;

        let mut state = self.state.write().await;
        let Some(record) = state.find_mut(id) else {
            return;
        };
        record.push_log(line, max);

        // Plain log lines are not broadcast; progress changes are.
        if let Some((processed_ms, progress)) = advanced {
            record.processed_ms = processed_ms;
            record.progress = progress;
            let snapshot = record.clone();
            self.publish(TaskEvent::Updated(snapshot));
        }
    }

    async fn finish(self: &Arc<Self>, id: &str, request: &ProcessingRequest, output_path: &Path) {
        match self.registry.register_output(&request.source_id, output_path).await {
            Ok(file_id) => {
                debug!("Registered output {:?} as {}", output_path, file_id);
                self.settle(id, |t| t.complete(vec![file_id])).await;
            }
            Err(e) => {
                self.fail(
                    id,
                    EngineErrorCode::OutputRegistrationFailed,
                    format!("cannot register output {:?}: {}", output_path, e),
                )
                .await;
            }
        }
    }
}

async fn stop(process: &mut dyn RunningProcess, id: &str) {
    if let Err(e) = process.kill().await {
        warn!("Failed to kill encoder for task {}: {}", id, e);
    }
    if let Err(e) = process.wait().await {
        warn!("Failed to reap encoder for task {}: {}", id, e);
    }
}

async fn discard_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}

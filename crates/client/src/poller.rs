// crates/client/src/poller.rs
//! Submit-then-poll loop for one import.
//!
//! Each import runs in its own task. The task issues at most one status
//! request at a time and sleeps a fixed interval after each one completes.
//! Transient failures are retried silently; only a terminal job status, a
//! definitive API error, or one of the caps in [`PollConfig`] ends the loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use larder_core::{ImportOutcome, UploadedFile};
use larder_types::{CreateImportResponse, JobStatus, JobStatusResponse};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ImportApi;
use crate::error::{ApiError, ClientError};
use crate::phase::{ClientPhase, FailureReason};
use crate::view::ImportView;

/// Timing limits for one import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between the end of one status request and the start of the next.
    pub interval: Duration,
    /// Give up polling after this long, counted from the first status request.
    pub max_duration: Duration,
    /// Give up after this many retryable errors in a row.
    pub max_consecutive_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_duration: Duration::from_secs(5 * 60),
            max_consecutive_failures: 15,
        }
    }
}

/// Starts imports and re-attaches to existing ones.
pub struct ImportSession {
    api: Arc<dyn ImportApi>,
    view: Arc<dyn ImportView>,
    config: PollConfig,
}

enum Start {
    Submit { file: UploadedFile, fast_path: bool },
    Resume { job_id: String },
}

impl ImportSession {
    pub fn new(api: Arc<dyn ImportApi>, view: Arc<dyn ImportView>, config: PollConfig) -> Self {
        Self { api, view, config }
    }

    /// Upload `file` and follow the resulting job. Must be called inside a
    /// tokio runtime.
    pub fn submit(&self, file: UploadedFile, fast_path: bool) -> PollGuard {
        self.spawn(Start::Submit { file, fast_path })
    }

    /// Follow a job submitted earlier, e.g. after the UI was left mid-import.
    pub fn resume(&self, job_id: impl Into<String>) -> PollGuard {
        self.spawn(Start::Resume {
            job_id: job_id.into(),
        })
    }

    fn spawn(&self, start: Start) -> PollGuard {
        let (phase_tx, phase_rx) = watch::channel(ClientPhase::Idle);
        let stop = CancellationToken::new();
        let shared = Shared::default();

        let poller = Poller {
            api: Arc::clone(&self.api),
            view: Arc::clone(&self.view),
            config: self.config,
            phase_tx,
            stop: stop.clone(),
            shared: shared.clone(),
        };
        let task = tokio::spawn(poller.run(start));

        PollGuard {
            task: Some(task),
            phase: phase_rx,
            cancel: CancelHandle {
                api: Arc::clone(&self.api),
                shared,
                stop: stop.clone(),
            },
            stop,
        }
    }
}

/// Owns a running import's local poll loop.
///
/// Dropping the guard, or calling [`PollGuard::detach`], stops the loop but
/// leaves the server-side job alone; [`ImportSession::resume`] picks it up
/// again. Use [`CancelHandle`] to cancel the job itself.
pub struct PollGuard {
    task: Option<JoinHandle<ClientPhase>>,
    phase: watch::Receiver<ClientPhase>,
    cancel: CancelHandle,
    stop: CancellationToken,
}

impl PollGuard {
    /// Latest phase published by the loop.
    pub fn phase(&self) -> ClientPhase {
        self.phase.borrow().clone()
    }

    /// Watch phase changes.
    pub fn subscribe(&self) -> watch::Receiver<ClientPhase> {
        self.phase.clone()
    }

    /// The job being followed, once the server has assigned one.
    pub fn job_id(&self) -> Option<String> {
        self.cancel.shared.lock().job_id.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the loop to finish and return its final phase.
    pub async fn wait(&mut self) -> Result<ClientPhase, ClientError> {
        match self.task.take() {
            Some(task) => Ok(task.await?),
            None => Ok(self.phase()),
        }
    }

    /// Stop polling without cancelling the job. Returns the job id to resume
    /// with, or `None` if the server had not assigned one yet.
    pub fn detach(self) -> Option<String> {
        self.stop.cancel();
        self.job_id()
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Job id and cancel intent, shared by the loop and its [`CancelHandle`].
///
/// Both fields live under one lock so that exactly one side sends the server
/// cancel: whichever of "job id assigned" and "cancel requested" happens
/// second.
#[derive(Default, Clone)]
struct Shared(Arc<Mutex<Tracking>>);

#[derive(Default)]
struct Tracking {
    job_id: Option<String>,
    cancel_requested: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Tracking> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cancels the import a [`PollGuard`] is following.
#[derive(Clone)]
pub struct CancelHandle {
    api: Arc<dyn ImportApi>,
    shared: Shared,
    stop: CancellationToken,
}

impl CancelHandle {
    /// Ask the server to cancel, then stop polling and reset the view.
    ///
    /// If the server has not answered the submission yet, the cancel is sent
    /// as soon as it does. On error nothing changes and polling continues.
    pub async fn cancel(&self) -> Result<(), ApiError> {
        let job_id = {
            let mut tracking = self.shared.lock();
            tracking.cancel_requested = true;
            tracking.job_id.clone()
        };
        if let Some(job_id) = job_id {
            if let Err(e) = self.api.cancel(&job_id).await {
                self.shared.lock().cancel_requested = false;
                return Err(e);
            }
            info!(job_id = %job_id, "Import cancelled");
        }
        self.stop.cancel();
        Ok(())
    }
}

struct Poller {
    api: Arc<dyn ImportApi>,
    view: Arc<dyn ImportView>,
    config: PollConfig,
    phase_tx: watch::Sender<ClientPhase>,
    stop: CancellationToken,
    shared: Shared,
}

impl Poller {
    async fn run(self, start: Start) -> ClientPhase {
        let job_id = match start {
            Start::Submit { file, fast_path } => match self.submit(file, fast_path).await {
                Ok(job_id) => job_id,
                Err(settled) => return settled,
            },
            Start::Resume { job_id } => job_id,
        };

        let cancelled_early = {
            let mut tracking = self.shared.lock();
            tracking.job_id = Some(job_id.clone());
            tracking.cancel_requested
        };
        if cancelled_early {
            // The handle saw no job id, so the server cancel is ours to send.
            if let Err(e) = self.api.cancel(&job_id).await {
                warn!(job_id = %job_id, error = %e, "Cancel after submit failed");
            }
            return self.reset();
        }
        if self.stop.is_cancelled() {
            return self.stopped();
        }

        self.poll(&job_id).await
    }

    /// Returns the new job id, or the settled phase if the server answered
    /// without a job.
    async fn submit(&self, file: UploadedFile, fast_path: bool) -> Result<String, ClientPhase> {
        self.set_phase(ClientPhase::Submitted);

        // Not raced against `stop`: dropping an in-flight upload could leave
        // a job nobody knows the id of.
        let response = match self.api.submit(&file, fast_path).await {
            Ok(CreateImportResponse::Job { job_id }) => {
                info!(job_id = %job_id, "Import submitted");
                return Ok(job_id);
            }
            other => other,
        };

        // No job exists to cancel, so a cancel that arrived during the upload
        // only has to reset the view. Whatever the server answered is dropped.
        if self.shared.lock().cancel_requested {
            info!("Submission cancelled before the server answered");
            return Err(self.reset());
        }

        match response {
            Ok(inline) => {
                let settled = match ImportOutcome::from_fast_path(&inline) {
                    Some(outcome) => self.complete(outcome),
                    None => self.fail(FailureReason::Server("Unexpected submit response".into())),
                };
                Err(settled)
            }
            Err(ApiError::Transport(e)) => {
                warn!(error = %e, "Submit failed");
                Err(self.fail(FailureReason::Unreachable))
            }
            Err(e) => Err(self.fail(FailureReason::Rejected(e.to_string()))),
        }
    }

    async fn poll(&self, job_id: &str) -> ClientPhase {
        self.set_phase(ClientPhase::Polling {
            job_id: job_id.to_string(),
            progress: Default::default(),
            partial: Vec::new(),
        });

        let started = Instant::now();
        let mut failures = 0u32;

        loop {
            if started.elapsed() >= self.config.max_duration {
                warn!(job_id, elapsed_secs = started.elapsed().as_secs(), "Polling timed out");
                return self.fail(FailureReason::TimedOut);
            }

            let result = tokio::select! {
                _ = self.stop.cancelled() => return self.stopped(),
                result = self.api.status(job_id) => result,
            };

            match result {
                Ok(snapshot) => {
                    failures = 0;
                    if let Some(settled) = self.observe(snapshot) {
                        return settled;
                    }
                }
                Err(ApiError::NotFound) => return self.fail(FailureReason::JobLost),
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    debug!(job_id, failures, error = %e, "Status request failed, retrying");
                    if failures >= self.config.max_consecutive_failures {
                        return self.fail(FailureReason::Unreachable);
                    }
                }
                Err(e) => return self.fail(FailureReason::Rejected(e.to_string())),
            }

            tokio::select! {
                _ = self.stop.cancelled() => return self.stopped(),
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    /// Apply one snapshot. Returns the settled phase if it was terminal.
    fn observe(&self, snapshot: JobStatusResponse) -> Option<ClientPhase> {
        match snapshot.status {
            JobStatus::Completed => {
                let outcome = ImportOutcome::from_snapshot(&snapshot)?;
                Some(self.complete(outcome))
            }
            JobStatus::Failed => {
                let message = snapshot
                    .error
                    .unwrap_or_else(|| "Import failed".to_string());
                Some(self.fail(FailureReason::Server(message)))
            }
            // Partial results are discarded, as for a local cancel.
            JobStatus::Cancelled => Some(self.reset()),
            JobStatus::Pending | JobStatus::PagesQueued | JobStatus::Processing => {
                self.view
                    .render_progress(&snapshot.job_id, &snapshot.progress, &snapshot.results);
                self.set_phase(ClientPhase::Polling {
                    job_id: snapshot.job_id,
                    progress: snapshot.progress,
                    partial: snapshot.results,
                });
                None
            }
        }
    }

    fn complete(&self, outcome: ImportOutcome) -> ClientPhase {
        match &outcome {
            ImportOutcome::Empty { .. } => self.view.show_no_recipe(),
            ImportOutcome::Single(recipe) => self.view.navigate_to_recipe(recipe),
            ImportOutcome::Multiple(summary) => self.view.show_summary(summary),
        }
        let phase = ClientPhase::from(outcome);
        self.set_phase(phase.clone());
        phase
    }

    fn fail(&self, reason: FailureReason) -> ClientPhase {
        self.view.show_error(&reason);
        let phase = ClientPhase::Failed(reason);
        self.set_phase(phase.clone());
        phase
    }

    fn reset(&self) -> ClientPhase {
        self.view.reset();
        self.set_phase(ClientPhase::Idle);
        ClientPhase::Idle
    }

    /// The loop was stopped from outside: by a cancel (reset the view) or a
    /// detach (leave the view as it is).
    fn stopped(&self) -> ClientPhase {
        if self.shared.lock().cancel_requested {
            self.reset()
        } else {
            debug!("Poll loop detached");
            self.phase_tx.borrow().clone()
        }
    }

    fn set_phase(&self, phase: ClientPhase) {
        self.phase_tx.send_replace(phase);
    }
}

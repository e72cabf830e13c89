//! Drives a provider job from submission to a terminal state.
//!
//! Submission either yields a result immediately or a task id; in the latter
//! case the job is checked once per interval until the provider reports a
//! usable URL, an explicit failure, or the attempt budget runs out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::models::failure::FailureKind;
use crate::models::job::{Job, JobKind, JobStatus};
use crate::models::provider::{ProviderStatus, StatusDetails};
use crate::services::provider::{JobPayload, JobProvider, ProviderError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Attempts before an ambiguous status-2 reply carrying a URL is trusted.
/// Earlier URLs have been observed to point at incomplete media.
pub const MIN_POLLS_FOR_STATUS_2_SUCCESS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_attempts: u32,
    pub min_attempts_for_ambiguous_success: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_attempts_for_ambiguous_success: MIN_POLLS_FOR_STATUS_2_SUCCESS,
        }
    }
}

impl PollerConfig {
    /// Per-kind defaults. Still images finish quickly, so they are checked
    /// more often.
    pub fn for_kind(kind: JobKind) -> Self {
        match kind {
            JobKind::FaceSwapImage => Self {
                interval: Duration::from_secs(2),
                ..Self::default()
            },
            JobKind::FaceSwapVideo | JobKind::VoiceClone | JobKind::SpeechSynthesis => {
                Self::default()
            }
        }
    }
}

#[derive(Clone)]
pub struct JobPoller {
    provider: Arc<dyn JobProvider>,
    config: PollerConfig,
}

impl JobPoller {
    pub fn new(provider: Arc<dyn JobProvider>, config: PollerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Hand `payload` to the provider. Never retried here; on failure the
    /// caller decides whether to resubmit.
    pub async fn submit(&self, kind: JobKind, payload: JobPayload) -> Job {
        let mut job = Job::pending(kind);

        match self.provider.submit(kind, payload).await {
            Ok(reply) => {
                // A URL next to a task id names where the output will land,
                // not a finished result.
                if let Some(task_id) = reply.task_id() {
                    tracing::info!(%kind, job_id = %task_id, "Job accepted by provider");
                    job.acknowledge(task_id.to_string(), reply.message.clone());
                } else if let Some(url) = reply.direct_url() {
                    tracing::info!(%kind, "Provider returned a direct result");
                    job.succeed(url.to_string());
                } else {
                    tracing::warn!(%kind, "Provider reply had neither a result URL nor a job id");
                    job.fail(
                        FailureKind::SubmissionRejected,
                        "provider returned neither a result URL nor a job id".to_string(),
                    );
                }
            }
            Err(e) => {
                tracing::warn!(%kind, error = %e, "Job submission failed");
                let reason = e
                    .detail()
                    .unwrap_or(FailureKind::SubmissionRejected.default_message());
                job.fail(FailureKind::SubmissionRejected, reason.to_string());
            }
        }

        record_terminal(&job);
        job
    }

    /// Issue exactly one status check and fold the reply into `job`.
    ///
    /// Terminal jobs are left untouched and cause no network call.
    pub async fn poll_once(&self, job: &mut Job) -> JobStatus {
        let Some(job_id) = self.prepare(job, self.config.max_attempts) else {
            return job.status();
        };
        let Some(attempt) = job.begin_attempt() else {
            return job.status();
        };

        let outcome = self.provider.status(&job_id).await;
        self.apply(job, attempt, self.config.max_attempts, outcome)
    }

    /// Track with the configured interval and attempt budget.
    pub fn track(&self, job: Job) -> PollHandle {
        self.poll_until_done(job, self.config.interval, self.config.max_attempts)
    }

    /// Check `job` immediately, then once per `interval`, until it reaches a
    /// terminal state or `max_attempts` checks have been made.
    ///
    /// Must be called from within a tokio runtime.
    pub fn poll_until_done(&self, job: Job, interval: Duration, max_attempts: u32) -> PollHandle {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(job.clone());

        let poller = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            poller.run(job, interval, max_attempts, token, tx).await;
        });

        PollHandle {
            cancel,
            state: rx,
            task,
        }
    }

    async fn run(
        self,
        mut job: Job,
        interval: Duration,
        max_attempts: u32,
        cancel: CancellationToken,
        tx: watch::Sender<Job>,
    ) {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !job.is_terminal() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Work on a copy so an abandoned check never leaks into the
            // published state.
            let mut next = job.clone();
            let Some(job_id) = self.prepare(&mut next, max_attempts) else {
                publish(&tx, &cancel, &next);
                job = next;
                break;
            };
            let Some(attempt) = next.begin_attempt() else {
                break;
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.provider.status(&job_id) => outcome,
            };
            self.apply(&mut next, attempt, max_attempts, outcome);

            if !publish(&tx, &cancel, &next) {
                break;
            }
            job = next;
        }

        if cancel.is_cancelled() {
            tracing::debug!(job_id = ?job.job_id(), attempt = job.poll_attempt(), "Job tracking cancelled");
        }
    }

    /// Returns the job id to check, or `None` when no check should be made.
    /// A job whose attempt budget is already spent times out here without
    /// touching the network; one that never got an id fails.
    fn prepare(&self, job: &mut Job, max_attempts: u32) -> Option<String> {
        if job.is_terminal() {
            return None;
        }
        let Some(job_id) = job.job_id().map(str::to_string) else {
            tracing::warn!(kind = %job.kind(), "Job has no id to track");
            job.fail(
                FailureKind::SubmissionRejected,
                "no job id to track".to_string(),
            );
            record_terminal(job);
            return None;
        };
        if job.poll_attempt() >= max_attempts {
            job.time_out();
            record_terminal(job);
            return None;
        }
        Some(job_id)
    }

    fn apply(
        &self,
        job: &mut Job,
        attempt: u32,
        max_attempts: u32,
        outcome: Result<StatusDetails, ProviderError>,
    ) -> JobStatus {
        match outcome {
            Ok(details) => match self.interpret(&details, attempt) {
                Verdict::Succeeded(url) => {
                    tracing::info!(job_id = ?job.job_id(), attempt, "Job succeeded");
                    job.succeed(url);
                }
                Verdict::Failed(reason) => {
                    tracing::warn!(job_id = ?job.job_id(), attempt, %reason, "Provider reported failure");
                    job.fail(FailureKind::ProviderReportedFailure, reason);
                }
                Verdict::InProgress => {
                    tracing::debug!(
                        job_id = ?job.job_id(),
                        attempt,
                        code = details.faceswap_status,
                        "Job still in progress"
                    );
                    job.note_progress(details.msg.clone());
                }
            },
            Err(e) => {
                let final_attempt = attempt >= max_attempts;
                if FailureKind::NetworkErrorDuringPoll.surfaced_to_user(final_attempt) {
                    tracing::warn!(job_id = ?job.job_id(), attempt, error = %e, "Status check failed on the final attempt");
                } else {
                    tracing::debug!(job_id = ?job.job_id(), attempt, error = %e, "Status check failed, retrying on next tick");
                }
                job.note_poll_error(e.to_string());
            }
        }

        if !job.is_terminal() && attempt >= max_attempts {
            tracing::warn!(job_id = ?job.job_id(), attempt, "Job timed out");
            job.time_out();
        }

        record_terminal(job);
        job.status()
    }

    fn interpret(&self, details: &StatusDetails, attempt: u32) -> Verdict {
        let status = details.status();
        if status == ProviderStatus::Failed {
            let reason = details
                .failure_message()
                .unwrap_or(FailureKind::ProviderReportedFailure.default_message());
            return Verdict::Failed(reason.to_string());
        }

        match (status, details.usable_url()) {
            (ProviderStatus::Ambiguous, Some(_))
                if attempt < self.config.min_attempts_for_ambiguous_success =>
            {
                Verdict::InProgress
            }
            (_, Some(url)) => Verdict::Succeeded(url.to_string()),
            (ProviderStatus::Complete, None) => Verdict::Failed(
                "provider reported completion without a result URL".to_string(),
            ),
            _ => Verdict::InProgress,
        }
    }
}

enum Verdict {
    Succeeded(String),
    Failed(String),
    InProgress,
}

/// Publish `job` unless tracking was cancelled. Returns whether it was sent.
fn publish(tx: &watch::Sender<Job>, cancel: &CancellationToken, job: &Job) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tx.send_replace(job.clone());
    true
}

fn record_terminal(job: &Job) {
    if job.is_terminal() {
        metrics::counter!("tracked_jobs_terminal_total", "status" => job.status().to_string())
            .increment(1);
    }
}

/// Handle to a job tracked in the background.
pub struct PollHandle {
    cancel: CancellationToken,
    state: watch::Receiver<Job>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop tracking. Idempotent and safe after the job has finished; once it
    /// returns, the observable job never changes again.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Latest published state of the job.
    pub fn snapshot(&self) -> Job {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every published state change.
    pub fn subscribe(&self) -> watch::Receiver<Job> {
        self.state.clone()
    }

    /// Wait for tracking to end and return the last published state.
    pub async fn wait(self) -> Job {
        let joined = self.task.await;
        let mut job = self.state.borrow().clone();
        if let Err(e) = joined {
            tracing::error!(error = %e, "Job tracking task stopped unexpectedly");
            job.fail(
                FailureKind::ProviderReportedFailure,
                "job tracking stopped unexpectedly".to_string(),
            );
        }
        job
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::failure::FailureKind;
use crate::services::media_proxy;

/// Kind of work handed to the external provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum JobKind {
    FaceSwapImage,
    FaceSwapVideo,
    VoiceClone,
    SpeechSynthesis,
}

impl JobKind {
    /// Same-origin endpoint that accepts the submission and answers with a
    /// task id. Voice jobs complete synchronously on the speech backend and
    /// have none.
    pub fn submit_path(self) -> Option<&'static str> {
        match self {
            JobKind::FaceSwapImage => Some("/api/initiate-faceswap"),
            JobKind::FaceSwapVideo => Some("/api/initiate-video-faceswap"),
            JobKind::VoiceClone | JobKind::SpeechSynthesis => None,
        }
    }

    /// Multipart field name carrying the payload.
    pub fn form_field(self) -> &'static str {
        match self {
            JobKind::FaceSwapImage | JobKind::FaceSwapVideo => "user_image",
            JobKind::VoiceClone | JobKind::SpeechSynthesis => "audio_file",
        }
    }
}

/// Coarse lifecycle status of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut
        )
    }
}

/// Lifecycle state with the data that only exists in that state.
///
/// Carrying the result URL and the failure reason inside their variants keeps
/// them mutually exclusive and absent before a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Submitted,
    Polling,
    Succeeded { result_url: String },
    Failed { kind: FailureKind, reason: String },
    TimedOut,
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Submitted => JobStatus::Submitted,
            JobState::Polling => JobStatus::Polling,
            JobState::Succeeded { .. } => JobStatus::Succeeded,
            JobState::Failed { .. } => JobStatus::Failed,
            JobState::TimedOut => JobStatus::TimedOut,
        }
    }
}

/// One outstanding request to the face-swap or voice-clone provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    kind: JobKind,
    job_id: Option<String>,
    state: JobState,
    poll_attempt: u32,
    provider_message: Option<String>,
    /// Error from the latest status check, cleared when the next one starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    last_poll_error: Option<String>,
    submitted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Job {
    /// A job that has not been acknowledged by the provider yet.
    pub fn pending(kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            kind,
            job_id: None,
            state: JobState::Pending,
            poll_attempt: 0,
            provider_message: None,
            last_poll_error: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    /// Resume tracking a job id obtained outside this process.
    pub fn resume(kind: JobKind, job_id: impl Into<String>) -> Self {
        let mut job = Self::pending(kind);
        job.acknowledge(job_id.into(), None);
        job
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn poll_attempt(&self) -> u32 {
        self.poll_attempt
    }

    /// Last progress or acknowledgement message from the provider.
    pub fn provider_message(&self) -> Option<&str> {
        self.provider_message.as_deref()
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn result_url(&self) -> Option<&str> {
        match &self.state {
            JobState::Succeeded { result_url } => Some(result_url),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.state {
            JobState::Failed { kind, .. } => Some(*kind),
            JobState::TimedOut if self.last_poll_error.is_some() => {
                Some(FailureKind::NetworkErrorDuringPoll)
            }
            JobState::TimedOut => Some(FailureKind::PollingTimedOut),
            _ => None,
        }
    }

    /// Error from the most recent status check, if it failed.
    pub fn last_poll_error(&self) -> Option<&str> {
        self.last_poll_error.as_deref()
    }

    /// The poll error the user should see. Transient errors stay hidden
    /// until the job has ended on one.
    pub fn surfaced_poll_error(&self) -> Option<&str> {
        let error = self.last_poll_error.as_deref()?;
        FailureKind::NetworkErrorDuringPoll
            .surfaced_to_user(self.is_terminal())
            .then_some(error)
    }

    /// Same-origin relay URL the browser should load the result from.
    pub fn gateway_url(&self) -> Option<String> {
        self.result_url().map(media_proxy::gateway_url)
    }

    pub(crate) fn acknowledge(&mut self, job_id: String, message: Option<String>) -> bool {
        if self.state != JobState::Pending {
            return false;
        }
        self.job_id = Some(job_id);
        self.provider_message = message;
        self.transition(JobState::Submitted);
        true
    }

    /// Count a status check, moving Submitted to Polling. Returns the new
    /// attempt number, or `None` when the job can no longer be polled.
    pub(crate) fn begin_attempt(&mut self) -> Option<u32> {
        match self.state {
            JobState::Submitted | JobState::Polling => {
                self.poll_attempt += 1;
                self.last_poll_error = None;
                self.transition(JobState::Polling);
                Some(self.poll_attempt)
            }
            _ => None,
        }
    }

    pub(crate) fn note_progress(&mut self, message: Option<String>) {
        if !self.is_terminal() && message.is_some() {
            self.provider_message = message;
            self.updated_at = Utc::now();
        }
    }

    pub(crate) fn note_poll_error(&mut self, error: String) {
        if !self.is_terminal() {
            self.last_poll_error = Some(error);
            self.updated_at = Utc::now();
        }
    }

    pub(crate) fn succeed(&mut self, result_url: String) -> bool {
        self.finish(JobState::Succeeded { result_url })
    }

    pub(crate) fn fail(&mut self, kind: FailureKind, reason: String) -> bool {
        self.finish(JobState::Failed { kind, reason })
    }

    pub(crate) fn time_out(&mut self) -> bool {
        self.finish(JobState::TimedOut)
    }

    fn finish(&mut self, terminal: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.transition(terminal);
        true
    }

    fn transition(&mut self, next: JobState) {
        self.state = next;
        self.updated_at = Utc::now();
    }
}

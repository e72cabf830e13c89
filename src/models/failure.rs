use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Every way a tracked job or a media playback can go wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// The provider refused the submission (HTTP error, malformed reply, network).
    SubmissionRejected,
    /// A single status check could not reach the provider.
    NetworkErrorDuringPoll,
    /// The provider answered with its explicit failure code.
    ProviderReportedFailure,
    /// The attempt budget ran out without a result.
    PollingTimedOut,
    /// The media relay could not fetch the upstream resource.
    ProxyUpstreamError,
    /// The browser's media element rejected the codec or container.
    MediaPlaybackUnsupported,
}

impl FailureKind {
    /// Only a transient poll failure is retried, and only by the next tick.
    pub fn retried_automatically(self) -> bool {
        matches!(self, FailureKind::NetworkErrorDuringPoll)
    }

    /// Whether the user sees this failure. A transient poll failure stays
    /// hidden unless it happened on the last allowed attempt.
    pub fn surfaced_to_user(self, final_attempt: bool) -> bool {
        match self {
            FailureKind::NetworkErrorDuringPoll => final_attempt,
            _ => true,
        }
    }

    /// Default English message shown when the provider did not supply one.
    pub fn default_message(self) -> &'static str {
        match self {
            FailureKind::SubmissionRejected => "submission failed",
            FailureKind::NetworkErrorDuringPoll => "could not reach the job provider",
            FailureKind::ProviderReportedFailure => "the provider failed to generate the media",
            FailureKind::PollingTimedOut => "generation took too long, please start again",
            FailureKind::ProxyUpstreamError => "the media could not be loaded",
            FailureKind::MediaPlaybackUnsupported => "this media format cannot be played",
        }
    }
}

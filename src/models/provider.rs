//! Wire types exchanged with the job provider's same-origin endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Reply to a job submission: either a direct result or a task id to poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub akool_task_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub akool_job_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub direct_url: Option<String>,
}

impl SubmitResponse {
    pub fn direct_url(&self) -> Option<&str> {
        non_empty(self.direct_url.as_deref())
    }

    pub fn task_id(&self) -> Option<&str> {
        non_empty(self.akool_task_id.as_deref())
    }
}

/// FastAPI-style error body: `{ "detail": ... }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(Value::String(detail.into())),
        }
    }

    /// Human-readable message, whichever shape `detail` came in.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            Value::Array(items) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Reply from `GET /api/faceswap-status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub task_id: Option<String>,
    pub status_details: StatusDetails,
}

/// Provider status record for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default)]
    pub faceswap_status: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg_msg: Option<String>,
    /// Remaining provider fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl StatusDetails {
    pub fn status(&self) -> ProviderStatus {
        ProviderStatus::from_code(self.faceswap_status)
    }

    pub fn usable_url(&self) -> Option<&str> {
        non_empty(self.url.as_deref())
    }

    /// Failure text, preferring the algorithm message.
    pub fn failure_message(&self) -> Option<&str> {
        non_empty(self.alg_msg.as_deref()).or_else(|| non_empty(self.msg.as_deref()))
    }
}

/// Interpretation of the provider's numeric `faceswap_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Queued,
    Running,
    /// Reported both while still processing and once a usable URL exists.
    Ambiguous,
    Complete,
    Failed,
    Unknown(i64),
}

impl ProviderStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ProviderStatus::Queued,
            1 => ProviderStatus::Running,
            2 => ProviderStatus::Ambiguous,
            3 => ProviderStatus::Complete,
            4 => ProviderStatus::Failed,
            other => ProviderStatus::Unknown(other),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_response_task_id_accepts_numbers() {
        let resp: SubmitResponse =
            serde_json::from_str(r#"{"akool_task_id": 42, "message": "ok"}"#).unwrap();
        assert_eq!(resp.task_id(), Some("42"));
        assert!(resp.direct_url().is_none());
    }

    #[test]
    fn test_submit_response_ignores_blank_direct_url() {
        let resp: SubmitResponse =
            serde_json::from_str(r#"{"akool_task_id": "T1", "direct_url": ""}"#).unwrap();
        assert!(resp.direct_url().is_none());
        assert_eq!(resp.task_id(), Some("T1"));
    }

    #[test]
    fn test_error_body_shapes() {
        let plain: ErrorBody = serde_json::from_str(r#"{"detail": "bad image"}"#).unwrap();
        assert_eq!(plain.message().as_deref(), Some("bad image"));

        let object: ErrorBody =
            serde_json::from_str(r#"{"detail": {"message": "quota"}}"#).unwrap();
        assert_eq!(object.message().as_deref(), Some("quota"));

        let list: ErrorBody =
            serde_json::from_str(r#"{"detail": [{"msg": "field required"}]}"#).unwrap();
        assert_eq!(list.message().as_deref(), Some("field required"));

        let empty: ErrorBody = serde_json::from_str("{}").unwrap();
        assert!(empty.message().is_none());
    }

    #[test]
    fn test_status_details_round_trip_keeps_extra_fields() {
        let raw = r#"{"task_id":"T1","status_details":{"faceswap_status":3,"url":"https://cdn/x.mp4","_id":"T1","createdAt":1}}"#;
        let envelope: StatusEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.status_details.status(), ProviderStatus::Complete);
        assert_eq!(envelope.status_details.usable_url(), Some("https://cdn/x.mp4"));
        assert_eq!(envelope.status_details.extra.get("_id"), Some(&Value::from("T1")));

        let back = serde_json::to_value(&envelope).unwrap();
        assert_eq!(back["status_details"]["createdAt"], Value::from(1));
    }

    #[test]
    fn test_failure_message_prefers_alg_msg() {
        let details = StatusDetails {
            faceswap_status: 4,
            msg: Some("generic".to_string()),
            alg_msg: Some("no face found".to_string()),
            ..Default::default()
        };
        assert_eq!(details.failure_message(), Some("no face found"));
        assert_eq!(details.status(), ProviderStatus::Failed);
        assert_eq!(ProviderStatus::from_code(9), ProviderStatus::Unknown(9));
    }
}

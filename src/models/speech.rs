use garde::Validate;
use serde::{Deserialize, Serialize};

/// Speech generation request forwarded to the speech backend unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GenerateSpeechRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1, max = 5000))]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(length(max = 100))]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(length(max = 20))]
    pub age: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(alphanumeric, length(min = 1, max = 64))]
    pub voice_id: Option<String>,
}

/// Reply from the backend's voice-clone endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneVoiceResponse {
    pub voice_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

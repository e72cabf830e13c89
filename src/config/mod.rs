use serde::Deserialize;

use crate::services::media_proxy::MediaProxyConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the speech generation backend
    #[serde(default = "default_speech_backend_url")]
    pub speech_backend_url: String,

    /// Bearer credential for CDN-hosted generated media. Server-side only.
    pub cdn_bearer_token: Option<String>,

    /// Comma-separated host suffixes that need the CDN credential
    #[serde(default = "default_cdn_auth_hosts")]
    pub cdn_auth_hosts: String,

    /// Face-swap provider API key. Face-swap routes answer 500 without it.
    pub akool_api_key: Option<String>,

    #[serde(default = "default_akool_api_base_url")]
    pub akool_api_base_url: String,

    #[serde(default = "default_akool_detect_url")]
    pub akool_detect_url: String,

    /// Optional webhook the provider calls on completion
    pub akool_webhook_url: Option<String>,

    /// Public-read bucket for user photos
    pub s3_bucket_name: Option<String>,

    #[serde(default = "default_aws_region")]
    pub aws_region: String,

    pub aws_access_key_id: Option<String>,

    pub aws_secret_access_key: Option<String>,

    /// Endpoint override for S3-compatible stores
    pub s3_endpoint: Option<String>,

    /// Comma-separated origins allowed on the JSON API. Empty means any.
    #[serde(default)]
    pub cors_origins: String,

    /// Request body limit for uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_speech_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_cdn_auth_hosts() -> String {
    "cloudfront.net".to_string()
}

fn default_akool_api_base_url() -> String {
    "https://openapi.akool.com/api/open/v3".to_string()
}

fn default_akool_detect_url() -> String {
    "https://sg3.akool.com/detect".to_string()
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            speech_backend_url: default_speech_backend_url(),
            cdn_bearer_token: None,
            cdn_auth_hosts: default_cdn_auth_hosts(),
            akool_api_key: None,
            akool_api_base_url: default_akool_api_base_url(),
            akool_detect_url: default_akool_detect_url(),
            akool_webhook_url: None,
            s3_bucket_name: None,
            aws_region: default_aws_region(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            s3_endpoint: None,
            cors_origins: String::new(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn media_proxy(&self) -> MediaProxyConfig {
        MediaProxyConfig {
            bearer_token: non_blank(self.cdn_bearer_token.as_deref()),
            auth_hosts: split_list(&self.cdn_auth_hosts),
            ..MediaProxyConfig::default()
        }
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        split_list(&self.cors_origins)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_proxy_config_from_lists() {
        let config = AppConfig {
            cdn_bearer_token: Some("  ".to_string()),
            cdn_auth_hosts: "cloudfront.net, akool.com ,".to_string(),
            ..AppConfig::default()
        };
        let proxy = config.media_proxy();
        assert!(proxy.bearer_token.is_none());
        assert_eq!(proxy.auth_hosts, vec!["cloudfront.net", "akool.com"]);
    }

    #[test]
    fn test_empty_cors_origins_means_permissive() {
        assert!(AppConfig::default().allowed_origins().is_empty());
        let config = AppConfig {
            cors_origins: "https://a.example,https://b.example".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.allowed_origins().len(), 2);
    }
}

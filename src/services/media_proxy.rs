use axum::http::{header, HeaderMap, HeaderValue};
use reqwest::{Client, Response, Url};
use std::time::{Duration, Instant};

/// Same-origin path the browser loads relayed media from.
pub const STREAM_PATH: &str = "/api/stream-video";

const MEDIA_ACCEPT: &str = "video/*,audio/*,image/*;q=0.9,*/*;q=0.8";
const DEFAULT_RANGE: &str = "bytes=0-";
const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Relay URL for a remote media resource.
pub fn gateway_url(remote_url: &str) -> String {
    format!("{}?url={}", STREAM_PATH, urlencoding::encode(remote_url))
}

/// Credentials and host rules for the relay, fixed at startup.
#[derive(Debug, Clone)]
pub struct MediaProxyConfig {
    /// Bearer credential for CDN-gated media. Never sent to the browser.
    pub bearer_token: Option<String>,
    /// Host suffixes that require the bearer credential.
    pub auth_hosts: Vec<String>,
    pub connect_timeout: Duration,
}

impl Default for MediaProxyConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            auth_hosts: vec!["cloudfront.net".to_string()],
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Fetches remote media server-side so the browser only talks to this origin.
pub struct MediaProxy {
    http: Client,
    config: MediaProxyConfig,
}

impl MediaProxy {
    pub fn new(config: MediaProxyConfig) -> Result<Self, ProxyError> {
        // No total timeout: large videos stream for as long as the client reads.
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { http, config })
    }

    /// Parse the `url` query parameter. Only absolute http(s) URLs are relayed;
    /// hosts are not otherwise restricted.
    pub fn parse_remote(raw: &str) -> Result<Url, ProxyError> {
        let url = Url::parse(raw.trim()).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;
        let supported = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
        if !supported {
            return Err(ProxyError::InvalidUrl(format!(
                "unsupported URL scheme or missing host: {}",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Whether requests to `url` must carry the bearer credential.
    pub fn requires_auth(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.config.auth_hosts.iter().any(|pattern| {
            let pattern = pattern.trim().trim_start_matches('.');
            !pattern.is_empty()
                && (host == pattern || host.ends_with(&format!(".{}", pattern)))
        })
    }

    /// GET the upstream resource. `range` is the browser's own `Range` header,
    /// if it sent one. Non-2xx replies become [`ProxyError::Upstream`].
    pub async fn fetch(&self, remote: &Url, range: Option<&str>) -> Result<Response, ProxyError> {
        let mut request = self
            .http
            .get(remote.clone())
            .header(header::ACCEPT, MEDIA_ACCEPT)
            .header(header::RANGE, range.unwrap_or(DEFAULT_RANGE));

        if self.requires_auth(remote) {
            match &self.config.bearer_token {
                Some(token) => {
                    tracing::debug!(host = ?remote.host_str(), "Attaching CDN credential");
                    request = request.bearer_auth(token);
                }
                None => {
                    tracing::warn!(
                        host = ?remote.host_str(),
                        "CDN host requires a credential but none is configured"
                    );
                }
            }
        }

        let start = Instant::now();
        let response = request.send().await?;
        metrics::histogram!("media_proxy_upstream_seconds").record(start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("").to_string();
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                reason,
            });
        }

        Ok(response)
    }
}

/// Headers mirrored from the upstream response.
pub fn forwarded_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let content_type = upstream
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    headers.insert(header::CONTENT_TYPE, content_type);

    let accept_ranges = upstream
        .get(header::ACCEPT_RANGES)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("bytes"));
    headers.insert(header::ACCEPT_RANGES, accept_ranges);

    for name in [header::CONTENT_LENGTH, header::CONTENT_RANGE] {
        if let Some(value) = upstream.get(&name) {
            headers.insert(name, value.clone());
        }
    }

    headers
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid media URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch media: {status} {reason}")]
    Upstream { status: u16, reason: String },

    #[error("Media request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(hosts: &[&str]) -> MediaProxy {
        MediaProxy::new(MediaProxyConfig {
            bearer_token: Some("secret".to_string()),
            auth_hosts: hosts.iter().map(|h| h.to_string()).collect(),
            ..MediaProxyConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_gateway_url_encodes_remote() {
        assert_eq!(
            gateway_url("https://cdn.example.com/v.mp4?sig=a&b=c"),
            "/api/stream-video?url=https%3A%2F%2Fcdn.example.com%2Fv.mp4%3Fsig%3Da%26b%3Dc"
        );
    }

    #[test]
    fn test_parse_remote_requires_absolute_http() {
        assert!(MediaProxy::parse_remote("https://cdn.example.com/a.mp4").is_ok());
        assert!(MediaProxy::parse_remote("/relative/a.mp4").is_err());
        assert!(MediaProxy::parse_remote("ftp://cdn.example.com/a.mp4").is_err());
        assert!(MediaProxy::parse_remote("file:///etc/passwd").is_err());
        assert!(MediaProxy::parse_remote("").is_err());
    }

    #[test]
    fn test_requires_auth_matches_host_suffix() {
        let proxy = proxy(&["cloudfront.net", ".akool.com"]);
        let gated = Url::parse("https://d11fju.cloudfront.net/x.mp4").unwrap();
        let apex = Url::parse("https://cloudfront.net/x.mp4").unwrap();
        let akool = Url::parse("https://sg3.akool.com/x.mp4").unwrap();
        let lookalike = Url::parse("https://evilcloudfront.net/x.mp4").unwrap();
        let path_only = Url::parse("https://example.com/cloudfront.net/x.mp4").unwrap();

        assert!(proxy.requires_auth(&gated));
        assert!(proxy.requires_auth(&apex));
        assert!(proxy.requires_auth(&akool));
        assert!(!proxy.requires_auth(&lookalike));
        assert!(!proxy.requires_auth(&path_only));
    }

    #[test]
    fn test_forwarded_headers_defaults_and_optional_length() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1024"));
        upstream.insert(header::SERVER, HeaderValue::from_static("cdn"));

        let headers = forwarded_headers(&upstream);
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CONTENT_LENGTH], "1024");
        assert!(headers.get(header::SERVER).is_none());

        let bare = forwarded_headers(&HeaderMap::new());
        assert!(bare.get(header::CONTENT_LENGTH).is_none());
        assert!(bare.get(header::CONTENT_RANGE).is_none());
    }
}

//! HTTP-based backends: plain remote URLs and cloud object stores

use crate::storage::{ByteStream, StorageBackend};
use std::fmt;
use std::io;
use std::time::Duration;
use tracing::debug;

/// Default timeout for a whole HTTP transfer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn into_stream(response: ureq::http::Response<ureq::Body>) -> ByteStream {
    Box::new(response.into_body().into_reader())
}

/// Fetches images from plain HTTP(S) URLs
#[derive(Clone)]
pub struct RemoteUrl {
    agent: ureq::Agent,
}

impl RemoteUrl {
    /// Create a fetcher with the given transfer timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
        }
    }
}

impl Default for RemoteUrl {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl StorageBackend for RemoteUrl {
    fn open(&self, url: &str) -> io::Result<ByteStream> {
        debug!("GET {}", url);
        let response = self.agent.get(url).call().map_err(io::Error::other)?;
        Ok(into_stream(response))
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

/// Object store reachable over HTTP, addressed as `endpoint/key`
///
/// Works with any store that serves objects by plain GET, optionally
/// authenticated with a bearer token (public or presigned buckets,
/// gateways in front of S3/Swift).
#[derive(Clone)]
pub struct CloudDisk {
    endpoint: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl CloudDisk {
    /// Create a cloud disk for `endpoint`
    pub fn new(endpoint: String, token: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint,
            token,
            agent: build_agent(timeout),
        }
    }

    /// Full URL of an object key
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for CloudDisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudDisk")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl StorageBackend for CloudDisk {
    fn open(&self, key: &str) -> io::Result<ByteStream> {
        let url = self.object_url(key);
        debug!("GET {}", url);

        let mut request = self.agent.get(&url);
        if let Some(ref token) = self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.call().map_err(io::Error::other)?;
        Ok(into_stream(response))
    }

    fn kind(&self) -> &'static str {
        "cloud"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_joins_single_slash() {
        let disk = CloudDisk::new(
            "https://bucket.example.org/".to_string(),
            None,
            DEFAULT_TIMEOUT,
        );
        assert_eq!(
            disk.object_url("/dive/1.jpg"),
            "https://bucket.example.org/dive/1.jpg"
        );
        assert_eq!(
            disk.object_url("dive/1.jpg"),
            "https://bucket.example.org/dive/1.jpg"
        );
    }

    #[test]
    fn backend_kinds() {
        assert_eq!(RemoteUrl::default().kind(), "remote");
        let disk = CloudDisk::new("https://x".to_string(), None, DEFAULT_TIMEOUT);
        assert_eq!(disk.kind(), "cloud");
    }

    #[test]
    fn remote_unreachable_is_io_error() {
        let remote = RemoteUrl::new(Duration::from_secs(2));
        assert!(remote.open("http://127.0.0.1:9/never.jpg").is_err());
    }
}

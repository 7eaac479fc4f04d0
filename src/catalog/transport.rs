use std::time::Duration;

use crate::error::DatasetError;

/// Upper bound on a single response body. Resource CSVs from open-data portals
/// run to hundreds of megabytes; ureq's own default is far smaller.
const MAX_BODY_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Blocking byte transport used for both catalog metadata and resource bodies.
///
/// Production code uses [`HttpTransport`]; tests swap in an in-memory
/// implementation to count and script requests.
pub trait Transport: Send + Sync {
    /// Fetch the full body of a small metadata response at `url`.
    fn get(&self, url: &str) -> Result<Vec<u8>, DatasetError>;

    /// Fetch a resource body at `url`, which may be arbitrarily large.
    fn download(&self, url: &str) -> Result<Vec<u8>, DatasetError> {
        self.get(url)
    }
}

/// [`Transport`] backed by two `ureq` agents.
///
/// Metadata requests are bounded by a global timeout. Downloads only bound
/// connecting and waiting for the response head, so a large body that keeps
/// streaming is never cut off.
pub struct HttpTransport {
    metadata: ureq::Agent,
    downloads: ureq::Agent,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let metadata = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let downloads = ureq::Agent::config_builder()
            .timeout_connect(Some(timeout))
            .timeout_recv_response(Some(timeout))
            .build();

        Self {
            metadata: metadata.into(),
            downloads: downloads.into(),
            user_agent: user_agent.into(),
        }
    }

    fn fetch(&self, agent: &ureq::Agent, url: &str) -> Result<Vec<u8>, DatasetError> {
        let http_err = |message: String| DatasetError::Http {
            url: url.to_string(),
            message,
        };

        let mut response = agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|source| http_err(source.to_string()))?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|source| http_err(source.to_string()))
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, DatasetError> {
        self.fetch(&self.metadata, url)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, DatasetError> {
        self.fetch(&self.downloads, url)
    }
}

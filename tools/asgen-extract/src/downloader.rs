//! Remote file retrieval.
//!
//! One blocking HTTP client is shared process-wide; it refuses redirect
//! chains that downgrade from HTTPS to HTTP, bounds every download to a
//! total time budget, and retries transient failures with exponential
//! backoff.

use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::redirect;
use std::path::Path;
use std::time::Duration;

/// Total time budget per download attempt.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(90);

/// Retries after the first failed attempt.
const MAX_RETRIES: u32 = 4;

/// Contract the pipeline uses to fetch remote data. Tests substitute
/// their own implementation; production uses `HttpDownloader`.
pub trait Downloader: Send + Sync {
    fn download(&self, url: &str) -> Result<Vec<u8>, String>;
}

pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Build the shared client. `ca_info` optionally adds a certificate
    /// bundle for repositories behind private CAs.
    pub fn new(ca_info: Option<&Path>) -> Result<HttpDownloader, String> {
        let policy = redirect::Policy::custom(|attempt| {
            let downgrade = attempt.url().scheme() == "http"
                && attempt.previous().iter().any(|u| u.scheme() == "https");
            if downgrade {
                attempt.error("redirect downgrades HTTPS to HTTP")
            } else if attempt.previous().len() > 10 {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        });

        let mut builder = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .redirect(policy)
            .user_agent(concat!("asgen/", env!("CARGO_PKG_VERSION")));

        if let Some(ca_path) = ca_info {
            let pem = std::fs::read(ca_path)
                .map_err(|e| format!("unable to read CA bundle {}: {}", ca_path.display(), e))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| format!("invalid CA bundle {}: {}", ca_path.display(), e))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| format!("unable to build HTTP client: {}", e))?;
        Ok(HttpDownloader { client })
    }

    fn fetch_once(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| format!("request failed: {}", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("server returned {}", status));
        }
        let bytes = response
            .bytes()
            .map_err(|e| format!("read failed: {}", e))?;
        Ok(bytes.to_vec())
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, String> {
        let mut delay = Duration::from_secs(1);
        let mut last_error = String::new();
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                debug!("Retrying download of {} (attempt {})", url, attempt + 1);
                std::thread::sleep(delay);
                delay *= 2;
            }
            match self.fetch_once(url) {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!("Download of {} failed: {}", url, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

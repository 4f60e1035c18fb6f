use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::BuildConfig;
use crate::error::FetchError;

/// Anything that can hand back a raw document for a URL.
pub trait DocumentSource: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// HTTP document source. One per run: it owns the client, the request
/// spacing limiter and the global concurrency cap, and is passed to every
/// component that needs network access.
pub struct HttpFetcher {
    client: Client,
    limiter: Option<DefaultDirectRateLimiter>,
    permits: Semaphore,
    cancel: CancellationToken,
    requests: AtomicUsize,
}

impl HttpFetcher {
    pub fn new(config: &BuildConfig, cancel: CancellationToken) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;

        // Zero delay disables spacing entirely
        let limiter = Quota::with_period(config.delay()).map(RateLimiter::direct);

        tracing::info!(
            "Fetcher ready: delay={}ms timeout={}s concurrency={}",
            config.delay_ms,
            config.timeout_secs,
            config.concurrency
        );

        Ok(Self {
            client,
            limiter,
            permits: Semaphore::new(config.concurrency),
            cancel,
            requests: AtomicUsize::new(0),
        })
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn requests_made(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// End of run: stop any further dispatch and report usage.
    pub fn close(self) -> usize {
        self.cancel.cancel();
        let made = self.requests_made();
        tracing::info!("Fetcher closed after {} requests", made);
        made
    }
}

impl DocumentSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::cancelled(url));
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchError::new(url, e))?;

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        // Stop may have arrived while queued
        if self.cancel.is_cancelled() {
            return Err(FetchError::cancelled(url));
        }

        self.requests.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::new(url, format!("HTTP {}", response.status())));
        }

        response.text().await.map_err(|e| FetchError::new(url, e))
    }
}

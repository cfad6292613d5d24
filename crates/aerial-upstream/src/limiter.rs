//! Global fetch admission.
//!
//! Every upstream fetch, for any resource and any route, takes one permit
//! from a single semaphore. The deadline covers the wait for a permit and
//! the fetch itself; when it expires the caller gets `Ok(None)`, meaning
//! "no result this cycle", which is not an error.

use std::sync::Arc;
use std::time::Duration;

use aerial_config::UpstreamSettings;
use anyhow::{Context, Result};
use tokio::sync::Semaphore;

use crate::{Record, Resource, Upstream};

pub struct FetchLimiter {
    upstream: Arc<dyn Upstream>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    timeout: Duration,
}

impl FetchLimiter {
    pub fn new(upstream: Arc<dyn Upstream>, max_in_flight: usize, timeout: Duration) -> Self {
        Self {
            upstream,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            timeout,
        }
    }

    pub fn from_settings(upstream: Arc<dyn Upstream>, settings: &UpstreamSettings) -> Self {
        Self::new(upstream, settings.max_in_flight, settings.fetch_timeout())
    }

    pub fn source_name(&self) -> &'static str {
        self.upstream.source_name()
    }

    /// Fetches currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    /// Fetch through the gate. `Ok(None)` when the deadline expired.
    pub async fn fetch(
        &self,
        resource: Resource,
        params: &[(&str, &str)],
    ) -> Result<Option<Vec<Record>>> {
        let attempt = async {
            let _permit = self
                .permits
                .acquire()
                .await
                .context("fetch limiter closed")?;
            self.upstream.fetch(resource, params).await
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => {
                tracing::debug!(
                    resource = resource.as_str(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "upstream fetch timed out"
                );
                Ok(None)
            }
        }
    }
}

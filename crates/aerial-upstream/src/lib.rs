//! aerial-upstream
//!
//! Boundary to the transit operator's public API.
//!
//! - [`Upstream`]: fetch one resource, get back ordered flat records.
//! - [`MivbProvider`]: the HTTP/XML implementation.
//! - [`FetchLimiter`]: global admission gate plus per-fetch deadline that
//!   every caller goes through.
//!
//! Record order is preserved exactly as the provider sent it: for itineraries
//! it becomes the canonical stop order of the route.

mod limiter;
mod xml;

pub use limiter::FetchLimiter;
pub use xml::parse_records;

use std::collections::BTreeMap;

use aerial_config::UpstreamSettings;
use anyhow::{anyhow, Context, Result};

/// One provider record: field name -> text value. Empty fields are absent.
pub type Record = BTreeMap<String, String>;

/// Resources exposed by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Every line with names and both destinations.
    Lines,
    /// Ordered stops of one route; params `line`, `iti`.
    Itinerary,
    /// Vehicle positions around one stop; param `halt`.
    WaitingTimes,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Lines => "lines",
            Resource::Itinerary => "itinerary",
            Resource::WaitingTimes => "waiting_times",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Resource::Lines => "getlinesnew.php",
            Resource::Itinerary => "getitinerary.php",
            Resource::WaitingTimes => "getwaitingtimes.php",
        }
    }

    /// Name of the repeated element carrying one record.
    pub fn element(&self) -> &'static str {
        match self {
            Resource::Lines => "line",
            Resource::Itinerary => "stop",
            Resource::WaitingTimes => "position",
        }
    }
}

/// Upstream provider contract.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch(&self, resource: Resource, params: &[(&str, &str)]) -> Result<Vec<Record>>;
}

/// HTTP provider for the operator's XML API.
#[derive(Debug, Clone)]
pub struct MivbProvider {
    http: reqwest::Client,
    base_url: String,
    lang: String,
}

impl MivbProvider {
    pub fn new(settings: &UpstreamSettings) -> Self {
        Self::new_with_base_url(settings.base_url.clone(), settings.lang.clone())
    }

    pub fn new_with_base_url(base_url: String, lang: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            lang,
        }
    }

    fn build_url(&self, resource: Resource) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), resource.path())
    }
}

#[async_trait::async_trait]
impl Upstream for MivbProvider {
    fn source_name(&self) -> &'static str {
        "mivb"
    }

    async fn fetch(&self, resource: Resource, params: &[(&str, &str)]) -> Result<Vec<Record>> {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("lang", self.lang.as_str()));

        let resp = self
            .http
            .get(self.build_url(resource))
            .query(&query)
            .send()
            .await
            .with_context(|| format!("{} request failed", resource.as_str()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("{} response body read failed", resource.as_str()))?;

        if !status.is_success() {
            return Err(anyhow!(
                "{} http error status={}",
                resource.as_str(),
                status.as_u16()
            ));
        }

        let records = parse_records(&body, resource.element())
            .with_context(|| format!("{} response decode failed", resource.as_str()))?;
        tracing::debug!(
            resource = resource.as_str(),
            records = records.len(),
            "upstream fetch ok"
        );
        Ok(records)
    }
}

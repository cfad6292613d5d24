//! Shared runtime state for aerial-daemon.
//!
//! `AppState` is cheap to clone: every field is an `Arc` or a small value.
//! Route drivers and the bootstrap builders each hold their own clone.

use std::sync::Arc;

use aerial_config::{AerialConfig, SchedulerSettings};
use aerial_model::{Model, Operator, Route};
use aerial_reconcile::{reconcile_route, EventPublisher, PassOutcome, StopSnapshot};
use aerial_store::Store;
use aerial_upstream::{FetchLimiter, Resource};
use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    /// Single admission gate for every upstream fetch.
    pub limiter: Arc<FetchLimiter>,
    pub publisher: EventPublisher,
    pub operator: Operator,
    pub scheduler: SchedulerSettings,
}

impl AppState {
    pub fn new(store: Store, limiter: Arc<FetchLimiter>, config: &AerialConfig) -> Self {
        Self {
            publisher: EventPublisher::new(&store, config.events.channel.clone()),
            operator: Operator::new(&store),
            scheduler: config.scheduler.clone(),
            limiter,
            store,
        }
    }

    /// Fetch the itinerary of `route`. `Ok(None)` when the fetch deadline
    /// expired.
    pub async fn fetch_stops(&self, route: &Route) -> Result<Option<Vec<StopSnapshot>>> {
        let line = route
            .line_id()
            .await?
            .with_context(|| format!("route {} has no line attribute", route.id()))?;
        let direction = route
            .direction()
            .await?
            .with_context(|| format!("route {} has no direction attribute", route.id()))?;

        let params = [("line", line.as_str()), ("iti", direction.as_str())];
        let Some(records) = self.limiter.fetch(Resource::Itinerary, &params).await? else {
            return Ok(None);
        };
        Ok(Some(StopSnapshot::from_records(&records)))
    }

    /// Fetch then reconcile `route`. Nothing is mutated when the fetch
    /// produced no result.
    pub async fn run_route_pass(&self, route: &Route, full: bool) -> Result<Option<PassOutcome>> {
        let Some(snapshots) = self.fetch_stops(route).await? else {
            return Ok(None);
        };
        let outcome = reconcile_route(route, &snapshots, full, &self.publisher).await?;
        Ok(Some(outcome))
    }
}

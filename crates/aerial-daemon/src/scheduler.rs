//! Per-route periodic drivers.
//!
//! Each route gets one task in a `JoinSet`. Every tick runs one attempt
//! (fetch + reconcile) bounded by the configured deadline; an expired
//! attempt is dropped and the next tick starts fresh. There is no backoff
//! and no failure counter. A registry mismatch (`ResolveError`) stops the
//! driver for that route.

use aerial_model::{Model, ResolveError, Route};
use anyhow::Result;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Why a driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriverExit {
    Cancelled,
    /// Stored keys no longer decode; retrying cannot help.
    Fatal,
}

pub struct Scheduler {
    state: AppState,
    cancel: CancellationToken,
    drivers: JoinSet<(String, DriverExit)>,
}

impl Scheduler {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            cancel: CancellationToken::new(),
            drivers: JoinSet::new(),
        }
    }

    /// Token observed by every driver; cancelling it stops them all.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn spawn_route_driver(&mut self, route: Route) {
        let state = self.state.clone();
        let cancel = self.cancel.child_token();
        self.drivers.spawn(async move {
            let id = route.id().to_string();
            let exit = drive_route(state, route, cancel).await;
            (id, exit)
        });
    }

    /// One driver for every route of every known line.
    pub async fn spawn_all(&mut self) -> Result<usize> {
        let mut spawned = 0;
        for line in self.state.operator.lines().await? {
            for route in line.routes().await? {
                self.spawn_route_driver(route);
                spawned += 1;
            }
        }
        Ok(spawned)
    }

    /// Cancel every driver and wait for all of them to finish.
    pub async fn shutdown(mut self) -> Vec<(String, DriverExit)> {
        self.cancel.cancel();

        let mut exits = Vec::with_capacity(self.drivers.len());
        while let Some(joined) = self.drivers.join_next().await {
            match joined {
                Ok(exit) => exits.push(exit),
                Err(err) => tracing::warn!(error = %err, "route driver panicked"),
            }
        }
        exits.sort();
        tracing::info!(drivers = exits.len(), "route drivers stopped");
        exits
    }
}

async fn drive_route(state: AppState, route: Route, cancel: CancellationToken) -> DriverExit {
    let deadline = state.scheduler.deadline();
    let mut ticker = tokio::time::interval(state.scheduler.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Set by the first attempt that reads the topology. A route found empty
    // gets full passes until one of them completes.
    let mut needs_seed: Option<bool> = None;

    tracing::debug!(route = %route.id(), "route driver started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return DriverExit::Cancelled,
            _ = ticker.tick() => {}
        }

        let attempt = async {
            let full = match needs_seed {
                Some(full) => full,
                None => {
                    let empty = route.stops().await?.is_empty();
                    needs_seed = Some(empty);
                    empty
                }
            };
            state.run_route_pass(&route, full).await
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return DriverExit::Cancelled,
            r = tokio::time::timeout(deadline, attempt) => r,
        };

        match result {
            Ok(Ok(Some(outcome))) => {
                if outcome.full {
                    needs_seed = Some(false);
                }
                if !outcome.events.is_empty() {
                    tracing::info!(
                        route = %route.id(),
                        events = outcome.events.len(),
                        full = outcome.full,
                        "presence changed"
                    );
                }
            }
            Ok(Ok(None)) => {
                tracing::debug!(route = %route.id(), "no itinerary this cycle");
            }
            Ok(Err(err)) if err.downcast_ref::<ResolveError>().is_some() => {
                let error = format!("{err:#}");
                tracing::error!(route = %route.id(), error = %error, "route driver stopped");
                return DriverExit::Fatal;
            }
            Ok(Err(err)) => {
                let error = format!("{err:#}");
                tracing::warn!(route = %route.id(), error = %error, "route pass failed");
            }
            Err(_elapsed) => {
                tracing::debug!(
                    route = %route.id(),
                    deadline_ms = deadline.as_millis() as u64,
                    "route pass deadline expired"
                );
            }
        }
    }
}

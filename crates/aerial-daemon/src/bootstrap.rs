//! Bootstrap builders: seed lines and routes from the provider.
//!
//! Builders only add or overwrite. Stale lines stay until `delete_line` is
//! called for them explicitly.

use std::collections::BTreeSet;

use aerial_model::{
    Line, Model, ResolveError, Route, Stop, ATTR_DESTINATION, ATTR_DIRECTION, ATTR_LINE,
    DIRECTIONS,
};
use aerial_upstream::Resource;
use anyhow::{Context, Result};

use crate::state::AppState;

/// Provider field carrying the line id.
const FIELD_ID: &str = "id";
/// Query parameter naming the stop of a waiting-times request.
const PARAM_HALT: &str = "halt";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub lines: usize,
    pub routes: usize,
    /// Routes whose topology fetch produced no result this time.
    pub unseeded: usize,
    pub failed_lines: usize,
}

/// Fetch the line list, upsert every line and register it with the operator.
pub async fn refresh_lines(state: &AppState) -> Result<Vec<Line>> {
    let Some(records) = state
        .limiter
        .fetch(Resource::Lines, &[])
        .await
        .context("line list fetch failed")?
    else {
        tracing::warn!("line list fetch timed out; nothing refreshed");
        return Ok(Vec::new());
    };

    let mut lines = Vec::with_capacity(records.len());
    for record in &records {
        let Some(id) = record.get(FIELD_ID) else {
            tracing::warn!("line record without id skipped");
            continue;
        };
        let line = Line::bind(&state.store, id);
        line.set_attributes(record).await?;
        lines.push(line);
    }
    state.operator.add_lines(&lines).await?;

    tracing::info!(lines = lines.len(), "lines refreshed");
    Ok(lines)
}

/// Upsert both routes of `line` and seed their topology with a full pass.
/// Returns the routes and whether each one was seeded.
pub async fn refresh_routes(state: &AppState, line: &Line) -> Result<Vec<(Route, bool)>> {
    let attrs = line.attributes().await?;
    let mut out = Vec::with_capacity(DIRECTIONS.len());

    for direction in DIRECTIONS {
        let route = line.route(direction);
        if let Some(destination) = attrs.get(&format!("destination{direction}")) {
            route.set_attr(ATTR_DESTINATION, destination).await?;
        }
        route.set_attr(ATTR_LINE, line.id()).await?;
        route.set_attr(ATTR_DIRECTION, &direction.to_string()).await?;
        line.add_route(&route).await?;

        let seeded = state
            .run_route_pass(&route, true)
            .await
            .with_context(|| format!("seeding {route} failed"))?
            .is_some();
        if !seeded {
            tracing::warn!(route = %route.id(), "itinerary fetch timed out; topology not seeded");
        }
        out.push((route, seeded));
    }
    Ok(out)
}

/// Lines, then routes of every known line. A line whose routes fail is
/// counted and skipped; registry corruption aborts.
pub async fn refresh_all(state: &AppState) -> Result<RefreshSummary> {
    refresh_lines(state).await?;

    let mut summary = RefreshSummary::default();
    for line in state.operator.lines().await? {
        summary.lines += 1;
        match refresh_routes(state, &line).await {
            Ok(routes) => {
                summary.routes += routes.len();
                summary.unseeded += routes.iter().filter(|(_, seeded)| !seeded).count();
            }
            Err(err) if err.downcast_ref::<ResolveError>().is_some() => return Err(err),
            Err(err) => {
                summary.failed_lines += 1;
                tracing::warn!(line = %line.id(), error = %format!("{err:#}"), "route refresh failed");
            }
        }
    }

    tracing::info!(
        lines = summary.lines,
        routes = summary.routes,
        unseeded = summary.unseeded,
        failed_lines = summary.failed_lines,
        "refresh complete"
    );
    Ok(summary)
}

/// Fetch the vehicle positions reported around `stop` and write every
/// position field into its attributes, in provider order. Returns the number
/// of position records applied; a timed-out fetch applies none.
pub async fn refresh_stop(state: &AppState, stop: &Stop) -> Result<usize> {
    let params = [(PARAM_HALT, stop.id())];
    let Some(positions) = state
        .limiter
        .fetch(Resource::WaitingTimes, &params)
        .await
        .with_context(|| format!("waiting times fetch for {stop} failed"))?
    else {
        tracing::warn!(stop = %stop.id(), "waiting times fetch timed out; stop not refreshed");
        return Ok(0);
    };

    for position in &positions {
        stop.set_attributes(position).await?;
    }
    tracing::debug!(stop = %stop.id(), positions = positions.len(), "stop refreshed");
    Ok(positions.len())
}

/// Remove `line`, its routes (attributes, topology, presence) and its
/// operator membership. Stop attributes are shared and stay.
pub async fn delete_line(state: &AppState, line: &Line) -> Result<()> {
    let mut routes: BTreeSet<Route> = line.routes().await?.into_iter().collect();
    routes.extend(DIRECTIONS.iter().map(|d| line.route(*d)));

    for route in &routes {
        route.delete().await?;
    }
    line.delete().await?;
    state
        .operator
        .remove_lines(std::slice::from_ref(line))
        .await?;

    tracing::info!(line = %line.id(), routes = routes.len(), "line deleted");
    Ok(())
}

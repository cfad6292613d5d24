use std::collections::BTreeSet;

use aerial_model::{Model, Route, Stop};
use anyhow::{Context, Result};

use crate::{
    plan_movements, ChangeEvent, EventPublisher, EventStop, Movement, PassOutcome, StopSnapshot,
};

async fn describe_stop(stop: Option<&Stop>) -> Result<EventStop> {
    let Some(stop) = stop else {
        return Ok(EventStop::none());
    };
    let (lat, lon) = stop.coordinates().await?;
    Ok(EventStop {
        id: stop.id().to_string(),
        lat: lat.unwrap_or_default(),
        lon: lon.unwrap_or_default(),
    })
}

async fn describe(route: &Route, movement: &Movement<Stop>) -> Result<ChangeEvent> {
    Ok(ChangeEvent {
        route: route.id().to_string(),
        origin: describe_stop(movement.origin()).await?,
        destination: describe_stop(movement.destination()).await?,
    })
}

/// Rewrite stop attributes and the canonical order from `snapshots`. Stops
/// that are no longer listed leave the topology.
async fn refresh_topology(route: &Route, fetched: &[(Stop, &StopSnapshot)]) -> Result<()> {
    for (position, (stop, snap)) in fetched.iter().enumerate() {
        stop.set_attributes(&snap.attributes).await?;
        route.place_stop(stop, position).await?;
    }

    let listed: BTreeSet<&Stop> = fetched.iter().map(|(stop, _)| stop).collect();
    let stale: Vec<Stop> = route
        .stops()
        .await?
        .into_iter()
        .filter(|s| !listed.contains(s))
        .collect();
    if !stale.is_empty() {
        tracing::info!(route = %route.id(), stale = stale.len(), "stops dropped from topology");
        route.remove_stops(&stale).await?;
    }
    Ok(())
}

/// One reconciliation pass for `route` against freshly fetched `snapshots`
/// (provider order). Events are published in planner order; the returned
/// outcome carries them as well.
///
/// Mutations already applied are not rolled back when a later step fails.
pub async fn reconcile_route(
    route: &Route,
    snapshots: &[StopSnapshot],
    full: bool,
    publisher: &EventPublisher,
) -> Result<PassOutcome> {
    let fetched: Vec<(Stop, &StopSnapshot)> =
        snapshots.iter().map(|s| (route.stop(&s.id), s)).collect();

    let new: BTreeSet<Stop> = fetched
        .iter()
        .filter(|(_, snap)| snap.present)
        .map(|(stop, _)| stop.clone())
        .collect();

    // Read before any mutation.
    let present = route.present();
    let old: BTreeSet<Stop> = present
        .stops()
        .await
        .with_context(|| format!("read presence of {} failed", route.id()))?
        .into_iter()
        .collect();

    if full {
        refresh_topology(route, &fetched)
            .await
            .with_context(|| format!("topology refresh of {} failed", route.id()))?;
    }

    let removed: Vec<Stop> = old.difference(&new).cloned().collect();
    let added: Vec<Stop> = new.difference(&old).cloned().collect();
    if !removed.is_empty() {
        present.remove(&removed).await?;
    }
    if !added.is_empty() {
        present.add(&added).await?;
    }

    let stops = route.stops().await?;
    let movements = plan_movements(&stops, &old, &new);

    let mut events = Vec::with_capacity(movements.len());
    for movement in &movements {
        let event = describe(route, movement).await?;
        publisher.publish(&event).await?;
        events.push(event);
    }

    tracing::debug!(
        route = %route.id(),
        full,
        stops = stops.len(),
        added = added.len(),
        removed = removed.len(),
        events = events.len(),
        "route reconciled"
    );

    Ok(PassOutcome {
        full,
        stops: stops.len(),
        added: added.len(),
        removed: removed.len(),
        events,
    })
}

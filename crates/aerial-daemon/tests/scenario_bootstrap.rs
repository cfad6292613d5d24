//! Bootstrap builders against a scripted provider and the in-memory store.

mod common;

use aerial_daemon::bootstrap::{
    delete_line, refresh_all, refresh_lines, refresh_routes, refresh_stop,
};
use aerial_model::query::{list_lines, present_stops};
use aerial_model::{Line, Model, Stop};
use common::{drain, ids, record, sorted, Harness};

#[tokio::test]
async fn refresh_lines_upserts_and_registers() {
    let h = Harness::new(5_000, 5_000);
    h.script_line_one(&[], &[]);

    let lines = refresh_lines(&h.state).await.unwrap();
    assert_eq!(lines.len(), 1);

    let listed = list_lines(&h.state.operator).await.unwrap();
    assert_eq!(listed["1"]["mode"], "M");
    assert_eq!(listed["1"]["destination1"], "STOCKEL");
}

#[tokio::test]
async fn refresh_lines_skips_records_without_id_and_keeps_stale_lines() {
    let h = Harness::new(5_000, 5_000);
    h.upstream
        .set_lines(vec![record(&[("id", "7")]), record(&[("mode", "T")])]);
    refresh_lines(&h.state).await.unwrap();

    h.upstream.set_lines(vec![record(&[("id", "8")])]);
    refresh_lines(&h.state).await.unwrap();

    let listed = list_lines(&h.state.operator).await.unwrap();
    let known: Vec<&str> = listed.keys().map(String::as_str).collect();
    assert_eq!(known, vec!["7", "8"]);
}

#[tokio::test]
async fn refresh_routes_sets_attributes_and_seeds_topology() {
    let h = Harness::new(5_000, 5_000);
    h.script_line_one(&["B"], &["C"]);
    refresh_lines(&h.state).await.unwrap();

    let line = Line::bind(&h.store, "1");
    let routes = refresh_routes(&h.state, &line).await.unwrap();
    assert_eq!(routes.len(), 2);
    assert!(routes.iter().all(|(_, seeded)| *seeded));

    let outbound = line.route(1);
    let attrs = outbound.attributes().await.unwrap();
    assert_eq!(attrs["destination"], "STOCKEL");
    assert_eq!(attrs["line"], "1");
    assert_eq!(attrs["iti"], "1");
    assert_eq!(ids(&outbound.stops().await.unwrap()), vec!["A", "B", "C", "D"]);
    assert_eq!(ids(&outbound.present().stops().await.unwrap()), vec!["B"]);

    let inbound = line.route(2);
    assert_eq!(
        inbound.attr("destination").await.unwrap().as_deref(),
        Some("GARE DE L'OUEST")
    );
    assert_eq!(ids(&inbound.stops().await.unwrap()), vec!["D", "C", "B", "A"]);

    let linked: Vec<String> = line
        .routes()
        .await
        .unwrap()
        .iter()
        .map(|r| r.id().to_string())
        .collect();
    assert_eq!(sorted(linked), vec!["1.1", "1.2"]);
}

#[tokio::test]
async fn refresh_all_is_idempotent() {
    let h = Harness::new(5_000, 5_000);
    h.script_line_one(&["A", "C"], &[]);

    let first = refresh_all(&h.state).await.unwrap();
    assert_eq!(first.lines, 1);
    assert_eq!(first.routes, 2);
    assert_eq!(first.unseeded, 0);
    let keys_after_first = h.mem.keys().await;

    let mut rx = h.subscribe();
    let second = refresh_all(&h.state).await.unwrap();
    assert_eq!(second, first);
    assert!(drain(&mut rx).is_empty(), "identical refresh must not publish");
    assert_eq!(h.mem.keys().await, keys_after_first);
}

#[tokio::test]
async fn seeding_reports_vehicles_already_on_the_route() {
    let h = Harness::new(5_000, 5_000);
    h.script_line_one(&["C"], &[]);

    let mut rx = h.subscribe();
    refresh_all(&h.state).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["route"], "1.1");
    assert_eq!(events[0]["origin"]["id"], "-1");
    assert_eq!(events[0]["destination"]["id"], "C");
    assert_eq!(events[0]["destination"]["lat"], "50.2");
}

#[tokio::test]
async fn present_stops_lists_every_route() {
    let h = Harness::new(5_000, 5_000);
    h.script_line_one(&["B"], &["D"]);
    refresh_all(&h.state).await.unwrap();

    let present = present_stops(&h.state.operator).await.unwrap();
    let flat: Vec<(&str, &str, &str)> = present
        .iter()
        .map(|p| (p.line.as_str(), p.route["iti"].as_str(), p.stop["id"].as_str()))
        .collect();
    assert_eq!(flat, vec![("1", "1", "B"), ("1", "2", "D")]);
    assert_eq!(present[0].stop["name"], "STOP B");
}

#[tokio::test]
async fn delete_line_leaves_only_shared_stops() {
    let h = Harness::new(5_000, 5_000);
    h.script_line_one(&["B"], &["C"]);
    refresh_all(&h.state).await.unwrap();

    let line = Line::bind(&h.store, "1");
    delete_line(&h.state, &line).await.unwrap();

    assert!(h.state.operator.lines().await.unwrap().is_empty());
    let keys = h.mem.keys().await;
    assert!(
        keys.iter().all(|k| k.starts_with("Stop:")),
        "unexpected keys left: {keys:?}"
    );
    assert_eq!(keys.len(), 4);
}

#[tokio::test]
async fn delete_line_of_unrefreshed_line_is_harmless() {
    let h = Harness::new(5_000, 5_000);
    let line = Line::bind(&h.store, "404");
    delete_line(&h.state, &line).await.unwrap();
    assert!(h.mem.keys().await.is_empty());
}

#[tokio::test]
async fn refresh_stop_writes_positions_in_provider_order() {
    let h = Harness::new(5_000, 5_000);
    h.script_line_one(&["B"], &[]);
    refresh_all(&h.state).await.unwrap();

    h.upstream.set_waiting_times(
        "B",
        vec![
            record(&[("line", "1"), ("minutes", "4"), ("destination", "STOCKEL")]),
            record(&[("line", "5"), ("minutes", "9")]),
        ],
    );
    h.upstream
        .set_waiting_times("C", vec![record(&[("minutes", "1")])]);

    let stop = Line::bind(&h.store, "1").route(1).stop("B");
    assert_eq!(refresh_stop(&h.state, &stop).await.unwrap(), 2);

    let attrs = stop.attributes().await.unwrap();
    // Later positions overwrite shared fields; the rest accumulates.
    assert_eq!(attrs["line"], "5");
    assert_eq!(attrs["minutes"], "9");
    assert_eq!(attrs["destination"], "STOCKEL");
    // Itinerary fields are kept.
    assert_eq!(attrs["name"], "STOP B");
    assert!(attrs.contains_key("latitude"));
}

#[tokio::test]
async fn refresh_stop_without_positions_changes_nothing() {
    let h = Harness::new(5_000, 5_000);
    let stop = Stop::bind(&h.store, "Z");
    assert_eq!(refresh_stop(&h.state, &stop).await.unwrap(), 0);
    assert!(stop.attributes().await.unwrap().is_empty());
    assert!(h.mem.keys().await.is_empty());
}

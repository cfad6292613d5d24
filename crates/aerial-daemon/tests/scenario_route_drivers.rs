//! Route drivers under paused time: periodic passes, deadline expiry,
//! registry errors and shutdown draining.

mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aerial_daemon::bootstrap::refresh_all;
use aerial_daemon::scheduler::{DriverExit, Scheduler};
use aerial_model::{Line, Model};
use aerial_store::{KeyStore, MemoryStore, Store};
use anyhow::Result;
use common::{drain, ids, itinerary, Harness};

async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Memory store whose sorted-set writes take 50 ms each while `slow` is set.
struct SlowTopology {
    inner: Arc<MemoryStore>,
    slow: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl KeyStore for SlowTopology {
    fn backend_name(&self) -> &'static str {
        "slow-topology"
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.inner.hget(key, field).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.inner.hset(key, field, value).await
    }

    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>> {
        self.inner.hgetall(key).await
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<()> {
        self.inner.sadd(key, members).await
    }

    async fn srem(&self, key: &str, members: &[String]) -> Result<()> {
        self.inner.srem(key, members).await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.inner.smembers(key).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.zadd(key, member, score).await
    }

    async fn zrem(&self, key: &str, members: &[String]) -> Result<()> {
        self.inner.zrem(key, members).await
    }

    async fn zrange_withscores(&self, key: &str) -> Result<Vec<(String, f64)>> {
        self.inner.zrange_withscores(key).await
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        self.inner.publish(channel, payload).await
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.inner.del(key).await
    }
}

#[tokio::test(start_paused = true)]
async fn driver_publishes_movement_on_next_tick() {
    let h = Harness::new(1_000, 500);
    h.script_line_one(&["A"], &[]);
    refresh_all(&h.state).await.unwrap();

    h.upstream
        .set_itinerary("1", "1", itinerary(&["A", "B", "C", "D"], &["B"]));
    let mut rx = h.subscribe();

    let mut scheduler = Scheduler::new(h.state.clone());
    assert_eq!(scheduler.spawn_all().await.unwrap(), 2);
    settle(100).await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["route"], "1.1");
    assert_eq!(events[0]["origin"]["id"], "A");
    assert_eq!(events[0]["destination"]["id"], "B");

    // Same snapshot on the following ticks: nothing more to say.
    settle(3_000).await;
    assert!(drain(&mut rx).is_empty());

    let exits = scheduler.shutdown().await;
    assert_eq!(
        exits,
        vec![
            ("1.1".to_string(), DriverExit::Cancelled),
            ("1.2".to_string(), DriverExit::Cancelled),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn driver_ticks_at_the_configured_interval() {
    let h = Harness::new(1_000, 500);
    h.script_line_one(&[], &[]);
    refresh_all(&h.state).await.unwrap();
    let before = h.upstream.calls();

    let mut scheduler = Scheduler::new(h.state.clone());
    scheduler.spawn_route_driver(Line::bind(&h.store, "1").route(1));
    settle(3_500).await;

    // Ticks at 0, 1000, 2000 and 3000 ms.
    assert_eq!(h.upstream.calls() - before, 4);
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn first_pass_seeds_missing_topology() {
    let h = Harness::new(1_000, 500);
    h.script_line_one(&["C"], &[]);

    // Route attributes exist but topology was never fetched.
    let route = Line::bind(&h.store, "1").route(1);
    route.set_attr("line", "1").await.unwrap();
    route.set_attr("iti", "1").await.unwrap();

    let mut scheduler = Scheduler::new(h.state.clone());
    scheduler.spawn_route_driver(route.clone());
    settle(100).await;

    assert_eq!(ids(&route.stops().await.unwrap()), vec!["A", "B", "C", "D"]);
    assert_eq!(ids(&route.present().stops().await.unwrap()), vec!["C"]);
    let stop = route.stop("C");
    assert_eq!(stop.attr("name").await.unwrap().as_deref(), Some("STOP C"));
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn seeding_cut_short_is_retried_in_full() {
    let slow = Arc::new(AtomicBool::new(true));
    let h = {
        let slow = slow.clone();
        Harness::with_store(1_000, 500, move |inner| {
            Arc::new(SlowTopology { inner, slow }) as Store
        })
    };

    let names: Vec<String> = (0..20).map(|i| format!("S{i:02}")).collect();
    let stops: Vec<&str> = names.iter().map(String::as_str).collect();
    h.upstream.set_itinerary("1", "1", itinerary(&stops, &["S05"]));

    let route = Line::bind(&h.store, "1").route(1);
    route.set_attr("line", "1").await.unwrap();
    route.set_attr("iti", "1").await.unwrap();
    let mut rx = h.subscribe();

    let mut scheduler = Scheduler::new(h.state.clone());
    scheduler.spawn_route_driver(route.clone());

    // Twenty writes at 50 ms do not fit the 500 ms deadline.
    settle(700).await;
    let partial = route.stops().await.unwrap().len();
    assert!(partial > 0 && partial < 20, "partial topology: {partial}");
    assert!(route.present().stops().await.unwrap().is_empty());
    assert!(drain(&mut rx).is_empty());

    // The next tick must seed again rather than run a light pass.
    slow.store(false, Ordering::SeqCst);
    settle(400).await;
    assert_eq!(ids(&route.stops().await.unwrap()), names);
    assert_eq!(ids(&route.present().stops().await.unwrap()), vec!["S05"]);
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["destination"]["id"], "S05");

    // Once seeded, later passes are light and quiet.
    settle(2_000).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(route.stops().await.unwrap().len(), 20);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn expired_attempt_changes_nothing() {
    let h = Harness::new(1_000, 500);
    h.script_line_one(&["A"], &[]);
    refresh_all(&h.state).await.unwrap();

    h.upstream
        .set_itinerary("1", "1", itinerary(&["A", "B", "C", "D"], &["D"]));
    h.upstream.set_delay(Duration::from_millis(800));
    let mut rx = h.subscribe();

    let route = Line::bind(&h.store, "1").route(1);
    let mut scheduler = Scheduler::new(h.state.clone());
    scheduler.spawn_route_driver(route.clone());
    // Attempts at 0, 1000, 2000 and 3000 ms all expire before 3500 ms.
    settle(3_600).await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(ids(&route.present().stops().await.unwrap()), vec!["A"]);
    assert!(h.upstream.calls() >= 3);
    assert_eq!(h.state.limiter.in_flight(), 0);

    // Provider recovers: the next tick goes through.
    h.upstream.set_delay(Duration::ZERO);
    settle(1_000).await;
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["destination"]["id"], "D");

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn registry_error_stops_only_that_driver() {
    let h = Harness::new(1_000, 500);
    h.script_line_one(&[], &[]);
    refresh_all(&h.state).await.unwrap();

    // A member with an unknown kind makes the topology undecodable.
    h.store
        .zadd("Route:1.1:zset", "Depot:9", 99.0)
        .await
        .unwrap();

    let mut scheduler = Scheduler::new(h.state.clone());
    scheduler.spawn_all().await.unwrap();
    settle(2_500).await;

    let exits = scheduler.shutdown().await;
    assert_eq!(
        exits,
        vec![
            ("1.1".to_string(), DriverExit::Fatal),
            ("1.2".to_string(), DriverExit::Cancelled),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_drains_drivers_stuck_in_a_fetch() {
    let h = Harness::new(10_000, 10_000);
    h.script_line_one(&[], &[]);
    refresh_all(&h.state).await.unwrap();
    h.upstream.set_delay(Duration::from_secs(3_600));

    let mut scheduler = Scheduler::new(h.state.clone());
    scheduler.spawn_all().await.unwrap();
    settle(100).await;
    assert_eq!(scheduler.len(), 2);
    assert_eq!(h.state.limiter.in_flight(), 2);

    let exits = scheduler.shutdown().await;
    assert_eq!(exits.len(), 2);
    assert!(exits.iter().all(|(_, exit)| *exit == DriverExit::Cancelled));
    assert_eq!(h.state.limiter.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_token_stops_drivers_before_shutdown_is_awaited() {
    let h = Harness::new(1_000, 500);
    h.script_line_one(&[], &[]);
    refresh_all(&h.state).await.unwrap();

    let mut scheduler = Scheduler::new(h.state.clone());
    scheduler.spawn_all().await.unwrap();
    settle(100).await;
    let calls = h.upstream.calls();

    scheduler.cancel_token().cancel();
    settle(5_000).await;
    assert_eq!(h.upstream.calls(), calls);

    assert_eq!(scheduler.shutdown().await.len(), 2);
}

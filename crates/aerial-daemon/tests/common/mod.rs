//! Scripted provider and state wiring shared by the daemon scenarios.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aerial_config::AerialConfig;
use aerial_daemon::state::AppState;
use aerial_store::{MemoryStore, Store, Subscription};
use aerial_upstream::{FetchLimiter, Record, Resource, Upstream};
use anyhow::Result;

pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Itinerary records for `stops`, flagging `present` ones.
pub fn itinerary(stops: &[&str], present: &[&str]) -> Vec<Record> {
    stops
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let flag = if present.contains(id) { "TRUE" } else { "FALSE" };
            let name = format!("STOP {id}");
            let lat = format!("50.{i}");
            let lon = format!("4.{i}");
            record(&[
                ("id", *id),
                ("name", &name),
                ("latitude", &lat),
                ("longitude", &lon),
                ("present", flag),
            ])
        })
        .collect()
}

/// Provider answering from in-memory tables, optionally slowly.
#[derive(Default)]
pub struct ScriptedUpstream {
    lines: Mutex<Vec<Record>>,
    itineraries: Mutex<HashMap<(String, String), Vec<Record>>>,
    waiting: Mutex<HashMap<String, Vec<Record>>>,
    delay: Mutex<Duration>,
    pub calls: AtomicUsize,
}

impl ScriptedUpstream {
    pub fn set_lines(&self, lines: Vec<Record>) {
        *self.lines.lock().unwrap() = lines;
    }

    pub fn set_itinerary(&self, line: &str, iti: &str, records: Vec<Record>) {
        self.itineraries
            .lock()
            .unwrap()
            .insert((line.to_string(), iti.to_string()), records);
    }

    pub fn set_waiting_times(&self, halt: &str, positions: Vec<Record>) {
        self.waiting
            .lock()
            .unwrap()
            .insert(halt.to_string(), positions);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Upstream for ScriptedUpstream {
    fn source_name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, resource: Resource, params: &[(&str, &str)]) -> Result<Vec<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let param = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
                .unwrap_or_default()
        };
        match resource {
            Resource::Lines => Ok(self.lines.lock().unwrap().clone()),
            Resource::Itinerary => Ok(self
                .itineraries
                .lock()
                .unwrap()
                .get(&(param("line"), param("iti")))
                .cloned()
                .unwrap_or_default()),
            Resource::WaitingTimes => Ok(self
                .waiting
                .lock()
                .unwrap()
                .get(&param("halt"))
                .cloned()
                .unwrap_or_default()),
        }
    }
}

pub struct Harness {
    pub mem: Arc<MemoryStore>,
    pub store: Store,
    pub upstream: Arc<ScriptedUpstream>,
    pub state: AppState,
}

impl Harness {
    pub fn new(interval_ms: u64, deadline_ms: u64) -> Self {
        Self::with_store(interval_ms, deadline_ms, |mem| mem as Store)
    }

    /// Like [`Harness::new`], with the daemon's store wrapped by `wrap`.
    pub fn with_store(
        interval_ms: u64,
        deadline_ms: u64,
        wrap: impl FnOnce(Arc<MemoryStore>) -> Store,
    ) -> Self {
        let mut config = AerialConfig::default();
        config.scheduler.interval_ms = interval_ms;
        config.scheduler.deadline_ms = deadline_ms;
        config.upstream.fetch_timeout_ms = 60_000;

        let mem = Arc::new(MemoryStore::new());
        let store = wrap(mem.clone());
        let upstream = Arc::new(ScriptedUpstream::default());
        let limiter = Arc::new(FetchLimiter::from_settings(
            upstream.clone(),
            &config.upstream,
        ));
        let state = AppState::new(store.clone(), limiter, &config);
        Self {
            mem,
            store,
            upstream,
            state,
        }
    }

    /// Line 1 with two directions over stops A..D.
    pub fn script_line_one(&self, present_1: &[&str], present_2: &[&str]) {
        self.upstream.set_lines(vec![record(&[
            ("id", "1"),
            ("mode", "M"),
            ("destination1", "STOCKEL"),
            ("destination2", "GARE DE L'OUEST"),
        ])]);
        self.upstream
            .set_itinerary("1", "1", itinerary(&["A", "B", "C", "D"], present_1));
        self.upstream
            .set_itinerary("1", "2", itinerary(&["D", "C", "B", "A"], present_2));
    }

    /// Events on the channel the daemon publishes to.
    pub fn subscribe(&self) -> Subscription {
        self.mem.subscribe(self.state.publisher.channel())
    }
}

pub fn drain(rx: &mut Subscription) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Some(payload) = rx.try_recv() {
        if let Ok(v) = serde_json::from_str(&payload) {
            out.push(v);
        }
    }
    out
}

pub fn ids(stops: &[aerial_model::Stop]) -> Vec<String> {
    use aerial_model::Model;
    stops.iter().map(|s| s.id().to_string()).collect()
}

pub fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

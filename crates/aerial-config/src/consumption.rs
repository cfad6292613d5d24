/// JSON-pointer prefixes actually read by `AerialConfig`.
///
/// Keep this in lockstep with `settings.rs`: a prefix listed here but never
/// deserialized hides typos in operator YAML.
pub fn consumed_pointers() -> &'static [&'static str] {
    CONSUMED
}

static CONSUMED: &[&str] = &[
    "/store/backend",
    "/store/url",
    "/upstream/base_url",
    "/upstream/lang",
    "/upstream/max_in_flight",
    "/upstream/fetch_timeout_ms",
    "/scheduler/interval_ms",
    "/scheduler/deadline_ms",
    "/events/channel",
];

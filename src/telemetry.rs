//! Telemetry metric name constants.
//!
//! Centralised metric names for larder operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `larder_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `tier` — cache tier that served a hit: "memory" or "durable"
//! - `provider` — provider name (e.g. "spoonacular", "mealdb")
//! - `operation` — gateway operation (e.g. "search", "details")
//! - `status` — outcome: "ok" or "error"
//! - `source` — where a fallback result came from: "fallback" or "samples"

/// Total cache hits.
///
/// Labels: `tier` ("memory" | "durable").
pub const CACHE_HITS_TOTAL: &str = "larder_cache_hits_total";

/// Total cache misses (both tiers missed).
pub const CACHE_MISSES_TOTAL: &str = "larder_cache_misses_total";

/// Total entries evicted from the in-memory tier because it was full.
pub const CACHE_EVICTIONS_TOTAL: &str = "larder_cache_evictions_total";

/// Total requests sent to a keyed provider.
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "larder_requests_total";

/// Provider request duration in seconds.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "larder_request_duration_seconds";

/// Total requests the provider refused for quota reasons.
///
/// Labels: `provider`.
pub const QUOTA_REJECTIONS_TOTAL: &str = "larder_quota_rejections_total";

/// Total credentials that transitioned to exhausted.
pub const CREDENTIALS_EXHAUSTED_TOTAL: &str = "larder_credentials_exhausted_total";

/// Total results served by a fallback source instead of the primary gateway.
///
/// Labels: `source` ("fallback" | "samples").
pub const FALLBACKS_TOTAL: &str = "larder_fallbacks_total";

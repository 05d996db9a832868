//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name ("openai", "anthropic", "google")
//! - `model`: model identifier
//! - `status`: outcome: "ok" or "error"
//! - `layer`: cache layer: "prompt" or a namespace name

/// Total generation calls dispatched through the provider registry.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Provider call duration in seconds.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "huginn_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "huginn_retries_total";

/// Total fallbacks from a failed primary model to a secondary provider.
///
/// Labels: `from`, `to` (provider names).
pub const FALLBACKS_TOTAL: &str = "huginn_fallbacks_total";

/// Total cache hits.
///
/// Labels: `layer`.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total cache misses.
///
/// Labels: `layer`.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total requests answered by the whitelist short-circuit.
pub const WHITELIST_HITS_TOTAL: &str = "huginn_whitelist_hits_total";

/// Estimated spend in USD per generated result.
///
/// Labels: `model`.
pub const COST_USD: &str = "huginn_cost_usd";

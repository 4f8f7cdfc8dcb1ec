//! Logger category constants (§6 "Logger").
//!
//! The original logger is category-based (`isEnabled`/`logError`/etc. per
//! dotted category). We use `tracing` directly and keep these as the
//! target strings passed to `tracing::event!(target: ..., ...)`, so the
//! four categories spec.md calls out stay addressable by name.

/// General provider lifecycle and hierarchy-building events.
pub const PROVIDER: &str = "htree::provider";

/// Timing spans around hierarchy-level building, merging and caching.
pub const PERFORMANCE_PROVIDER: &str = "htree::performance::provider";

/// ECSQL query construction and execution events.
pub const QUERIES: &str = "htree::queries";

/// Timing spans around query execution and row consumption.
pub const PERFORMANCE_QUERIES: &str = "htree::performance::queries";

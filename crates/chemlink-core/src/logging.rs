//! Structured logging field names for chemlink.
//!
//! All crates use these constants for consistent structured logging fields.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-line output, high-volume data (matcher hits) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "convert", "render", "search", "engine", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pipeline", "openbabel", "indigo", "file_index", "scheduler"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "convert", "render", "save", "search", "reindex"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// External identifier of a saved structure.
pub const CHEMICAL_ID: &str = "chemical_id";

/// Truncated preview of caller input.
pub const INPUT_PREVIEW: &str = "input";

/// Requested output format.
pub const OUTPUT_FORMAT: &str = "output_format";

/// Strategy or backend name inside a fallback chain.
pub const STRATEGY: &str = "strategy";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search.
pub const RESULT_COUNT: &str = "result_count";

/// Number of lines captured from an external command.
pub const LINE_COUNT: &str = "line_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

//! Centralized default constants for chemlink.
//!
//! Every crate references these constants instead of defining its own magic
//! numbers. Organized by domain area.

// =============================================================================
// INPUT HANDLING
// =============================================================================

/// Maximum number of input characters echoed back in errors and logs.
pub const INPUT_PREVIEW_CHARS: usize = 50;

// =============================================================================
// CONVERSION
// =============================================================================

/// Output format requested when canonicalizing structures for search.
pub const CANONICAL_FORMAT: &str = "smiles";

/// Intermediate format used by the normalize-then-render strategy.
pub const RENDER_INTERMEDIATE_FORMAT: &str = "mol";

/// Output formats the embedded toolkit can emit.
pub const EMBEDDED_OUTPUT_FORMATS: &[&str] = &["cdx", "cdxml", "smiles", "smi", "ket", "mol"];

// =============================================================================
// RENDERING
// =============================================================================

/// Image width and height used when the caller gives none.
pub const IMAGE_SIZE_PX: u32 = 500;

/// Margin (pixels) the embedded renderer leaves around a structure.
pub const RENDER_MARGIN_PX: i32 = 10;

/// Message carried by `RenderFailure` when every strategy misses.
pub const RENDER_FAILURE_MSG: &str = "Failed to generate image with all available libraries.";

// =============================================================================
// EXTERNAL TOOLS
// =============================================================================

/// Default `obabel` executable (resolved through PATH).
pub const OBABEL_PROGRAM: &str = "obabel";

/// Per-command timeout for external chemistry tools (seconds).
pub const ENGINE_CMD_TIMEOUT_SECS: u64 = 30;

/// Banner the external converter prints instead of data when it cannot
/// process its input (also printed on a bare invocation).
pub const OBABEL_BANNER_PATTERN: &str = r"Open Babel 3\.\d+\.\d+ --";

/// Hit limit passed to the accelerated index search.
pub const FAST_SEARCH_MAX_HITS: u64 = 10_000_000;

// =============================================================================
// SEARCH INDEX
// =============================================================================

/// Default directory for the file-backed index.
pub const SEARCH_FILE_DIR: &str = "chemistry-index";

/// Extension of the master and delta logs (one `<smiles> <id>` per line).
pub const CHEM_FILE_FORMAT: &str = "smi";

/// Default reindex interval in seconds (5 minutes).
///
/// Each cycle rebuilds the accelerated index from the full master log, so
/// the cost per cycle grows with the number of saved records.
pub const SEARCH_INDEX_INTERVAL_SECS: u64 = 300;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8090;

/// Default database URL for the relational index backend.
pub const DATABASE_URL: &str = "postgres://localhost/chemistry";

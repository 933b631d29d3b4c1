//! Core traits for chemlink abstractions.
//!
//! Every chemistry backend sits behind one of these seams so the fallback
//! pipelines and the search index can be driven by fakes in tests.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// CONVERSION & RENDERING TRAITS
// =============================================================================

/// One backend in the conversion fallback chain.
///
/// `Ok(None)` is a soft miss: the backend ran but could not produce output
/// for this input, and the pipeline moves on to the next convertor.
#[async_trait]
pub trait Convertor: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Whether the backend needs the caller to name the input format.
    fn requires_input_format(&self) -> bool;

    /// Whether the backend can emit `format` at all.
    fn supports_output(&self, format: &str) -> bool;

    async fn convert(&self, request: &ConversionRequest) -> Result<Option<String>>;
}

/// One strategy in the image render chain.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render the structure, or `Ok(None)` to let the next strategy try.
    async fn generate(&self, request: &RenderRequest) -> Result<Option<Vec<u8>>>;
}

// =============================================================================
// SEARCH TRAITS
// =============================================================================

/// A searchable collection of canonicalized structures.
#[async_trait]
pub trait ChemicalIndex: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Create backing storage if absent. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Persist a record. Findable by `search` as soon as this returns.
    async fn save(&self, record: &ChemicalRecord) -> Result<()>;

    /// External ids of every stored structure matching `term`.
    async fn search(&self, term: &str, search_type: SearchType) -> Result<BTreeSet<String>>;

    /// Fold recently saved records into the accelerated index.
    async fn reindex(&self) -> Result<()>;

    /// Remove every record and re-initialize empty storage.
    async fn clear_all(&self) -> Result<()>;
}

/// Structure matching over `<smiles> <id>` files, used by file-backed indexes.
#[async_trait]
pub trait StructureMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw matching lines from `file`. An empty result is not an error.
    async fn search(&self, file: &Path, term: &str, search_type: SearchType)
        -> Result<Vec<String>>;

    /// Build the accelerated index at `target` from every line of `source`.
    async fn build_index(&self, source: &Path, target: &Path) -> Result<()>;
}

// =============================================================================
// EMBEDDED TOOLKIT TRAITS
// =============================================================================

/// Opaque handle to a structure loaded inside a [`ToolkitSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructureHandle(pub i32);

/// An in-process structure toolkit.
///
/// Calls are synchronous; async callers run them on a blocking thread.
pub trait StructureToolkit: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open an isolated session. Handles never outlive their session.
    fn open_session(&self) -> Result<Box<dyn ToolkitSession + '_>>;
}

/// Per-call toolkit state.
///
/// `Error::Toolkit` from any method means the toolkit rejected this
/// structure or operation, not that the toolkit is unavailable.
pub trait ToolkitSession {
    /// Structural validity check; returns the toolkit's diagnostic text.
    fn check_structure(&self, input: &str) -> Result<String>;

    fn load(&self, input: &str, kind: StructureKind) -> Result<StructureHandle>;

    /// Serialize to `format`, `Ok(None)` if the toolkit has no writer for it.
    fn to_format(&self, handle: StructureHandle, format: &str) -> Result<Option<String>>;

    /// Lay out and draw the structure. `format` is PNG or SVG.
    fn render(&self, handle: StructureHandle, format: ImageFormat, size: ImageSize)
        -> Result<Vec<u8>>;

    fn canonicalize(&self, handle: StructureHandle) -> Result<String>;

    /// Per connected component properties.
    fn components(&self, handle: StructureHandle) -> Result<Vec<ComponentProperties>>;

    /// Gross formula of the whole structure.
    fn formula(&self, handle: StructureHandle) -> Result<String>;
}

//! # chemlink-convert
//!
//! Conversion, canonicalization, rendering and property extraction for
//! chemlink, each driven as an ordered fallback over the chemistry engines.

pub mod canonical;
pub mod convertors;
pub mod extract;
pub mod pipeline;
pub mod render;

pub use canonical::Canonicalizer;
pub use convertors::{EmbeddedConvertor, OpenBabelConvertor};
pub use extract::ExtractService;
pub use pipeline::ConversionPipeline;
pub use render::{RenderPipeline, RenderedImage};

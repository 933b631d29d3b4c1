//! Render strategies, ordered from most faithful to most robust.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use chemlink_core::defaults::RENDER_INTERMEDIATE_FORMAT;
use chemlink_core::{ConversionRequest, ImageGenerator, RenderRequest, Result};
use chemlink_engines::{EmbeddedEngine, OpenBabel};

use crate::pipeline::ConversionPipeline;

/// Embedded toolkit, straight from the caller's input.
pub struct EmbeddedImageGenerator {
    engine: EmbeddedEngine,
}

impl EmbeddedImageGenerator {
    pub fn new(engine: EmbeddedEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ImageGenerator for EmbeddedImageGenerator {
    fn name(&self) -> &'static str {
        "embedded_original"
    }

    async fn generate(&self, request: &RenderRequest) -> Result<Option<Vec<u8>>> {
        self.engine.render(request).await
    }
}

/// Embedded toolkit after normalizing the input to a molfile.
///
/// Loses some notation-specific detail but loads far more reliably than
/// arbitrary formats.
pub struct NormalizedImageGenerator {
    pipeline: ConversionPipeline,
    engine: EmbeddedEngine,
}

impl NormalizedImageGenerator {
    pub fn new(pipeline: ConversionPipeline, engine: EmbeddedEngine) -> Self {
        Self { pipeline, engine }
    }
}

#[async_trait]
impl ImageGenerator for NormalizedImageGenerator {
    fn name(&self) -> &'static str {
        "embedded_normalized"
    }

    async fn generate(&self, request: &RenderRequest) -> Result<Option<Vec<u8>>> {
        let conversion = ConversionRequest::with_input_format(
            request.input.clone(),
            request.input_format.clone(),
            RENDER_INTERMEDIATE_FORMAT,
        );
        let normalized = match self.pipeline.convert(&conversion).await {
            Ok(mol) => mol,
            Err(e) if e.is_client_error() => {
                warn!(
                    subsystem = "render",
                    component = "generator",
                    strategy = self.name(),
                    error = %e,
                    "Could not normalize input for rendering"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        debug!(
            subsystem = "render",
            strategy = self.name(),
            "Rendering normalized structure"
        );

        let normalized_request = RenderRequest {
            input: normalized,
            input_format: RENDER_INTERMEDIATE_FORMAT.to_string(),
            format: request.format,
            size: request.size,
        };
        self.engine.render(&normalized_request).await
    }
}

/// obabel, from the caller's input and declared format.
pub struct OpenBabelImageGenerator {
    obabel: Arc<OpenBabel>,
}

impl OpenBabelImageGenerator {
    pub fn new(obabel: Arc<OpenBabel>) -> Self {
        Self { obabel }
    }
}

#[async_trait]
impl ImageGenerator for OpenBabelImageGenerator {
    fn name(&self) -> &'static str {
        "openbabel"
    }

    async fn generate(&self, request: &RenderRequest) -> Result<Option<Vec<u8>>> {
        self.obabel.render(request).await
    }
}

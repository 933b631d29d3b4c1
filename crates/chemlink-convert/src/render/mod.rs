//! Image rendering with strategy fallback.

mod generators;
mod jpeg;

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use chemlink_core::defaults::RENDER_FAILURE_MSG;
use chemlink_core::{
    input_preview, Error, ImageFormat, ImageGenerator, ImageRequest, ImageSize, RenderRequest,
    Result,
};
use chemlink_engines::{EmbeddedEngine, OpenBabel};

use crate::pipeline::ConversionPipeline;

pub use generators::{EmbeddedImageGenerator, NormalizedImageGenerator, OpenBabelImageGenerator};
pub use jpeg::png_to_jpeg;

/// A finished image and its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl RenderedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Tries each generator in order until one yields a non-empty image.
#[derive(Clone)]
pub struct RenderPipeline {
    generators: Vec<Arc<dyn ImageGenerator>>,
}

impl RenderPipeline {
    pub fn new(generators: Vec<Arc<dyn ImageGenerator>>) -> Self {
        Self { generators }
    }

    /// Original input via the embedded toolkit, then a molfile-normalized
    /// render, then obabel.
    pub fn standard(
        pipeline: ConversionPipeline,
        embedded: EmbeddedEngine,
        obabel: Arc<OpenBabel>,
    ) -> Self {
        Self::new(vec![
            Arc::new(EmbeddedImageGenerator::new(embedded.clone())),
            Arc::new(NormalizedImageGenerator::new(pipeline, embedded)),
            Arc::new(OpenBabelImageGenerator::new(obabel)),
        ])
    }

    pub async fn render(&self, request: &ImageRequest) -> Result<RenderedImage> {
        if request.input.trim().is_empty() {
            return Err(Error::InvalidInput("input must not be empty".to_string()));
        }
        let format = ImageFormat::parse(&request.output_format)?;
        let size = ImageSize::from_request(request.width.as_deref(), request.height.as_deref())?;

        let start = Instant::now();
        info!(
            subsystem = "render",
            component = "pipeline",
            op = "render",
            output_format = format.extension(),
            width = size.width,
            height = size.height,
            input = %input_preview(&request.input),
            "Rendering structure"
        );

        let render_request = RenderRequest {
            input: request.input.clone(),
            input_format: request.input_format.trim().to_string(),
            format: format.render_format(),
            size,
        };

        let mut rendered = None;
        for generator in &self.generators {
            match generator.generate(&render_request).await? {
                Some(bytes) if !bytes.is_empty() => {
                    info!(
                        subsystem = "render",
                        component = "pipeline",
                        op = "render",
                        strategy = generator.name(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Render complete"
                    );
                    rendered = Some(bytes);
                    break;
                }
                _ => {
                    warn!(
                        subsystem = "render",
                        component = "pipeline",
                        strategy = generator.name(),
                        "Generator produced no image, falling back"
                    );
                }
            }
        }

        let bytes = rendered.ok_or_else(|| Error::RenderFailure(RENDER_FAILURE_MSG.to_string()))?;
        let bytes = match format {
            ImageFormat::Jpeg => png_to_jpeg(&bytes)?,
            _ => bytes,
        };
        Ok(RenderedImage { format, bytes })
    }
}

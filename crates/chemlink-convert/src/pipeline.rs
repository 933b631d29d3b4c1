//! Ordered fallback over conversion backends.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use chemlink_core::{ConversionRequest, Convertor, Error, Result};
use chemlink_engines::{EmbeddedEngine, OpenBabel};

use crate::convertors::{EmbeddedConvertor, OpenBabelConvertor};

/// Tries each applicable convertor in order until one produces output.
///
/// A convertor that needs an explicit input format is skipped when the
/// request has none. Soft misses fall through to the next convertor; hard
/// errors stop the chain.
#[derive(Clone)]
pub struct ConversionPipeline {
    convertors: Vec<Arc<dyn Convertor>>,
}

impl ConversionPipeline {
    pub fn new(convertors: Vec<Arc<dyn Convertor>>) -> Self {
        Self { convertors }
    }

    /// obabel first (it parses by declared format), then the embedded toolkit.
    pub fn standard(obabel: Arc<OpenBabel>, embedded: EmbeddedEngine) -> Self {
        Self::new(vec![
            Arc::new(OpenBabelConvertor::new(obabel)),
            Arc::new(EmbeddedConvertor::new(embedded)),
        ])
    }

    pub async fn convert(&self, request: &ConversionRequest) -> Result<String> {
        if request.input.trim().is_empty() {
            return Err(Error::InvalidInput("input must not be empty".to_string()));
        }
        let format = request.output_format.trim();
        if format.is_empty() {
            return Err(Error::InvalidInput("outputFormat must not be empty".to_string()));
        }

        let start = Instant::now();
        info!(
            subsystem = "convert",
            component = "pipeline",
            op = "convert",
            input_format = %request.input_format,
            output_format = format,
            input = %request.preview(),
            "Converting structure"
        );

        let candidates: Vec<&Arc<dyn Convertor>> = self
            .convertors
            .iter()
            .filter(|c| request.has_input_format() || !c.requires_input_format())
            .filter(|c| c.supports_output(format))
            .collect();

        if candidates.is_empty() {
            debug!(
                subsystem = "convert",
                component = "pipeline",
                output_format = format,
                "No convertor can emit format"
            );
            return Err(Error::UnsupportedFormat(format.to_string()));
        }

        for convertor in candidates {
            match convertor.convert(request).await? {
                Some(output) if !output.trim().is_empty() => {
                    info!(
                        subsystem = "convert",
                        component = "pipeline",
                        op = "convert",
                        strategy = convertor.name(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Conversion complete"
                    );
                    return Ok(output);
                }
                _ => {
                    warn!(
                        subsystem = "convert",
                        component = "pipeline",
                        strategy = convertor.name(),
                        output_format = format,
                        input = %request.preview(),
                        "Convertor produced no output, falling back"
                    );
                }
            }
        }

        Err(Error::InvalidStructure(format!(
            "Unable to perform conversion to {}. Input: {}",
            format,
            request.preview()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Hit(&'static str),
        Miss,
        Fail,
    }

    struct Scripted {
        name: &'static str,
        needs_format: bool,
        formats: &'static [&'static str],
        reply: Reply,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            needs_format: bool,
            formats: &'static [&'static str],
            reply: Reply,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                needs_format,
                formats,
                reply,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Convertor for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn requires_input_format(&self) -> bool {
            self.needs_format
        }

        fn supports_output(&self, format: &str) -> bool {
            self.formats.contains(&format)
        }

        async fn convert(&self, _request: &ConversionRequest) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Hit(out) => Ok(Some(out.to_string())),
                Reply::Miss => Ok(None),
                Reply::Fail => Err(Error::Command("obabel timed out after 30s".to_string())),
            }
        }
    }

    const ALL: &[&str] = &["mol", "smiles", "cdxml"];

    #[tokio::test]
    async fn test_first_hit_wins() {
        let first = Scripted::new("first", true, ALL, Reply::Hit("from-first"));
        let second = Scripted::new("second", false, ALL, Reply::Hit("from-second"));
        let pipeline = ConversionPipeline::new(vec![first.clone(), second.clone()]);

        let out = pipeline
            .convert(&ConversionRequest::with_input_format("CCC", "smiles", "mol"))
            .await
            .unwrap();
        assert_eq!(out, "from-first");
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_soft_miss_falls_through() {
        let first = Scripted::new("first", true, ALL, Reply::Miss);
        let second = Scripted::new("second", false, ALL, Reply::Hit("from-second"));
        let pipeline = ConversionPipeline::new(vec![first.clone(), second]);

        let out = pipeline
            .convert(&ConversionRequest::with_input_format("CCC", "smiles", "mol"))
            .await
            .unwrap();
        assert_eq!(out, "from-second");
        assert_eq!(first.calls(), 1);
    }

    #[tokio::test]
    async fn test_format_dependent_convertor_skipped_without_input_format() {
        let first = Scripted::new("first", true, ALL, Reply::Hit("from-first"));
        let second = Scripted::new("second", false, ALL, Reply::Hit("from-second"));
        let pipeline = ConversionPipeline::new(vec![first.clone(), second]);

        let out = pipeline
            .convert(&ConversionRequest::new("CCC", "mol"))
            .await
            .unwrap();
        assert_eq!(out, "from-second");
        assert_eq!(first.calls(), 0);
    }

    #[tokio::test]
    async fn test_hard_error_stops_chain() {
        let first = Scripted::new("first", true, ALL, Reply::Fail);
        let second = Scripted::new("second", false, ALL, Reply::Hit("from-second"));
        let pipeline = ConversionPipeline::new(vec![first, second.clone()]);

        let err = pipeline
            .convert(&ConversionRequest::with_input_format("CCC", "smiles", "mol"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_miss_is_invalid_structure() {
        let first = Scripted::new("first", true, ALL, Reply::Miss);
        let second = Scripted::new("second", false, ALL, Reply::Miss);
        let pipeline = ConversionPipeline::new(vec![first, second]);

        let err = pipeline
            .convert(&ConversionRequest::new("not-a-structure", "cdxml"))
            .await
            .unwrap_err();
        match err {
            Error::InvalidStructure(msg) => {
                assert!(msg.contains("cdxml"));
                assert!(msg.contains("not-a-structure"));
            }
            other => panic!("Expected InvalidStructure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_preview_is_truncated() {
        let only = Scripted::new("only", false, ALL, Reply::Miss);
        let pipeline = ConversionPipeline::new(vec![only]);
        let long_input = "C".repeat(500);

        let err = pipeline
            .convert(&ConversionRequest::new(long_input.clone(), "mol"))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(!msg.contains(&long_input));
        assert!(msg.contains("..."));
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let first = Scripted::new("first", true, ALL, Reply::Hit("x"));
        let second = Scripted::new("second", false, &["mol"], Reply::Hit("y"));
        let pipeline = ConversionPipeline::new(vec![first, second]);

        // without an input format only `second` applies, and it lacks inchi
        let err = pipeline
            .convert(&ConversionRequest::new("CCC", "inchi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(f) if f == "inchi"));
    }

    #[tokio::test]
    async fn test_blank_input_rejected() {
        let only = Scripted::new("only", false, ALL, Reply::Hit("x"));
        let pipeline = ConversionPipeline::new(vec![only.clone()]);
        let err = pipeline
            .convert(&ConversionRequest::new("  ", "mol"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(only.calls(), 0);
    }
}

//! Async front for the embedded structure toolkit.
//!
//! Toolkit calls are synchronous and may be slow on large structures, so each
//! operation opens a fresh session on a blocking thread.

use std::sync::Arc;

use tracing::{debug, warn};

use chemlink_core::{
    input_preview, ComponentProperties, ConversionRequest, Error, RenderRequest, Result,
    StructureHandle, StructureKind, StructureToolkit, ToolkitSession,
};

/// Marker the validity check reports for text that does not load as a
/// normal molecule or reaction.
pub const LOADING_ERROR_MARKER: &str = "Error at loading structure";

/// Everything the toolkit reports about one loaded structure.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureReport {
    pub kind: StructureKind,
    pub components: Vec<ComponentProperties>,
    pub formula: Option<String>,
}

/// Load attempts in order, chosen from the validity check's diagnostic.
///
/// Inputs the check cannot load are most likely query structures; for the
/// rest, reaction is tried before molecule.
pub fn load_order(diagnostic: &str) -> [StructureKind; 4] {
    if diagnostic.contains(LOADING_ERROR_MARKER) {
        [
            StructureKind::QueryMolecule,
            StructureKind::QueryReaction,
            StructureKind::Reaction,
            StructureKind::Molecule,
        ]
    } else {
        [
            StructureKind::Reaction,
            StructureKind::Molecule,
            StructureKind::QueryMolecule,
            StructureKind::QueryReaction,
        ]
    }
}

/// Load `input` with the first interpretation the toolkit accepts.
pub fn load_structure(
    session: &dyn ToolkitSession,
    input: &str,
) -> Result<(StructureHandle, StructureKind)> {
    if input.trim().is_empty() {
        return Err(Error::InvalidStructure("Input is empty".to_string()));
    }

    let diagnostic = session.check_structure(input).unwrap_or_else(|e| {
        debug!(component = "indigo", error = %e, "Structure check failed");
        String::new()
    });

    for kind in load_order(&diagnostic) {
        match session.load(input, kind) {
            Ok(handle) => {
                debug!(component = "indigo", kind = kind.as_str(), "Structure loaded");
                return Ok((handle, kind));
            }
            Err(e) => {
                debug!(
                    component = "indigo",
                    kind = kind.as_str(),
                    error = %e,
                    "Load attempt failed"
                );
            }
        }
    }

    Err(Error::InvalidStructure(format!(
        "Can't load input as molecule or reaction. Input: {}",
        input_preview(input)
    )))
}

/// Whether a failure means "this backend could not handle the structure".
fn is_soft_failure(err: &Error) -> bool {
    matches!(
        err,
        Error::InvalidStructure(_) | Error::Toolkit(_) | Error::InvalidInput(_)
    )
}

/// The embedded toolkit as used by the conversion, render and extract paths.
#[derive(Clone)]
pub struct EmbeddedEngine {
    toolkit: Arc<dyn StructureToolkit>,
}

impl EmbeddedEngine {
    pub fn new(toolkit: Arc<dyn StructureToolkit>) -> Self {
        Self { toolkit }
    }

    pub fn name(&self) -> &'static str {
        self.toolkit.name()
    }

    /// Run `f` inside a fresh session on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ToolkitSession) -> Result<T> + Send + 'static,
    {
        let toolkit = Arc::clone(&self.toolkit);
        tokio::task::spawn_blocking(move || {
            let session = toolkit.open_session()?;
            f(session.as_ref())
        })
        .await
        .map_err(|e| Error::Internal(format!("Embedded toolkit task failed: {}", e)))?
    }

    /// Convert, sniffing the input format. A structure the toolkit cannot
    /// load or cannot write in the requested format is a soft miss.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<Option<String>> {
        let input = request.input.clone();
        let format = request.output_format.clone();
        let result = self
            .run(move |session| {
                let (handle, _) = load_structure(session, &input)?;
                session.to_format(handle, &format)
            })
            .await;
        self.soften(result, "convert", &request.input)
    }

    /// Render PNG or SVG from any input the toolkit can load.
    pub async fn render(&self, request: &RenderRequest) -> Result<Option<Vec<u8>>> {
        let input = request.input.clone();
        let format = request.format.render_format();
        let size = request.size;
        let result = self
            .run(move |session| {
                let (handle, _) = load_structure(session, &input)?;
                session.render(handle, format, size)
            })
            .await
            .map(|bytes| Some(bytes).filter(|b| !b.is_empty()));
        self.soften(result, "render", &request.input)
    }

    /// Canonical SMILES, or `None` if the toolkit cannot load the input.
    pub async fn canonicalize(&self, input: &str) -> Result<Option<String>> {
        let owned = input.to_string();
        let result = self
            .run(move |session| {
                let (handle, _) = load_structure(session, &owned)?;
                session.canonicalize(handle).map(Some)
            })
            .await;
        self.soften(result, "canonicalize", input)
    }

    /// Properties of every component. Unlike conversion, an unloadable
    /// structure is an error here since there is no fallback.
    pub async fn describe(&self, input: &str) -> Result<StructureReport> {
        let owned = input.to_string();
        self.run(move |session| {
            let (handle, kind) = load_structure(session, &owned)?;
            let components = session.components(handle).unwrap_or_else(|e| {
                debug!(component = "indigo", error = %e, "Component iteration failed");
                Vec::new()
            });
            let formula = session.formula(handle).ok().filter(|f| !f.is_empty());
            Ok(StructureReport {
                kind,
                components,
                formula,
            })
        })
        .await
    }

    fn soften<T>(&self, result: Result<Option<T>>, op: &str, input: &str) -> Result<Option<T>> {
        match result {
            Err(e) if is_soft_failure(&e) => {
                warn!(
                    subsystem = "engine",
                    component = self.name(),
                    op,
                    input = %input_preview(input),
                    error = %e,
                    "Embedded toolkit could not handle structure"
                );
                Ok(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chemlink_core::{ImageFormat, ImageSize};

    /// Toolkit accepting only structures in `accepts` and recording loads.
    struct ScriptedToolkit {
        diagnostic: String,
        accepts: Vec<StructureKind>,
        attempts: Mutex<Vec<StructureKind>>,
    }

    impl ScriptedToolkit {
        fn new(diagnostic: &str, accepts: &[StructureKind]) -> Self {
            Self {
                diagnostic: diagnostic.to_string(),
                accepts: accepts.to_vec(),
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    struct ScriptedSession<'a>(&'a ScriptedToolkit);

    impl StructureToolkit for ScriptedToolkit {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn open_session(&self) -> Result<Box<dyn ToolkitSession + '_>> {
            Ok(Box::new(ScriptedSession(self)))
        }
    }

    impl ToolkitSession for ScriptedSession<'_> {
        fn check_structure(&self, _input: &str) -> Result<String> {
            Ok(self.0.diagnostic.clone())
        }

        fn load(&self, _input: &str, kind: StructureKind) -> Result<StructureHandle> {
            self.0.attempts.lock().unwrap().push(kind);
            if self.0.accepts.contains(&kind) {
                Ok(StructureHandle(1))
            } else {
                Err(Error::Toolkit("syntax error".to_string()))
            }
        }

        fn to_format(&self, _handle: StructureHandle, format: &str) -> Result<Option<String>> {
            Ok((format == "smiles").then(|| "CCC".to_string()))
        }

        fn render(&self, _h: StructureHandle, _f: ImageFormat, _s: ImageSize) -> Result<Vec<u8>> {
            Err(Error::Toolkit("layout failed".to_string()))
        }

        fn canonicalize(&self, _handle: StructureHandle) -> Result<String> {
            Ok("CCC".to_string())
        }

        fn components(&self, _handle: StructureHandle) -> Result<Vec<ComponentProperties>> {
            Ok(vec![ComponentProperties {
                atom_count: Some(3),
                ..Default::default()
            }])
        }

        fn formula(&self, _handle: StructureHandle) -> Result<String> {
            Ok("C3 H8".to_string())
        }
    }

    #[test]
    fn test_load_order_normal_structure() {
        assert_eq!(
            load_order("{}"),
            [
                StructureKind::Reaction,
                StructureKind::Molecule,
                StructureKind::QueryMolecule,
                StructureKind::QueryReaction
            ]
        );
    }

    #[test]
    fn test_load_order_after_loading_error() {
        let order = load_order(r#"{"load":"Error at loading structure: bad"}"#);
        assert_eq!(order[0], StructureKind::QueryMolecule);
        assert_eq!(order[1], StructureKind::QueryReaction);
    }

    #[test]
    fn test_load_structure_tries_until_accepted() {
        let toolkit = ScriptedToolkit::new("", &[StructureKind::Molecule]);
        let session = toolkit.open_session().unwrap();
        let (_, kind) = load_structure(session.as_ref(), "CCC").unwrap();
        assert_eq!(kind, StructureKind::Molecule);
        assert_eq!(
            *toolkit.attempts.lock().unwrap(),
            vec![StructureKind::Reaction, StructureKind::Molecule]
        );
    }

    #[test]
    fn test_load_structure_query_path() {
        let toolkit = ScriptedToolkit::new(LOADING_ERROR_MARKER, &[StructureKind::QueryReaction]);
        let session = toolkit.open_session().unwrap();
        let (_, kind) = load_structure(session.as_ref(), "[#6]>>[#6]").unwrap();
        assert_eq!(kind, StructureKind::QueryReaction);
    }

    #[test]
    fn test_load_structure_all_attempts_fail() {
        let toolkit = ScriptedToolkit::new("", &[]);
        let session = toolkit.open_session().unwrap();
        let err = load_structure(session.as_ref(), "not-a-structure").unwrap_err();
        match err {
            Error::InvalidStructure(msg) => assert!(msg.contains("not-a-structure")),
            other => panic!("Expected InvalidStructure, got {:?}", other),
        }
        assert_eq!(toolkit.attempts.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_load_structure_empty_input() {
        let toolkit = ScriptedToolkit::new("", &[StructureKind::Molecule]);
        let session = toolkit.open_session().unwrap();
        let err = load_structure(session.as_ref(), "  ").unwrap_err();
        assert_eq!(err.to_string(), "Invalid structure: Input is empty");
        assert!(toolkit.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_convert_soft_misses_unloadable_input() {
        let engine = EmbeddedEngine::new(Arc::new(ScriptedToolkit::new("", &[])));
        let result = engine
            .convert(&ConversionRequest::new("garbage", "smiles"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_convert_unknown_format_is_soft_miss() {
        let engine =
            EmbeddedEngine::new(Arc::new(ScriptedToolkit::new("", &[StructureKind::Molecule])));
        let hit = engine
            .convert(&ConversionRequest::new("CCC", "smiles"))
            .await
            .unwrap();
        assert_eq!(hit.as_deref(), Some("CCC"));
        let miss = engine
            .convert(&ConversionRequest::new("CCC", "xyz"))
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_render_failure_is_soft_miss() {
        let engine =
            EmbeddedEngine::new(Arc::new(ScriptedToolkit::new("", &[StructureKind::Molecule])));
        let request = RenderRequest {
            input: "CCC".to_string(),
            input_format: String::new(),
            format: ImageFormat::Png,
            size: ImageSize::default(),
        };
        assert!(engine.render(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_describe_reports_kind_and_formula() {
        let engine =
            EmbeddedEngine::new(Arc::new(ScriptedToolkit::new("", &[StructureKind::Reaction])));
        let report = engine.describe("CC>>CC").await.unwrap();
        assert_eq!(report.kind, StructureKind::Reaction);
        assert_eq!(report.components.len(), 1);
        assert_eq!(report.formula.as_deref(), Some("C3 H8"));
    }

    #[tokio::test]
    async fn test_describe_unloadable_is_error() {
        let engine = EmbeddedEngine::new(Arc::new(ScriptedToolkit::new("", &[])));
        let result = engine.describe("garbage").await;
        assert!(matches!(result, Err(Error::InvalidStructure(_))));
    }
}

//! Conversion and rendering against the installed engines.
//!
//! Run with `cargo test -p chemlink-convert -- --ignored` on a host with
//! obabel 3.x and the Indigo shared libraries available.

use std::sync::Arc;

use chemlink_convert::{
    Canonicalizer, ConversionPipeline, ExtractService, OpenBabelConvertor, RenderPipeline,
};
use chemlink_core::{ConversionRequest, Error, ImageRequest};
use chemlink_engines::{EmbeddedEngine, IndigoToolkit, OpenBabel};

struct Engines {
    obabel: Arc<OpenBabel>,
    embedded: EmbeddedEngine,
}

fn engines() -> Engines {
    Engines {
        obabel: Arc::new(OpenBabel::from_env().unwrap()),
        embedded: EmbeddedEngine::new(Arc::new(IndigoToolkit::from_env().unwrap())),
    }
}

fn pipeline(e: &Engines) -> ConversionPipeline {
    ConversionPipeline::standard(e.obabel.clone(), e.embedded.clone())
}

#[tokio::test]
#[ignore = "requires obabel and libindigo"]
async fn test_smiles_to_cdxml() {
    let e = engines();
    let out = pipeline(&e)
        .convert(&ConversionRequest::with_input_format("CCC", "smiles", "cdxml"))
        .await
        .unwrap();
    assert!(out.contains("<CDXML"));
}

#[tokio::test]
#[ignore = "requires obabel and libindigo"]
async fn test_sniffed_input_to_mol() {
    let e = engines();
    let out = pipeline(&e)
        .convert(&ConversionRequest::new("c1ccccc1", "mol"))
        .await
        .unwrap();
    assert!(out.contains("V2000") || out.contains("V3000"));
}

#[tokio::test]
#[ignore = "requires obabel and libindigo"]
async fn test_unparseable_input_names_input() {
    let e = engines();
    let err = pipeline(&e)
        .convert(&ConversionRequest::new("not-a-structure", "cdxml"))
        .await
        .unwrap_err();
    match err {
        Error::InvalidStructure(msg) => assert!(msg.contains("not-a-structure")),
        other => panic!("Expected InvalidStructure, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires obabel and libindigo"]
async fn test_canonical_forms_agree() {
    let e = engines();
    let canonicalizer = Canonicalizer::new(
        e.embedded.clone(),
        pipeline(&e),
        Arc::new(OpenBabelConvertor::new(e.obabel.clone())),
    );
    let a = canonicalizer.canonicalize("OCC").await.unwrap();
    let b = canonicalizer.canonicalize("C(O)C").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(canonicalizer.canonicalize(&a).await.unwrap(), a);
}

#[tokio::test]
#[ignore = "requires obabel, libindigo and libindigo-renderer"]
async fn test_render_jpeg_at_requested_size() {
    let e = engines();
    let renderer = RenderPipeline::standard(pipeline(&e), e.embedded.clone(), e.obabel.clone());
    let image = renderer
        .render(&ImageRequest::new("CCC", "smiles", "jpg").with_size(100, 100))
        .await
        .unwrap();
    let decoded = image::load_from_memory(&image.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 100));
}

#[tokio::test]
#[ignore = "requires obabel, libindigo and libindigo-renderer"]
async fn test_render_svg() {
    let e = engines();
    let renderer = RenderPipeline::standard(pipeline(&e), e.embedded.clone(), e.obabel.clone());
    let image = renderer
        .render(&ImageRequest::new("CCC", "smiles", "svg"))
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&image.bytes).contains("<svg"));
}

#[tokio::test]
#[ignore = "requires libindigo"]
async fn test_extract_propane() {
    let e = engines();
    let result = ExtractService::new(e.embedded.clone())
        .extract("CCC")
        .await
        .unwrap();
    assert!(!result.is_reaction);
    assert_eq!(result.molecule_info.len(), 1);
    assert_eq!(result.molecule_info[0].atom_count, 3);
}

//! Search scenarios against real obabel matching and canonicalization.
//!
//! Run with `cargo test -p chemlink-search -- --ignored` on a host with
//! obabel 3.x and libindigo installed.

use std::collections::BTreeSet;
use std::sync::Arc;

use chemlink_convert::{Canonicalizer, ConversionPipeline, OpenBabelConvertor};
use chemlink_core::{IndexTier, SaveRequest, SearchQuery, SearchType};
use chemlink_engines::{EmbeddedEngine, IndigoToolkit, OpenBabel};
use chemlink_search::{FileChemicalIndex, SearchService};

async fn service() -> (tempfile::TempDir, Arc<FileChemicalIndex>, SearchService) {
    let dir = tempfile::tempdir().unwrap();
    let obabel = Arc::new(OpenBabel::from_env().unwrap());
    let embedded = EmbeddedEngine::new(Arc::new(IndigoToolkit::from_env().unwrap()));
    let canonicalizer = Canonicalizer::new(
        embedded.clone(),
        ConversionPipeline::standard(obabel.clone(), embedded),
        Arc::new(OpenBabelConvertor::new(obabel.clone())),
    );
    let index = Arc::new(FileChemicalIndex::new(dir.path(), obabel));
    let service = SearchService::new(canonicalizer, index.clone());
    service.initialize().await.unwrap();
    (dir, index, service)
}

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
#[ignore = "requires obabel and libindigo"]
async fn test_substructure_search() {
    let (_dir, _index, service) = service().await;
    service.save(&SaveRequest::new("C", "123")).await.unwrap();
    service.save(&SaveRequest::new("CCC", "5678")).await.unwrap();

    let hits = service
        .search(&SearchQuery::new("CC", SearchType::Substructure))
        .await
        .unwrap();
    assert_eq!(hits, ids(&["5678"]));
}

#[tokio::test]
#[ignore = "requires obabel and libindigo"]
async fn test_exact_search_across_reindex() {
    let (_dir, index, service) = service().await;
    service.save(&SaveRequest::new("CCC", "456")).await.unwrap();
    service.reindex().await.unwrap();
    service.save(&SaveRequest::new("C(C)C", "789")).await.unwrap();

    let hits = service
        .search(&SearchQuery::new("CCC", SearchType::Exact))
        .await
        .unwrap();
    assert_eq!(hits, ids(&["456", "789"]));

    service.reindex().await.unwrap();
    let delta = tokio::fs::read_to_string(index.tier_path(IndexTier::Delta))
        .await
        .unwrap();
    assert!(delta.is_empty());
}

#[tokio::test]
#[ignore = "requires obabel and libindigo"]
async fn test_clear_removes_everything() {
    let (_dir, _index, service) = service().await;
    service.save(&SaveRequest::new("CCO", "1")).await.unwrap();
    service.reindex().await.unwrap();
    service.clear().await.unwrap();

    let hits = service
        .search(&SearchQuery::new("C", SearchType::Substructure))
        .await
        .unwrap();
    assert!(hits.is_empty());
}

//! Save, search, reindex and clear through `SearchService` over a
//! file-backed index, with in-process stand-ins for the chemistry engines.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use chemlink_convert::{Canonicalizer, ConversionPipeline};
use chemlink_core::{
    ConversionRequest, Convertor, Error, IndexTier, Result, SaveRequest, SearchQuery, SearchType,
    StructureMatcher, StructureToolkit, ToolkitSession,
};
use chemlink_engines::EmbeddedEngine;
use chemlink_search::{
    FileChemicalIndex, IndexScheduler, SchedulerConfig, SchedulerEvent, SearchService,
};

/// Treats the input text as already canonical.
struct Identity;

#[async_trait]
impl Convertor for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn requires_input_format(&self) -> bool {
        false
    }

    fn supports_output(&self, _format: &str) -> bool {
        true
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<Option<String>> {
        Ok(Some(request.input.trim().to_string()))
    }
}

/// Toolkit that is never available, so canonicalization always takes the
/// conversion fallback.
struct Unloaded;

impl StructureToolkit for Unloaded {
    fn name(&self) -> &'static str {
        "unloaded"
    }

    fn open_session(&self) -> Result<Box<dyn ToolkitSession + '_>> {
        Err(Error::Toolkit("toolkit not loaded".to_string()))
    }
}

/// Substructure as substring containment over the SMILES column.
struct Substring;

#[async_trait]
impl StructureMatcher for Substring {
    fn name(&self) -> &'static str {
        "substring"
    }

    async fn search(
        &self,
        file: &Path,
        term: &str,
        search_type: SearchType,
    ) -> Result<Vec<String>> {
        let content = tokio::fs::read_to_string(file).await?;
        Ok(content
            .lines()
            .filter(|line| match line.split_whitespace().next() {
                Some(smiles) if search_type == SearchType::Exact => smiles == term,
                Some(smiles) => smiles.contains(term),
                None => false,
            })
            .map(str::to_string)
            .collect())
    }

    async fn build_index(&self, source: &Path, target: &Path) -> Result<()> {
        tokio::fs::copy(source, target).await?;
        Ok(())
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    index: Arc<FileChemicalIndex>,
    service: SearchService,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(FileChemicalIndex::new(dir.path(), Arc::new(Substring)));
    let canonicalizer = Canonicalizer::new(
        EmbeddedEngine::new(Arc::new(Unloaded)),
        ConversionPipeline::new(vec![Arc::new(Identity)]),
        Arc::new(Identity),
    );
    let service = SearchService::new(canonicalizer, index.clone());
    service.initialize().await.unwrap();
    Fixture {
        _dir: dir,
        index,
        service,
    }
}

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn search(service: &SearchService, term: &str, search_type: SearchType) -> BTreeSet<String> {
    service
        .search(&SearchQuery::new(term, search_type))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_substructure_hits_only_containing_structures() {
    let f = fixture().await;
    f.service.save(&SaveRequest::new("C", "123")).await.unwrap();
    f.service.save(&SaveRequest::new("CCC", "5678")).await.unwrap();

    assert_eq!(search(&f.service, "CC", SearchType::Substructure).await, ids(&["5678"]));
}

#[tokio::test]
async fn test_exact_returns_every_id_for_structure() {
    let f = fixture().await;
    f.service.save(&SaveRequest::new("CCC", "456")).await.unwrap();
    f.service.save(&SaveRequest::new("CCC", "789")).await.unwrap();

    assert_eq!(search(&f.service, "CCC", SearchType::Exact).await, ids(&["456", "789"]));
}

#[tokio::test]
async fn test_exact_is_subset_of_substructure() {
    let f = fixture().await;
    for (smiles, id) in [("CCO", "1"), ("CCCO", "2"), ("CCO", "3")] {
        f.service.save(&SaveRequest::new(smiles, id)).await.unwrap();
    }
    let exact = search(&f.service, "CCO", SearchType::Exact).await;
    let sub = search(&f.service, "CCO", SearchType::Substructure).await;
    assert_eq!(exact, ids(&["1", "3"]));
    assert!(exact.is_subset(&sub));
}

#[tokio::test]
async fn test_reindex_empties_delta_and_keeps_hits() {
    let f = fixture().await;
    f.service.save(&SaveRequest::new("CCC", "456")).await.unwrap();
    f.service.reindex().await.unwrap();

    let delta = tokio::fs::read_to_string(f.index.tier_path(IndexTier::Delta))
        .await
        .unwrap();
    assert!(delta.is_empty());
    assert_eq!(search(&f.service, "CCC", SearchType::Exact).await, ids(&["456"]));
}

#[tokio::test]
async fn test_clear_then_search_is_empty() {
    let f = fixture().await;
    f.service.save(&SaveRequest::new("CCC", "456")).await.unwrap();
    f.service.reindex().await.unwrap();
    f.service.save(&SaveRequest::new("CC", "789")).await.unwrap();

    f.service.clear().await.unwrap();
    assert!(search(&f.service, "C", SearchType::Substructure).await.is_empty());
}

#[tokio::test]
async fn test_blank_term_is_empty() {
    let f = fixture().await;
    f.service.save(&SaveRequest::new("CCC", "456")).await.unwrap();
    assert!(f.service.search(&SearchQuery::default()).await.unwrap().is_empty());
    assert!(search(&f.service, "", SearchType::Exact).await.is_empty());
}

#[tokio::test]
async fn test_scheduler_folds_delta() {
    let f = fixture().await;
    f.service.save(&SaveRequest::new("CCC", "456")).await.unwrap();

    let handle = IndexScheduler::new(
        f.index.clone(),
        SchedulerConfig::default().with_interval(Duration::from_secs(3600)),
    )
    .start();
    let mut events = handle.events();
    handle.trigger().await.unwrap();

    loop {
        match events.recv().await.unwrap() {
            SchedulerEvent::ReindexCompleted { .. } => break,
            SchedulerEvent::ReindexFailed { error } => panic!("reindex failed: {}", error),
            _ => continue,
        }
    }
    handle.shutdown().await.unwrap();

    let fast = tokio::fs::read_to_string(f.index.tier_path(IndexTier::Fast))
        .await
        .unwrap();
    assert_eq!(fast, "CCC 456\n");
    assert_eq!(search(&f.service, "CCC", SearchType::Exact).await, ids(&["456"]));
}

//! Search orchestration: canonicalize, then delegate to the index.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use chemlink_convert::Canonicalizer;
use chemlink_core::{
    input_preview, ChemicalIndex, ChemicalRecord, Error, Result, SaveRequest, SearchQuery,
};

/// Front door for saving and searching structures.
///
/// Saved structures and search terms both pass through the same
/// [`Canonicalizer`], so exact matches compare one notation.
#[derive(Clone)]
pub struct SearchService {
    canonicalizer: Canonicalizer,
    index: Arc<dyn ChemicalIndex>,
}

impl SearchService {
    pub fn new(canonicalizer: Canonicalizer, index: Arc<dyn ChemicalIndex>) -> Self {
        Self {
            canonicalizer,
            index,
        }
    }

    pub fn index(&self) -> Arc<dyn ChemicalIndex> {
        self.index.clone()
    }

    pub async fn initialize(&self) -> Result<()> {
        self.index.initialize().await
    }

    pub async fn save(&self, request: &SaveRequest) -> Result<()> {
        if request.chemical.trim().is_empty() {
            return Err(Error::InvalidInput("chemical must not be empty".to_string()));
        }
        if request.chemical_id.trim().is_empty() {
            return Err(Error::InvalidInput("chemicalId must not be empty".to_string()));
        }

        let canonical = self.canonicalizer.canonicalize(&request.chemical).await?;
        debug!(
            subsystem = "search",
            component = "service",
            op = "save",
            chemical_id = %request.chemical_id,
            canonical = %canonical,
            "Canonicalized structure for save"
        );
        self.index
            .save(&ChemicalRecord::new(canonical, request.chemical_id.trim()))
            .await?;
        info!(
            subsystem = "search",
            component = "service",
            op = "save",
            index = self.index.name(),
            chemical_id = %request.chemical_id,
            input = %input_preview(&request.chemical),
            "Chemical saved"
        );
        Ok(())
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<BTreeSet<String>> {
        let Some(term) = query.effective_term() else {
            debug!(
                subsystem = "search",
                component = "service",
                op = "search",
                "Blank search term, returning no hits"
            );
            return Ok(BTreeSet::new());
        };

        let start = Instant::now();
        let canonical = self.canonicalizer.canonicalize(term).await?;
        let hits = self.index.search(&canonical, query.search_type).await?;
        info!(
            subsystem = "search",
            component = "service",
            op = "search",
            index = self.index.name(),
            search_type = ?query.search_type,
            input = %input_preview(term),
            result_count = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(hits)
    }

    pub async fn reindex(&self) -> Result<()> {
        let start = Instant::now();
        self.index.reindex().await?;
        info!(
            subsystem = "search",
            component = "service",
            op = "reindex",
            index = self.index.name(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Reindex requested"
        );
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.index.clear_all().await?;
        info!(
            subsystem = "search",
            component = "service",
            op = "clear",
            index = self.index.name(),
            "Search indexes cleared"
        );
        Ok(())
    }
}

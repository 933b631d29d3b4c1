//! Canonical SMILES for search keys.

use std::sync::Arc;

use tracing::debug;

use chemlink_core::defaults::CANONICAL_FORMAT;
use chemlink_core::{ConversionRequest, Convertor, Result};
use chemlink_engines::EmbeddedEngine;

use crate::pipeline::ConversionPipeline;

/// Two-pass canonicalization applied to every saved structure and every
/// search term, so both sides of a match share one notation.
///
/// The first pass asks the embedded toolkit for canonical SMILES and falls
/// back to a plain SMILES conversion through `fallback` when the toolkit
/// cannot load the input. The second re-canonicalizes that SMILES with
/// `refiner`, keeping the first-pass form when the refiner misses.
#[derive(Clone)]
pub struct Canonicalizer {
    embedded: EmbeddedEngine,
    fallback: ConversionPipeline,
    refiner: Arc<dyn Convertor>,
}

impl Canonicalizer {
    pub fn new(
        embedded: EmbeddedEngine,
        fallback: ConversionPipeline,
        refiner: Arc<dyn Convertor>,
    ) -> Self {
        Self {
            embedded,
            fallback,
            refiner,
        }
    }

    pub async fn canonicalize(&self, input: &str) -> Result<String> {
        let first = self.first_pass(input).await?;

        let request = ConversionRequest::with_input_format(
            first.trim(),
            CANONICAL_FORMAT,
            CANONICAL_FORMAT,
        );
        let refined = match self.refiner.convert(&request).await? {
            Some(smiles) if !smiles.trim().is_empty() => smiles,
            _ => {
                debug!(
                    subsystem = "convert",
                    component = "canonical",
                    strategy = self.refiner.name(),
                    "Second canonicalization pass missed, keeping first pass"
                );
                first
            }
        };
        Ok(search_key(&refined))
    }

    async fn first_pass(&self, input: &str) -> Result<String> {
        match self.embedded.canonicalize(input).await? {
            Some(smiles) if !smiles.trim().is_empty() => Ok(smiles),
            _ => {
                debug!(
                    subsystem = "convert",
                    component = "canonical",
                    toolkit = self.embedded.name(),
                    "No canonical form from toolkit, converting to SMILES"
                );
                self.fallback
                    .convert(&ConversionRequest::new(input, CANONICAL_FORMAT))
                    .await
            }
        }
    }
}

/// The structure part of a SMILES line. obabel appends the title after
/// whitespace, and the stored line format reserves the last token for the id.
fn search_key(smiles: &str) -> String {
    smiles
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

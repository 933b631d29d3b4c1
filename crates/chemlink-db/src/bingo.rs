//! Chemical index stored in PostgreSQL and matched by the Bingo cartridge.

use std::collections::BTreeSet;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::{debug, info};

use chemlink_core::{ChemicalIndex, ChemicalRecord, Error, Result, SearchType};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS chemicals (
    id SERIAL PRIMARY KEY,
    smiles VARCHAR(2000) NOT NULL,
    chemical_id VARCHAR(255) NOT NULL UNIQUE,
    molecule bingo.molecule,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

const CREATE_ID_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_chemicals_chemical_id ON chemicals(chemical_id)";

const CREATE_MOLECULE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_chemicals_molecule_bingo \
     ON chemicals USING bingo_idx (molecule bingo.molecule)";

const UPSERT: &str = "INSERT INTO chemicals (smiles, chemical_id, molecule) VALUES ($1, $2, $1) \
     ON CONFLICT (chemical_id) \
     DO UPDATE SET smiles = EXCLUDED.smiles, molecule = EXCLUDED.molecule";

/// Matching query for a search type.
pub fn search_sql(search_type: SearchType) -> &'static str {
    match search_type {
        SearchType::Exact => "SELECT chemical_id FROM chemicals WHERE molecule @ ($1, 'exact') = 1",
        SearchType::Substructure => {
            "SELECT chemical_id FROM chemicals WHERE molecule @ ($1, '')::bingo.sub"
        }
    }
}

/// PostgreSQL chemical index.
///
/// Saves upsert on `chemical_id`, so re-saving an id replaces its structure.
/// The cartridge maintains its own molecule index, which makes `reindex` a
/// no-op here.
pub struct BingoChemicalIndex {
    pool: Pool<Postgres>,
}

impl BingoChemicalIndex {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChemicalIndex for BingoChemicalIndex {
    fn name(&self) -> &'static str {
        "bingo"
    }

    async fn initialize(&self) -> Result<()> {
        for statement in [CREATE_TABLE, CREATE_ID_INDEX, CREATE_MOLECULE_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        }
        info!(
            subsystem = "db",
            component = "bingo",
            "Bingo chemical index initialized"
        );
        Ok(())
    }

    async fn save(&self, record: &ChemicalRecord) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(&record.canonical_form)
            .bind(&record.external_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "bingo",
            op = "save",
            chemical_id = %record.external_id,
            "Chemical saved"
        );
        Ok(())
    }

    async fn search(&self, term: &str, search_type: SearchType) -> Result<BTreeSet<String>> {
        let start = Instant::now();
        let ids: Vec<String> = sqlx::query_scalar(search_sql(search_type))
            .bind(term)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let hits: BTreeSet<String> = ids.into_iter().collect();
        info!(
            subsystem = "db",
            component = "bingo",
            op = "search",
            search_type = ?search_type,
            result_count = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(hits)
    }

    async fn reindex(&self) -> Result<()> {
        debug!(
            subsystem = "db",
            component = "bingo",
            op = "reindex",
            "Cartridge maintains its own index, nothing to do"
        );
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM chemicals")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        info!(
            subsystem = "db",
            component = "bingo",
            op = "clear",
            rows = result.rows_affected(),
            "Chemical index cleared"
        );
        Ok(())
    }
}

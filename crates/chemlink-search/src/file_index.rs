//! File-backed tiered chemical index.
//!
//! Layout under the index directory:
//!
//! | File | Tier | Contents |
//! |------|------|----------|
//! | `chemicalsMaster.smi` | MASTER | every saved `<smiles> <id>` line |
//! | `nonIndexedChemicals.smi` | DELTA | lines saved since the last reindex |
//! | `fastSearchChemicals.fs` | FAST | matcher index built from MASTER |
//!
//! Searches scan DELTA in full and query FAST, so a record is findable as
//! soon as `save` returns. Each reindex rebuilds FAST from the whole MASTER
//! file, so its cost grows linearly with the number of saved records.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use chemlink_core::defaults::CHEM_FILE_FORMAT;
use chemlink_core::{
    ChemicalIndex, ChemicalRecord, Error, IndexTier, Result, SearchType, StructureMatcher,
};

/// Base name of each tier's file; the extension selects the matcher format.
fn tier_file_name(tier: IndexTier) -> String {
    match tier {
        IndexTier::Master => format!("chemicalsMaster.{}", CHEM_FILE_FORMAT),
        IndexTier::Delta => format!("nonIndexedChemicals.{}", CHEM_FILE_FORMAT),
        IndexTier::Fast => "fastSearchChemicals.fs".to_string(),
    }
}

/// Staging names for files replaced by rename. The FAST staging file keeps
/// the `.fs` extension the matcher keys its index format on.
const FAST_STAGING: &str = "fastSearchChemicals.building.fs";
const DELTA_STAGING: &str = "nonIndexedChemicals.rewrite.tmp";

/// External id of a matcher hit: the last whitespace-separated token.
pub fn external_id(line: &str) -> Option<&str> {
    line.split_whitespace().last()
}

pub struct FileChemicalIndex {
    dir: PathBuf,
    matcher: Arc<dyn StructureMatcher>,
    /// Serializes the MASTER+DELTA append pair, the DELTA rewrite, and clear.
    write_lock: Mutex<()>,
    /// Held for a whole reindex, clear or initialize, so rebuilds never
    /// overlap and staging files are only removed between them.
    rebuild_lock: Mutex<()>,
}

impl FileChemicalIndex {
    pub fn new(dir: impl Into<PathBuf>, matcher: Arc<dyn StructureMatcher>) -> Self {
        Self {
            dir: dir.into(),
            matcher,
            write_lock: Mutex::new(()),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tier_path(&self, tier: IndexTier) -> PathBuf {
        self.dir.join(tier_file_name(tier))
    }

    async fn create_storage(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        for tier in [IndexTier::Master, IndexTier::Delta, IndexTier::Fast] {
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.tier_path(tier))
                .await?;
        }
        for staging in [FAST_STAGING, DELTA_STAGING] {
            remove_if_exists(&self.dir.join(staging)).await?;
        }
        Ok(())
    }

    async fn search_tier(
        &self,
        tier: IndexTier,
        term: &str,
        search_type: SearchType,
    ) -> Result<Vec<String>> {
        let path = self.tier_path(tier);
        if file_len(&path).await? == 0 {
            debug!(
                subsystem = "search",
                component = "file_index",
                tier = tier.as_str(),
                "Tier empty, skipping"
            );
            return Ok(Vec::new());
        }
        self.matcher.search(&path, term, search_type).await
    }

    /// Drop the first `folded` lines of DELTA, keeping anything saved since.
    async fn trim_delta(&self, folded: usize) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let delta = self.tier_path(IndexTier::Delta);
        let content = tokio::fs::read_to_string(&delta).await?;
        let remaining: Vec<&str> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .skip(folded)
            .collect();

        let staging = self.dir.join(DELTA_STAGING);
        let mut body = remaining.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        tokio::fs::write(&staging, body).await?;
        tokio::fs::rename(&staging, &delta).await?;
        Ok(remaining.len())
    }
}

#[async_trait]
impl ChemicalIndex for FileChemicalIndex {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn initialize(&self) -> Result<()> {
        let _rebuild = self.rebuild_lock.lock().await;
        let _guard = self.write_lock.lock().await;
        self.create_storage().await?;
        info!(
            subsystem = "search",
            component = "file_index",
            dir = %self.dir.display(),
            "Chemical index initialized"
        );
        Ok(())
    }

    async fn save(&self, record: &ChemicalRecord) -> Result<()> {
        let canonical = record.canonical_form.trim();
        let id = record.external_id.trim();
        if canonical.is_empty() || canonical.contains(char::is_whitespace) {
            return Err(Error::InvalidInput(format!(
                "canonical form must be a single token, got '{}'",
                canonical
            )));
        }
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(Error::InvalidInput(format!(
                "chemicalId must be non-empty and contain no whitespace, got '{}'",
                record.external_id
            )));
        }
        let line = format!("{} {}\n", canonical, id);

        let _guard = self.write_lock.lock().await;
        append_line(&self.tier_path(IndexTier::Master), &line).await?;
        append_line(&self.tier_path(IndexTier::Delta), &line).await?;
        debug!(
            subsystem = "search",
            component = "file_index",
            op = "save",
            chemical_id = id,
            "Chemical saved"
        );
        Ok(())
    }

    async fn search(&self, term: &str, search_type: SearchType) -> Result<BTreeSet<String>> {
        let start = Instant::now();
        let delta = self.search_tier(IndexTier::Delta, term, search_type).await?;
        let fast = self.search_tier(IndexTier::Fast, term, search_type).await?;

        let hits: BTreeSet<String> = delta
            .iter()
            .chain(fast.iter())
            .filter_map(|line| external_id(line))
            .map(str::to_string)
            .collect();
        info!(
            subsystem = "search",
            component = "file_index",
            op = "search",
            search_type = ?search_type,
            result_count = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(hits)
    }

    async fn reindex(&self) -> Result<()> {
        let _rebuild = self.rebuild_lock.lock().await;
        let start = Instant::now();

        let folded = {
            let _guard = self.write_lock.lock().await;
            count_lines(&self.tier_path(IndexTier::Delta)).await?
        };

        let master = self.tier_path(IndexTier::Master);
        if file_len(&master).await? == 0 {
            debug!(
                subsystem = "search",
                component = "file_index",
                op = "reindex",
                "Master empty, nothing to index"
            );
            return Ok(());
        }

        let staging = self.dir.join(FAST_STAGING);
        remove_if_exists(&staging).await?;
        if let Err(e) = self.matcher.build_index(&master, &staging).await {
            warn!(
                subsystem = "search",
                component = "file_index",
                op = "reindex",
                error = %e,
                "Index build failed, keeping previous fast index"
            );
            remove_if_exists(&staging).await?;
            return Err(e);
        }
        tokio::fs::rename(&staging, self.tier_path(IndexTier::Fast)).await?;

        let remaining = self.trim_delta(folded).await?;
        info!(
            subsystem = "search",
            component = "file_index",
            op = "reindex",
            folded,
            remaining,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reindex complete"
        );
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let _rebuild = self.rebuild_lock.lock().await;
        let _guard = self.write_lock.lock().await;
        for tier in [IndexTier::Master, IndexTier::Delta, IndexTier::Fast] {
            remove_if_exists(&self.tier_path(tier)).await?;
        }
        self.create_storage().await?;
        info!(
            subsystem = "search",
            component = "file_index",
            op = "clear",
            "Chemical index cleared"
        );
        Ok(())
    }
}

async fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

async fn file_len(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

async fn count_lines(path: &Path) -> Result<usize> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    Ok(content.lines().filter(|l| !l.trim().is_empty()).count())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

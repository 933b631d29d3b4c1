//! Search backend selection.

use std::path::PathBuf;
use std::str::FromStr;

use chemlink_core::defaults::{DATABASE_URL, SEARCH_FILE_DIR};
use chemlink_core::Error;

/// Which [`ChemicalIndex`](chemlink_core::ChemicalIndex) implementation backs search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchRepository {
    /// Tiered `.smi`/`.fs` files searched through obabel.
    #[default]
    File,
    /// PostgreSQL with the Bingo cartridge.
    Bingo,
}

impl FromStr for SearchRepository {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(SearchRepository::File),
            "bingo" => Ok(SearchRepository::Bingo),
            other => Err(Error::Config(format!(
                "Unknown SEARCH_REPOSITORY '{}', expected 'file' or 'bingo'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub repository: SearchRepository,
    pub file_dir: PathBuf,
    pub database_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            repository: SearchRepository::default(),
            file_dir: PathBuf::from(SEARCH_FILE_DIR),
            database_url: DATABASE_URL.to_string(),
        }
    }
}

impl SearchConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SEARCH_REPOSITORY` | `file` | `file` or `bingo` |
    /// | `SEARCH_FILE_DIR` | `chemistry-index` | Directory for the file index |
    /// | `DATABASE_URL` | `postgres://localhost/chemistry` | Bingo database |
    ///
    /// An unrecognized repository name is a configuration error rather than
    /// a silent fallback.
    pub fn from_env() -> chemlink_core::Result<Self> {
        let defaults = Self::default();
        let repository = match std::env::var("SEARCH_REPOSITORY") {
            Ok(v) if !v.trim().is_empty() => v.parse()?,
            _ => defaults.repository,
        };
        let file_dir = std::env::var("SEARCH_FILE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.file_dir);
        let database_url = std::env::var("DATABASE_URL").unwrap_or(defaults.database_url);

        Ok(Self {
            repository,
            file_dir,
            database_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository() {
        assert_eq!("file".parse::<SearchRepository>().unwrap(), SearchRepository::File);
        assert_eq!(" Bingo ".parse::<SearchRepository>().unwrap(), SearchRepository::Bingo);
        assert!(matches!(
            "sqlite".parse::<SearchRepository>(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.repository, SearchRepository::File);
        assert_eq!(config.file_dir, PathBuf::from("chemistry-index"));
    }
}

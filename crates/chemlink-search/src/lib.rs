//! # chemlink-search
//!
//! Tiered chemical search for chemlink.
//!
//! Structures are canonicalized, appended to an index, and found by exact or
//! substructure match. The file-backed index keeps recent saves in a
//! linearly scanned tier until the [`IndexScheduler`] folds them into the
//! accelerated tier.

pub mod config;
pub mod file_index;
pub mod scheduler;
pub mod service;

pub use config::{SearchConfig, SearchRepository};
pub use file_index::FileChemicalIndex;
pub use scheduler::{IndexScheduler, SchedulerConfig, SchedulerEvent, SchedulerHandle};
pub use service::SearchService;

//! # chemlink-engines
//!
//! Adapters for the two chemistry engines chemlink drives:
//!
//! - [`OpenBabel`]: the `obabel` command-line tool, run through [`CommandRunner`]
//! - [`IndigoToolkit`]: the Indigo C library, loaded at runtime and fronted
//!   by [`EmbeddedEngine`]

pub mod command;
pub mod embedded;
pub mod indigo;
pub mod openbabel;

pub use command::{CommandOutput, CommandRunner};
pub use embedded::{load_order, load_structure, EmbeddedEngine, StructureReport};
pub use indigo::IndigoToolkit;
pub use openbabel::OpenBabel;

//! Local repository storage core
//!
//! Git-compatible object database (loose objects and packs), staging-area
//! index and reference resolution.
//!
//! - `areas`: the stores of a repository and the repository that wires them
//! - `artifacts`: on-disk formats (objects, packs, index, refs)
//! - `commands`: plumbing commands run by the `bit` binary
//! - `config`: repository layout
//! - `errors`: error kinds raised by the stores

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod config;
pub mod errors;

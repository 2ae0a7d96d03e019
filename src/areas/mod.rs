//! Core repository components
//!
//! This module contains the fundamental building blocks of a Git repository:
//!
//! - `database`: Object database for storing blobs, trees, commits and tags
//! - `index`: Staging area (index/cache) and its locked mutation protocol
//! - `refs`: Reference resolution and updates (branches, HEAD, tags, remotes)
//! - `repository`: Wiring of the components from a `RepositoryConfig`
//! - `storage`: Storage capability behind the index

pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod storage;

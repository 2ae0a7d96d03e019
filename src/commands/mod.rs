//! Git command implementations
//!
//! Only plumbing commands are provided: each one is a thin layer over the
//! repository's object database, index and references.

pub mod plumbing;

//! Git data structures and on-disk formats
//!
//! - `index`: Index file format (header, entries, extensions, checksum)
//! - `objects`: Git object types (blob, tree, commit, tag) and loose framing
//! - `pack`: Pack container decoding and delta resolution
//! - `refs`: Reference names, values and the packed-refs table

pub mod index;
pub mod objects;
pub mod pack;
pub mod refs;

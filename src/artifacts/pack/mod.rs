//! Git packfile format
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "PACK" (4 bytes)
//!   - Version: 2 or 3 (4 bytes)
//!   - Object count (4 bytes)
//!
//! Entries (variable length):
//!   - Type and inflated size varint
//!   - OFS_DELTA: backward distance to the base entry
//!   - REF_DELTA: raw 20-byte base object ID
//!   - zlib stream of the object (or delta) payload
//!
//! Checksum (20 bytes):
//!   - SHA-1 of all preceding bytes
//! ```
//!
//! Packs are read-only here: they are scanned once to build an in-memory
//! `{oid -> offset}` index, and objects are then materialized on demand by a
//! `DecodeSession`, which memoizes resolved delta bases for its own lifetime.

pub mod delta;
pub mod entry;
pub mod packfile;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod varint;

/// Magic signature identifying pack files
pub const SIGNATURE: &[u8; 4] = b"PACK";

/// Size of the pack header in bytes
pub const HEADER_SIZE: usize = 12;

/// Size of the trailing SHA-1 checksum in bytes
pub const CHECKSUM_SIZE: usize = 20;

/// Pack versions accepted by the reader
pub const SUPPORTED_VERSIONS: [u32; 2] = [2, 3];

/// Entry type code of an offset delta
pub const OFS_DELTA: u8 = 6;

/// Entry type code of a reference delta
pub const REF_DELTA: u8 = 7;

//! Reference names, values and the packed-refs table
//!
//! - `ref_name`: validated reference names and their namespace
//! - `ref_value`: contents of a loose ref file (direct or symbolic)
//! - `packed_refs`: the `packed-refs` file

pub mod packed_refs;
pub mod ref_name;
pub mod ref_value;

/// Characters and sequences git refuses in reference names
pub const INVALID_REF_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|^\/|\/$|\/\/|\.lock$|\.lock\/|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";

pub const SYMREF_PREFIX: &str = "ref: ";

pub const REFS_DIR: &str = "refs/";
pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";

pub const HEAD: &str = "HEAD";
pub const MERGE_HEAD: &str = "MERGE_HEAD";

pub const PACKED_REFS: &str = "packed-refs";

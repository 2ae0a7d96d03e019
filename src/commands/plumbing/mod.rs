//! Plumbing commands (low-level Git operations)
//!
//! Plumbing commands provide direct access to the object database, the
//! index and the references. They're primarily used for scripting and for
//! inspecting a repository.
//!
//! ## Commands
//!
//! - `init`: Create the repository layout
//! - `cat-file`: Print an object, its type or its size
//! - `hash-object`: Compute object ID and optionally store in database
//! - `rev-parse`: Resolve a name to an object ID
//! - `show-ref`: List references
//! - `ls-files`: List index entries
//! - `update-index`: Stage files into the index
//! - `verify-pack`: Check a pack and list its objects
//! - `unpack-objects`: Store the objects of a pack as loose objects

pub mod cat_file;
pub mod hash_object;
mod init;
mod ls_files;
pub mod rev_parse;
mod show_ref;
mod unpack_objects;
mod update_index;
mod verify_pack;

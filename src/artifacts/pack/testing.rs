//! Pack construction for tests

use crate::artifacts::objects::loose::compress;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::pack::varint::{encode_entry_header, encode_offset_distance, encode_size};
use crate::artifacts::pack::{OFS_DELTA, REF_DELTA};
use sha1::{Digest, Sha1};

pub(crate) enum TestEntry {
    Object(ObjectType, Vec<u8>),
    /// Delta against the entry at position `base` in the same pack
    OfsDelta { base: usize, delta: Vec<u8> },
    /// Delta with a raw backward distance, valid or not
    OfsDistance { distance: u64, delta: Vec<u8> },
    RefDelta { base: ObjectId, delta: Vec<u8> },
}

/// Delta copying the common prefix of `base` and inserting the rest of `target`
pub(crate) fn delta_for(base: &[u8], target: &[u8]) -> Vec<u8> {
    let mut delta = encode_size(base.len() as u64);
    delta.extend(encode_size(target.len() as u64));

    let common = base
        .iter()
        .zip(target)
        .take_while(|(a, b)| a == b)
        .count()
        .min(0xffff);
    if common > 0 {
        delta.extend_from_slice(&[0x90 | 0x20, (common & 0xff) as u8, (common >> 8) as u8]);
    }

    for chunk in target[common..].chunks(0x7f) {
        delta.push(chunk.len() as u8);
        delta.extend_from_slice(chunk);
    }

    delta
}

/// Pack bytes (with a valid trailer) and the offset of each entry
pub(crate) fn build_pack(entries: &[TestEntry]) -> (Vec<u8>, Vec<u64>) {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"PACK");
    bytes.extend_from_slice(&2u32.to_be_bytes());
    bytes.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    let mut offsets = Vec::with_capacity(entries.len());
    for entry in entries {
        let offset = bytes.len() as u64;
        offsets.push(offset);

        let (header, payload) = match entry {
            TestEntry::Object(object_type, data) => {
                (encode_entry_header(object_type.pack_code(), data.len() as u64), data)
            }
            TestEntry::OfsDelta { base, delta } => {
                let mut header = encode_entry_header(OFS_DELTA, delta.len() as u64);
                header.extend(encode_offset_distance(offset - offsets[*base]));
                (header, delta)
            }
            TestEntry::OfsDistance { distance, delta } => {
                let mut header = encode_entry_header(OFS_DELTA, delta.len() as u64);
                header.extend(encode_offset_distance(*distance));
                (header, delta)
            }
            TestEntry::RefDelta { base, delta } => {
                let mut header = encode_entry_header(REF_DELTA, delta.len() as u64);
                header.extend_from_slice(&base.to_raw());
                (header, delta)
            }
        };

        bytes.extend(header);
        bytes.extend_from_slice(&compress(payload).unwrap());
    }

    let checksum = Sha1::digest(&bytes);
    bytes.extend_from_slice(checksum.as_slice());

    (bytes, offsets)
}

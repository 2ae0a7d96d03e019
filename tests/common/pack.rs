//! Hand-assembled pack files

use flate2::Compression;
use flate2::write::ZlibEncoder;
use sha1::{Digest, Sha1};
use std::io::Write;

const BLOB: u8 = 3;
const OFS_DELTA: u8 = 6;
const REF_DELTA: u8 = 7;

pub enum PackEntry {
    Blob(Vec<u8>),
    /// Delta against the entry at position `base` in the same pack
    OfsDelta { base: usize, delta: Vec<u8> },
    /// Delta against an object outside the pack
    RefDelta { base: String, delta: Vec<u8> },
}

fn size_varint(mut size: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (size & 0x7f) as u8;
        size >>= 7;
        if size == 0 {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

fn entry_header(kind: u8, size: usize) -> Vec<u8> {
    let mut first = (kind << 4) | (size & 0x0f) as u8;
    let mut rest = size >> 4;
    let mut bytes = Vec::new();
    while rest > 0 {
        bytes.push(first | 0x80);
        first = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    bytes.push(first);
    bytes
}

fn offset_distance(mut distance: u64) -> Vec<u8> {
    let mut bytes = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        bytes.insert(0, 0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    bytes
}

fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("Failed to compress");
    encoder.finish().expect("Failed to compress")
}

/// Delta copying the common prefix of `base` and inserting the rest of `target`
pub fn delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let mut delta = size_varint(base.len());
    delta.extend(size_varint(target.len()));

    let common = base
        .iter()
        .zip(target)
        .take_while(|(a, b)| a == b)
        .count()
        .min(0xff);
    if common > 0 {
        delta.extend_from_slice(&[0x90, common as u8]);
    }
    for chunk in target[common..].chunks(0x7f) {
        delta.push(chunk.len() as u8);
        delta.extend_from_slice(chunk);
    }

    delta
}

/// Version 2 pack with a valid trailer
pub fn build(entries: &[PackEntry]) -> Vec<u8> {
    let mut bytes = b"PACK".to_vec();
    bytes.extend_from_slice(&2u32.to_be_bytes());
    bytes.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    let mut offsets = Vec::with_capacity(entries.len());
    for entry in entries {
        let offset = bytes.len() as u64;
        offsets.push(offset);

        let payload = match entry {
            PackEntry::Blob(data) => {
                bytes.extend(entry_header(BLOB, data.len()));
                data
            }
            PackEntry::OfsDelta { base, delta } => {
                bytes.extend(entry_header(OFS_DELTA, delta.len()));
                bytes.extend(offset_distance(offset - offsets[*base]));
                delta
            }
            PackEntry::RefDelta { base, delta } => {
                bytes.extend(entry_header(REF_DELTA, delta.len()));
                for pair in base.as_bytes().chunks(2) {
                    let hex = std::str::from_utf8(pair).expect("Invalid hex");
                    bytes.push(u8::from_str_radix(hex, 16).expect("Invalid hex"));
                }
                delta
            }
        };
        bytes.extend(compress(payload));
    }

    let checksum = Sha1::digest(&bytes);
    bytes.extend_from_slice(checksum.as_slice());
    bytes
}

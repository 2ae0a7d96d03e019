//! Pack entry scanning and inflation

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::OBJECT_ID_RAW_LENGTH;
use crate::artifacts::pack::{varint, HEADER_SIZE, OFS_DELTA, REF_DELTA};
use crate::errors::BitError;
use flate2::{Decompress, FlushDecompress, Status};

/// Upper bound for the buffer reserved up front from a declared size
const MAX_INITIAL_RESERVE: usize = 1 << 20;

/// Output growth step while inflating
const INFLATE_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Object(ObjectType),
    OfsDelta { base_offset: u64 },
    RefDelta { base: ObjectId },
}

/// Location and shape of one entry inside a pack
///
/// `size` is the inflated size of the payload: the object itself for plain
/// entries, the delta instructions for delta entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub offset: u64,
    pub kind: EntryKind,
    pub size: u64,
    pub data_start: usize,
    pub data_end: usize,
}

impl PackEntry {
    /// Read the entry starting at `offset`
    ///
    /// `body` must stop before the pack trailer, so that a zlib stream running
    /// into the checksum is reported as truncated.
    pub fn scan(body: &[u8], offset: u64) -> anyhow::Result<Self> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|start| *start < body.len())
            .ok_or_else(|| BitError::format(format!("entry offset {offset} is past the end of the pack")))?;

        let (type_code, size, header_len) = varint::read_entry_header(&body[start..])?;
        let mut cursor = start + header_len;

        let kind = match type_code {
            OFS_DELTA => {
                let (distance, consumed) = varint::read_offset_distance(&body[cursor..])?;
                cursor += consumed;

                let base_offset = offset
                    .checked_sub(distance)
                    .filter(|base| *base >= HEADER_SIZE as u64)
                    .ok_or_else(|| {
                        BitError::format(format!(
                            "delta offset before file start: entry at {offset} points {distance} bytes back"
                        ))
                    })?;
                EntryKind::OfsDelta { base_offset }
            }
            REF_DELTA => {
                let raw = body
                    .get(cursor..cursor + OBJECT_ID_RAW_LENGTH)
                    .ok_or_else(|| BitError::format(format!("truncated base id at offset {offset}")))?;
                cursor += OBJECT_ID_RAW_LENGTH;
                EntryKind::RefDelta {
                    base: ObjectId::from_raw(raw)?,
                }
            }
            code => EntryKind::Object(ObjectType::from_pack_code(code).ok_or_else(|| {
                BitError::format(format!("invalid object type {code} at offset {offset}"))
            })?),
        };

        let (_, consumed) = inflate(&body[cursor..], size)?;

        Ok(PackEntry {
            offset,
            kind,
            size,
            data_start: cursor,
            data_end: cursor + consumed,
        })
    }

    /// Inflated payload of this entry
    pub fn payload(&self, pack: &[u8]) -> anyhow::Result<Vec<u8>> {
        let data = pack.get(self.data_start..self.data_end).ok_or_else(|| {
            BitError::format(format!("entry at {} lies outside the pack", self.offset))
        })?;

        inflate(data, self.size).map(|(payload, _)| payload)
    }

    pub fn is_delta(&self) -> bool {
        !matches!(self.kind, EntryKind::Object(_))
    }

    /// Bytes the entry occupies in the pack, header included
    pub fn packed_size(&self) -> u64 {
        self.data_end as u64 - self.offset
    }
}

/// Inflate one zlib stream, returning the data and the compressed length
///
/// The result must be exactly `expected` bytes long; inflation stops as soon
/// as it grows past that.
pub fn inflate(input: &[u8], expected: u64) -> anyhow::Result<(Vec<u8>, usize)> {
    let expected = usize::try_from(expected)
        .map_err(|_| BitError::format(format!("declared size {expected} is too large")))?;

    let mut stream = Decompress::new(true);
    let mut out = Vec::with_capacity(expected.min(MAX_INITIAL_RESERVE));

    loop {
        if out.len() == out.capacity() {
            out.reserve(INFLATE_CHUNK);
        }

        let consumed = stream.total_in() as usize;
        let produced = stream.total_out();
        let status = stream
            .decompress_vec(&input[consumed..], &mut out, FlushDecompress::None)
            .map_err(|err| BitError::format(format!("corrupt zlib stream: {err}")))?;

        if out.len() > expected {
            anyhow::bail!(BitError::format(format!(
                "inflated data exceeds the declared {expected} bytes"
            )));
        }

        match status {
            Status::StreamEnd => break,
            _ if stream.total_in() as usize == consumed
                && stream.total_out() == produced
                && out.len() < out.capacity() =>
            {
                anyhow::bail!(BitError::format("truncated zlib stream"));
            }
            _ => {}
        }
    }

    if out.len() != expected {
        anyhow::bail!(BitError::format(format!(
            "inflated {} bytes, expected {expected}",
            out.len()
        )));
    }

    Ok((out, stream.total_in() as usize))
}

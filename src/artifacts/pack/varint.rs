//! Variable-length integers used by packs and deltas
//!
//! Three encodings share the 7-bits-per-byte/continuation-bit scheme:
//!
//! - entry headers: `MSB | type(3) | size(4)` then little-endian size groups
//! - OFS_DELTA distances: big-endian groups, adding one per continuation byte
//! - delta source/target sizes: plain little-endian groups

use crate::errors::BitError;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;

fn truncated(what: &str) -> anyhow::Error {
    BitError::format(format!("truncated {what} varint")).into()
}

fn overflow(what: &str) -> anyhow::Error {
    BitError::format(format!("{what} varint overflows 64 bits")).into()
}

/// Shift a 7-bit group into place, refusing to drop bits
fn shifted(group: u8, shift: u32, what: &str) -> anyhow::Result<u64> {
    let group = (group & PAYLOAD) as u64;
    if shift > 63 || (group << shift) >> shift != group {
        return Err(overflow(what));
    }
    Ok(group << shift)
}

/// Decode an entry header into `(type code, inflated size, bytes consumed)`
pub fn read_entry_header(data: &[u8]) -> anyhow::Result<(u8, u64, usize)> {
    let first = *data.first().ok_or_else(|| truncated("entry header"))?;
    let type_code = (first >> 4) & 0x07;
    let mut size = (first & 0x0f) as u64;
    let mut shift = 4u32;
    let mut consumed = 1;
    let mut byte = first;

    while byte & CONTINUATION != 0 {
        byte = *data.get(consumed).ok_or_else(|| truncated("entry header"))?;
        consumed += 1;

        size |= shifted(byte, shift, "entry header")?;
        shift += 7;
    }

    Ok((type_code, size, consumed))
}

/// Decode an OFS_DELTA distance into `(distance, bytes consumed)`
pub fn read_offset_distance(data: &[u8]) -> anyhow::Result<(u64, usize)> {
    let mut byte = *data.first().ok_or_else(|| truncated("delta offset"))?;
    let mut distance = (byte & PAYLOAD) as u64;
    let mut consumed = 1;

    while byte & CONTINUATION != 0 {
        byte = *data.get(consumed).ok_or_else(|| truncated("delta offset"))?;
        consumed += 1;

        distance = distance
            .checked_add(1)
            .filter(|value| *value <= u64::MAX >> 7)
            .ok_or_else(|| overflow("delta offset"))?;
        distance = (distance << 7) | (byte & PAYLOAD) as u64;
    }

    Ok((distance, consumed))
}

/// Decode a delta size into `(size, bytes consumed)`
pub fn read_size(data: &[u8]) -> anyhow::Result<(u64, usize)> {
    let mut size = 0u64;
    let mut shift = 0u32;
    let mut consumed = 0;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| truncated("delta size"))?;
        consumed += 1;

        size |= shifted(byte, shift, "delta size")?;
        shift += 7;

        if byte & CONTINUATION == 0 {
            return Ok((size, consumed));
        }
    }
}

pub fn encode_entry_header(type_code: u8, size: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut remaining = size >> 4;
    let mut first = ((type_code & 0x07) << 4) | (size & 0x0f) as u8;
    if remaining != 0 {
        first |= CONTINUATION;
    }
    out.push(first);

    while remaining != 0 {
        let mut byte = (remaining & PAYLOAD as u64) as u8;
        remaining >>= 7;
        if remaining != 0 {
            byte |= CONTINUATION;
        }
        out.push(byte);
    }

    out
}

pub fn encode_offset_distance(mut distance: u64) -> Vec<u8> {
    let mut out = vec![(distance & PAYLOAD as u64) as u8];
    distance >>= 7;

    while distance != 0 {
        distance -= 1;
        out.push((distance & PAYLOAD as u64) as u8 | CONTINUATION);
        distance >>= 7;
    }

    out.reverse();
    out
}

pub fn encode_size(mut size: u64) -> Vec<u8> {
    let mut out = Vec::new();

    loop {
        let byte = (size & PAYLOAD as u64) as u8;
        size >>= 7;
        if size == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | CONTINUATION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0x30], 3, 0)]
    #[case(&[0x95, 0x0a], 1, 0xa5)]
    #[case(&[0xbf, 0x7f], 3, 0x7ff)]
    fn decodes_entry_headers(#[case] bytes: &[u8], #[case] type_code: u8, #[case] size: u64) {
        pretty_assertions::assert_eq!(
            read_entry_header(bytes).unwrap(),
            (type_code, size, bytes.len())
        );
    }

    #[test]
    fn offset_distance_adds_one_per_continuation() {
        // (0 + 1) << 7 | 0 = 128, the smallest two-byte distance
        pretty_assertions::assert_eq!(read_offset_distance(&[0x80, 0x00]).unwrap(), (128, 2));
    }

    #[rstest]
    #[case::header(read_entry_header(&[0x95]).map(|_| ()))]
    #[case::offset(read_offset_distance(&[0x81]).map(|_| ()))]
    #[case::size(read_size(&[0xff, 0xff]).map(|_| ()))]
    #[case::empty(read_size(&[]).map(|_| ()))]
    fn reports_truncated_varints(#[case] result: anyhow::Result<()>) {
        let err = result.unwrap_err();
        assert!(matches!(BitError::kind_of(&err), Some(BitError::Format(_))));
    }

    #[test]
    fn reports_overflowing_varints() {
        let mut bytes = vec![0xff; 11];
        bytes.push(0x01);

        assert!(read_size(&bytes).is_err());
        assert!(read_offset_distance(&bytes).is_err());
        assert!(read_entry_header(&bytes).is_err());
    }

    proptest! {
        #[test]
        fn encoders_agree_with_decoders(value in 0u64..(1 << 56), type_code in 1u8..8) {
            prop_assert_eq!(read_size(&encode_size(value)).unwrap().0, value);
            prop_assert_eq!(read_offset_distance(&encode_offset_distance(value)).unwrap().0, value);

            let (decoded_type, decoded_size, _) =
                read_entry_header(&encode_entry_header(type_code, value)).unwrap();
            prop_assert_eq!(decoded_type, type_code);
            prop_assert_eq!(decoded_size, value);
        }
    }
}

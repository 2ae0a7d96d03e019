//! Delta instruction decoding
//!
//! A delta payload starts with the expected base size and the resulting
//! target size, followed by instructions:
//!
//! - `1oooosss` copy: up to 4 offset bytes and 3 size bytes follow, selected
//!   by the low bits; a size of zero means 0x10000
//! - `0nnnnnnn` insert: the next `n` bytes are copied literally (`n > 0`)
//! - `00000000` is reserved and rejected

use crate::artifacts::pack::varint;
use crate::errors::BitError;

const COPY: u8 = 0x80;
const DEFAULT_COPY_SIZE: usize = 0x10000;

fn malformed(reason: impl Into<String>) -> anyhow::Error {
    BitError::format(format!("malformed delta: {}", reason.into())).into()
}

/// Reconstruct a target object from its base and a delta payload
pub fn apply_delta(base: &[u8], delta: &[u8]) -> anyhow::Result<Vec<u8>> {
    let (source_size, consumed) = varint::read_size(delta)?;
    let mut position = consumed;
    let (target_size, consumed) = varint::read_size(&delta[position..])?;
    position += consumed;

    if source_size != base.len() as u64 {
        return Err(malformed(format!(
            "expects a {source_size}-byte base, got {} bytes",
            base.len()
        )));
    }

    let target_size =
        usize::try_from(target_size).map_err(|_| malformed("target size too large"))?;
    let mut target = Vec::with_capacity(target_size.min(delta.len().saturating_mul(128)));

    while position < delta.len() {
        let instruction = delta[position];
        position += 1;

        if instruction & COPY != 0 {
            let mut offset = 0usize;
            for (bit, shift) in (0..4).zip((0..32).step_by(8)) {
                if instruction & (1 << bit) != 0 {
                    let byte = *delta
                        .get(position)
                        .ok_or_else(|| malformed("truncated copy offset"))?;
                    position += 1;
                    offset |= (byte as usize) << shift;
                }
            }

            let mut size = 0usize;
            for (bit, shift) in (4..7).zip((0..24).step_by(8)) {
                if instruction & (1 << bit) != 0 {
                    let byte = *delta
                        .get(position)
                        .ok_or_else(|| malformed("truncated copy size"))?;
                    position += 1;
                    size |= (byte as usize) << shift;
                }
            }
            if size == 0 {
                size = DEFAULT_COPY_SIZE;
            }

            let range = offset
                .checked_add(size)
                .filter(|end| *end <= base.len())
                .map(|end| offset..end)
                .ok_or_else(|| {
                    malformed(format!(
                        "copy of {size} bytes at {offset} exceeds the {}-byte base",
                        base.len()
                    ))
                })?;
            target.extend_from_slice(&base[range]);
        } else if instruction != 0 {
            let size = instruction as usize;
            let literal = delta
                .get(position..position + size)
                .ok_or_else(|| malformed("truncated insert"))?;
            position += size;
            target.extend_from_slice(literal);
        } else {
            return Err(malformed("reserved instruction 0x00"));
        }

        if target.len() > target_size {
            return Err(malformed("result exceeds the declared target size"));
        }
    }

    if target.len() != target_size {
        return Err(malformed(format!(
            "result is {} bytes, expected {target_size}",
            target.len()
        )));
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::pack::varint::encode_size;
    use rstest::rstest;

    fn delta(source: usize, target: usize, instructions: &[u8]) -> Vec<u8> {
        let mut out = encode_size(source as u64);
        out.extend(encode_size(target as u64));
        out.extend_from_slice(instructions);
        out
    }

    #[test]
    fn copies_and_inserts() {
        let base = b"hello world";
        // copy "hello " (offset 0, size 6), insert "rust", copy nothing else
        let instructions = [&[0x90, 0x06][..], &[0x04], b"rust"].concat();

        let target = apply_delta(base, &delta(base.len(), 10, &instructions)).unwrap();

        pretty_assertions::assert_eq!(target, b"hello rust".to_vec());
    }

    #[test]
    fn copy_uses_multi_byte_offsets() {
        let base = (0..=255u8).cycle().take(0x1_0100).collect::<Vec<_>>();
        // offset 0x0100 (second offset byte only), size 3
        let instructions = [0x92, 0x01, 0x03];

        let target = apply_delta(&base, &delta(base.len(), 3, &instructions)).unwrap();

        pretty_assertions::assert_eq!(target, vec![0, 1, 2]);
    }

    #[test]
    fn zero_copy_size_means_64k() {
        let base = vec![7u8; DEFAULT_COPY_SIZE];
        let instructions = [0x80];

        let target = apply_delta(&base, &delta(base.len(), DEFAULT_COPY_SIZE, &instructions)).unwrap();

        pretty_assertions::assert_eq!(target.len(), DEFAULT_COPY_SIZE);
    }

    #[rstest]
    #[case::wrong_base_size(delta(3, 1, &[0x01, b'x']))]
    #[case::copy_out_of_range(delta(11, 4, &[0x91, 0x09, 0x04]))]
    #[case::reserved(delta(11, 1, &[0x00]))]
    #[case::truncated_insert(delta(11, 4, &[0x04, b'a']))]
    #[case::short_result(delta(11, 5, &[0x01, b'a']))]
    #[case::long_result(delta(11, 1, &[0x02, b'a', b'b']))]
    fn rejects_malformed_deltas(#[case] payload: Vec<u8>) {
        let err = apply_delta(b"hello world", &payload).unwrap_err();

        assert!(matches!(BitError::kind_of(&err), Some(BitError::Format(_))));
    }
}

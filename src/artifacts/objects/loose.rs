//! Loose object framing
//!
//! A loose object file is the zlib stream of `<type> <size>\0<payload>`.

use crate::artifacts::objects::object::{header, Object};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::BitError;
use anyhow::Context;
use bytes::Bytes;
use std::io::{Read, Write};

/// Compressed loose representation of an object
pub fn encode_loose(object: &impl Object) -> anyhow::Result<Bytes> {
    encode_raw(object.object_type(), &object.serialize()?)
}

/// Compressed loose representation of an already serialized payload
pub fn encode_raw(object_type: ObjectType, payload: &[u8]) -> anyhow::Result<Bytes> {
    let mut framed = header(object_type, payload.len());
    framed.extend_from_slice(payload);

    compress(&framed)
}

/// Decompress a loose object and split its header from the payload
pub fn decode_loose(data: &[u8]) -> anyhow::Result<(ObjectType, Bytes)> {
    let content = decompress(data)?;
    split_header(content)
}

/// Split `<type> <size>\0<payload>`, checking the declared size
pub fn split_header(content: Bytes) -> anyhow::Result<(ObjectType, Bytes)> {
    let nul = content
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| BitError::format("object header is not NUL-terminated"))?;
    let header = std::str::from_utf8(&content[..nul])
        .map_err(|_| BitError::format("object header is not ASCII"))?;

    let (object_type, size) = header
        .split_once(' ')
        .ok_or_else(|| BitError::format(format!("malformed object header {header:?}")))?;
    let object_type = ObjectType::try_from(object_type)?;
    let size = size
        .parse::<usize>()
        .map_err(|_| BitError::format(format!("invalid object size {size:?}")))?;

    let payload = content.slice(nul + 1..);
    if payload.len() != size {
        anyhow::bail!(BitError::format(format!(
            "object declares {size} bytes but holds {}",
            payload.len()
        )));
    }

    Ok((object_type, payload))
}

pub fn compress(data: &[u8]) -> anyhow::Result<Bytes> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .context("Unable to compress object content")?;

    encoder
        .finish()
        .map(Bytes::from)
        .context("Unable to finish compressing object content")
}

pub fn decompress(data: &[u8]) -> anyhow::Result<Bytes> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut decompressed_content = Vec::new();
    decoder
        .read_to_end(&mut decompressed_content)
        .map_err(|err| BitError::format(format!("unable to decompress object content: {err}")))?;

    Ok(decompressed_content.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::blob::Blob;
    use proptest::prelude::*;

    #[test]
    fn rejects_size_mismatch() {
        let compressed = compress(b"blob 10\0short").unwrap();

        let err = decode_loose(&compressed).unwrap_err();
        assert!(matches!(BitError::kind_of(&err), Some(BitError::Format(_))));
    }

    #[test]
    fn rejects_non_zlib_data() {
        assert!(decode_loose(b"definitely not zlib").is_err());
    }

    proptest! {
        #[test]
        fn loose_framing_round_trips(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let blob = Blob::new(Bytes::from(payload.clone()));

            let (object_type, decoded) = decode_loose(&encode_loose(&blob).unwrap()).unwrap();

            prop_assert_eq!(object_type, ObjectType::Blob);
            prop_assert_eq!(decoded.to_vec(), payload);
        }
    }
}

use crate::artifacts::index::checksum::Checksum;
use crate::errors::BitError;
use byteorder::ByteOrder;
use bytes::Bytes;
use derive_new::new;

/// Cached tree hashes, stale as soon as an entry changes
pub const TREE: [u8; 4] = *b"TREE";

/// Untracked-file cache, stale as soon as an entry changes
pub const UNTRACKED: [u8; 4] = *b"UNTR";

const EXTENSION_HEADER_SIZE: usize = 8;

/// Opaque extension block, written back exactly as read
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Extension {
    pub signature: [u8; 4],
    pub data: Bytes,
}

impl Extension {
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }

    /// Extensions describing entries rather than carrying independent data
    pub fn is_cache(&self) -> bool {
        self.signature == TREE || self.signature == UNTRACKED
    }

    pub fn read_from(reader: &mut Checksum<&[u8]>) -> anyhow::Result<Self> {
        let header = reader.read(EXTENSION_HEADER_SIZE)?;
        let signature = [header[0], header[1], header[2], header[3]];
        let size = byteorder::NetworkEndian::read_u32(&header[4..8]) as usize;

        let data = reader.read(size).map_err(|_| {
            BitError::format(format!(
                "extension {} declares {size} bytes past the end of the index",
                String::from_utf8_lossy(&signature)
            ))
        })?;

        Ok(Extension {
            signature,
            data: Bytes::copy_from_slice(data),
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(EXTENSION_HEADER_SIZE + self.data.len());
        bytes.extend_from_slice(&self.signature);
        bytes.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

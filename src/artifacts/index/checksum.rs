use crate::artifacts::index::CHECKSUM_SIZE;
use crate::errors::BitError;
use bytes::Bytes;
use sha1::{Digest, Sha1};

/// SHA-1 tracking reader/writer for the index file
///
/// Every byte read or written goes through the digest; the trailing 20 bytes
/// of the file must equal the digest of everything before them.
#[derive(Debug)]
pub struct Checksum<T> {
    inner: T,
    position: usize,
    digest: Sha1,
}

impl<'a> Checksum<&'a [u8]> {
    pub fn reader(data: &'a [u8]) -> Self {
        Checksum {
            inner: data,
            position: 0,
            digest: Sha1::new(),
        }
    }

    pub fn read(&mut self, size: usize) -> anyhow::Result<&'a [u8]> {
        let data: &'a [u8] = self.inner;
        let chunk = data
            .get(self.position..self.position + size)
            .ok_or_else(|| BitError::format("unexpected end-of-file while reading index"))?;

        self.position += size;
        self.digest.update(chunk);
        Ok(chunk)
    }

    /// Bytes not consumed yet, checksum included
    pub fn remaining(&self) -> usize {
        self.inner.len() - self.position
    }

    /// Compare the trailer with the digest and make sure nothing follows it
    pub fn verify(self) -> anyhow::Result<()> {
        let data: &'a [u8] = self.inner;
        let expected = data
            .get(self.position..)
            .filter(|rest| rest.len() == CHECKSUM_SIZE)
            .ok_or_else(|| {
                BitError::format(format!(
                    "expected a {CHECKSUM_SIZE}-byte checksum, found {} bytes",
                    self.remaining()
                ))
            })?;

        if self.digest.finalize().as_slice() != expected {
            anyhow::bail!(BitError::format(
                "checksum does not match value stored on disk"
            ));
        }

        Ok(())
    }
}

impl Checksum<Vec<u8>> {
    pub fn writer() -> Self {
        Checksum {
            inner: Vec::new(),
            position: 0,
            digest: Sha1::new(),
        }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.inner.extend_from_slice(data);
        self.position += data.len();
        self.digest.update(data);
    }

    /// Append the digest and return the complete file
    pub fn write_checksum(mut self) -> Bytes {
        let checksum = self.digest.finalize();
        self.inner.extend_from_slice(checksum.as_slice());
        Bytes::from(self.inner)
    }
}

//! Header block shared by commits and tags
//!
//! ```text
//! <key> <value>\n
//! <key> <first line>\n
//!  <continuation line>\n
//! \n
//! <message>
//! ```
//!
//! Headers are kept as an ordered list of raw key/value pairs, including
//! keys this crate does not interpret, so re-encoding a decoded object
//! reproduces its exact bytes and therefore its object ID.

use crate::errors::BitError;
use bytes::Bytes;

/// Ordered header lines; values are raw bytes since an `encoding` header
/// may announce a non-UTF-8 charset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, Vec<u8>)>);

impl Headers {
    pub fn push(&mut self, key: &str, value: impl Into<Vec<u8>>) {
        self.0.push((key.to_string(), value.into()));
    }

    /// Insert right after the last header named `after`, or at the end
    pub fn insert_after(&mut self, after: &str, key: &str, value: impl Into<Vec<u8>>) {
        let position = self
            .0
            .iter()
            .rposition(|(k, _)| k == after)
            .map_or(self.0.len(), |index| index + 1);
        self.0.insert(position, (key.to_string(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Value of `key` for headers that must be text, such as object IDs
    pub fn get_str(&self, key: &str) -> anyhow::Result<Option<&str>> {
        self.get(key).map(|value| as_text(key, value)).transpose()
    }

    pub fn get_all<'h>(&'h self, key: &str) -> impl Iterator<Item = &'h [u8]> {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Split a commit or tag payload into its headers and message
    pub fn parse(data: &Bytes) -> anyhow::Result<(Headers, Bytes)> {
        let mut headers = Headers::default();
        let mut position = 0;

        loop {
            let line_end = data[position..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|offset| position + offset)
                .ok_or_else(|| BitError::format("missing blank line after object headers"))?;
            let line = &data[position..line_end];
            position = line_end + 1;

            if line.is_empty() {
                break;
            }

            if let Some(continuation) = line.strip_prefix(b" ") {
                let (_, value) = headers
                    .0
                    .last_mut()
                    .ok_or_else(|| BitError::format("continuation line without a header"))?;
                value.push(b'\n');
                value.extend_from_slice(continuation);
                continue;
            }

            let space = line.iter().position(|&b| b == b' ').ok_or_else(|| {
                BitError::format(format!(
                    "malformed header line {:?}",
                    String::from_utf8_lossy(line)
                ))
            })?;
            let key = std::str::from_utf8(&line[..space])
                .map_err(|_| BitError::format("header name is not valid UTF-8"))?;
            headers.push(key, &line[space + 1..]);
        }

        Ok((headers, data.slice(position..)))
    }

    /// Append the encoded headers and the blank separator line to `out`
    pub fn write(&self, out: &mut Vec<u8>) {
        for (key, value) in &self.0 {
            out.extend_from_slice(key.as_bytes());
            out.push(b' ');
            for &byte in value {
                out.push(byte);
                if byte == b'\n' {
                    out.push(b' ');
                }
            }
            out.push(b'\n');
        }
        out.push(b'\n');
    }
}

fn as_text<'v>(key: &str, value: &'v [u8]) -> anyhow::Result<&'v str> {
    std::str::from_utf8(value)
        .map_err(|_| BitError::format(format!("{key} header is not valid UTF-8")).into())
}

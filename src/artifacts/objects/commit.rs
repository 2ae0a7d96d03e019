//! Git commit object
//!
//! Commits represent snapshots of the repository at specific points in time.
//!
//! ## Format
//!
//! ```text
//! tree <tree-sha>
//! parent <parent-sha>            (zero or more, order preserved)
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//! gpgsig <signature>             (optional, multi-line)
//!
//! <commit message>
//! ```
//!
//! Decoded commits keep every header line and the message as raw bytes, so
//! unknown headers such as `mergetag` survive a round trip, as does a message
//! written in the charset an `encoding` header names.

use crate::artifacts::objects::author::Author;
use crate::artifacts::objects::headers::Headers;
use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::BitError;
use bytes::Bytes;

const SIGNATURE_HEADER: &str = "gpgsig";

/// Git commit object
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    /// Tree object ID representing the directory snapshot
    tree_oid: ObjectId,
    /// Parent commit IDs (empty for a root commit, several for a merge)
    parents: Vec<ObjectId>,
    author: Author,
    committer: Author,
    /// Raw header lines in their original order
    headers: Headers,
    message: Bytes,
}

impl Commit {
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        committer: Author,
        message: String,
    ) -> Self {
        let mut headers = Headers::default();
        headers.push("tree", tree_oid.as_ref());
        for parent in &parents {
            headers.push("parent", parent.as_ref());
        }
        headers.push("author", author.display());
        headers.push("committer", committer.display());

        Commit {
            tree_oid,
            parents,
            author,
            committer,
            headers,
            message: Bytes::from(message),
        }
    }

    /// Attach a detached signature (placed after the committer line)
    pub fn with_signature(mut self, signature: &str) -> Self {
        let signature = signature.trim_end_matches('\n');
        self.headers
            .insert_after("committer", SIGNATURE_HEADER, signature);
        self
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn committer(&self) -> &Author {
        &self.committer
    }

    /// Detached signature, if the commit was signed
    pub fn signature(&self) -> Option<&[u8]> {
        self.headers.get(SIGNATURE_HEADER)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// First line of the commit message, lossily decoded
    pub fn short_message(&self) -> String {
        let first_line = self.message.split(|&b| b == b'\n').next().unwrap_or_default();
        String::from_utf8_lossy(first_line).into_owned()
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = Vec::new();
        self.headers.write(&mut content);
        content.extend_from_slice(&self.message);

        Ok(Bytes::from(content))
    }
}

impl Unpackable for Commit {
    fn deserialize(data: Bytes) -> anyhow::Result<Self> {
        let (headers, message) = Headers::parse(&data)?;

        let tree_oid = match headers.iter().next() {
            Some(("tree", value)) => parse_oid("tree", value)?,
            _ => anyhow::bail!(BitError::format("commit must start with a tree header")),
        };

        let parents = headers
            .get_all("parent")
            .map(|parent| parse_oid("parent", parent))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let author = headers
            .get("author")
            .ok_or_else(|| BitError::format("commit is missing the author header"))?;
        let committer = headers
            .get("committer")
            .ok_or_else(|| BitError::format("commit is missing the committer header"))?;

        Ok(Commit {
            tree_oid,
            parents,
            author: Author::try_from(String::from_utf8_lossy(author).as_ref())?,
            committer: Author::try_from(String::from_utf8_lossy(committer).as_ref())?,
            headers,
            message,
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        let mut content = Vec::new();
        self.headers.write(&mut content);
        content.extend_from_slice(&self.message);
        String::from_utf8_lossy(&content).into_owned()
    }
}

fn parse_oid(key: &str, value: &[u8]) -> anyhow::Result<ObjectId> {
    let text = std::str::from_utf8(value)
        .map_err(|_| BitError::format(format!("{key} header is not a valid object ID")))?;
    ObjectId::try_parse(text.to_string())
}

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use derive_new::new;
use sha1::{Digest, Sha1};

/// Canonical payload encoding (without the `<type> <size>\0` header)
pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

/// Decoding from a canonical payload (without the header)
pub trait Unpackable {
    fn deserialize(data: Bytes) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    fn object_id(&self) -> Result<ObjectId> {
        Ok(hash(self.object_type(), &self.serialize()?))
    }
}

/// Object header `<type> <size>\0`
pub fn header(object_type: ObjectType, size: usize) -> Vec<u8> {
    format!("{} {}\0", object_type.as_str(), size).into_bytes()
}

/// Object ID of a payload of the given type
pub fn hash(object_type: ObjectType, payload: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(header(object_type, payload.len()));
    hasher.update(payload);

    // a SHA-1 digest is always 20 bytes, so this cannot fail
    ObjectId::from_raw(hasher.finalize().as_slice()).unwrap_or_default()
}

/// Undecoded object: its kind and canonical payload
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct RawObject {
    pub object_type: ObjectType,
    pub data: Bytes,
}

impl RawObject {
    pub fn object_id(&self) -> ObjectId {
        hash(self.object_type, &self.data)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn parse(&self) -> Result<GitObject> {
        GitObject::deserialize(self.object_type, self.data.clone())
    }
}

/// Any of the four object kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitObject {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl GitObject {
    pub fn deserialize(object_type: ObjectType, data: Bytes) -> Result<Self> {
        Ok(match object_type {
            ObjectType::Blob => GitObject::Blob(Blob::deserialize(data)?),
            ObjectType::Tree => GitObject::Tree(Tree::deserialize(data)?),
            ObjectType::Commit => GitObject::Commit(Commit::deserialize(data)?),
            ObjectType::Tag => GitObject::Tag(Tag::deserialize(data)?),
        })
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            GitObject::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            GitObject::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_commit(&self) -> Option<&Commit> {
        match self {
            GitObject::Commit(commit) => Some(commit),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            GitObject::Tag(tag) => Some(tag),
            _ => None,
        }
    }
}

impl Packable for GitObject {
    fn serialize(&self) -> Result<Bytes> {
        match self {
            GitObject::Blob(blob) => blob.serialize(),
            GitObject::Tree(tree) => tree.serialize(),
            GitObject::Commit(commit) => commit.serialize(),
            GitObject::Tag(tag) => tag.serialize(),
        }
    }
}

impl Object for GitObject {
    fn object_type(&self) -> ObjectType {
        match self {
            GitObject::Blob(_) => ObjectType::Blob,
            GitObject::Tree(_) => ObjectType::Tree,
            GitObject::Commit(_) => ObjectType::Commit,
            GitObject::Tag(_) => ObjectType::Tag,
        }
    }

    fn display(&self) -> String {
        match self {
            GitObject::Blob(blob) => blob.display(),
            GitObject::Tree(tree) => tree.display(),
            GitObject::Commit(commit) => commit.display(),
            GitObject::Tag(tag) => tag.display(),
        }
    }
}

impl From<Blob> for GitObject {
    fn from(blob: Blob) -> Self {
        GitObject::Blob(blob)
    }
}

impl From<Tree> for GitObject {
    fn from(tree: Tree) -> Self {
        GitObject::Tree(tree)
    }
}

impl From<Commit> for GitObject {
    fn from(commit: Commit) -> Self {
        GitObject::Commit(commit)
    }
}

impl From<Tag> for GitObject {
    fn from(tag: Tag) -> Self {
        GitObject::Tag(tag)
    }
}

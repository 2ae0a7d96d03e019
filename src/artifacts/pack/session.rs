//! Delta resolution over one pack
//!
//! A `DecodeSession` materializes pack entries on demand. Every object it
//! produces is memoized by object ID for the lifetime of the session, so a
//! base shared by many deltas is inflated and reconstructed once. Sessions
//! are meant to be short-lived: one per lookup batch or per indexing pass.

use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::pack::delta::apply_delta;
use crate::artifacts::pack::entry::EntryKind;
use crate::artifacts::pack::packfile::Packfile;
use crate::errors::BitError;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Source of delta bases that are not stored in the pack itself (thin packs)
pub trait ExternalBases {
    fn load_base(&self, oid: &ObjectId) -> anyhow::Result<Option<RawObject>>;
}

/// Outcome of resolving an entry while the pack index may still be incomplete
#[derive(Debug)]
pub(crate) enum Resolution {
    Ready(RawObject),
    /// The chain needs this REF_DELTA base, which is not (yet) known
    MissingBase(ObjectId),
}

pub struct DecodeSession<'p> {
    pack: &'p Packfile,
    external: Option<&'p dyn ExternalBases>,
    cache: HashMap<ObjectId, RawObject>,
    resolved: HashMap<u64, ObjectId>,
    offsets: HashMap<ObjectId, u64>,
    depths: HashMap<u64, usize>,
}

impl<'p> DecodeSession<'p> {
    pub fn new(pack: &'p Packfile) -> Self {
        DecodeSession {
            pack,
            external: None,
            cache: HashMap::new(),
            resolved: HashMap::new(),
            offsets: HashMap::new(),
            depths: HashMap::new(),
        }
    }

    pub fn with_external(mut self, external: &'p dyn ExternalBases) -> Self {
        self.external = Some(external);
        self
    }

    /// Object stored at `offset`, with its delta chain applied
    pub fn object_at(&mut self, offset: u64) -> anyhow::Result<RawObject> {
        match self.resolve_at(offset)? {
            Resolution::Ready(object) => Ok(object),
            Resolution::MissingBase(base) => Err(BitError::format(format!(
                "missing delta base {base} for entry at offset {offset}"
            ))
            .into()),
        }
    }

    /// Object with the given ID, if the pack holds it
    pub fn read(&mut self, oid: &ObjectId) -> anyhow::Result<Option<RawObject>> {
        match self.offset_of(oid) {
            Some(offset) => self.object_at(offset).map(Some),
            None => Ok(None),
        }
    }

    /// Object ID of an entry already resolved in this session
    pub fn oid_at(&self, offset: u64) -> Option<&ObjectId> {
        self.resolved.get(&offset)
    }

    /// Delta chain length of an entry already resolved in this session
    pub fn depth_at(&self, offset: u64) -> Option<usize> {
        self.depths.get(&offset).copied()
    }

    /// Offsets discovered by this session, by object ID
    pub(crate) fn into_offsets(self) -> HashMap<ObjectId, u64> {
        self.offsets
    }

    fn offset_of(&self, oid: &ObjectId) -> Option<u64> {
        self.offsets
            .get(oid)
            .copied()
            .or_else(|| self.pack.offset_of(oid))
    }

    fn cached_at(&self, offset: u64) -> Option<RawObject> {
        self.resolved
            .get(&offset)
            .and_then(|oid| self.cache.get(oid))
            .cloned()
    }

    /// Walk the delta chain down to a known base, then patch back up
    ///
    /// Runs in a loop rather than recursing so chain length is bounded by
    /// memory, not by the call stack.
    pub(crate) fn resolve_at(&mut self, offset: u64) -> anyhow::Result<Resolution> {
        if let Some(object) = self.cached_at(offset) {
            trace!(offset, "pack entry cache hit");
            return Ok(Resolution::Ready(object));
        }

        let pack = self.pack;
        let mut chain: Vec<(u64, Vec<u8>)> = Vec::new();
        let mut visited = HashSet::new();
        let mut current = offset;

        let (mut object, mut depth) = loop {
            if let Some(object) = self.cached_at(current) {
                break (object, self.depth_at(current).unwrap_or_default());
            }
            if !visited.insert(current) {
                anyhow::bail!(BitError::format(format!(
                    "delta chain of entry at offset {offset} refers back to itself"
                )));
            }

            let entry = pack.entry_at(current).ok_or_else(|| {
                BitError::format(format!("no pack entry starts at offset {current}"))
            })?;
            let payload = entry.payload(pack.data())?;

            match &entry.kind {
                EntryKind::Object(object_type) => {
                    let object = RawObject::new(*object_type, Bytes::from(payload));
                    self.remember(current, &object, 0);
                    break (object, 0);
                }
                EntryKind::OfsDelta { base_offset } => {
                    chain.push((current, payload));
                    current = *base_offset;
                }
                EntryKind::RefDelta { base } => {
                    chain.push((current, payload));
                    match self.offset_of(base) {
                        Some(base_offset) => current = base_offset,
                        None => match self.load_external(base)? {
                            Some(object) => break (object, 0),
                            None => return Ok(Resolution::MissingBase(base.clone())),
                        },
                    }
                }
            }
        };

        while let Some((entry_offset, delta)) = chain.pop() {
            object = Self::patch(&object, &delta)?;
            depth += 1;
            self.remember(entry_offset, &object, depth);
        }

        Ok(Resolution::Ready(object))
    }

    fn remember(&mut self, offset: u64, object: &RawObject, depth: usize) {
        let oid = object.object_id();
        self.resolved.insert(offset, oid.clone());
        self.offsets.entry(oid.clone()).or_insert(offset);
        self.depths.insert(offset, depth);
        self.cache.insert(oid, object.clone());
    }

    fn load_external(&mut self, oid: &ObjectId) -> anyhow::Result<Option<RawObject>> {
        if let Some(object) = self.cache.get(oid) {
            return Ok(Some(object.clone()));
        }

        let Some(external) = self.external else {
            return Ok(None);
        };
        let object = external.load_base(oid)?;
        if let Some(object) = &object {
            trace!(%oid, "loaded thin pack base from outside the pack");
            self.cache.insert(oid.clone(), object.clone());
        }

        Ok(object)
    }

    fn patch(base: &RawObject, delta: &[u8]) -> anyhow::Result<RawObject> {
        let data = apply_delta(&base.data, delta)?;
        Ok(RawObject::new(base.object_type, Bytes::from(data)))
    }
}

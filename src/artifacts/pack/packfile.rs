//! In-memory pack reader
//!
//! Parsing validates the header and trailer, scans every entry to learn its
//! bounds, then resolves each entry once through a `DecodeSession` to build
//! the `{oid -> offset}` index. REF_DELTA entries whose base appears later in
//! the pack are retried until a pass makes no progress.

use crate::artifacts::objects::object::RawObject;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::pack::entry::{EntryKind, PackEntry};
use crate::artifacts::pack::session::{DecodeSession, ExternalBases, Resolution};
use crate::artifacts::pack::{CHECKSUM_SIZE, HEADER_SIZE, SIGNATURE, SUPPORTED_VERSIONS};
use crate::errors::BitError;
use anyhow::Context;
use byteorder::{ByteOrder, NetworkEndian};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// What `git verify-pack -v` reports for one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackObjectInfo {
    pub oid: ObjectId,
    pub object_type: ObjectType,
    /// Size of the reconstructed object
    pub size: u64,
    /// Bytes used by the entry inside the pack
    pub packed_size: u64,
    pub offset: u64,
    /// Number of deltas applied to reach the object (0 for plain entries)
    pub depth: usize,
    pub base: Option<ObjectId>,
}

#[derive(Debug)]
pub struct Packfile {
    data: Bytes,
    version: u32,
    entries: BTreeMap<u64, PackEntry>,
    index: HashMap<ObjectId, u64>,
}

impl Packfile {
    pub fn parse(data: impl Into<Bytes>) -> anyhow::Result<Self> {
        Self::build(data.into(), None)
    }

    /// Parse a thin pack, taking missing REF_DELTA bases from `bases`
    pub fn parse_with_bases(
        data: impl Into<Bytes>,
        bases: &dyn ExternalBases,
    ) -> anyhow::Result<Self> {
        Self::build(data.into(), Some(bases))
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Unable to read pack file {}", path.display()))?;

        Self::parse(data).with_context(|| format!("Invalid pack file {}", path.display()))
    }

    fn build(data: Bytes, bases: Option<&dyn ExternalBases>) -> anyhow::Result<Self> {
        if data.len() < HEADER_SIZE + CHECKSUM_SIZE {
            anyhow::bail!(BitError::format(format!(
                "truncated pack: {} bytes",
                data.len()
            )));
        }
        if &data[..4] != SIGNATURE {
            anyhow::bail!(BitError::format("bad pack signature"));
        }

        let version = NetworkEndian::read_u32(&data[4..8]);
        if !SUPPORTED_VERSIONS.contains(&version) {
            anyhow::bail!(BitError::format(format!(
                "unsupported pack version {version}"
            )));
        }
        let count = NetworkEndian::read_u32(&data[8..12]);

        let body_end = data.len() - CHECKSUM_SIZE;
        let checksum = Sha1::digest(&data[..body_end]);
        if checksum.as_slice() != &data[body_end..] {
            anyhow::bail!(BitError::format("pack checksum mismatch"));
        }

        let entries = Self::scan(&data[..body_end], count)?;
        let mut pack = Packfile {
            data,
            version,
            entries,
            index: HashMap::new(),
        };

        let index = {
            let mut session = DecodeSession::new(&pack);
            if let Some(bases) = bases {
                session = session.with_external(bases);
            }
            Self::resolve_all(&mut session, pack.entries.keys().copied().collect())?;
            session.into_offsets()
        };
        pack.index = index;

        debug!(
            objects = count,
            version,
            distinct = pack.index.len(),
            "indexed pack"
        );
        Ok(pack)
    }

    fn scan(body: &[u8], count: u32) -> anyhow::Result<BTreeMap<u64, PackEntry>> {
        let mut entries = BTreeMap::new();
        let mut offset = HEADER_SIZE;

        for scanned in 0..count {
            if offset >= body.len() {
                anyhow::bail!(BitError::format(format!(
                    "pack declares {count} objects but holds {scanned}"
                )));
            }

            let entry = PackEntry::scan(body, offset as u64)?;
            offset = entry.data_end;
            entries.insert(entry.offset, entry);
        }

        if offset != body.len() {
            anyhow::bail!(BitError::format(format!(
                "{} unexpected bytes before the pack checksum",
                body.len() - offset
            )));
        }

        Ok(entries)
    }

    /// Resolve every entry, deferring those waiting on a later REF_DELTA base
    fn resolve_all(session: &mut DecodeSession<'_>, mut pending: Vec<u64>) -> anyhow::Result<()> {
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            let mut missing = None;

            for offset in pending {
                if let Resolution::MissingBase(base) = session.resolve_at(offset)? {
                    deferred.push(offset);
                    missing = Some(base);
                }
            }

            if let Some(base) = missing.filter(|_| deferred.len() == before) {
                anyhow::bail!(BitError::format(format!("missing delta base {base}")));
            }
            pending = deferred;
        }

        Ok(())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Trailing SHA-1 of the pack, which also names it on disk
    pub fn checksum(&self) -> anyhow::Result<ObjectId> {
        ObjectId::from_raw(&self.data[self.data.len() - CHECKSUM_SIZE..])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.contains_key(oid)
    }

    pub fn offset_of(&self, oid: &ObjectId) -> Option<u64> {
        self.index.get(oid).copied()
    }

    /// Object IDs held by the pack, in offset order
    pub fn oids(&self) -> Vec<ObjectId> {
        let mut oids = self.index.iter().collect::<Vec<_>>();
        oids.sort_by_key(|(_, offset)| **offset);
        oids.into_iter().map(|(oid, _)| oid.clone()).collect()
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn entry_at(&self, offset: u64) -> Option<&PackEntry> {
        self.entries.get(&offset)
    }

    pub fn session(&self) -> DecodeSession<'_> {
        DecodeSession::new(self)
    }

    /// Read one object with a throwaway session
    pub fn read(&self, oid: &ObjectId) -> anyhow::Result<Option<RawObject>> {
        self.session().read(oid)
    }

    /// Per-entry details, in offset order
    pub fn objects(&self) -> anyhow::Result<Vec<PackObjectInfo>> {
        let mut session = self.session();
        let mut objects = Vec::with_capacity(self.entries.len());

        for (offset, entry) in &self.entries {
            let object = session.object_at(*offset)?;
            let base = match &entry.kind {
                EntryKind::Object(_) => None,
                EntryKind::OfsDelta { base_offset } => session.oid_at(*base_offset).cloned(),
                EntryKind::RefDelta { base } => Some(base.clone()),
            };

            objects.push(PackObjectInfo {
                oid: object.object_id(),
                object_type: object.object_type,
                size: object.size() as u64,
                packed_size: entry.packed_size(),
                offset: *offset,
                depth: session.depth_at(*offset).unwrap_or_default(),
                base,
            });
        }

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object::hash;
    use crate::artifacts::pack::testing::{build_pack, delta_for, TestEntry};
    use crate::artifacts::pack::varint::encode_size;
    use rstest::rstest;
    use std::cell::Cell;

    const BASE: &[u8] = b"the quick brown fox jumps over the lazy dog\n";
    const TARGET: &[u8] = b"the quick brown fox jumps over the lazy cat\n";

    fn blob(data: &[u8]) -> TestEntry {
        TestEntry::Object(ObjectType::Blob, data.to_vec())
    }

    fn assert_format_error(err: anyhow::Error, fragment: &str) {
        assert!(
            matches!(BitError::kind_of(&err), Some(BitError::Format(_))),
            "unexpected error kind: {err:#}"
        );
        assert!(err.to_string().contains(fragment), "{err:#}");
    }

    struct Bases {
        objects: Vec<RawObject>,
        calls: Cell<usize>,
    }

    impl ExternalBases for Bases {
        fn load_base(&self, oid: &ObjectId) -> anyhow::Result<Option<RawObject>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self
                .objects
                .iter()
                .find(|object| &object.object_id() == oid)
                .cloned())
        }
    }

    #[test]
    fn reconstructs_ofs_delta_target() {
        let (bytes, offsets) = build_pack(&[
            blob(BASE),
            TestEntry::OfsDelta {
                base: 0,
                delta: delta_for(BASE, TARGET),
            },
        ]);

        let pack = Packfile::parse(bytes).unwrap();
        let target_oid = hash(ObjectType::Blob, TARGET);

        let object = pack.read(&target_oid).unwrap().unwrap();
        pretty_assertions::assert_eq!(object.data.as_ref(), TARGET);
        pretty_assertions::assert_eq!(object.object_type, ObjectType::Blob);
        pretty_assertions::assert_eq!(pack.offset_of(&target_oid), Some(offsets[1]));
        pretty_assertions::assert_eq!(
            pack.oids(),
            vec![hash(ObjectType::Blob, BASE), target_oid]
        );
    }

    #[test]
    fn resolves_ref_delta_with_base_after_the_delta() {
        let base_oid = hash(ObjectType::Blob, BASE);
        let (bytes, _) = build_pack(&[
            TestEntry::RefDelta {
                base: base_oid.clone(),
                delta: delta_for(BASE, TARGET),
            },
            blob(BASE),
        ]);

        let pack = Packfile::parse(bytes).unwrap();

        let object = pack.read(&hash(ObjectType::Blob, TARGET)).unwrap().unwrap();
        pretty_assertions::assert_eq!(object.data.as_ref(), TARGET);
        assert!(pack.contains(&base_oid));
    }

    #[test]
    fn resolves_delta_chains_and_reports_depth() {
        let third = b"the quick brown fox jumps over the lazy cow\n";
        let (bytes, offsets) = build_pack(&[
            blob(BASE),
            TestEntry::OfsDelta {
                base: 0,
                delta: delta_for(BASE, TARGET),
            },
            TestEntry::OfsDelta {
                base: 1,
                delta: delta_for(TARGET, third),
            },
        ]);

        let pack = Packfile::parse(bytes).unwrap();
        let objects = pack.objects().unwrap();

        pretty_assertions::assert_eq!(
            objects.iter().map(|o| (o.offset, o.depth)).collect::<Vec<_>>(),
            vec![(offsets[0], 0), (offsets[1], 1), (offsets[2], 2)]
        );
        pretty_assertions::assert_eq!(objects[2].oid, hash(ObjectType::Blob, third));
        pretty_assertions::assert_eq!(objects[2].size, third.len() as u64);
        pretty_assertions::assert_eq!(objects[2].base, Some(objects[1].oid.clone()));
    }

    #[test]
    fn reads_the_tip_of_a_very_long_delta_chain() {
        const CHAIN: usize = 5000;
        let revision = |i: usize| format!("revision {i:05}\n").into_bytes();

        let mut entries = vec![blob(&revision(0))];
        for i in 1..=CHAIN {
            entries.push(TestEntry::OfsDelta {
                base: i - 1,
                delta: delta_for(&revision(i - 1), &revision(i)),
            });
        }
        let (bytes, offsets) = build_pack(&entries);

        let pack = Packfile::parse(bytes).unwrap();
        let mut session = pack.session();
        let tip = session.object_at(offsets[CHAIN]).unwrap();

        pretty_assertions::assert_eq!(tip.data.as_ref(), revision(CHAIN).as_slice());
        pretty_assertions::assert_eq!(session.depth_at(offsets[CHAIN]), Some(CHAIN));
        pretty_assertions::assert_eq!(session.depth_at(offsets[1]), Some(1));
    }

    #[test]
    fn shared_base_is_expanded_once_per_session() {
        let base_oid = hash(ObjectType::Blob, BASE);
        let bases = Bases {
            objects: vec![RawObject::new(ObjectType::Blob, Bytes::from_static(BASE))],
            calls: Cell::new(0),
        };
        let (bytes, _) = build_pack(&[
            TestEntry::RefDelta {
                base: base_oid.clone(),
                delta: delta_for(BASE, TARGET),
            },
            TestEntry::RefDelta {
                base: base_oid,
                delta: delta_for(BASE, b"the quick brown fox\n"),
            },
        ]);

        let pack = Packfile::parse_with_bases(bytes, &bases).unwrap();

        pretty_assertions::assert_eq!(bases.calls.get(), 1);
        pretty_assertions::assert_eq!(pack.len(), 2);
    }

    #[test]
    fn thin_pack_objects_need_the_external_base_to_be_read() {
        let base = RawObject::new(ObjectType::Blob, Bytes::from_static(BASE));
        let bases = Bases {
            objects: vec![base.clone()],
            calls: Cell::new(0),
        };
        let (bytes, _) = build_pack(&[TestEntry::RefDelta {
            base: base.object_id(),
            delta: delta_for(BASE, TARGET),
        }]);
        let pack = Packfile::parse_with_bases(bytes, &bases).unwrap();
        let target_oid = hash(ObjectType::Blob, TARGET);

        let with_bases = pack.session().with_external(&bases).read(&target_oid).unwrap();
        pretty_assertions::assert_eq!(with_bases.unwrap().data.as_ref(), TARGET);

        let err = pack.read(&target_oid).unwrap_err();
        assert_format_error(err, "missing delta base");
    }

    #[test]
    fn missing_ref_delta_base_is_fatal() {
        let (bytes, _) = build_pack(&[TestEntry::RefDelta {
            base: hash(ObjectType::Blob, BASE),
            delta: delta_for(BASE, TARGET),
        }]);

        assert_format_error(Packfile::parse(bytes).unwrap_err(), "missing delta base");
    }

    #[test]
    fn ofs_delta_pointing_at_itself_is_a_cycle() {
        let (bytes, _) = build_pack(&[
            blob(BASE),
            TestEntry::OfsDistance {
                distance: 0,
                delta: delta_for(BASE, TARGET),
            },
        ]);

        assert_format_error(Packfile::parse(bytes).unwrap_err(), "refers back to itself");
    }

    #[test]
    fn ofs_delta_before_file_start_is_rejected() {
        let (bytes, _) = build_pack(&[TestEntry::OfsDistance {
            distance: 100,
            delta: delta_for(BASE, TARGET),
        }]);

        assert_format_error(Packfile::parse(bytes).unwrap_err(), "delta offset before file start");
    }

    #[test]
    fn ofs_delta_must_land_on_an_entry() {
        let (bytes, offsets) = build_pack(&[
            blob(BASE),
            TestEntry::OfsDistance {
                distance: 1,
                delta: delta_for(BASE, TARGET),
            },
        ]);
        assert!(offsets[1] - 1 > offsets[0]);

        assert_format_error(Packfile::parse(bytes).unwrap_err(), "no pack entry starts");
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let (mut bytes, _) = build_pack(&[blob(BASE)]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        assert_format_error(Packfile::parse(bytes).unwrap_err(), "checksum mismatch");
    }

    /// Replace the header fields and recompute the trailer
    fn reseal(mut bytes: Vec<u8>, edit: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        bytes.truncate(bytes.len() - CHECKSUM_SIZE);
        edit(&mut bytes);
        let checksum = Sha1::digest(&bytes);
        bytes.extend_from_slice(checksum.as_slice());
        bytes
    }

    #[rstest]
    #[case::signature(|b: &mut Vec<u8>| b[..4].copy_from_slice(b"KCAP"), "bad pack signature")]
    #[case::version(|b: &mut Vec<u8>| b[4..8].copy_from_slice(&4u32.to_be_bytes()), "unsupported pack version 4")]
    #[case::count_too_high(|b: &mut Vec<u8>| b[8..12].copy_from_slice(&3u32.to_be_bytes()), "declares 3 objects but holds 2")]
    #[case::count_too_low(|b: &mut Vec<u8>| b[8..12].copy_from_slice(&1u32.to_be_bytes()), "unexpected bytes")]
    #[case::trailing_garbage(|b: &mut Vec<u8>| b.extend_from_slice(b"junk"), "unexpected bytes")]
    fn rejects_malformed_containers(#[case] edit: fn(&mut Vec<u8>), #[case] fragment: &str) {
        let (bytes, _) = build_pack(&[blob(BASE), blob(TARGET)]);

        let err = Packfile::parse(reseal(bytes, edit)).unwrap_err();

        assert_format_error(err, fragment);
    }

    #[test]
    fn accepts_version_three() {
        let (bytes, _) = build_pack(&[blob(BASE)]);
        let bytes = reseal(bytes, |b| b[4..8].copy_from_slice(&3u32.to_be_bytes()));

        pretty_assertions::assert_eq!(Packfile::parse(bytes).unwrap().version(), 3);
    }

    #[test]
    fn rejects_truncated_packs() {
        let (bytes, _) = build_pack(&[blob(BASE)]);

        assert_format_error(Packfile::parse(bytes[..20].to_vec()).unwrap_err(), "truncated pack");
        assert!(Packfile::parse(bytes[..bytes.len() - 5].to_vec()).is_err());
    }

    #[test]
    fn rejects_delta_with_wrong_source_size() {
        let mut delta = encode_size(3);
        delta.extend(encode_size(1));
        delta.extend_from_slice(&[0x01, b'x']);
        let (bytes, _) = build_pack(&[blob(BASE), TestEntry::OfsDelta { base: 0, delta }]);

        assert_format_error(Packfile::parse(bytes).unwrap_err(), "malformed delta");
    }

    #[test]
    fn empty_pack_is_valid() {
        let (bytes, _) = build_pack(&[]);

        let pack = Packfile::parse(bytes).unwrap();

        assert!(pack.is_empty());
        assert!(pack.objects().unwrap().is_empty());
    }
}

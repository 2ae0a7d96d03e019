//! Object database
//!
//! Objects are read from loose files first, then from the packs under
//! `objects/pack`. Writes always produce loose objects.

use crate::areas::storage::write_atomic;
use crate::artifacts::objects::loose::{decode_loose, encode_raw};
use crate::artifacts::objects::object::{hash, GitObject, Object, RawObject};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::pack::packfile::Packfile;
use crate::artifacts::pack::session::ExternalBases;
use crate::errors::BitError;
use anyhow::Context;
use bytes::Bytes;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, trace, warn};

const PACK_DIR: &str = "pack";
const PACK_EXTENSION: &str = "pack";

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
    /// Packs found on first use
    packs: OnceLock<Vec<Packfile>>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database {
            path,
            packs: OnceLock::new(),
        }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn pack_path(&self) -> PathBuf {
        self.path.join(PACK_DIR)
    }

    fn loose_path(&self, object_id: &ObjectId) -> PathBuf {
        self.path.join(object_id.to_path())
    }

    /// Type and payload of an object, loose or packed
    pub fn read(&self, object_id: &ObjectId) -> anyhow::Result<RawObject> {
        if let Some(object) = self.read_loose(object_id)? {
            return Ok(object);
        }

        for pack in self.packs() {
            let mut session = pack.session().with_external(self);
            if let Some(object) = session.read(object_id)? {
                trace!(oid = %object_id, "read packed object");
                return Ok(object);
            }
        }

        anyhow::bail!(BitError::NotFound(format!("object {object_id}")))
    }

    pub fn parse(&self, object_id: &ObjectId) -> anyhow::Result<GitObject> {
        self.read(object_id)?
            .parse()
            .with_context(|| format!("Unable to parse object {object_id}"))
    }

    pub fn object_type(&self, object_id: &ObjectId) -> anyhow::Result<ObjectType> {
        Ok(self.read(object_id)?.object_type)
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.loose_path(object_id).is_file()
            || self.packs().iter().any(|pack| pack.contains(object_id))
    }

    /// Store an object loose unless it is already present
    pub fn write(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        self.write_raw(object.object_type(), &object.serialize()?)
    }

    /// Same as `write`, for an already serialized payload
    pub fn write_raw(&self, object_type: ObjectType, data: &[u8]) -> anyhow::Result<ObjectId> {
        let object_id = hash(object_type, data);

        if self.contains(&object_id) {
            trace!(oid = %object_id, "object already stored");
            return Ok(object_id);
        }

        let object_path = self.loose_path(&object_id);
        let object_content = encode_raw(object_type, data)?;
        write_atomic(&object_path, &object_content)
            .with_context(|| format!("Unable to write object {object_id}"))?;

        debug!(oid = %object_id, kind = object_type.as_str(), size = data.len(), "wrote object");
        Ok(object_id)
    }

    /// Decode a received pack and store every object in it loose
    ///
    /// REF_DELTA bases missing from the pack are taken from this database.
    pub fn unpack(&self, data: impl Into<Bytes>) -> anyhow::Result<Vec<ObjectId>> {
        let pack = Packfile::parse_with_bases(data, self)?;
        let mut session = pack.session().with_external(self);

        let mut written = Vec::with_capacity(pack.len());
        for object_id in pack.oids() {
            let object = session
                .read(&object_id)?
                .ok_or_else(|| BitError::NotFound(format!("object {object_id} in pack")))?;
            written.push(self.write_raw(object.object_type, &object.data)?);
        }

        debug!(objects = written.len(), "unpacked pack");
        Ok(written)
    }

    /// Every stored object ID, loose and packed, sorted and deduplicated
    pub fn list_objects(&self) -> anyhow::Result<Vec<ObjectId>> {
        let mut object_ids = self.list_loose("")?.into_iter().collect::<BTreeSet<_>>();
        for pack in self.packs() {
            object_ids.extend(pack.oids());
        }

        Ok(object_ids.into_iter().collect())
    }

    /// Find all objects whose OID starts with the given prefix.
    ///
    /// Used to expand abbreviated object IDs. More than one match means the
    /// prefix is ambiguous; the caller decides what to do with it.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        let mut matches = self.list_loose(prefix)?.into_iter().collect::<BTreeSet<_>>();
        for pack in self.packs() {
            matches.extend(
                pack.oids()
                    .into_iter()
                    .filter(|oid| oid.as_ref().starts_with(prefix)),
            );
        }

        Ok(matches.into_iter().collect())
    }

    fn read_loose(&self, object_id: &ObjectId) -> anyhow::Result<Option<RawObject>> {
        let object_path = self.loose_path(object_id);
        let object_content = match std::fs::read(&object_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Unable to read object file {}", object_path.display())
                });
            }
        };

        let (object_type, data) =
            decode_loose(&object_content).map_err(|err| BitError::Corrupt {
                oid: object_id.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Some(RawObject::new(object_type, data)))
    }

    /// Loose object IDs starting with `prefix`
    ///
    /// For prefixes of 2+ characters only the matching fan-out directory is
    /// searched.
    fn list_loose(&self, prefix: &str) -> anyhow::Result<Vec<ObjectId>> {
        if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(Vec::new());
        }

        let dirs = if prefix.len() >= 2 {
            vec![prefix[..2].to_string()]
        } else {
            (0..=255u8).map(|i| format!("{i:02x}")).collect()
        };

        let mut matches = Vec::new();
        for dir_name in dirs {
            let dir_path = self.path.join(&dir_name);
            if !dir_path.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&dir_path)
                .with_context(|| format!("Unable to list {}", dir_path.display()))?
            {
                let file_name = entry?.file_name();
                let full_oid = format!("{dir_name}{}", file_name.to_string_lossy());

                // temporary files and other strays are skipped
                if full_oid.len() == OBJECT_ID_LENGTH
                    && full_oid.starts_with(prefix)
                    && let Ok(oid) = ObjectId::try_parse(full_oid)
                {
                    matches.push(oid);
                }
            }
        }

        Ok(matches)
    }

    fn packs(&self) -> &[Packfile] {
        self.packs.get_or_init(|| self.load_packs())
    }

    fn load_packs(&self) -> Vec<Packfile> {
        let pack_dir = self.pack_path();
        let entries = match std::fs::read_dir(&pack_dir) {
            Ok(entries) => entries,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %pack_dir.display(), %err, "unable to list packs");
                }
                return Vec::new();
            }
        };

        let mut paths = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == PACK_EXTENSION))
            .collect::<Vec<_>>();
        paths.sort();

        paths
            .into_iter()
            .filter_map(|path| match Packfile::open(&path) {
                Ok(pack) => Some(pack),
                Err(err) => {
                    warn!(path = %path.display(), error = ?err, "skipping unreadable pack");
                    None
                }
            })
            .collect()
    }
}

impl ExternalBases for Database {
    fn load_base(&self, oid: &ObjectId) -> anyhow::Result<Option<RawObject>> {
        match self.read(oid) {
            Ok(object) => Ok(Some(object)),
            Err(err) if matches!(BitError::kind_of(&err), Some(BitError::NotFound(_))) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

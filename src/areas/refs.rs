//! Git references (branches, HEAD, tags)
//!
//! References are human-readable names for object IDs. They are stored
//! either as one file per reference under the git directory ("loose") or as
//! lines of the `packed-refs` file. A loose file holds a 40-character hash or
//! `ref: <name>` for symbolic references.
//!
//! ## Resolution
//!
//! [`Refs::resolve`] rewrites a name step by step until it becomes an object
//! ID. Each step tries, in order:
//!
//! 1. `ref: <name>` continues with `<name>`
//! 2. a full 40-character hash is the answer
//! 3. `HEAD` and `MERGE_HEAD` are read from the git directory
//! 4. `refs/...` names are read as they are
//! 5. `refs/heads/<name>`, `refs/tags/<name>` and `refs/remotes/<name>`
//! 6. `packed-refs` lines ending with the name
//!
//! An optional depth limits the number of steps; when it runs out, the value
//! reached so far is returned as is.

use crate::areas::storage::write_atomic;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::packed_refs::PackedRefs;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::ref_value::RefValue;
use crate::artifacts::refs::{
    HEAD, HEADS_PREFIX, MERGE_HEAD, PACKED_REFS, REFS_DIR, REMOTES_PREFIX, SYMREF_PREFIX,
    TAGS_PREFIX,
};
use crate::errors::BitError;
use anyhow::Context;
use derive_new::new;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Steps allowed when no depth is given, so a symbolic loop terminates
const MAX_RESOLVE_HOPS: usize = 32;

/// Outcome of [`Refs::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRef {
    Oid(ObjectId),
    /// Value reached when the depth ran out before an object ID
    Name(String),
}

impl ResolvedRef {
    pub fn oid(&self) -> Option<&ObjectId> {
        match self {
            ResolvedRef::Oid(oid) => Some(oid),
            ResolvedRef::Name(_) => None,
        }
    }
}

impl std::fmt::Display for ResolvedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedRef::Oid(oid) => write!(f, "{oid}"),
            ResolvedRef::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Git references manager
#[derive(Debug, new)]
pub struct Refs {
    /// Path to the git directory (typically `.git`)
    path: Box<Path>,
}

impl Refs {
    pub fn git_path(&self) -> &Path {
        &self.path
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join(REFS_DIR)
    }

    pub fn heads_path(&self) -> PathBuf {
        self.path.join(HEADS_PREFIX)
    }

    pub fn tags_path(&self) -> PathBuf {
        self.path.join(TAGS_PREFIX)
    }

    /// Resolve a name, hash or `ref: ` value
    ///
    /// `depth` is the number of resolution steps allowed; once used up the
    /// current value is returned unresolved.
    pub fn resolve(&self, reference: &str, depth: Option<usize>) -> anyhow::Result<ResolvedRef> {
        let mut current = reference.to_string();
        let mut remaining = depth;

        for _ in 0..MAX_RESOLVE_HOPS {
            if let Some(remaining) = remaining.as_mut() {
                if *remaining == 0 {
                    return Ok(Self::unresolved(current));
                }
                *remaining -= 1;
            }

            if let Some(target) = current.strip_prefix(SYMREF_PREFIX) {
                current = target.to_string();
                continue;
            }

            if ObjectId::is_valid(&current) {
                return Ok(ResolvedRef::Oid(ObjectId::try_parse(current)?));
            }

            match self.lookup(&current)? {
                Some(next) => current = next,
                None => {
                    anyhow::bail!(BitError::NotFound(format!(
                        "could not resolve reference {current}"
                    )))
                }
            }
        }

        anyhow::bail!(BitError::NotFound(format!(
            "could not resolve reference {reference}: more than {MAX_RESOLVE_HOPS} levels of indirection"
        )))
    }

    /// Resolve all the way down to an object ID
    pub fn resolve_oid(&self, reference: &str) -> anyhow::Result<ObjectId> {
        match self.resolve(reference, None)? {
            ResolvedRef::Oid(oid) => Ok(oid),
            ResolvedRef::Name(name) => anyhow::bail!(BitError::NotFound(format!(
                "could not resolve reference {name}"
            ))),
        }
    }

    /// Store the refs advertised by a remote under `refs/remotes/<remote>/`
    ///
    /// Every value is checked before anything is written. Symbolic refs win
    /// over concrete refs with the same key and are rewritten to point inside
    /// the remote's namespace.
    pub fn update_remote_refs(
        &self,
        remote: &str,
        refs: &BTreeMap<String, String>,
        symrefs: &BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        RefName::validate(remote)?;

        for value in refs.values() {
            if !ObjectId::is_valid(value.trim()) {
                anyhow::bail!(BitError::Validation(format!(
                    "unexpected ref contents: '{value}'"
                )));
            }
        }

        let mut combined = refs.clone();
        for (key, target) in symrefs {
            let branch = target.strip_prefix(HEADS_PREFIX).unwrap_or(target);
            let target = format!("{REMOTES_PREFIX}{remote}/{branch}");
            RefName::validate(&target)?;
            combined.insert(key.clone(), format!("{SYMREF_PREFIX}{target}"));
        }

        let mut updates = Vec::with_capacity(combined.len());
        for (key, value) in combined {
            let key = key.strip_prefix(HEADS_PREFIX).unwrap_or(&key);
            let key = key.strip_prefix(TAGS_PREFIX).unwrap_or(key);
            let name = RefName::try_parse(format!("{REMOTES_PREFIX}{remote}/{key}"))?;
            updates.push((name, format!("{}\n", value.trim())));
        }

        for (name, content) in updates {
            write_atomic(&self.path.join(name.as_str()), content.as_bytes())
                .with_context(|| format!("failed to write ref {name}"))?;
            debug!(reference = %name, value = content.trim(), "updated remote ref");
        }

        Ok(())
    }

    /// One ref, loose first, then packed
    pub fn read_ref(&self, name: &str) -> anyhow::Result<Option<RefValue>> {
        if let Some(content) = self.read_loose(name)? {
            return RefValue::parse(&content)?
                .map(Some)
                .ok_or_else(|| BitError::format(format!("invalid contents of ref {name}")).into());
        }

        Ok(self
            .packed_refs()?
            .get(name)
            .map(|packed| RefValue::Direct(packed.oid.clone())))
    }

    pub fn write_ref(&self, name: &str, oid: &ObjectId) -> anyhow::Result<()> {
        self.write_value(name, RefValue::Direct(oid.clone()))
    }

    pub fn write_symbolic_ref(&self, name: &str, target: &str) -> anyhow::Result<()> {
        RefName::validate(target)?;
        self.write_value(name, RefValue::Symbolic(target.to_string()))
    }

    fn write_value(&self, name: &str, value: RefValue) -> anyhow::Result<()> {
        let name = RefName::try_parse(name)?;

        write_atomic(
            &self.path.join(name.as_str()),
            value.to_file_content().as_bytes(),
        )
        .with_context(|| format!("failed to write ref {name}"))?;

        debug!(reference = %name, ?value, "wrote ref");
        Ok(())
    }

    /// Refs whose name starts with `prefix`, resolved to object IDs
    ///
    /// Loose refs override packed ones; symbolic refs are followed and
    /// dropped if they dangle.
    pub fn list_refs(&self, prefix: &str) -> anyhow::Result<BTreeMap<String, ObjectId>> {
        let mut refs = self
            .packed_refs()?
            .entries()
            .iter()
            .filter(|packed| packed.name.starts_with(prefix))
            .map(|packed| (packed.name.clone(), packed.oid.clone()))
            .collect::<BTreeMap<_, _>>();

        let loose_names = WalkDir::new(self.refs_path())
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative_path = entry.path().strip_prefix(&self.path).ok()?;
                let name = relative_path
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                name.starts_with(prefix).then_some(name)
            })
            .collect::<Vec<_>>();

        for name in loose_names {
            let oid = match self.read_ref(&name) {
                Ok(Some(RefValue::Direct(oid))) => oid,
                Ok(Some(RefValue::Symbolic(target))) => match self.resolve(&target, None) {
                    Ok(ResolvedRef::Oid(oid)) => oid,
                    _ => {
                        trace!(reference = %name, %target, "skipping dangling symbolic ref");
                        continue;
                    }
                },
                Ok(None) => continue,
                Err(err) => {
                    warn!(reference = %name, error = ?err, "ignoring broken ref");
                    continue;
                }
            };
            refs.insert(name, oid);
        }

        Ok(refs)
    }

    /// Branch a remote's HEAD points at, `None` if it is detached
    pub fn remote_head_branch(&self, remote: &str) -> anyhow::Result<Option<String>> {
        match self.resolve(&format!("{remote}/{HEAD}"), Some(2))? {
            ResolvedRef::Oid(_) => Ok(None),
            ResolvedRef::Name(name) => {
                let name = name.strip_prefix(SYMREF_PREFIX).unwrap_or(&name);
                let remote_prefix = format!("{REMOTES_PREFIX}{remote}/");
                let branch = name
                    .strip_prefix(&remote_prefix)
                    .or_else(|| name.rsplit('/').next())
                    .unwrap_or(name);
                Ok(Some(branch.to_string()))
            }
        }
    }

    pub fn packed_refs(&self) -> anyhow::Result<PackedRefs> {
        let path = self.path.join(PACKED_REFS);
        match std::fs::read_to_string(&path) {
            Ok(text) => PackedRefs::parse(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PackedRefs::default()),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    /// One resolution step past the `ref: ` and hash checks
    fn lookup(&self, reference: &str) -> anyhow::Result<Option<String>> {
        if reference == HEAD || reference == MERGE_HEAD || reference.starts_with(REFS_DIR) {
            if let Some(content) = self.read_loose(reference)? {
                return Ok(Some(content));
            }
        }

        for prefix in [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX] {
            if let Some(content) = self.read_loose(&format!("{prefix}{reference}"))? {
                return Ok(Some(content));
            }
        }

        let packed_refs = self.packed_refs()?;
        let candidates = packed_refs.matching_suffix(reference);
        match candidates.as_slice() {
            [] => {
                trace!(reference = reference, "no loose or packed ref matches");
                Ok(None)
            }
            [packed] => Ok(Some(packed.oid.to_string())),
            _ => anyhow::bail!(BitError::AmbiguousReference(reference.to_string())),
        }
    }

    /// Trimmed contents of a loose ref file; empty files count as absent
    fn read_loose(&self, name: &str) -> anyhow::Result<Option<String>> {
        if !Self::is_safe_name(name) {
            trace!(reference = name, "not a loose ref path");
            return Ok(None);
        }

        let path = self.path.join(name);
        if path.is_dir() {
            return Ok(None);
        }

        match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                trace!(reference = name, "no loose ref");
                Ok(None)
            }
            Err(err) => Err(err).with_context(|| format!("failed to read ref file at {path:?}")),
        }
    }

    /// Whether `name` stays inside the git directory when used as a path
    fn is_safe_name(name: &str) -> bool {
        !name.is_empty()
            && !name.starts_with('/')
            && name
                .split('/')
                .all(|component| !matches!(component, "" | "." | ".."))
    }

    fn unresolved(value: String) -> ResolvedRef {
        match ObjectId::try_parse(value.clone()) {
            Ok(oid) => ResolvedRef::Oid(oid),
            Err(_) => ResolvedRef::Name(value),
        }
    }
}

use crate::artifacts::refs::{
    HEAD, HEADS_PREFIX, INVALID_REF_NAME_REGEX, MERGE_HEAD, REMOTES_PREFIX, TAGS_PREFIX,
};
use crate::errors::BitError;
use anyhow::Context;
use regex::Regex;
use std::sync::LazyLock;

/// Compiled once per process and shared by every validation
static INVALID_REF_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(INVALID_REF_NAME_REGEX));

/// Namespace a reference belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Branch,
    Tag,
    RemoteTracking,
    Other,
}

/// Validated, slash-separated reference name such as `refs/heads/master`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    pub fn try_parse(name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    pub fn head() -> Self {
        Self(HEAD.to_string())
    }

    pub fn branch(branch: &str) -> anyhow::Result<Self> {
        Self::try_parse(format!("{HEADS_PREFIX}{branch}"))
    }

    /// Check a name (or a fragment of one, such as a remote name)
    pub fn validate(name: &str) -> anyhow::Result<()> {
        if name.is_empty() {
            anyhow::bail!(BitError::Validation(
                "reference name cannot be empty".to_string()
            ));
        }

        let re = INVALID_REF_NAME
            .as_ref()
            .map_err(Clone::clone)
            .with_context(|| format!("invalid ref name regex: {INVALID_REF_NAME_REGEX}"))?;

        if re.is_match(name) {
            anyhow::bail!(BitError::Validation(format!(
                "invalid reference name: {name}"
            )));
        }
        Ok(())
    }

    pub fn kind(&self) -> RefKind {
        RefKind::of(&self.0)
    }

    /// Name without its namespace prefix (`refs/heads/main` -> `main`)
    pub fn short_name(&self) -> &str {
        [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX]
            .iter()
            .find_map(|prefix| self.0.strip_prefix(prefix))
            .unwrap_or(&self.0)
    }

    /// Root-level names live directly in the git directory
    pub fn is_pseudo_ref(&self) -> bool {
        self.0 == HEAD || self.0 == MERGE_HEAD
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RefKind {
    pub fn of(name: &str) -> Self {
        if name.starts_with(HEADS_PREFIX) {
            RefKind::Branch
        } else if name.starts_with(TAGS_PREFIX) {
            RefKind::Tag
        } else if name.starts_with(REMOTES_PREFIX) {
            RefKind::RemoteTracking
        } else {
            RefKind::Other
        }
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

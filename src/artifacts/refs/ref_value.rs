use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::SYMREF_PREFIX;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Contents of a loose ref file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    /// Points straight at an object
    Direct(ObjectId),
    /// Points at another reference (`ref: <name>`)
    Symbolic(String),
}

impl RefValue {
    /// Interpret trimmed file contents; `None` for anything else
    pub fn parse(content: &str) -> anyhow::Result<Option<Self>> {
        let content = content.trim();

        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref_match) = symref_match {
            return Ok(Some(RefValue::Symbolic(symref_match[1].trim().to_string())));
        }

        if ObjectId::is_valid(content) {
            return Ok(Some(RefValue::Direct(ObjectId::try_parse(content.to_string())?)));
        }

        Ok(None)
    }

    /// Newline-terminated file contents
    pub fn to_file_content(&self) -> String {
        match self {
            RefValue::Direct(oid) => format!("{oid}\n"),
            RefValue::Symbolic(target) => format!("{SYMREF_PREFIX}{target}\n"),
        }
    }

    pub fn oid(&self) -> Option<&ObjectId> {
        match self {
            RefValue::Direct(oid) => Some(oid),
            RefValue::Symbolic(_) => None,
        }
    }
}

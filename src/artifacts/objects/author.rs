//! Author, committer and tagger identities
//!
//! Format: `<name> <<email>> <unix-seconds> <+HHMM|-HHMM>`

use crate::errors::BitError;
use chrono::{DateTime, FixedOffset};

/// Author or committer information
///
/// Contains name, email, and timestamp with timezone information.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Author {
    /// Create a new author with the current timestamp
    pub fn new(name: String, email: String) -> Self {
        Author {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(name: String, email: String, timestamp: DateTime<FixedOffset>) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// "Name <email@example.com>"
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// Header form: "Name <email> timestamp timezone"
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    fn parse_timezone(timezone: &str) -> Option<FixedOffset> {
        let (sign, digits) = match timezone.as_bytes().first()? {
            b'+' => (1, &timezone[1..]),
            b'-' => (-1, &timezone[1..]),
            _ => return None,
        };
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let hours: i32 = digits[..2].parse().ok()?;
        let minutes: i32 = digits[2..].parse().ok()?;
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
    }
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| BitError::format(format!("{reason} in identity {value:?}"));

        let email_start = value.find('<').ok_or_else(|| invalid("missing '<'"))?;
        let email_end = value.rfind('>').ok_or_else(|| invalid("missing '>'"))?;
        if email_end < email_start {
            return Err(invalid("misplaced '>'").into());
        }

        let name = value[..email_start].trim_end().to_string();
        let email = value[email_start + 1..email_end].to_string();

        let mut when = value[email_end + 1..].split_whitespace();
        let timestamp = when
            .next()
            .and_then(|seconds| seconds.parse::<i64>().ok())
            .ok_or_else(|| invalid("invalid timestamp"))?;
        let timezone = when
            .next()
            .and_then(Self::parse_timezone)
            .ok_or_else(|| invalid("invalid timezone"))?;
        if when.next().is_some() {
            return Err(invalid("trailing data").into());
        }

        let timestamp = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| invalid("timestamp out of range"))?
            .with_timezone(&timezone);

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

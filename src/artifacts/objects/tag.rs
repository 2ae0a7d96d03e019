//! Git annotated tag object
//!
//! ## Format
//!
//! ```text
//! object <target-sha>
//! type <target-type>
//! tag <tag-name>
//! tagger <name> <email> <timestamp> <timezone>   (optional)
//!
//! <message>
//! -----BEGIN PGP SIGNATURE-----                  (optional, inline)
//! ```
//!
//! The target may be any object kind, not only a commit. The message is kept
//! as raw bytes since it need not be UTF-8.

use crate::artifacts::objects::author::Author;
use crate::artifacts::objects::headers::Headers;
use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::BitError;
use bytes::Bytes;

const SIGNATURE_MARKERS: [&str; 2] = ["-----BEGIN PGP SIGNATURE-----", "-----BEGIN SSH SIGNATURE-----"];

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Tag {
    target: ObjectId,
    target_type: ObjectType,
    name: String,
    tagger: Option<Author>,
    headers: Headers,
    message: Bytes,
}

impl Tag {
    pub fn new(
        target: ObjectId,
        target_type: ObjectType,
        name: String,
        tagger: Option<Author>,
        message: String,
    ) -> Self {
        let mut headers = Headers::default();
        headers.push("object", target.as_ref());
        headers.push("type", target_type.as_str());
        headers.push("tag", name.as_str());
        if let Some(tagger) = &tagger {
            headers.push("tagger", tagger.display());
        }

        Tag {
            target,
            target_type,
            name,
            tagger,
            headers,
            message: Bytes::from(message),
        }
    }

    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> Option<&Author> {
        self.tagger.as_ref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Full message, including an inline signature block if present
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Inline signature block appended to the message, if any
    pub fn signature(&self) -> Option<&[u8]> {
        SIGNATURE_MARKERS
            .iter()
            .filter_map(|marker| {
                self.message
                    .windows(marker.len())
                    .position(|window| window == marker.as_bytes())
            })
            .min()
            .map(|start| &self.message[start..])
    }
}

impl Packable for Tag {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = Vec::new();
        self.headers.write(&mut content);
        content.extend_from_slice(&self.message);

        Ok(Bytes::from(content))
    }
}

impl Unpackable for Tag {
    fn deserialize(data: Bytes) -> anyhow::Result<Self> {
        let (headers, message) = Headers::parse(&data)?;
        let target = ObjectId::try_parse(required(&headers, "object")?.to_string())?;
        let target_type = ObjectType::try_from(required(&headers, "type")?)?;
        let name = required(&headers, "tag")?.to_string();
        let tagger = headers
            .get("tagger")
            .map(|tagger| Author::try_from(String::from_utf8_lossy(tagger).as_ref()))
            .transpose()?;

        Ok(Tag {
            target,
            target_type,
            name,
            tagger,
            headers,
            message,
        })
    }
}

fn required<'h>(headers: &'h Headers, key: &str) -> anyhow::Result<&'h str> {
    headers
        .get_str(key)?
        .ok_or_else(|| BitError::format(format!("tag is missing the {key} header")).into())
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn display(&self) -> String {
        let mut content = Vec::new();
        self.headers.write(&mut content);
        content.extend_from_slice(&self.message);
        String::from_utf8_lossy(&content).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object::hash;

    #[test]
    fn tag_can_point_at_a_blob() {
        let blob_oid = hash(ObjectType::Blob, b"release notes");
        let tagger = Author::try_from("Rel Eng <rel@example.com> 1700000000 +0000").unwrap();
        let tag = Tag::new(
            blob_oid.clone(),
            ObjectType::Blob,
            "notes-v1".into(),
            Some(tagger),
            "notes\n".into(),
        );

        let decoded = Tag::deserialize(tag.serialize().unwrap()).unwrap();

        pretty_assertions::assert_eq!(decoded.target(), &blob_oid);
        pretty_assertions::assert_eq!(decoded.target_type(), ObjectType::Blob);
        pretty_assertions::assert_eq!(decoded, tag);
    }

    #[test]
    fn tagger_is_optional_and_signature_is_exposed() {
        let payload = "object 4b825dc642cb6eb9a060e54bf8d69288fbee4904\ntype tree\ntag old\n\n\
                       v1\n-----BEGIN PGP SIGNATURE-----\nabc\n-----END PGP SIGNATURE-----\n";

        let tag = Tag::deserialize(Bytes::from(payload)).unwrap();

        assert!(tag.tagger().is_none());
        pretty_assertions::assert_eq!(
            tag.signature(),
            Some(&b"-----BEGIN PGP SIGNATURE-----\nabc\n-----END PGP SIGNATURE-----\n"[..])
        );
        pretty_assertions::assert_eq!(tag.serialize().unwrap(), Bytes::from(payload));
    }

    #[test]
    fn non_utf8_message_is_kept_verbatim() {
        let payload = Bytes::from_static(
            b"object 4b825dc642cb6eb9a060e54bf8d69288fbee4904\ntype tree\ntag v2\n\
              tagger Ren\xe9 <r@example.com> 1700000000 +0000\nencoding ISO-8859-1\n\n\
              r\xe9sum\xe9\n",
        );

        let tag = Tag::deserialize(payload.clone()).unwrap();

        pretty_assertions::assert_eq!(tag.name(), "v2");
        pretty_assertions::assert_eq!(tag.message(), b"r\xe9sum\xe9\n");
        assert!(tag.signature().is_none());
        pretty_assertions::assert_eq!(tag.serialize().unwrap(), payload);
    }

    #[test]
    fn rejects_tag_without_target() {
        let err = Tag::deserialize(Bytes::from_static(b"type commit\ntag v1\n\nmsg")).unwrap_err();

        assert!(matches!(BitError::kind_of(&err), Some(BitError::Format(_))));
    }
}

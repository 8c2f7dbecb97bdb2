//! Version tags and client preconditions.
//!
//! A [`VersionTag`] is derived purely from an entity's identity and its last
//! modification time, so two reads of the same unmodified entity always agree
//! and every successful write produces a new tag. The rendered form is a
//! quoted string that can be used verbatim as an HTTP entity tag.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Document, EntityId, Timestamp};

/// Opaque version identifier for one state of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    /// Derive the tag for `(id, updated_at)`.
    pub fn derive(id: EntityId, updated_at: Timestamp) -> Self {
        let input = format!("{}:{}", id, updated_at.timestamp_micros());
        let digest = Sha256::digest(input.as_bytes());
        Self(format!("\"{}\"", hex::encode(digest)))
    }

    /// Tag of a document's current state.
    pub fn of<D: Document>(doc: &D) -> Self {
        Self::derive(doc.id(), doc.updated_at())
    }

    /// Wrap a client-supplied value, adding quotes if they are missing.
    pub fn from_client(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            Self(trimmed.to_string())
        } else {
            Self(format!("\"{}\"", trimmed.trim_matches('"')))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Version a caller expects the entity to be at when writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// `*`: any live version.
    Any,
    /// One of these strong tags. Weak tags are dropped during parsing, so an
    /// empty list never matches.
    OneOf(Vec<VersionTag>),
}

impl ExpectedVersion {
    /// Expect exactly `tag`.
    pub fn exactly(tag: VersionTag) -> Self {
        Self::OneOf(vec![tag])
    }

    /// Parse an `If-Match` header value. Blank input means no
    /// precondition. Writes use strong comparison, so weak tags are dropped.
    pub fn parse(header: &str) -> Option<Self> {
        Self::parse_with(header, false)
    }

    /// Parse an `If-None-Match` header value. Reads use weak comparison:
    /// `W/"tag"` matches `"tag"`.
    pub fn parse_weak(header: &str) -> Option<Self> {
        Self::parse_with(header, true)
    }

    fn parse_with(header: &str, weak: bool) -> Option<Self> {
        let header = header.trim();
        if header.is_empty() {
            return None;
        }
        if header == "*" {
            return Some(Self::Any);
        }
        let tags = header
            .split(',')
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .filter_map(|candidate| match candidate.strip_prefix("W/") {
                Some(opaque) if weak => Some(opaque),
                Some(_) => None,
                None => Some(candidate),
            })
            .map(VersionTag::from_client)
            .collect();
        Some(Self::OneOf(tags))
    }

    /// Byte-for-byte comparison against the current tag.
    pub fn admits(&self, current: &VersionTag) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(tags) => tags.iter().any(|tag| tag == current),
        }
    }
}

/// An entity paired with the tag of the state it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    #[serde(flatten)]
    pub value: T,
    pub version: VersionTag,
}

impl<D: Document> Versioned<D> {
    pub fn from_document(value: D) -> Self {
        let version = VersionTag::of(&value);
        Self { value, version }
    }
}

//! Content type kinds.
//!
//! Document, media and member types live in separate stores but share a
//! single alias namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The family a content type belongs to.
///
/// Selects which store a type is read from and written to. It does not
/// partition aliases: an alias is unique across all three kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentTypeKind {
    /// Page/item types (document types).
    Document,
    /// Media item types.
    Media,
    /// Member profile types.
    Member,
}

impl ContentTypeKind {
    /// All kinds, in store order.
    pub const ALL: [ContentTypeKind; 3] = [Self::Document, Self::Media, Self::Member];

    /// Return the string representation used in snapshots and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Media => "media",
            Self::Member => "member",
        }
    }

    /// Whether types of this kind can be organized into folders.
    pub fn has_containers(&self) -> bool {
        !matches!(self, Self::Member)
    }
}

impl fmt::Display for ContentTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentTypeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "document" | "documentType" => Ok(Self::Document),
            "media" | "mediaType" => Ok(Self::Media),
            "member" | "memberType" => Ok(Self::Member),
            _ => Err(anyhow::anyhow!(
                "invalid content type kind: {s:?} (expected document, media, or member)"
            )),
        }
    }
}

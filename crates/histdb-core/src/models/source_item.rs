use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of source an item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Files or other batch snapshots; ordered by modification time.
    File,
    /// Message streams; ordered by broker timestamp.
    Stream,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Stream => "stream",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "stream" => Ok(Self::Stream),
            other => Err(format!("unknown source kind '{other}'")),
        }
    }
}

/// Identity of one unit of input. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub kind: SourceKind,
    /// Path for files, message id for streams.
    pub locator: String,
    /// Time asserted by the source (file mtime, message timestamp).
    pub source_time: DateTime<Utc>,
}

impl SourceItem {
    pub fn new(kind: SourceKind, locator: impl Into<String>, source_time: DateTime<Utc>) -> Self {
        Self {
            kind,
            locator: locator.into(),
            source_time,
        }
    }
}

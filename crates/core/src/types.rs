//! Object values produced by backends

use std::fmt;
use std::pin::Pin;

use jiff::Timestamp;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// Lazily read object content
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Path and modification time of a listed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Path relative to the backend root
    pub path: String,

    /// Last modification time, absent for directory groupings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
}

impl Metadata {
    /// Metadata for a directory grouping (no timestamp)
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
        }
    }

    /// Metadata for a file
    pub fn file(path: impl Into<String>, last_modified: Option<Timestamp>) -> Self {
        Self {
            path: path.into(),
            last_modified,
        }
    }
}

/// An object with eagerly materialized content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub path: String,
    pub last_modified: Timestamp,
    /// Empty when the object comes from a listing
    pub content: Vec<u8>,
}

impl Object {
    /// Object with no content, as returned by listings
    pub fn listed(path: impl Into<String>, last_modified: Timestamp) -> Self {
        Self {
            path: path.into(),
            last_modified,
            content: Vec::new(),
        }
    }

    /// Whether the path ends in `.{extension}`
    pub fn has_extension(&self, extension: &str) -> bool {
        std::path::Path::new(&self.path)
            .extension()
            .is_some_and(|ext| ext == extension)
    }

    pub fn metadata(&self) -> Metadata {
        Metadata::file(&self.path, Some(self.last_modified))
    }
}

/// An object whose content is read on demand
///
/// The reader owns the underlying file handle or response body and releases
/// it when the stream is dropped.
pub struct ObjectStream {
    pub path: String,
    pub last_modified: Timestamp,
    pub content: ObjectReader,
}

impl ObjectStream {
    /// Read the remaining content into an [`Object`]
    pub async fn into_object(mut self) -> Result<Object> {
        let mut content = Vec::new();
        self.content.read_to_end(&mut content).await?;
        Ok(Object {
            path: self.path,
            last_modified: self.last_modified,
            content,
        })
    }

    /// Release the content without reading it
    pub fn close(self) {
        drop(self.content);
    }
}

impl fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("path", &self.path)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

//! Backend capability traits
//!
//! These traits define the interface every storage provider implements.
//! Operations a provider cannot support have default implementations that
//! fail with [`Error::NotImplemented`].

use async_trait::async_trait;
use http::{Request, Response};

use crate::delivery::{self, ConditionalRead, DeliveryBody, ReadConditions};
use crate::error::{Error, Result};
use crate::page::DirectoryPage;
use crate::types::{Object, ObjectReader, ObjectStream};

/// Canonical object-storage operations
///
/// All paths are relative to the backend's configured root.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short provider name used in logs and CLI output
    fn name(&self) -> &'static str;

    /// List the objects directly under `prefix`
    ///
    /// Returned objects carry no content. Their paths are single segments
    /// relative to `prefix`.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<Object>>;

    /// First page of a depth-one listing of `path`
    ///
    /// `limit <= 0` lets the backend choose the page size.
    async fn list_objects_from_directory(&self, path: &str, limit: i32) -> Result<DirectoryPage> {
        let _ = (path, limit);
        Err(Error::NotImplemented(format!(
            "{}: directory listing",
            self.name()
        )))
    }

    /// Read an object into memory
    async fn get_object(&self, path: &str) -> Result<Object>;

    /// Create or replace an object
    async fn put_object(&self, path: &str, content: Vec<u8>) -> Result<()>;

    /// Delete an object
    async fn delete_object(&self, path: &str) -> Result<()>;

    /// Move an object, or every object under a directory prefix, to `new_path`
    async fn rename_prefix_or_object(&self, path: &str, new_path: &str) -> Result<()> {
        let _ = (path, new_path);
        Err(Error::NotImplemented(format!("{}: rename", self.name())))
    }
}

/// Backends that can read and write content without buffering it
#[async_trait]
pub trait StreamingBackend: Backend {
    /// Open an object for reading
    async fn get_object_stream(&self, path: &str) -> Result<ObjectStream>;

    /// Create or replace an object from `content`
    async fn put_object_stream(&self, path: &str, content: ObjectReader) -> Result<()>;

    /// Read an object subject to HTTP preconditions and an optional range
    async fn get_object_conditional(
        &self,
        path: &str,
        conditions: &ReadConditions,
    ) -> Result<ConditionalRead>;

    /// Answer an HTTP request for `path`
    async fn serve_http(&self, request: &Request<()>, path: &str) -> Response<DeliveryBody> {
        delivery::deliver(self, request, path).await
    }
}

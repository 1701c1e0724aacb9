//! stow-core: Core library for the stowage object-storage abstraction
//!
//! This crate provides the SDK-independent parts of stowage:
//! - Path rules shared by every backend
//! - Single-use paginated directory listings
//! - Snapshot diffing with a time tolerance
//! - Copy-then-delete rename of objects and prefixes
//! - Conditional HTTP delivery of objects
//! - The Backend and StreamingBackend traits, configuration and a local
//!   filesystem backend
//!
//! Vendor SDK adapters live in their own crates and implement the traits
//! defined here.

pub mod config;
pub mod delivery;
pub mod diff;
pub mod error;
pub mod local;
pub mod page;
pub mod path;
pub mod rename;
pub mod traits;
pub mod types;

pub use config::{BackendConfig, Config, ConfigManager, S3Config};
pub use delivery::{ConditionalRead, DeliveryBody, DeliveryMetadata, ReadConditions, deliver};
pub use diff::{ObjectSliceDiff, diff};
pub use error::{Error, Result};
pub use local::LocalFilesystemBackend;
pub use page::{DirectoryPage, PageCursor, PageFetch, PageState};
pub use rename::{CopyStore, KeyListing, rename_prefix_or_object};
pub use traits::{Backend, StreamingBackend};
pub use types::{Metadata, Object, ObjectReader, ObjectStream};

//! stow-s3: Amazon S3 backend for stowage
//!
//! This crate implements the stow-core Backend and StreamingBackend traits
//! on top of aws-sdk-s3. It works with AWS and with S3-compatible services
//! reached through a custom endpoint.

mod backend;
mod listing;

pub use backend::{PART_SIZE, S3Backend};

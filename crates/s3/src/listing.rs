//! Depth-one listing over ListObjectsV2
//!
//! The continuation token returned by S3 is the cursor. A page is truncated
//! only when S3 says so and hands back a token to continue from.

use async_trait::async_trait;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use jiff::Timestamp;
use stow_core::page::{PageCursor, PageFetch};
use stow_core::{Metadata, Object, Result, path};

use crate::backend::{map_sdk_error, to_timestamp};

/// Cursor over one delimited ListObjectsV2 listing
pub(crate) struct S3DirectoryCursor {
    pub(crate) client: aws_sdk_s3::Client,
    pub(crate) bucket: String,
    /// Backend root prefix, stripped from returned keys
    pub(crate) root: String,
    /// Absolute key prefix being listed, with trailing separator
    pub(crate) listing_prefix: String,
    pub(crate) max_keys: Option<i32>,
    pub(crate) continuation_token: Option<String>,
}

#[async_trait]
impl PageCursor for S3DirectoryCursor {
    async fn advance(self: Box<Self>) -> Result<PageFetch> {
        let mut this = self;

        let output = this
            .client
            .list_objects_v2()
            .bucket(&this.bucket)
            .prefix(&this.listing_prefix)
            .delimiter("/")
            .set_max_keys(this.max_keys)
            .set_continuation_token(this.continuation_token.take())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &this.listing_prefix))?;

        let page = ListedPage::from_output(&output, &this.root, &this.listing_prefix);
        tracing::debug!(
            prefix = %this.listing_prefix,
            directories = page.directories.len(),
            files = page.files.len(),
            truncated = page.next_token.is_some(),
            "Listed S3 prefix"
        );

        match page.next_token {
            Some(token) => {
                this.continuation_token = Some(token);
                Ok(PageFetch {
                    directories: page.directories,
                    files: page.files,
                    next: Some(this as Box<dyn PageCursor>),
                })
            }
            None => Ok(PageFetch::last(page.directories, page.files)),
        }
    }
}

/// Normalized contents of one ListObjectsV2 response
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ListedPage {
    pub(crate) directories: Vec<Metadata>,
    pub(crate) files: Vec<Metadata>,
    pub(crate) next_token: Option<String>,
}

impl ListedPage {
    /// Relativize keys to the backend root and drop anything that is not a
    /// direct child of `listing_prefix`
    pub(crate) fn from_output(output: &ListObjectsV2Output, root: &str, listing_prefix: &str) -> Self {
        let mut page = ListedPage::default();

        for common_prefix in output.common_prefixes() {
            let Some(prefix) = common_prefix.prefix() else {
                continue;
            };
            let trimmed = prefix.trim_end_matches(path::SEPARATOR);
            if !is_direct_child(trimmed, listing_prefix) {
                continue;
            }
            page.directories
                .push(Metadata::dir(path::relativize(root, trimmed)));
        }

        for object in output.contents() {
            let Some(key) = object.key() else {
                continue;
            };
            if !is_direct_child(key, listing_prefix) {
                continue;
            }
            page.files.push(Metadata::file(
                path::relativize(root, key),
                object.last_modified().map(to_timestamp),
            ));
        }

        if output.is_truncated().unwrap_or(false) {
            page.next_token = output.next_continuation_token().map(str::to_string);
        }
        page
    }
}

/// Files directly under `key_prefix` in one undelimited ListObjectsV2 response
///
/// Deeper keys and the placeholder for the prefix itself are dropped.
pub(crate) fn flat_objects(output: &ListObjectsV2Output, key_prefix: &str) -> Vec<Object> {
    output
        .contents()
        .iter()
        .filter_map(|object| {
            let relative = path::relativize(key_prefix, object.key()?);
            if !path::is_valid_leaf(&relative) {
                return None;
            }
            let last_modified = object
                .last_modified()
                .map(to_timestamp)
                .unwrap_or(Timestamp::UNIX_EPOCH);
            Some(Object::listed(relative, last_modified))
        })
        .collect()
}

fn is_direct_child(key: &str, listing_prefix: &str) -> bool {
    key.strip_prefix(listing_prefix)
        .is_some_and(path::is_valid_leaf)
}

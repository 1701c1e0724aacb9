//! Prefix or object rename on stores with a native copy primitive
//!
//! Object stores have no rename. A rename is a copy to the new key followed
//! by a delete of the old one, per object. Renaming a directory prefix moves
//! every object below it one copy/delete pair at a time; a failure stops the
//! walk and leaves the objects moved so far at their new location.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::path;

/// One page of keys returned by [`CopyStore::list_keys`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyListing {
    /// Absolute keys
    pub keys: Vec<String>,
    /// Token for the next page, `None` when complete
    pub next_token: Option<String>,
}

/// Store primitives the rename algorithm is built on
///
/// Every key here is absolute, i.e. already joined with the backend root.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CopyStore: Send + Sync {
    /// Whether a single object exists at `key`
    async fn object_exists(&self, key: &str) -> Result<bool>;

    /// List keys under `prefix` at any depth
    async fn list_keys(
        &self,
        prefix: &str,
        max_keys: Option<i32>,
        token: Option<String>,
    ) -> Result<KeyListing>;

    /// Copy the object at `from` to `to`
    async fn copy_key(&self, from: &str, to: &str) -> Result<()>;

    /// Delete the object at `key`
    async fn delete_key(&self, key: &str) -> Result<()>;
}

/// Rename the object or directory prefix at `path` to `new_path`
///
/// Fails with [`Error::NewPathNotEmpty`] when `new_path` is an object or a
/// non-empty prefix, and with [`Error::NotFound`] when `path` is neither.
pub async fn rename_prefix_or_object<S>(
    store: &S,
    root_prefix: &str,
    from: &str,
    to: &str,
) -> Result<()>
where
    S: CopyStore + ?Sized,
{
    let from_key = path::normalize(root_prefix, from);
    let to_key = path::normalize(root_prefix, to);
    let root_key = path::clean(root_prefix);

    if from_key == root_key || to_key == root_key {
        return Err(Error::InvalidPath(
            "cannot rename to or from the backend root".to_string(),
        ));
    }
    if store.object_exists(&to_key).await? {
        return Err(Error::NewPathNotEmpty(to.to_string()));
    }
    let probe = store
        .list_keys(&path::directory_prefix(&to_key), Some(1), None)
        .await?;
    if !probe.keys.is_empty() {
        return Err(Error::NewPathNotEmpty(to.to_string()));
    }

    if store.object_exists(&from_key).await? {
        tracing::debug!(from = %from_key, to = %to_key, "Renaming object");
        return move_object(store, &from_key, &to_key).await;
    }

    // Only a prefix can contain its destination; object keys are independent
    let from_prefix = path::directory_prefix(&from_key);
    if to_key.starts_with(&from_prefix) {
        return Err(Error::InvalidPath(format!(
            "cannot move {from} into itself ({to})"
        )));
    }
    let keys = collect_keys(store, &from_prefix).await?;
    if keys.is_empty() {
        return Err(Error::NotFound(from.to_string()));
    }

    tracing::debug!(
        from = %from_key,
        to = %to_key,
        objects = keys.len(),
        "Renaming prefix"
    );

    let to_prefix = path::directory_prefix(&to_key);
    for (moved, key) in keys.iter().enumerate() {
        let Some(rest) = key.strip_prefix(&from_prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        let destination = format!("{to_prefix}{rest}");
        if let Err(e) = move_object(store, key, &destination).await {
            tracing::warn!(
                key = %key,
                moved,
                remaining = keys.len() - moved,
                error = %e,
                "Prefix rename stopped partway"
            );
            return Err(e);
        }
    }

    Ok(())
}

/// Copy then delete; a failed delete leaves the object at both keys
async fn move_object<S>(store: &S, from: &str, to: &str) -> Result<()>
where
    S: CopyStore + ?Sized,
{
    store.copy_key(from, to).await?;
    if let Err(e) = store.delete_key(from).await {
        tracing::warn!(from, to, error = %e, "Copied object but could not delete source");
        return Err(e);
    }
    Ok(())
}

/// Follow the listing token until every key under `prefix` is known
async fn collect_keys<S>(store: &S, prefix: &str) -> Result<Vec<String>>
where
    S: CopyStore + ?Sized,
{
    let mut keys = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let listing = store.list_keys(prefix, None, token.take()).await?;
        keys.extend(listing.keys);

        match listing.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(keys)
}

//! Local filesystem backend
//!
//! Objects are regular files below a root directory; directory prefixes are
//! real directories. Relative paths are cleaned before use, so `..` can never
//! reach outside the root.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::fs::{self, File, ReadDir};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::config::BackendConfig;
use crate::delivery::{self, ConditionalRead, DeliveryMetadata, ReadConditions};
use crate::error::{Error, Result};
use crate::page::{DirectoryPage, PageCursor, PageFetch};
use crate::path;
use crate::rename::{self, CopyStore, KeyListing};
use crate::traits::{Backend, StreamingBackend};
use crate::types::{Metadata, Object, ObjectReader, ObjectStream};

/// Backend storing objects as files under a root directory
#[derive(Debug, Clone)]
pub struct LocalFilesystemBackend {
    root: PathBuf,
}

impl LocalFilesystemBackend {
    /// Create a backend rooted at `root_directory`, made absolute
    ///
    /// The directory does not need to exist yet.
    pub fn new(root_directory: impl AsRef<Path>) -> Result<Self> {
        let root = root_directory.as_ref();
        if root.as_os_str().is_empty() {
            return Err(Error::Config("root_directory cannot be empty".into()));
        }
        Ok(Self {
            root: std::path::absolute(root)?,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        match config {
            BackendConfig::Local { root_directory } => Self::new(root_directory),
            other => Err(Error::Config(format!(
                "expected a local backend, got {}",
                other.kind()
            ))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, relative: &str) -> PathBuf {
        let cleaned = path::clean(relative);
        if cleaned.is_empty() {
            self.root.clone()
        } else {
            self.root.join(cleaned)
        }
    }

    /// Open a regular file; directories count as missing
    async fn open_file(&self, relative: &str) -> Result<(File, std::fs::Metadata)> {
        let key = path::clean(relative);
        if key.is_empty() {
            return Err(Error::NotFound(relative.to_string()));
        }

        let file = File::open(self.full_path(&key))
            .await
            .map_err(|e| Error::from_io(e, relative))?;
        let meta = file.metadata().await?;
        if meta.is_dir() {
            return Err(Error::NotFound(relative.to_string()));
        }
        Ok((file, meta))
    }

    /// Remove directories emptied by a delete, up to but excluding the root
    async fn prune_empty_parents(&self, deleted: &Path) {
        let mut current = deleted.parent();
        while let Some(dir) = current {
            if dir == self.root.as_path() || !dir.starts_with(&self.root) {
                break;
            }
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            tracing::trace!(dir = %dir.display(), "Removed empty directory");
            current = dir.parent();
        }
    }
}

fn modified_at(meta: &std::fs::Metadata) -> Result<Timestamp> {
    let modified = meta.modified()?;
    Timestamp::try_from(modified)
        .map_err(|e| Error::General(format!("invalid modification time: {e}")))
}

/// Entity tag derived from size and modification time
fn file_etag(size: u64, modified: Timestamp) -> String {
    format!("\"{:x}-{:x}\"", modified.as_second(), size)
}

/// Nothing at the path, including a path that runs through a file
fn is_missing(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
    )
}

fn entry_name(entry: &fs::DirEntry) -> String {
    entry.file_name().to_string_lossy().into_owned()
}

#[async_trait]
impl Backend for LocalFilesystemBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<Object>> {
        let dir = self.full_path(prefix);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry_name(&entry);
            if !path::is_valid_leaf(&name) {
                continue;
            }
            let meta = match fs::metadata(entry.path()).await {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(name = %name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if meta.is_dir() {
                continue;
            }
            objects.push(Object::listed(name, modified_at(&meta)?));
        }

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    async fn list_objects_from_directory(&self, path: &str, limit: i32) -> Result<DirectoryPage> {
        let directory = path::clean(path);
        let full = self.full_path(&directory);

        match fs::metadata(&full).await {
            Ok(meta) if !meta.is_dir() => return Err(Error::PrefixIsAnObject(directory)),
            Ok(_) => {}
            Err(e) if is_missing(&e) => return Ok(DirectoryPage::exhausted()),
            Err(e) => return Err(Error::Io(e)),
        }

        let entries = match fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(e) if is_missing(&e) => return Ok(DirectoryPage::exhausted()),
            Err(e) => return Err(Error::Io(e)),
        };

        tracing::debug!(directory = %directory, limit, "Listing local directory");

        DirectoryPage::start(Box::new(LocalDirectoryCursor {
            directory,
            entries,
            pending: None,
            limit: usize::try_from(limit).unwrap_or(0),
        }))
        .await
    }

    async fn get_object(&self, path: &str) -> Result<Object> {
        self.get_object_stream(path).await?.into_object().await
    }

    async fn put_object(&self, path: &str, content: Vec<u8>) -> Result<()> {
        self.put_object_stream(path, Box::pin(std::io::Cursor::new(content)))
            .await
    }

    async fn delete_object(&self, path: &str) -> Result<()> {
        let key = path::clean(path);
        if key.is_empty() {
            return Err(Error::InvalidPath("cannot delete the backend root".into()));
        }
        fs::remove_file(self.full_path(&key))
            .await
            .map_err(|e| Error::from_io(e, path))
    }

    async fn rename_prefix_or_object(&self, path: &str, new_path: &str) -> Result<()> {
        rename::rename_prefix_or_object(self, "", path, new_path).await
    }
}

#[async_trait]
impl StreamingBackend for LocalFilesystemBackend {
    async fn get_object_stream(&self, path: &str) -> Result<ObjectStream> {
        let (file, meta) = self.open_file(path).await?;
        Ok(ObjectStream {
            path: path.to_string(),
            last_modified: modified_at(&meta)?,
            content: Box::pin(file),
        })
    }

    async fn put_object_stream(&self, path: &str, mut content: ObjectReader) -> Result<()> {
        let key = path::clean(path);
        if key.is_empty() {
            return Err(Error::InvalidPath("object path cannot be empty".into()));
        }

        let full = self.full_path(&key);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(&full).await?;
        let written = tokio::io::copy(&mut content, &mut file).await?;
        file.flush().await?;

        tracing::debug!(path = %key, bytes = written, "Wrote object");
        Ok(())
    }

    async fn get_object_conditional(
        &self,
        path: &str,
        conditions: &ReadConditions,
    ) -> Result<ConditionalRead> {
        let (mut file, meta) = self.open_file(path).await?;
        let last_modified = modified_at(&meta)?;
        let size = meta.len();
        let etag = file_etag(size, last_modified);

        conditions.evaluate(path, Some(last_modified), Some(&etag))?;

        let mut metadata = DeliveryMetadata {
            content_type: Some(
                mime_guess::from_path(path::clean(path))
                    .first_or_octet_stream()
                    .to_string(),
            ),
            etag: Some(etag),
            last_modified: Some(last_modified),
            ..Default::default()
        };

        let range = conditions
            .range
            .as_deref()
            .and_then(|r| delivery::parse_byte_range(r, size));

        let content: ObjectReader = match range {
            Some((start, end)) => {
                let length = end - start + 1;
                file.seek(SeekFrom::Start(start)).await?;
                metadata.content_length = Some(length);
                metadata.content_range = Some(format!("bytes {start}-{end}/{size}"));
                Box::pin(file.take(length))
            }
            None => {
                metadata.content_length = Some(size);
                Box::pin(file)
            }
        };

        Ok(ConditionalRead { metadata, content })
    }
}

#[async_trait]
impl CopyStore for LocalFilesystemBackend {
    async fn object_exists(&self, key: &str) -> Result<bool> {
        if path::clean(key).is_empty() {
            return Ok(false);
        }
        match fs::metadata(self.full_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Keys come back in lexical order; the token is the last key returned
    async fn list_keys(
        &self,
        prefix: &str,
        max_keys: Option<i32>,
        token: Option<String>,
    ) -> Result<KeyListing> {
        let mut keys = Vec::new();
        let mut pending = vec![path::clean(prefix)];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(self.full_path(&dir)).await {
                Ok(entries) => entries,
                Err(e) if is_missing(&e) => continue,
                Err(e) => return Err(Error::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let key = path::normalize(&dir, &entry_name(&entry));
                if entry.file_type().await?.is_dir() {
                    pending.push(key);
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        if let Some(after) = &token {
            keys.retain(|k| k > after);
        }

        let max = max_keys.and_then(|m| usize::try_from(m).ok()).filter(|&m| m > 0);
        let next_token = match max {
            Some(max) if keys.len() > max => {
                keys.truncate(max);
                keys.last().cloned()
            }
            _ => None,
        };

        Ok(KeyListing { keys, next_token })
    }

    async fn copy_key(&self, from: &str, to: &str) -> Result<()> {
        let destination = self.full_path(to);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(self.full_path(from), &destination)
            .await
            .map_err(|e| Error::from_io(e, from))?;
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        let full = self.full_path(key);
        fs::remove_file(&full)
            .await
            .map_err(|e| Error::from_io(e, key))?;
        self.prune_empty_parents(&full).await;
        Ok(())
    }
}

/// Open directory handle carried from page to page
struct LocalDirectoryCursor {
    directory: String,
    entries: ReadDir,
    /// Entry read ahead to learn whether another page exists
    pending: Option<fs::DirEntry>,
    /// Entries per page, 0 for the whole directory
    limit: usize,
}

impl LocalDirectoryCursor {
    async fn next_entry(&mut self) -> Result<Option<fs::DirEntry>> {
        if let Some(entry) = self.pending.take() {
            return Ok(Some(entry));
        }
        Ok(self.entries.next_entry().await?)
    }
}

#[async_trait]
impl PageCursor for LocalDirectoryCursor {
    async fn advance(self: Box<Self>) -> Result<PageFetch> {
        let mut this = self;
        let mut directories = Vec::new();
        let mut files = Vec::new();

        let mut read = 0;
        while this.limit == 0 || read < this.limit {
            let Some(entry) = this.next_entry().await? else {
                return Ok(PageFetch::last(directories, files));
            };
            read += 1;

            let name = entry_name(&entry);
            if !path::is_valid_leaf(&name) {
                continue;
            }
            let entry_path = path::normalize(&this.directory, &name);
            let meta = match fs::metadata(entry.path()).await {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(path = %entry_path, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if meta.is_dir() {
                directories.push(Metadata::dir(entry_path));
            } else {
                files.push(Metadata::file(entry_path, modified_at(&meta).ok()));
            }
        }

        match this.entries.next_entry().await? {
            Some(entry) => {
                this.pending = Some(entry);
                Ok(PageFetch {
                    directories,
                    files,
                    next: Some(this as Box<dyn PageCursor>),
                })
            }
            None => Ok(PageFetch::last(directories, files)),
        }
    }
}

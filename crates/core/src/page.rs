//! Paginated depth-one directory listing
//!
//! Every backend exposes its own pagination primitive: a continuation token,
//! a marker key, an open directory handle. A backend wraps that primitive in
//! a [`PageCursor`] and hands it to [`DirectoryPage::start`]; callers only
//! ever see [`DirectoryPage`].
//!
//! A page is a single-use capability. [`DirectoryPage::next_page`] consumes
//! the page it is called on, so a page can be advanced at most once:
//!
//! ```compile_fail
//! # async fn demo(page: stow_core::DirectoryPage) -> stow_core::Result<()> {
//! let next = page.next_page().await?;
//! let again = page.next_page().await?; // use of moved value: `page`
//! # Ok(())
//! # }
//! ```
//!
//! Enumerating a directory exhaustively:
//!
//! ```no_run
//! # async fn demo(backend: &dyn stow_core::Backend) -> stow_core::Result<()> {
//! let mut page = backend.list_objects_from_directory("charts", 100).await?;
//! loop {
//!     for file in page.files() {
//!         println!("{}", file.path);
//!     }
//!     if !page.is_truncated() {
//!         break;
//!     }
//!     page.free_entries();
//!     page = page.next_page().await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Metadata;

/// Position of a page in its listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Holds a cursor but nothing has been fetched yet
    Fresh,
    /// Holds fetched entries and a cursor for more
    Paged,
    /// Nothing left to fetch
    Exhausted,
}

/// One batch fetched through a [`PageCursor`]
pub struct PageFetch {
    /// Common-prefix groupings, without trailing separator
    pub directories: Vec<Metadata>,
    /// Leaf objects at exactly the listed level
    pub files: Vec<Metadata>,
    /// Cursor for the following batch, `None` when the listing is complete
    pub next: Option<Box<dyn PageCursor>>,
}

impl PageFetch {
    /// A batch with no successor
    pub fn last(directories: Vec<Metadata>, files: Vec<Metadata>) -> Self {
        Self {
            directories,
            files,
            next: None,
        }
    }
}

/// Backend-specific pagination state
///
/// `advance` consumes the cursor; whatever state the next batch needs travels
/// inside the returned [`PageFetch::next`].
#[async_trait]
pub trait PageCursor: Send {
    async fn advance(self: Box<Self>) -> Result<PageFetch>;
}

/// A single page of a depth-one directory listing
pub struct DirectoryPage {
    directories: Vec<Metadata>,
    files: Vec<Metadata>,
    cursor: Option<Box<dyn PageCursor>>,
    state: PageState,
}

impl DirectoryPage {
    /// A page that has not fetched anything yet
    pub fn fresh(cursor: Box<dyn PageCursor>) -> Self {
        Self {
            directories: Vec::new(),
            files: Vec::new(),
            cursor: Some(cursor),
            state: PageState::Fresh,
        }
    }

    /// An empty page with nothing left to fetch
    pub fn exhausted() -> Self {
        Self {
            directories: Vec::new(),
            files: Vec::new(),
            cursor: None,
            state: PageState::Exhausted,
        }
    }

    /// Fetch the first page through `cursor`
    pub async fn start(cursor: Box<dyn PageCursor>) -> Result<Self> {
        Self::fresh(cursor).next_page().await
    }

    /// Directory groupings on this page
    pub fn directories(&self) -> &[Metadata] {
        &self.directories
    }

    /// Files on this page
    pub fn files(&self) -> &[Metadata] {
        &self.files
    }

    /// Take ownership of the directory groupings, leaving the page empty of them
    pub fn take_directories(&mut self) -> Vec<Metadata> {
        std::mem::take(&mut self.directories)
    }

    /// Take ownership of the files, leaving the page empty of them
    pub fn take_files(&mut self) -> Vec<Metadata> {
        std::mem::take(&mut self.files)
    }

    /// Whether more entries can be fetched with [`next_page`](Self::next_page)
    pub fn is_truncated(&self) -> bool {
        self.cursor.is_some()
    }

    /// End-of-sequence signal: no page after this one holds entries
    pub fn is_end_of_listing(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// Release buffered entries; the cursor stays valid
    pub fn free_entries(&mut self) {
        self.directories = Vec::new();
        self.files = Vec::new();
    }

    /// Fetch the successor page, consuming this one
    ///
    /// On an exhausted page this returns another empty, exhausted page.
    pub async fn next_page(self) -> Result<DirectoryPage> {
        let Some(cursor) = self.cursor else {
            return Ok(DirectoryPage::exhausted());
        };

        let fetch = cursor.advance().await?;
        let state = if fetch.next.is_some() {
            PageState::Paged
        } else {
            PageState::Exhausted
        };

        tracing::debug!(
            directories = fetch.directories.len(),
            files = fetch.files.len(),
            truncated = fetch.next.is_some(),
            "Fetched directory page"
        );

        Ok(DirectoryPage {
            directories: fetch.directories,
            files: fetch.files,
            cursor: fetch.next,
            state,
        })
    }
}

impl fmt::Debug for DirectoryPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryPage")
            .field("directories", &self.directories)
            .field("files", &self.files)
            .field("truncated", &self.is_truncated())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves fixed batches, one per advance
    struct VecCursor {
        batches: Vec<(Vec<Metadata>, Vec<Metadata>)>,
    }

    #[async_trait]
    impl PageCursor for VecCursor {
        async fn advance(self: Box<Self>) -> Result<PageFetch> {
            let mut this = self;
            if this.batches.is_empty() {
                return Ok(PageFetch::last(Vec::new(), Vec::new()));
            }
            let (directories, files) = this.batches.remove(0);
            let next: Option<Box<dyn PageCursor>> = if this.batches.is_empty() {
                None
            } else {
                Some(this as Box<dyn PageCursor>)
            };
            Ok(PageFetch {
                directories,
                files,
                next,
            })
        }
    }

    fn cursor(batches: Vec<(Vec<Metadata>, Vec<Metadata>)>) -> Box<dyn PageCursor> {
        Box::new(VecCursor { batches })
    }

    #[test]
    fn test_fresh_page() {
        let page = DirectoryPage::fresh(cursor(vec![]));
        assert_eq!(page.state(), PageState::Fresh);
        assert!(page.is_truncated());
        assert!(page.files().is_empty());
    }

    #[tokio::test]
    async fn test_pages_until_exhausted() {
        let mut page = DirectoryPage::start(cursor(vec![
            (vec![Metadata::dir("d1")], vec![Metadata::file("f1", None)]),
            (vec![], vec![Metadata::file("f2", None)]),
        ]))
        .await
        .unwrap();

        assert_eq!(page.state(), PageState::Paged);
        assert!(page.is_truncated());
        assert_eq!(page.directories()[0].path, "d1");
        assert_eq!(page.files()[0].path, "f1");

        page = page.next_page().await.unwrap();
        assert_eq!(page.state(), PageState::Exhausted);
        assert!(!page.is_truncated());
        assert!(page.is_end_of_listing());
        assert_eq!(page.files()[0].path, "f2");
    }

    #[tokio::test]
    async fn test_next_page_on_exhausted_is_empty() {
        let page = DirectoryPage::exhausted();
        let next = page.next_page().await.unwrap();
        assert_eq!(next.state(), PageState::Exhausted);
        assert!(!next.is_truncated());
        assert!(next.directories().is_empty());
        assert!(next.files().is_empty());
    }

    #[tokio::test]
    async fn test_free_entries_keeps_cursor() {
        let mut page = DirectoryPage::start(cursor(vec![
            (vec![], vec![Metadata::file("f1", None)]),
            (vec![], vec![Metadata::file("f2", None)]),
        ]))
        .await
        .unwrap();

        page.free_entries();
        assert!(page.files().is_empty());
        assert!(page.is_truncated());

        let page = page.next_page().await.unwrap();
        assert_eq!(page.files()[0].path, "f2");
    }

    #[tokio::test]
    async fn test_take_entries() {
        let mut page = DirectoryPage::start(cursor(vec![(
            vec![Metadata::dir("d1")],
            vec![Metadata::file("f1", None)],
        )]))
        .await
        .unwrap();

        let files = page.take_files();
        let dirs = page.take_directories();
        assert_eq!(files.len(), 1);
        assert_eq!(dirs.len(), 1);
        assert!(page.files().is_empty());
    }
}

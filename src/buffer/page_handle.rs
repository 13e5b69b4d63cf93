use crate::buffer::buffer_pool_manager::BufferError;
use crate::concurrency::transaction::{Permissions, TransactionId};
use crate::errors::Result;
use crate::storage::page::{Page, PageId};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Checked reference to a cached page.
///
/// The buffer pool owns the page; a handle only observes it. Once the page is
/// evicted or discarded every access through the handle fails with
/// [`BufferError::StaleHandle`] and the caller must fetch the page again.
/// Closures passed to `read`/`write` must not call back into the buffer pool.
#[derive(Debug, Clone)]
pub struct PageHandle {
    pid: PageId,
    tid: TransactionId,
    perm: Permissions,
    frame: Weak<RwLock<Page>>,
}

impl PageHandle {
    pub(crate) fn new(
        pid: PageId,
        tid: TransactionId,
        perm: Permissions,
        frame: &Arc<RwLock<Page>>,
    ) -> Self {
        Self {
            pid,
            tid,
            perm,
            frame: Arc::downgrade(frame),
        }
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    /// The transaction that fetched the page.
    pub fn transaction(&self) -> TransactionId {
        self.tid
    }

    pub fn permissions(&self) -> Permissions {
        self.perm
    }

    /// Whether the page is still resident under this handle.
    pub fn is_valid(&self) -> bool {
        self.frame.strong_count() > 0
    }

    fn frame(&self) -> Result<Arc<RwLock<Page>>> {
        self.frame
            .upgrade()
            .ok_or_else(|| BufferError::StaleHandle(self.pid).into())
    }

    pub fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Page) -> R,
    {
        let frame = self.frame()?;
        let page = frame.read();
        Ok(f(&page))
    }

    /// Mutable access; only handles fetched with `ReadWrite` may write.
    ///
    /// The page is marked dirty by the fetching transaction before `f` runs,
    /// so commit forces it and eviction leaves it alone.
    pub fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Page) -> R,
    {
        if self.perm != Permissions::ReadWrite {
            return Err(BufferError::ReadOnlyHandle(self.pid).into());
        }
        let frame = self.frame()?;
        let mut page = frame.write();
        page.mark_dirty(Some(self.tid));
        Ok(f(&mut page))
    }

    /// Copy of the page as it is now.
    pub fn snapshot(&self) -> Result<Page> {
        self.read(Page::clone)
    }
}

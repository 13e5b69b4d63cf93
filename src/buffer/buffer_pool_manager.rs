use crate::buffer::page_handle::PageHandle;
use crate::catalog::Catalog;
use crate::concurrency::lock_manager::{LockManager, LockMode};
use crate::concurrency::transaction::{Permissions, TransactionId};
use crate::errors::Result;
use crate::storage::disk::log_file::LogService;
use crate::storage::page::{Page, PageId};
use crate::storage::tuple::Tuple;
use crate::storage::StorageError;
use crate::TableId;
use parking_lot::RwLock;
use rand::seq::IteratorRandom;
use slog::Logger;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("all {0} cached pages are dirty; nothing can be evicted")]
    AllPagesDirty(usize),

    #[error("handle to page {0} outlived its cache entry")]
    StaleHandle(PageId),

    #[error("page {0} was fetched read-only")]
    ReadOnlyHandle(PageId),

    #[error("{tid} does not hold an exclusive lock on page {pid}")]
    LockNotHeld { tid: TransactionId, pid: PageId },
}

type Frame = Arc<RwLock<Page>>;

/// Fixed-capacity page cache. Every page access goes through here: it takes
/// the page lock, loads or evicts pages, and runs the NO-STEAL / FORCE
/// commit protocol.
pub struct BufferPoolManager {
    // Maximum number of resident pages
    pool_size: usize,
    // Resident pages; the cache is the sole owner of each frame
    page_table: RwLock<HashMap<PageId, Frame>>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    log: Arc<dyn LogService>,
    logger: Logger,
}

impl BufferPoolManager {
    pub fn new(
        pool_size: usize,
        catalog: Arc<Catalog>,
        log: Arc<dyn LogService>,
        logger: &Logger,
    ) -> Self {
        Self {
            pool_size,
            page_table: RwLock::new(HashMap::new()),
            lock_manager: LockManager::new(logger),
            catalog,
            log,
            logger: logger.clone(),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn num_cached(&self) -> usize {
        self.page_table.read().len()
    }

    pub fn is_cached(&self, pid: PageId) -> bool {
        self.page_table.read().contains_key(&pid)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    fn frame(&self, pid: PageId) -> Option<Frame> {
        self.page_table.read().get(&pid).cloned()
    }

    /// Locks `pid` for `tid` in the mode `perm` implies, then returns the
    /// cached page, loading it (and evicting a clean page) if needed.
    ///
    /// May block on the page lock; fails with a deadlock abort if waiting
    /// would close a cycle.
    pub fn fetch_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<PageHandle> {
        self.lock_manager.acquire(tid, pid, perm.lock_mode())?;

        if let Some(frame) = self.frame(pid) {
            debug!(self.logger, "cache hit {} for {}", pid, tid);
            return Ok(PageHandle::new(pid, tid, perm, &frame));
        }

        let file = self.catalog.database_file(pid.table_id())?;
        let page = file.read_page(pid)?;

        let mut table = self.page_table.write();
        if let Some(frame) = table.get(&pid) {
            return Ok(PageHandle::new(pid, tid, perm, frame));
        }
        if table.len() >= self.pool_size {
            self.evict_locked(&mut table)?;
        }
        let frame = Arc::new(RwLock::new(page));
        table.insert(pid, frame.clone());
        debug!(self.logger, "cache miss {} for {}, {} resident", pid, tid, table.len());

        Ok(PageHandle::new(pid, tid, perm, &frame))
    }

    /// Releases `tid`'s lock on one page before the transaction ends.
    ///
    /// Breaks strict two-phase locking; only safe for pages the transaction
    /// neither read for its result nor modified.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(pid, tid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds(tid, pid) != LockMode::Free
    }

    /// Adds `tuple` to table `table_id`, caching every page the insert dirtied.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: &Tuple) -> Result<()> {
        let file = self.catalog.database_file(table_id)?;
        for page in file.insert_tuple(self, tid, tuple)? {
            self.mark_and_cache(page, tid)?;
        }
        Ok(())
    }

    /// Removes `tuple` from the table its record id points into.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        let file = self.catalog.database_file(rid.pid.table_id())?;
        for page in file.delete_tuple(self, tid, tuple)? {
            self.mark_and_cache(page, tid)?;
        }
        Ok(())
    }

    /// Marks `page` dirty under `tid` and installs it as the cached version,
    /// evicting first if a new entry would exceed capacity.
    pub fn mark_and_cache(&self, mut page: Page, tid: TransactionId) -> Result<()> {
        let pid = page.get_id();
        if self.lock_manager.holds(tid, pid) != LockMode::Exclusive {
            return Err(BufferError::LockNotHeld { tid, pid }.into());
        }
        page.mark_dirty(Some(tid));

        let mut table = self.page_table.write();
        if let Some(frame) = table.get(&pid) {
            *frame.write() = page;
            return Ok(());
        }
        if table.len() >= self.pool_size {
            self.evict_locked(&mut table)?;
        }
        table.insert(pid, Arc::new(RwLock::new(page)));
        Ok(())
    }

    pub fn commit(&self, tid: TransactionId) -> Result<()> {
        self.transaction_complete(tid, true)
    }

    pub fn abort(&self, tid: TransactionId) -> Result<()> {
        self.transaction_complete(tid, false)
    }

    /// Ends `tid`. On commit every page it holds exclusively is forced to
    /// disk and gets a fresh before-image; on abort those pages are dropped
    /// so the next reader sees the durable version. All locks go last.
    ///
    /// If a commit-time flush fails the locks stay held and the error is
    /// returned; the caller is expected to abort.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        for pid in self.lock_manager.pages_locked(tid, LockMode::Exclusive) {
            if commit {
                self.flush_page(pid)?;
                if let Some(frame) = self.frame(pid) {
                    frame.write().set_before_image();
                }
            } else {
                self.discard_page(pid);
            }
        }
        self.lock_manager.release_all(tid);
        info!(
            self.logger,
            "{} {}",
            tid,
            if commit { "committed" } else { "aborted" }
        );
        Ok(())
    }

    /// Writes every dirty cached page to disk.
    ///
    /// This also writes uncommitted changes, so it bypasses NO-STEAL; use it
    /// for shutdown and tests only.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pids: Vec<PageId> = self.page_table.read().keys().copied().collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Writes every dirty page `tid` holds exclusively.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for pid in self.lock_manager.pages_locked(tid, LockMode::Exclusive) {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Logs and forces an update record, then writes the page. Clean or
    /// uncached pages are left alone.
    pub fn flush_page(&self, pid: PageId) -> Result<()> {
        let frame = match self.frame(pid) {
            Some(frame) => frame,
            None => return Ok(()),
        };
        let mut page = frame.write();
        let dirtier = match page.is_dirty() {
            Some(tid) => tid,
            None => return Ok(()),
        };

        // Log before data.
        self.log
            .log_update(dirtier, pid, page.get_before_image(), page.get_data())?;
        self.log.force()?;

        let file = self.catalog.database_file(pid.table_id())?;
        file.write_page(&page)?;
        page.mark_dirty(None);
        debug!(self.logger, "flushed {} dirtied by {}", pid, dirtier);
        Ok(())
    }

    /// Drops `pid` from the cache without writing it.
    pub fn discard_page(&self, pid: PageId) {
        if self.page_table.write().remove(&pid).is_some() {
            debug!(self.logger, "discarded {}", pid);
        }
    }

    /// Evicts one clean page and returns its id.
    pub fn evict_page(&self) -> Result<PageId> {
        let mut table = self.page_table.write();
        self.evict_locked(&mut table)
    }

    // Picks a random clean page, preferring one no handle still points at.
    // Dirty pages are never evicted (NO-STEAL), so nothing is written here.
    //
    // A frame being written is waited for rather than skipped. Frame guard
    // holders never take the page table, so this cannot deadlock.
    fn evict_locked(&self, table: &mut HashMap<PageId, Frame>) -> Result<PageId> {
        let clean: Vec<(PageId, bool)> = table
            .iter()
            .filter(|(_, frame)| frame.read().is_dirty().is_none())
            .map(|(pid, frame)| (*pid, Arc::weak_count(frame) > 0))
            .collect();

        let mut rng = rand::thread_rng();
        let victim = clean
            .iter()
            .filter(|(_, referenced)| !referenced)
            .map(|(pid, _)| *pid)
            .choose(&mut rng)
            .or_else(|| clean.iter().map(|(pid, _)| *pid).choose(&mut rng));

        match victim {
            Some(pid) => {
                table.remove(&pid);
                debug!(self.logger, "evicted {}", pid);
                Ok(pid)
            }
            None => {
                warn!(self.logger, "eviction failed: all {} pages dirty", table.len());
                Err(BufferError::AllPagesDirty(table.len()).into())
            }
        }
    }
}

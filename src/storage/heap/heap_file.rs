use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::concurrency::lock_manager::LockMode;
use crate::concurrency::transaction::{Permissions, TransactionId};
use crate::errors::Result;
use crate::storage::disk::disk_manager::DiskManager;
use crate::storage::heap::heap_file_iterator::HeapFileIterator;
use crate::storage::page::{Page, PageId};
use crate::storage::tuple::{Tuple, TupleDesc};
use crate::storage::{DbFile, StorageError};
use crate::{PageNo, TableId};
use slog::Logger;
use std::collections::hash_map::DefaultHasher;
use std::fs::OpenOptions;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

/// An unordered table stored as a flat sequence of slotted pages.
pub struct HeapFile {
    table_id: TableId,
    desc: Arc<TupleDesc>,
    disk_manager: DiskManager,
    logger: Logger,
}

impl HeapFile {
    pub fn open<P: AsRef<Path>>(
        path: P,
        desc: Arc<TupleDesc>,
        page_size: usize,
        logger: &Logger,
    ) -> Result<Self> {
        if Page::slots_per_page(page_size, desc.size()) == 0 {
            return Err(StorageError::TupleTooWide {
                tuple_size: desc.size(),
                page_size,
            }
            .into());
        }
        // Create first so the canonical path exists.
        OpenOptions::new()
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        let canonical = path.as_ref().canonicalize()?;
        let table_id = Self::table_id_for(&canonical);

        let disk_manager = DiskManager::new(&canonical, page_size, logger)?;
        debug!(logger, "opened table {} at {:?}", table_id, canonical);

        Ok(Self {
            table_id,
            desc,
            disk_manager,
            logger: logger.clone(),
        })
    }

    // Stable per file: the hash of its canonical path.
    fn table_id_for(path: &Path) -> TableId {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        hasher.finish()
    }

    pub fn path(&self) -> &Path {
        self.disk_manager.path()
    }

    pub fn page_size(&self) -> usize {
        self.disk_manager.page_size()
    }

    /// Number of page writes issued against the backing file.
    pub fn num_writes(&self) -> u32 {
        self.disk_manager.num_writes()
    }

    pub fn iter<'a>(&'a self, bpm: &'a BufferPoolManager, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, bpm, tid)
    }

    fn page_id(&self, page_no: PageNo) -> PageId {
        PageId::new(self.table_id, page_no)
    }

    // Inserts into the cached page behind `pid` if it has room. A full page
    // is only read, so probing it never dirties it.
    fn try_insert(
        &self,
        bpm: &BufferPoolManager,
        tid: TransactionId,
        pid: PageId,
        tuple: &Tuple,
    ) -> Result<Option<Page>> {
        let handle = bpm.fetch_page(tid, pid, Permissions::ReadWrite)?;
        if handle.read(|page| page.num_empty_slots())? == 0 {
            return Ok(None);
        }
        let page = handle.write(|page| -> Result<Page> {
            page.insert_tuple(tuple)?;
            Ok(page.clone())
        })??;
        Ok(Some(page))
    }
}

impl DbFile for HeapFile {
    fn id(&self) -> TableId {
        self.table_id
    }

    fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    fn read_page(&self, pid: PageId) -> Result<Page> {
        let num_pages = self.num_pages()?;
        if pid.table_id() != self.table_id || pid.page_no() >= num_pages {
            return Err(StorageError::PageOutOfRange { pid, num_pages }.into());
        }
        let mut data = Page::empty_page_data(self.page_size());
        self.disk_manager.read_page(pid.page_no(), &mut data)?;
        Ok(Page::new(pid, self.desc.clone(), data))
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        self.disk_manager
            .write_page(page.get_id().page_no(), page.get_data())
    }

    fn num_pages(&self) -> Result<PageNo> {
        self.disk_manager.num_pages()
    }

    // Growth is not serialized between transactions: two inserters that both
    // find every page full each append a page.
    fn insert_tuple(
        &self,
        bpm: &BufferPoolManager,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<Page>> {
        if **tuple.desc() != *self.desc {
            return Err(StorageError::SchemaMismatch.into());
        }

        for page_no in 0..self.num_pages()? {
            let pid = self.page_id(page_no);
            let held_before = bpm.lock_manager().holds(tid, pid);
            if let Some(page) = self.try_insert(bpm, tid, pid, tuple)? {
                return Ok(vec![page]);
            }
            // Full and untouched by this transaction: no need to keep it exclusive.
            if held_before == LockMode::Free {
                bpm.unsafe_release_page(tid, pid);
            }
        }

        let page_no = self
            .disk_manager
            .append_page(&Page::empty_page_data(self.page_size()))?;
        debug!(self.logger, "table {} grew to {} pages", self.table_id, page_no + 1);

        let pid = self.page_id(page_no);
        match self.try_insert(bpm, tid, pid, tuple)? {
            Some(page) => Ok(vec![page]),
            None => Err(StorageError::PageFull(pid).into()),
        }
    }

    fn delete_tuple(
        &self,
        bpm: &BufferPoolManager,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<Page>> {
        let rid = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        if rid.pid.table_id() != self.table_id {
            return Err(StorageError::WrongTable {
                expected: self.table_id,
                found: rid.pid.table_id(),
            }
            .into());
        }

        let handle = bpm.fetch_page(tid, rid.pid, Permissions::ReadWrite)?;
        let page = handle.write(|page| -> Result<Page> {
            page.delete_tuple(tuple)?;
            Ok(page.clone())
        })??;
        Ok(vec![page])
    }
}

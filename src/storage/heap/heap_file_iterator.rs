use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::concurrency::transaction::{Permissions, TransactionId};
use crate::errors::Result;
use crate::storage::heap::heap_file::HeapFile;
use crate::storage::page::PageId;
use crate::storage::tuple::Tuple;
use crate::storage::{DbFile, StorageError};
use crate::PageNo;
use std::collections::VecDeque;

/// Lazy, rewindable scan over a heap file under shared page locks.
///
/// Pages are fetched in ascending order and one page's tuples are drained
/// before the next page is fetched. Must be `open`ed before use.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    bpm: &'a BufferPoolManager,
    tid: TransactionId,
    num_pages: PageNo,
    next_page: PageNo,
    buffered: VecDeque<Tuple>,
    open: bool,
}

impl<'a> HeapFileIterator<'a> {
    pub(crate) fn new(file: &'a HeapFile, bpm: &'a BufferPoolManager, tid: TransactionId) -> Self {
        Self {
            file,
            bpm,
            tid,
            num_pages: 0,
            next_page: 0,
            buffered: VecDeque::new(),
            open: false,
        }
    }

    pub fn open(&mut self) -> Result<()> {
        self.num_pages = self.file.num_pages()?;
        self.next_page = 0;
        self.buffered.clear();
        self.open = true;
        Ok(())
    }

    /// Restarts the scan from page zero.
    pub fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.open = false;
        self.next_page = 0;
        self.buffered.clear();
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn load_next_page(&mut self) -> Result<()> {
        let pid = PageId::new(self.file.id(), self.next_page);
        let handle = self.bpm.fetch_page(self.tid, pid, Permissions::ReadOnly)?;
        self.buffered = handle.read(|page| page.tuples())??.into();
        self.next_page += 1;
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<Tuple>> {
        if !self.open {
            return Err(StorageError::IteratorNotOpen.into());
        }
        loop {
            if let Some(tuple) = self.buffered.pop_front() {
                return Ok(Some(tuple));
            }
            if self.next_page >= self.num_pages {
                return Ok(None);
            }
            self.load_next_page()?;
        }
    }
}

impl<'a> Iterator for HeapFileIterator<'a> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

pub mod disk;
pub mod heap;
pub mod page;
pub mod tuple;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::concurrency::transaction::TransactionId;
use crate::errors::Result;
use crate::storage::page::{Page, PageId};
use crate::storage::tuple::{Tuple, TupleDesc};
use crate::{PageNo, TableId};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("page {pid} is beyond the end of a {num_pages}-page file")]
    PageOutOfRange { pid: PageId, num_pages: PageNo },

    #[error("tuple does not match the table schema")]
    SchemaMismatch,

    #[error("tuple of {tuple_size} bytes cannot fit a {page_size}-byte page")]
    TupleTooWide { tuple_size: usize, page_size: usize },

    #[error("page {0} has no empty slot")]
    PageFull(PageId),

    #[error("slot {slot} of page {pid} is empty")]
    SlotEmpty { pid: PageId, slot: usize },

    #[error("tuple has no record id")]
    MissingRecordId,

    #[error("tuple belongs to table {found}, not {expected}")]
    WrongTable { expected: TableId, found: TableId },

    #[error("iterator is not open")]
    IteratorNotOpen,

    #[error("string field is not valid utf-8")]
    InvalidUtf8,
}

/// Page-structured table storage: read/write whole pages, count them, and
/// mutate tuples through the buffer pool.
pub trait DbFile: Send + Sync {
    fn id(&self) -> TableId;

    fn tuple_desc(&self) -> &Arc<TupleDesc>;

    fn read_page(&self, pid: PageId) -> Result<Page>;

    fn write_page(&self, page: &Page) -> Result<()>;

    fn num_pages(&self) -> Result<PageNo>;

    /// Returns the pages modified by the insertion.
    fn insert_tuple(
        &self,
        bpm: &BufferPoolManager,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<Page>>;

    /// Returns the pages modified by the deletion.
    fn delete_tuple(
        &self,
        bpm: &BufferPoolManager,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<Page>>;
}

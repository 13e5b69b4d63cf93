mod buffer;
mod catalog;
mod concurrency;
mod config;
mod database;
mod storage;

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate slog;
extern crate slog_async;
extern crate slog_term;

pub use self::buffer::buffer_pool_manager::{BufferError, BufferPoolManager};
pub use self::buffer::page_handle::PageHandle;
pub use self::catalog::{Catalog, CatalogError};
pub use self::concurrency::lock_manager::{LockError, LockManager, LockMode};
pub use self::concurrency::transaction::{Permissions, TransactionId};
pub use self::concurrency::wait_for_graph::{LockRecord, WaitForGraph};
pub use self::config::Config;
pub use self::database::Database;
pub use self::storage::disk::disk_manager::DiskManager;
pub use self::storage::disk::log_file::{LogFile, LogService, UpdateRecord};
pub use self::storage::heap::heap_file::HeapFile;
pub use self::storage::heap::heap_file_iterator::HeapFileIterator;
pub use self::storage::page::{Page, PageId};
pub use self::storage::tuple::{Field, RecordId, Tuple, TupleDesc, Type, STRING_LEN};
pub use self::storage::{DbFile, StorageError};

pub mod errors {
    pub use anyhow::Error;
    pub use anyhow::Result;

    /// True when `err` is the deadlock abort signal raised by the lock manager.
    pub fn is_transaction_aborted(err: &Error) -> bool {
        err.downcast_ref::<crate::LockError>().is_some()
    }
}

pub fn default_logger() -> slog::Logger {
    use slog::Drain;

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, o!())
}

const DEFAULT_PAGE_SIZE: usize = 4096;
const DEFAULT_POOL_PAGES: usize = 50;

pub type TableId = u64;
pub type PageNo = u32;

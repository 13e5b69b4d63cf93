//! The process-wide context: one catalog, one log, one buffer pool.

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::catalog::Catalog;
use crate::concurrency::transaction::TransactionId;
use crate::config::Config;
use crate::errors::Result;
use crate::storage::disk::log_file::LogService;
use crate::storage::heap::heap_file::HeapFile;
use crate::storage::tuple::TupleDesc;
use parking_lot::RwLock;
use slog::Logger;
use std::path::Path;
use std::sync::Arc;

/// Constructed once and shared by reference counting with every collaborator.
pub struct Database {
    config: Config,
    catalog: Arc<Catalog>,
    log: Arc<dyn LogService>,
    buffer_pool: RwLock<Arc<BufferPoolManager>>,
    logger: Logger,
}

impl Database {
    pub fn new(config: Config, log: Arc<dyn LogService>, logger: &Logger) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPoolManager::new(
            config.pool_pages,
            catalog.clone(),
            log.clone(),
            logger,
        ));
        info!(
            logger,
            "database ready: page_size={}, pool_pages={}", config.page_size, config.pool_pages
        );
        Self {
            config,
            catalog,
            log,
            buffer_pool: RwLock::new(buffer_pool),
            logger: logger.clone(),
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn log(&self) -> &Arc<dyn LogService> {
        &self.log
    }

    pub fn buffer_pool(&self) -> Arc<BufferPoolManager> {
        self.buffer_pool.read().clone()
    }

    /// Opens a heap file with this context's page size and registers it.
    pub fn open_table<P: AsRef<Path>>(
        &self,
        path: P,
        desc: Arc<TupleDesc>,
        name: &str,
    ) -> Result<Arc<HeapFile>> {
        let file = Arc::new(HeapFile::open(path, desc, self.config.page_size, &self.logger)?);
        self.catalog.add_table(file.clone(), name);
        Ok(file)
    }

    pub fn begin(&self) -> TransactionId {
        TransactionId::new()
    }

    /// Swaps in an empty buffer pool with fresh lock state. Holders of the old
    /// pool keep a working but detached instance.
    pub fn reset_buffer_pool(&self) -> Arc<BufferPoolManager> {
        let fresh = Arc::new(BufferPoolManager::new(
            self.config.pool_pages,
            self.catalog.clone(),
            self.log.clone(),
            &self.logger,
        ));
        *self.buffer_pool.write() = fresh.clone();
        debug!(self.logger, "buffer pool reset");
        fresh
    }
}

//! Page-granularity strict two-phase locking with wait-for-graph deadlock detection.

use crate::concurrency::transaction::TransactionId;
use crate::concurrency::wait_for_graph::{LockRecord, WaitForGraph};
use crate::storage::page::PageId;
use parking_lot::{Condvar, Mutex};
use slog::Logger;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Lock strength. Ordered so that `held >= requested` means "strong enough".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockMode {
    Free,
    Shared,
    Exclusive,
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("transaction {tid} aborted: deadlock while waiting for {mode:?} lock on page {pid}")]
    Deadlock {
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
    },
}

/// Lock records currently granted on one page.
#[derive(Debug, Default)]
struct PageLocks {
    holders: Vec<LockRecord>,
}

impl PageLocks {
    fn mode_of(&self, tid: TransactionId) -> LockMode {
        self.holders
            .iter()
            .filter(|record| record.tid == tid)
            .map(|record| record.mode)
            .max()
            .unwrap_or(LockMode::Free)
    }

    /// Aggregate state of the page across all holders.
    fn state(&self) -> LockMode {
        self.holders
            .iter()
            .map(|record| record.mode)
            .max()
            .unwrap_or(LockMode::Free)
    }

    fn admits(&self, tid: TransactionId, mode: LockMode) -> bool {
        match mode {
            LockMode::Free => true,
            LockMode::Shared => !self
                .holders
                .iter()
                .any(|record| record.mode == LockMode::Exclusive && record.tid != tid),
            LockMode::Exclusive => self.state() == LockMode::Free,
        }
    }

    fn blockers(&self, tid: TransactionId) -> Vec<LockRecord> {
        self.holders
            .iter()
            .filter(|record| record.tid != tid)
            .copied()
            .collect()
    }

    fn remove(&mut self, tid: TransactionId) -> bool {
        let before = self.holders.len();
        self.holders.retain(|record| record.tid != tid);
        self.holders.len() != before
    }
}

/// Per-page synchronization scope: the page's lock records plus the condition
/// its waiters sleep on.
#[derive(Debug, Default)]
struct PageLockEntry {
    locks: Mutex<PageLocks>,
    cvar: Condvar,
}

pub struct LockManager {
    table: Mutex<HashMap<PageId, Arc<PageLockEntry>>>,
    waits_for: Mutex<WaitForGraph>,
    logger: Logger,
}

impl LockManager {
    pub fn new(logger: &Logger) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            waits_for: Mutex::new(WaitForGraph::new()),
            logger: logger.clone(),
        }
    }

    fn entry(&self, pid: PageId) -> Arc<PageLockEntry> {
        self.table.lock().entry(pid).or_default().clone()
    }

    fn existing_entry(&self, pid: PageId) -> Option<Arc<PageLockEntry>> {
        self.table.lock().get(&pid).cloned()
    }

    /// Blocks until `tid` holds `pid` in at least `mode`.
    ///
    /// Fails with [`LockError::Deadlock`] when waiting would close a cycle in the
    /// wait-for graph; the caller then never receives the lock and must abort.
    pub fn acquire(
        &self,
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
    ) -> Result<(), LockError> {
        let entry = self.entry(pid);
        let mut locks = entry.locks.lock();

        let held = locks.mode_of(tid);
        if held >= mode {
            return Ok(());
        }

        // Upgrade: give up the shared lock, then wait for the page to drain.
        if mode == LockMode::Exclusive && held == LockMode::Shared {
            locks.remove(tid);
            entry.cvar.notify_all();
        }

        loop {
            if locks.admits(tid, mode) {
                locks.holders.push(LockRecord { tid, mode, pid });
                self.waits_for.lock().clear_waiting(tid);
                // New holders change what other waiters are blocked behind.
                entry.cvar.notify_all();
                debug!(self.logger, "{} granted {:?} on {}", tid, mode, pid);
                return Ok(());
            }

            {
                let mut graph = self.waits_for.lock();
                graph.set_waiting(tid, locks.blockers(tid));
                if graph.has_cycle_from(tid) {
                    graph.clear_waiting(tid);
                    warn!(
                        self.logger,
                        "deadlock: {} aborted requesting {:?} on {}", tid, mode, pid
                    );
                    return Err(LockError::Deadlock { tid, pid, mode });
                }
            }

            entry.cvar.wait(&mut locks);
        }
    }

    /// Drops every lock record `tid` has on `pid` and wakes the page's waiters.
    ///
    /// Edges pointing at the released lock go at once, so no other acquire can
    /// see a cycle through it before the waiters wake.
    pub fn release(&self, pid: PageId, tid: TransactionId) {
        if let Some(entry) = self.existing_entry(pid) {
            let mut locks = entry.locks.lock();
            if locks.remove(tid) {
                self.waits_for.lock().remove_holder(tid, pid);
                debug!(self.logger, "{} released {}", tid, pid);
                entry.cvar.notify_all();
            }
        }
    }

    /// Strongest mode `tid` holds on `pid`, or `Free`.
    pub fn holds(&self, tid: TransactionId, pid: PageId) -> LockMode {
        match self.existing_entry(pid) {
            Some(entry) => entry.locks.lock().mode_of(tid),
            None => LockMode::Free,
        }
    }

    /// Pages on which `tid` holds exactly `mode`.
    pub fn pages_locked(&self, tid: TransactionId, mode: LockMode) -> Vec<PageId> {
        let entries: Vec<(PageId, Arc<PageLockEntry>)> = self
            .table
            .lock()
            .iter()
            .map(|(pid, entry)| (*pid, entry.clone()))
            .collect();

        entries
            .into_iter()
            .filter(|(_, entry)| entry.locks.lock().mode_of(tid) == mode)
            .map(|(pid, _)| pid)
            .collect()
    }

    /// Releases everything `tid` holds and erases it from the wait-for graph.
    pub fn release_all(&self, tid: TransactionId) {
        let entries: Vec<Arc<PageLockEntry>> = self.table.lock().values().cloned().collect();

        for entry in entries {
            let mut locks = entry.locks.lock();
            if locks.remove(tid) {
                entry.cvar.notify_all();
            }
        }

        self.waits_for.lock().purge(tid);

        // Entries nobody holds or waits on can go; waiters keep their own Arc.
        self.table
            .lock()
            .retain(|_, entry| Arc::strong_count(entry) > 1 || !entry.locks.lock().holders.is_empty());

        debug!(self.logger, "{} released all locks", tid);
    }

    /// Snapshot of what `tid` is currently blocked behind.
    pub fn waiting_on(&self, tid: TransactionId) -> Vec<LockRecord> {
        self.waits_for.lock().waiting_on(tid)
    }
}

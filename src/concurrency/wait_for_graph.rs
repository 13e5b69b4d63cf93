use crate::concurrency::lock_manager::LockMode;
use crate::concurrency::transaction::TransactionId;
use crate::storage::page::PageId;
use std::collections::{HashMap, HashSet};

/// A granted lock: `tid` holds `pid` in `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockRecord {
    pub tid: TransactionId,
    pub mode: LockMode,
    pub pid: PageId,
}

/// Maps each blocked transaction to the lock records it is waiting behind.
///
/// Only consulted for cycle detection; lock grants never look at it.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<LockRecord>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the waiter's outgoing edges with `blockers`.
    pub fn set_waiting<I>(&mut self, waiter: TransactionId, blockers: I)
    where
        I: IntoIterator<Item = LockRecord>,
    {
        let blockers: HashSet<LockRecord> = blockers
            .into_iter()
            .filter(|record| record.tid != waiter)
            .collect();
        if blockers.is_empty() {
            self.edges.remove(&waiter);
        } else {
            self.edges.insert(waiter, blockers);
        }
    }

    /// Drops the waiter's own outgoing edges.
    pub fn clear_waiting(&mut self, waiter: TransactionId) {
        self.edges.remove(&waiter);
    }

    /// Forgets `tid` entirely: its own entry and every edge pointing at it.
    pub fn purge(&mut self, tid: TransactionId) {
        self.edges.remove(&tid);
        self.edges.retain(|_, blockers| {
            blockers.retain(|record| record.tid != tid);
            !blockers.is_empty()
        });
    }

    /// Drops every edge that points at `holder`'s lock on `pid`.
    pub fn remove_holder(&mut self, holder: TransactionId, pid: PageId) {
        self.edges.retain(|_, blockers| {
            blockers.retain(|record| !(record.tid == holder && record.pid == pid));
            !blockers.is_empty()
        });
    }

    pub fn waiting_on(&self, waiter: TransactionId) -> Vec<LockRecord> {
        self.edges
            .get(&waiter)
            .map(|blockers| blockers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_waiting(&self, waiter: TransactionId) -> bool {
        self.edges.contains_key(&waiter)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Whether following wait-for edges from `start` leads back to `start`.
    ///
    /// Iterative depth-first search with an explicit stack and visited set.
    pub fn has_cycle_from(&self, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![start];

        while let Some(tid) = stack.pop() {
            let blockers = match self.edges.get(&tid) {
                Some(blockers) => blockers,
                None => continue,
            };
            for record in blockers {
                if record.tid == start {
                    return true;
                }
                if visited.insert(record.tid) {
                    stack.push(record.tid);
                }
            }
        }

        false
    }
}

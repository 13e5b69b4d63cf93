use crate::concurrency::transaction::TransactionId;
use crate::errors::Result;
use crate::storage::tuple::{RecordId, Tuple, TupleDesc};
use crate::storage::StorageError;
use crate::{PageNo, TableId};
use std::fmt;
use std::sync::Arc;

#[cfg(test)]
mod page_test;

/// Names one page: the owning table and the page's position in its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table_id: TableId,
    page_no: PageNo,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: PageNo) -> Self {
        Self { table_id, page_no }
    }
    pub fn table_id(&self) -> TableId {
        self.table_id
    }
    pub fn page_no(&self) -> PageNo {
        self.page_no
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/**
 *
 * Slotted heap page.
 *
 * Layout (page_size bytes in total):
 * -------------------------------------------------------------
 * | occupancy bitmap (ceil(slots / 8)) | slot 0 | slot 1 | ... | padding
 * -------------------------------------------------------------
 *
 * slots = floor(page_size * 8 / (tuple_size * 8 + 1)). Bit i lives in byte
 * i / 8 at position i % 8 (least significant first); 1 means occupied.
 */
#[derive(Debug, Clone)]
pub struct Page {
    pid: PageId,
    desc: Arc<TupleDesc>,
    data: Vec<u8>,
    before_image: Vec<u8>,
    dirtied_by: Option<TransactionId>,
}

impl Page {
    /// Wraps bytes read from disk. The before-image starts as a copy of them.
    pub fn new(pid: PageId, desc: Arc<TupleDesc>, data: Vec<u8>) -> Self {
        Self {
            pid,
            desc,
            before_image: data.clone(),
            data,
            dirtied_by: None,
        }
    }

    pub fn empty(pid: PageId, desc: Arc<TupleDesc>, page_size: usize) -> Self {
        Self::new(pid, desc, Self::empty_page_data(page_size))
    }

    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
        (page_size * 8) / (tuple_size * 8 + 1)
    }

    pub fn header_size(num_slots: usize) -> usize {
        (num_slots + 7) / 8
    }

    pub fn get_id(&self) -> PageId {
        self.pid
    }
    pub fn get_data(&self) -> &[u8] {
        &self.data
    }
    pub fn page_size(&self) -> usize {
        self.data.len()
    }
    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// The transaction that dirtied the page, if it is dirty.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }
    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirtied_by = tid;
    }

    pub fn get_before_image(&self) -> &[u8] {
        &self.before_image
    }
    pub fn set_before_image(&mut self) {
        self.before_image = self.data.clone();
    }

    pub fn num_slots(&self) -> usize {
        Self::slots_per_page(self.data.len(), self.desc.size())
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots()).filter(|&i| !self.is_slot_used(i)).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots() && self.data[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.data[slot / 8] |= mask;
        } else {
            self.data[slot / 8] &= !mask;
        }
    }

    fn slot_offset(&self, slot: usize) -> usize {
        Self::header_size(self.num_slots()) + slot * self.desc.size()
    }

    /// The tuple stored at `slot`, or `None` when the slot is empty.
    pub fn tuple(&self, slot: usize) -> Result<Option<Tuple>> {
        if !self.is_slot_used(slot) {
            return Ok(None);
        }
        let offset = self.slot_offset(slot);
        let mut tuple = Tuple::from_bytes(&self.desc, &self.data[offset..offset + self.desc.size()])?;
        tuple.set_record_id(Some(RecordId {
            pid: self.pid,
            slot,
        }));
        Ok(Some(tuple))
    }

    /// Occupied slots in ascending order.
    pub fn tuples(&self) -> Result<Vec<Tuple>> {
        let mut tuples = Vec::new();
        for slot in 0..self.num_slots() {
            if let Some(tuple) = self.tuple(slot)? {
                tuples.push(tuple);
            }
        }
        Ok(tuples)
    }

    /// Writes `tuple` into the first free slot and returns where it landed.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<RecordId> {
        if **tuple.desc() != *self.desc {
            return Err(StorageError::SchemaMismatch.into());
        }
        let slot = (0..self.num_slots())
            .find(|&i| !self.is_slot_used(i))
            .ok_or(StorageError::PageFull(self.pid))?;

        let offset = self.slot_offset(slot);
        let bytes = tuple.to_bytes();
        self.data[offset..offset + bytes.len()].copy_from_slice(&bytes);
        self.set_slot_used(slot, true);

        Ok(RecordId {
            pid: self.pid,
            slot,
        })
    }

    /// Clears the slot named by the tuple's record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        if rid.pid != self.pid || !self.is_slot_used(rid.slot) {
            return Err(StorageError::SlotEmpty {
                pid: rid.pid,
                slot: rid.slot,
            }
            .into());
        }
        self.set_slot_used(rid.slot, false);
        Ok(())
    }
}

use crate::concurrency::transaction::TransactionId;
use crate::errors::Result;
use crate::storage::page::PageId;
use crate::{PageNo, TableId};
use parking_lot::Mutex;
use slog::Logger;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// The write-ahead log contract the buffer pool relies on: an update record
/// must be appended and forced before the page it describes reaches disk.
pub trait LogService: Send + Sync {
    fn log_update(
        &self,
        tid: TransactionId,
        pid: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<()>;

    fn force(&self) -> Result<()>;
}

/// One update record read back from a [`LogFile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub tid: u64,
    pub pid: PageId,
    pub before: Vec<u8>,
    pub after: Vec<u8>,
}

/**
 * Append-only file of update records.
 *
 * Record format (big-endian):
 * -----------------------------------------------------------------------------
 * | len (4) | tid (8) | table (8) | page (4) | before_len (4) | before | after_len (4) | after
 * -----------------------------------------------------------------------------
 * `len` counts every byte after itself.
 */
pub struct LogFile {
    log_file: Mutex<File>,
    logger: Logger,
}

impl LogFile {
    pub fn open<P: AsRef<Path>>(path: P, logger: &Logger) -> Result<Self> {
        let log_file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path.as_ref())?;
        debug!(logger, "log file: {:?}", path.as_ref());
        Ok(Self {
            log_file: Mutex::new(log_file),
            logger: logger.clone(),
        })
    }

    fn encode(tid: TransactionId, pid: PageId, before: &[u8], after: &[u8]) -> Vec<u8> {
        let body_len = 8 + 8 + 4 + 4 + before.len() + 4 + after.len();
        let mut buf = Vec::with_capacity(4 + body_len);
        buf.extend_from_slice(&(body_len as u32).to_be_bytes());
        buf.extend_from_slice(&tid.get().to_be_bytes());
        buf.extend_from_slice(&pid.table_id().to_be_bytes());
        buf.extend_from_slice(&pid.page_no().to_be_bytes());
        buf.extend_from_slice(&(before.len() as u32).to_be_bytes());
        buf.extend_from_slice(before);
        buf.extend_from_slice(&(after.len() as u32).to_be_bytes());
        buf.extend_from_slice(after);
        buf
    }

    fn decode(body: &[u8]) -> Result<UpdateRecord> {
        let mut cursor = Cursor { buf: body, pos: 0 };
        let tid = u64::from_be_bytes(cursor.array()?);
        let table_id = TableId::from_be_bytes(cursor.array()?);
        let page_no = PageNo::from_be_bytes(cursor.array()?);
        let before_len = u32::from_be_bytes(cursor.array()?) as usize;
        let before = cursor.take(before_len)?.to_vec();
        let after_len = u32::from_be_bytes(cursor.array()?) as usize;
        let after = cursor.take(after_len)?.to_vec();
        Ok(UpdateRecord {
            tid,
            pid: PageId::new(table_id, page_no),
            before,
            after,
        })
    }

    /// Every complete record in the file, oldest first.
    pub fn records(&self) -> Result<Vec<UpdateRecord>> {
        let mut file = self.log_file.lock();
        let mut data = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut data)?;

        let mut records = Vec::new();
        let mut offset = 0;
        while offset + 4 <= data.len() {
            let mut len = [0u8; 4];
            len.copy_from_slice(&data[offset..offset + 4]);
            let len = u32::from_be_bytes(len) as usize;
            let start = offset + 4;
            if start + len > data.len() {
                warn!(self.logger, "torn log record at offset {}", offset);
                break;
            }
            records.push(Self::decode(&data[start..start + len])?);
            offset = start + len;
        }
        Ok(records)
    }
}

impl LogService for LogFile {
    fn log_update(
        &self,
        tid: TransactionId,
        pid: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<()> {
        let record = Self::encode(tid, pid, before, after);
        let mut file = self.log_file.lock();
        file.write_all(&record)?;
        file.flush()?;
        debug!(self.logger, "logged update by {} on {}", tid, pid);
        Ok(())
    }

    fn force(&self) -> Result<()> {
        self.log_file.lock().sync_data()?;
        Ok(())
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            bail!("log record truncated at byte {}", self.pos)
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

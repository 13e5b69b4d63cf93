use crate::errors::Result;
use crate::PageNo;
use parking_lot::Mutex;
use slog::Logger;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

// DiskManager performs the reading and writing of fixed-size pages to and from one flat table file.
// Page n occupies bytes [n * page_size, (n + 1) * page_size).
pub struct DiskManager {
    path: PathBuf,
    page_size: usize,
    num_writes: AtomicU32,
    db_file: Mutex<File>,
    logger: Logger,
}

impl DiskManager {
    // Opens (creating if absent) the file backing one table.
    pub fn new<P: AsRef<Path>>(path: P, page_size: usize, logger: &Logger) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let len = db_file.metadata()?.len();
        if len % page_size as u64 != 0 {
            warn!(
                logger,
                "{:?} is {} bytes, not a whole number of {}-byte pages", path, len, page_size
            );
        }

        Ok(Self {
            path,
            page_size,
            num_writes: AtomicU32::new(0),
            db_file: Mutex::new(db_file),
            logger: logger.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::SeqCst)
    }

    pub fn num_pages(&self) -> Result<PageNo> {
        let len = self.db_file.lock().metadata()?.len();
        Ok((len / self.page_size as u64) as PageNo)
    }

    // Read the contents of the specified page into the given memory area
    pub fn read_page(&self, page_no: PageNo, page_data: &mut [u8]) -> Result<()> {
        let offset = page_no as u64 * self.page_size as u64;
        let mut file = self.db_file.lock();
        let len = file.metadata()?.len();

        debug!(self.logger, "read page {}, offset: {}, file_len: {}", page_no, offset, len);

        if offset + self.page_size as u64 > len {
            bail!(
                "I/O error reading page {} past end of {:?} ({} bytes)",
                page_no,
                self.path,
                len
            )
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut page_data[..self.page_size])?;
        Ok(())
    }

    // Write the contents of the specified page into disk file
    pub fn write_page(&self, page_no: PageNo, page_data: &[u8]) -> Result<()> {
        if page_data.len() != self.page_size {
            bail!(
                "page {} has {} bytes, expected {}",
                page_no,
                page_data.len(),
                self.page_size
            )
        }
        let offset = page_no as u64 * self.page_size as u64;
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page_data)?;
        file.sync_data()?;

        let n = self.num_writes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(self.logger, "wrote page {}, num_writes: {}", page_no, n);
        Ok(())
    }

    // Appends one page to the end of the file and returns its page number.
    pub fn append_page(&self, page_data: &[u8]) -> Result<PageNo> {
        let mut file = self.db_file.lock();
        let page_no = (file.metadata()?.len() / self.page_size as u64) as PageNo;
        file.seek(SeekFrom::Start(page_no as u64 * self.page_size as u64))?;
        file.write_all(page_data)?;
        file.sync_data()?;
        debug!(self.logger, "appended page {} to {:?}", page_no, self.path);
        Ok(page_no)
    }
}

use crate::default_logger;
use crate::errors::Result;
use crate::storage::disk::disk_manager::DiskManager;
use rand::prelude::StdRng;
use rand::{RngCore, SeedableRng};
use tempfile::tempdir;

const PAGE_SIZE: usize = 4096;

#[test]
fn read_write_page_test() -> Result<()> {
    let logger = default_logger();
    let dir = tempdir()?;

    let mut buf = [0u8; PAGE_SIZE];
    let mut data = [0u8; PAGE_SIZE];

    let dm = DiskManager::new(dir.path().join("test_read_write_page.db"), PAGE_SIZE, &logger)?;

    let test_data = b"A test string.";
    data[..test_data.len()].copy_from_slice(test_data);

    // reading past the end is an error, not a silent zero page
    assert!(dm.read_page(0, &mut buf).is_err());

    dm.write_page(0, &data)?;
    dm.read_page(0, &mut buf)?;
    assert_eq!(data.to_vec(), buf.to_vec());
    assert_eq!(dm.num_pages()?, 1);

    buf = [0u8; PAGE_SIZE];
    dm.write_page(5, &data)?;
    dm.read_page(5, &mut buf)?;

    assert_eq!(data.to_vec(), buf.to_vec());
    assert_eq!(dm.num_pages()?, 6);
    assert_eq!(dm.num_writes(), 2);

    Ok(())
}

#[test]
fn append_grows_by_one_page() -> Result<()> {
    let logger = default_logger();
    let dir = tempdir()?;
    let dm = DiskManager::new(dir.path().join("append.db"), PAGE_SIZE, &logger)?;

    let mut rng: StdRng = SeedableRng::seed_from_u64(7);
    let mut payload = vec![0u8; PAGE_SIZE];
    rng.fill_bytes(&mut payload);

    assert_eq!(dm.append_page(&vec![0u8; PAGE_SIZE])?, 0);
    assert_eq!(dm.append_page(&payload)?, 1);
    assert_eq!(dm.num_pages()?, 2);

    let mut buf = vec![0u8; PAGE_SIZE];
    dm.read_page(1, &mut buf)?;
    assert_eq!(buf, payload);
    Ok(())
}

#[test]
fn short_page_is_rejected() -> Result<()> {
    let logger = default_logger();
    let dir = tempdir()?;
    let dm = DiskManager::new(dir.path().join("short.db"), PAGE_SIZE, &logger)?;
    assert!(dm.write_page(0, &[1u8; 100]).is_err());
    Ok(())
}

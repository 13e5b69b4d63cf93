use crate::concurrency::lock_manager::LockMode;
use crate::config::Config;
use crate::database::Database;
use crate::default_logger;
use crate::errors::Result;
use crate::storage::disk::log_file::LogFile;
use crate::storage::heap::heap_file::HeapFile;
use crate::storage::page::PageId;
use crate::storage::tuple::{Field, Tuple, TupleDesc, Type};
use crate::storage::{DbFile, StorageError};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

// 8-byte tuples on 64-byte pages: 7 slots per page.
const SMALL_PAGE: usize = 64;
const SLOTS: usize = 7;

fn setup(page_size: usize) -> Result<(TempDir, Database, Arc<HeapFile>)> {
    let logger = default_logger();
    let dir = tempdir()?;
    let log = Arc::new(LogFile::open(dir.path().join("wal.log"), &logger)?);
    let db = Database::new(Config::new(page_size, 16)?, log, &logger);
    let desc = Arc::new(TupleDesc::new(&[Type::Int, Type::Int], &["a", "b"]));
    let file = db.open_table(dir.path().join("pairs.dat"), desc, "pairs")?;
    Ok((dir, db, file))
}

fn pair(file: &HeapFile, a: i32, b: i32) -> Result<Tuple> {
    Tuple::new(file.tuple_desc().clone(), vec![Field::Int(a), Field::Int(b)])
}

fn scan(db: &Database, file: &HeapFile) -> Result<Vec<Vec<Field>>> {
    let bpm = db.buffer_pool();
    let tid = db.begin();
    let mut it = file.iter(&bpm, tid);
    it.open()?;
    let rows = it
        .map(|t| t.map(|t| t.fields().to_vec()))
        .collect::<Result<Vec<_>>>()?;
    bpm.commit(tid)?;
    Ok(rows)
}

#[test]
fn inserted_tuple_reads_back() -> Result<()> {
    let (_dir, db, file) = setup(4096)?;
    let bpm = db.buffer_pool();
    let tid = db.begin();

    bpm.insert_tuple(tid, file.id(), &pair(&file, 42, -7)?)?;
    bpm.commit(tid)?;

    assert_eq!(file.num_pages()?, 1);
    assert_eq!(scan(&db, &file)?, vec![vec![Field::Int(42), Field::Int(-7)]]);
    Ok(())
}

#[test]
fn full_file_grows_by_exactly_one_page() -> Result<()> {
    let (_dir, db, file) = setup(SMALL_PAGE)?;
    let bpm = db.buffer_pool();
    let tid = db.begin();

    for i in 0..SLOTS as i32 {
        bpm.insert_tuple(tid, file.id(), &pair(&file, i, i)?)?;
    }
    assert_eq!(file.num_pages()?, 1);

    bpm.insert_tuple(tid, file.id(), &pair(&file, 99, 99)?)?;
    assert_eq!(file.num_pages()?, 2);
    bpm.commit(tid)?;

    let page = file.read_page(PageId::new(file.id(), 1))?;
    let tuples = page.tuples()?;
    assert_eq!(tuples.len(), 1);
    assert_eq!(tuples[0].fields(), &[Field::Int(99), Field::Int(99)]);
    Ok(())
}

#[test]
fn full_pages_are_released_during_insert() -> Result<()> {
    let (_dir, db, file) = setup(SMALL_PAGE)?;
    let bpm = db.buffer_pool();

    let filler = db.begin();
    for i in 0..SLOTS as i32 {
        bpm.insert_tuple(filler, file.id(), &pair(&file, i, 0)?)?;
    }
    bpm.commit(filler)?;

    let tid = db.begin();
    bpm.insert_tuple(tid, file.id(), &pair(&file, 100, 0)?)?;
    let lm = bpm.lock_manager();
    assert_eq!(lm.holds(tid, PageId::new(file.id(), 0)), LockMode::Free);
    assert_eq!(lm.holds(tid, PageId::new(file.id(), 1)), LockMode::Exclusive);
    bpm.commit(tid)?;
    Ok(())
}

#[test]
fn deleted_tuple_disappears_from_scan() -> Result<()> {
    let (_dir, db, file) = setup(4096)?;
    let bpm = db.buffer_pool();
    let tid = db.begin();
    for i in 0..3 {
        bpm.insert_tuple(tid, file.id(), &pair(&file, i, i * 10)?)?;
    }
    bpm.commit(tid)?;

    let tid = db.begin();
    let victim = {
        let mut it = file.iter(&bpm, tid);
        it.open()?;
        it.find(|t| matches!(t, Ok(t) if t.field(0) == Some(&Field::Int(1))))
            .expect("row 1 present")?
    };
    bpm.delete_tuple(tid, &victim)?;
    bpm.commit(tid)?;

    let rows = scan(&db, &file)?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r[0] != Field::Int(1)));
    Ok(())
}

#[test]
fn delete_without_record_id_fails() -> Result<()> {
    let (_dir, db, file) = setup(4096)?;
    let bpm = db.buffer_pool();
    let err = bpm.delete_tuple(db.begin(), &pair(&file, 1, 1)?).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::MissingRecordId)
    ));
    Ok(())
}

#[test]
fn iterator_must_be_opened_and_can_rewind() -> Result<()> {
    let (_dir, db, file) = setup(SMALL_PAGE)?;
    let bpm = db.buffer_pool();
    let tid = db.begin();
    for i in 0..10 {
        bpm.insert_tuple(tid, file.id(), &pair(&file, i, i)?)?;
    }

    let mut it = file.iter(&bpm, tid);
    let err = it.next().expect("error item").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::IteratorNotOpen)
    ));

    it.open()?;
    let first: Vec<Tuple> = it.by_ref().take(3).collect::<Result<_>>()?;
    assert_eq!(first.len(), 3);

    it.rewind()?;
    let all: Vec<Tuple> = it.by_ref().collect::<Result<_>>()?;
    assert_eq!(all.len(), 10);
    assert_eq!(all[0].fields(), first[0].fields());
    // Ascending page order, slot order within a page.
    let keys: Vec<i32> = all
        .iter()
        .map(|t| match t.field(0) {
            Some(Field::Int(v)) => *v,
            _ => -1,
        })
        .collect();
    assert_eq!(keys, (0..10).collect::<Vec<_>>());

    it.close();
    assert!(it.next().expect("error item").is_err());
    bpm.commit(tid)?;
    Ok(())
}

#[test]
fn empty_file_scans_nothing() -> Result<()> {
    let (_dir, db, file) = setup(4096)?;
    assert!(scan(&db, &file)?.is_empty());
    Ok(())
}

#[test]
fn reading_past_the_end_fails() -> Result<()> {
    let (_dir, _db, file) = setup(4096)?;
    let err = file.read_page(PageId::new(file.id(), 0)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::PageOutOfRange { .. })
    ));
    Ok(())
}

#[test]
fn table_id_is_stable_per_file() -> Result<()> {
    let logger = default_logger();
    let dir = tempdir()?;
    let desc = Arc::new(TupleDesc::unnamed(&[Type::Int]));

    let a = HeapFile::open(dir.path().join("a.dat"), desc.clone(), 4096, &logger)?;
    let again = HeapFile::open(dir.path().join("a.dat"), desc.clone(), 4096, &logger)?;
    let b = HeapFile::open(dir.path().join("b.dat"), desc, 4096, &logger)?;

    assert_eq!(a.id(), again.id());
    assert_ne!(a.id(), b.id());
    Ok(())
}

#[test]
fn tuple_wider_than_page_is_rejected() -> Result<()> {
    let logger = default_logger();
    let dir = tempdir()?;
    let desc = Arc::new(TupleDesc::unnamed(&[Type::Str]));
    assert!(HeapFile::open(dir.path().join("w.dat"), desc, 64, &logger).is_err());
    Ok(())
}

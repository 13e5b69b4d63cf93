use crate::concurrency::transaction::TransactionId;
use crate::errors::Result;
use crate::storage::page::{Page, PageId};
use crate::storage::tuple::{Field, Tuple, TupleDesc, Type};
use crate::storage::StorageError;
use std::sync::Arc;

fn two_ints() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::unnamed(&[Type::Int, Type::Int]))
}

fn row(desc: &Arc<TupleDesc>, a: i32, b: i32) -> Result<Tuple> {
    Tuple::new(desc.clone(), vec![Field::Int(a), Field::Int(b)])
}

#[test]
fn slot_count_follows_bitmap_formula() {
    // 8-byte tuples: 4096 * 8 / 65 = 504 slots, 63 header bytes.
    assert_eq!(Page::slots_per_page(4096, 8), 504);
    assert_eq!(Page::header_size(504), 63);
    assert_eq!(Page::slots_per_page(64, 8), 7);
    assert_eq!(Page::header_size(7), 1);
}

#[test]
fn empty_page_has_every_slot_free() {
    let page = Page::empty(PageId::new(1, 0), two_ints(), 4096);
    assert_eq!(page.num_slots(), 504);
    assert_eq!(page.num_empty_slots(), 504);
    assert!(page.is_dirty().is_none());
    assert_eq!(page.get_before_image(), page.get_data());
}

#[test]
fn insert_then_read_back() -> Result<()> {
    let desc = two_ints();
    let mut page = Page::empty(PageId::new(1, 3), desc.clone(), 64);

    let first = page.insert_tuple(&row(&desc, 1, 10)?)?;
    let second = page.insert_tuple(&row(&desc, 2, 20)?)?;
    assert_eq!(first.slot, 0);
    assert_eq!(second.slot, 1);
    assert_eq!(page.num_empty_slots(), 5);

    let stored = page.tuples()?;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].fields(), &[Field::Int(2), Field::Int(20)]);
    assert_eq!(stored[1].record_id(), Some(second));
    Ok(())
}

#[test]
fn full_page_rejects_insert() -> Result<()> {
    let desc = two_ints();
    let mut page = Page::empty(PageId::new(1, 0), desc.clone(), 64);
    for i in 0..7 {
        page.insert_tuple(&row(&desc, i, i)?)?;
    }
    assert_eq!(page.num_empty_slots(), 0);

    let err = page.insert_tuple(&row(&desc, 8, 8)?).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::PageFull(_))
    ));
    Ok(())
}

#[test]
fn delete_frees_the_slot_for_reuse() -> Result<()> {
    let desc = two_ints();
    let mut page = Page::empty(PageId::new(1, 0), desc.clone(), 64);
    page.insert_tuple(&row(&desc, 1, 1)?)?;
    page.insert_tuple(&row(&desc, 2, 2)?)?;

    let victim = page.tuple(0)?.expect("slot 0 occupied");
    page.delete_tuple(&victim)?;
    assert!(!page.is_slot_used(0));
    assert!(page.delete_tuple(&victim).is_err());

    let rid = page.insert_tuple(&row(&desc, 3, 3)?)?;
    assert_eq!(rid.slot, 0);
    Ok(())
}

#[test]
fn before_image_only_moves_when_asked() -> Result<()> {
    let desc = two_ints();
    let mut page = Page::empty(PageId::new(1, 0), desc.clone(), 64);
    let clean = page.get_data().to_vec();

    page.insert_tuple(&row(&desc, 5, 5)?)?;
    page.mark_dirty(Some(TransactionId::new()));
    assert_eq!(page.get_before_image(), clean.as_slice());

    page.set_before_image();
    assert_eq!(page.get_before_image(), page.get_data());
    Ok(())
}

#[test]
fn schema_mismatch_is_rejected() -> Result<()> {
    let mut page = Page::empty(PageId::new(1, 0), two_ints(), 4096);
    let other = Arc::new(TupleDesc::unnamed(&[Type::Str]));
    let tuple = Tuple::new(other, vec![Field::Str("x".into())])?;
    assert!(page.insert_tuple(&tuple).is_err());
    Ok(())
}

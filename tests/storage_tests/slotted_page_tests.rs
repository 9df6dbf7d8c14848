//! Tests for SlottedPage
//!
//! These tests verify:
//! - Header and slot bytes match the page format
//! - Add/get on a fresh page
//! - Capacity boundary and NoRoom handling
//! - Tombstones and compaction on delete
//! - In-place shrink and growth with relocation
//! - Empty records next to records with data

use std::collections::BTreeMap;

use heapdb::storage::{DbBlock, SlottedPage, BLOCK_SZ};
use heapdb::HeapError;

// =============================================================================
// Helper Functions
// =============================================================================

fn new_page() -> SlottedPage {
    SlottedPage::initialize(vec![0u8; BLOCK_SZ], 1).unwrap()
}

fn u16_at(block: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([block[offset], block[offset + 1]])
}

/// Fill the page with `size`-byte records until the next one would not fit
fn fill_page(page: &mut SlottedPage, size: usize) -> Vec<u16> {
    let mut ids = Vec::new();
    let mut n = 0u8;
    while page.has_room(size) {
        ids.push(page.add(&vec![n; size]).unwrap());
        n = n.wrapping_add(1);
    }
    ids
}

// =============================================================================
// Format Tests
// =============================================================================

#[test]
fn test_initialize_writes_header() {
    let page = new_page();

    assert_eq!(page.num_records(), 0);
    assert_eq!(page.end_free(), 4095);
    assert_eq!(u16_at(page.block(), 0), 0);
    assert_eq!(u16_at(page.block(), 2), 4095);
    assert!(page.ids().is_empty());
}

#[test]
fn test_add_writes_header_and_slot() {
    let mut page = new_page();

    let id = page.add(b"hello").unwrap();

    assert_eq!(id, 1);
    let block = page.block();
    assert_eq!(u16_at(block, 0), 1); // num_records
    assert_eq!(u16_at(block, 2), 4090); // end_free
    assert_eq!(u16_at(block, 4), 5); // size of record 1
    assert_eq!(u16_at(block, 6), 4091); // loc of record 1
    assert_eq!(&block[4091..4096], b"hello");
}

#[test]
fn test_from_block_reads_existing_page() {
    let mut page = new_page();
    page.add(b"first").unwrap();
    page.add(b"second").unwrap();

    let reopened = SlottedPage::from_block(page.block().to_vec(), 1).unwrap();

    assert_eq!(reopened.num_records(), 2);
    assert_eq!(reopened.end_free(), page.end_free());
    assert_eq!(reopened.get(2).unwrap(), Some(b"second".to_vec()));
}

// =============================================================================
// Add/Get Tests
// =============================================================================

#[test]
fn test_fresh_page_add_get() {
    let mut page = new_page();
    let data = b"some record bytes".to_vec();

    let id = page.add(&data).unwrap();

    assert_eq!(page.get(id).unwrap(), Some(data));
}

#[test]
fn test_record_ids_are_sequential_from_one() {
    let mut page = new_page();

    let ids: Vec<u16> = (0..5).map(|_| page.add(b"x").unwrap()).collect();

    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(page.ids(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_empty_record() {
    let mut page = new_page();

    let id = page.add(b"").unwrap();

    assert_eq!(page.get(id).unwrap(), Some(Vec::new()));
    assert_eq!(page.ids(), vec![id]);
}

#[test]
fn test_invalid_record_ids_rejected() {
    let mut page = new_page();
    page.add(b"one").unwrap();

    assert!(matches!(page.get(0), Err(HeapError::InvalidRecordId { .. })));
    assert!(matches!(page.get(2), Err(HeapError::InvalidRecordId { .. })));
    assert!(matches!(page.del(9), Err(HeapError::InvalidRecordId { .. })));
    assert!(matches!(page.put(2, b"x"), Err(HeapError::InvalidRecordId { .. })));
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_capacity_for_100_byte_records() {
    let mut page = new_page();

    let ids = fill_page(&mut page, 100);

    // Each record costs 104 bytes; 39 * 104 + 4 <= 4095 < 40 * 104 + 4
    assert_eq!(ids.len(), 39);
}

#[test]
fn test_add_past_capacity_fails_and_keeps_state() {
    let mut page = new_page();
    let ids = fill_page(&mut page, 100);
    let before = page.block().to_vec();
    let num_records = page.num_records();

    let result = page.add(&[0xAB; 100]);

    assert!(matches!(result, Err(HeapError::NoRoom { .. })));
    assert!(result.unwrap_err().is_no_room());
    assert_eq!(page.num_records(), num_records);
    assert_eq!(page.block(), before.as_slice());
    for (n, id) in ids.iter().enumerate() {
        assert_eq!(page.get(*id).unwrap(), Some(vec![n as u8; 100]));
    }
}

#[test]
fn test_largest_record_fits_empty_page() {
    let mut page = new_page();
    let max = SlottedPage::max_record_size();
    assert_eq!(page.free_space(), max + 4);
    assert!(page.has_room(max));
    assert!(!page.has_room(max + 1));
    assert!(SlottedPage::check_fits_empty(max).is_ok());
    assert!(matches!(
        SlottedPage::check_fits_empty(max + 1),
        Err(HeapError::NoRoom { .. })
    ));

    let id = page.add(&vec![9u8; max]).unwrap();

    assert_eq!(page.get(id).unwrap(), Some(vec![9u8; max]));
    assert_eq!(page.free_space(), 0);
}

#[test]
fn test_record_larger_than_page_rejected() {
    let mut page = new_page();

    let result = page.add(&vec![1u8; BLOCK_SZ]);

    assert!(matches!(result, Err(HeapError::NoRoom { .. })));
    assert_eq!(page.num_records(), 0);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_leaves_tombstone() {
    let mut page = new_page();
    let a = page.add(b"aaa").unwrap();
    let b = page.add(b"bbb").unwrap();
    let c = page.add(b"ccc").unwrap();

    page.del(b).unwrap();

    assert_eq!(page.get(b).unwrap(), None);
    assert_eq!(page.ids(), vec![a, c]);
    assert_eq!(page.num_records(), 3);
    assert_eq!(u16_at(page.block(), 4 * b as usize), 0);
    assert_eq!(u16_at(page.block(), 4 * b as usize + 2), 0);
}

#[test]
fn test_delete_compacts_records() {
    let mut page = new_page();
    let a = page.add(&[b'A'; 10]).unwrap();
    let b = page.add(&[b'B'; 20]).unwrap();
    let c = page.add(&[b'C'; 30]).unwrap();
    assert_eq!(page.end_free(), 4035);

    page.del(b).unwrap();

    // B's 20 bytes are handed back to free space
    assert_eq!(page.end_free(), 4055);
    assert_eq!(page.get(a).unwrap(), Some(vec![b'A'; 10]));
    assert_eq!(page.get(c).unwrap(), Some(vec![b'C'; 30]));
    assert_eq!(page.ids(), vec![a, c]);
    // A did not move, C slid up against it
    assert_eq!(u16_at(page.block(), 4 * a as usize + 2), 4086);
    assert_eq!(u16_at(page.block(), 4 * c as usize + 2), 4056);
}

#[test]
fn test_delete_twice_is_noop() {
    let mut page = new_page();
    let a = page.add(b"aaa").unwrap();
    page.del(a).unwrap();
    let before = page.block().to_vec();

    page.del(a).unwrap();

    assert_eq!(page.block(), before.as_slice());
}

#[test]
fn test_ids_never_reused_after_delete() {
    let mut page = new_page();
    let a = page.add(b"aaa").unwrap();
    page.del(a).unwrap();

    let b = page.add(b"bbb").unwrap();

    assert_eq!(b, 2);
    assert_eq!(page.ids(), vec![2]);
}

#[test]
fn test_deleted_space_is_reusable() {
    let mut page = new_page();
    let ids = fill_page(&mut page, 100);
    assert!(!page.has_room(100));

    page.del(ids[0]).unwrap();
    page.del(ids[1]).unwrap();

    // Two records' worth of data is back, minus the new slot
    assert!(page.has_room(100));
    page.add(&[7u8; 100]).unwrap();
}

// =============================================================================
// Put Tests
// =============================================================================

#[test]
fn test_put_same_size() {
    let mut page = new_page();
    let a = page.add(b"aaaa").unwrap();
    let b = page.add(b"bbbb").unwrap();

    page.put(a, b"AAAA").unwrap();

    assert_eq!(page.get(a).unwrap(), Some(b"AAAA".to_vec()));
    assert_eq!(page.get(b).unwrap(), Some(b"bbbb".to_vec()));
    assert_eq!(page.end_free(), 4087);
}

#[test]
fn test_put_shrink_reclaims_space() {
    let mut page = new_page();
    let a = page.add(&[b'A'; 10]).unwrap();
    let b = page.add(&[b'B'; 10]).unwrap();
    let c = page.add(&[b'C'; 10]).unwrap();
    let end_free = page.end_free();

    page.put(b, b"bb").unwrap();

    assert_eq!(page.end_free(), end_free + 8);
    assert_eq!(page.get(a).unwrap(), Some(vec![b'A'; 10]));
    assert_eq!(page.get(b).unwrap(), Some(b"bb".to_vec()));
    assert_eq!(page.get(c).unwrap(), Some(vec![b'C'; 10]));
}

#[test]
fn test_put_grow_relocates() {
    let mut page = new_page();
    let a = page.add(&[b'A'; 10]).unwrap();
    let b = page.add(&[b'B'; 10]).unwrap();
    let c = page.add(&[b'C'; 10]).unwrap();

    page.put(a, &[b'a'; 25]).unwrap();

    assert_eq!(page.get(a).unwrap(), Some(vec![b'a'; 25]));
    assert_eq!(page.get(b).unwrap(), Some(vec![b'B'; 10]));
    assert_eq!(page.get(c).unwrap(), Some(vec![b'C'; 10]));
    assert_eq!(page.end_free(), 4095 - 45);
    assert_eq!(page.ids(), vec![a, b, c]);
}

#[test]
fn test_put_grow_middle_record() {
    let mut page = new_page();
    let a = page.add(b"first").unwrap();
    let b = page.add(b"second").unwrap();
    let c = page.add(b"third").unwrap();

    page.put(b, b"a much longer second record").unwrap();

    assert_eq!(page.get(a).unwrap(), Some(b"first".to_vec()));
    assert_eq!(page.get(b).unwrap(), Some(b"a much longer second record".to_vec()));
    assert_eq!(page.get(c).unwrap(), Some(b"third".to_vec()));
}

#[test]
fn test_put_grow_without_room_keeps_page() {
    let mut page = new_page();
    let ids = fill_page(&mut page, 100);
    let before = page.block().to_vec();

    let result = page.put(ids[0], &[0xFF; 400]);

    assert!(matches!(result, Err(HeapError::NoRoom { .. })));
    assert_eq!(page.block(), before.as_slice());
    assert_eq!(page.get(ids[0]).unwrap(), Some(vec![0u8; 100]));
}

#[test]
fn test_put_deleted_record_fails() {
    let mut page = new_page();
    let a = page.add(b"aaa").unwrap();
    page.del(a).unwrap();

    let result = page.put(a, b"again");

    assert!(matches!(result, Err(HeapError::RecordDeleted { .. })));
}

#[test]
fn test_mixed_operations_keep_records_intact() {
    let mut page = new_page();
    let mut expected: Vec<(u16, Vec<u8>)> = Vec::new();
    for i in 0..20u8 {
        let data = vec![i; (i as usize % 7) + 3];
        expected.push((page.add(&data).unwrap(), data));
    }

    // Grow every third record, shrink every fourth, delete every fifth
    for (n, (id, data)) in expected.iter_mut().enumerate() {
        if n % 3 == 0 {
            *data = vec![data[0]; data.len() + 11];
            page.put(*id, data).unwrap();
        } else if n % 4 == 0 {
            data.truncate(1);
            page.put(*id, data).unwrap();
        }
    }
    let deleted: Vec<u16> = expected
        .iter()
        .enumerate()
        .filter(|(n, _)| n % 5 == 0)
        .map(|(_, (id, _))| *id)
        .collect();
    for id in &deleted {
        page.del(*id).unwrap();
    }

    for (id, data) in &expected {
        if deleted.contains(id) {
            assert_eq!(page.get(*id).unwrap(), None);
        } else {
            assert_eq!(page.get(*id).unwrap().as_ref(), Some(data));
        }
    }

    // Live data is exactly the bytes above end_free
    let live: usize = expected
        .iter()
        .filter(|(id, _)| !deleted.contains(id))
        .map(|(_, data)| data.len())
        .sum();
    assert_eq!(page.end_free() as usize, BLOCK_SZ - 1 - live);
}

// =============================================================================
// Empty Record Tests
// =============================================================================

#[test]
fn test_grow_empty_record_keeps_neighbour() {
    let mut page = new_page();
    let a = page.add(b"AAAA").unwrap();
    let e = page.add(b"").unwrap();

    page.put(e, b"xyz").unwrap();

    assert_eq!(page.get(a).unwrap(), Some(b"AAAA".to_vec()));
    assert_eq!(page.get(e).unwrap(), Some(b"xyz".to_vec()));
    assert_eq!(page.end_free() as usize, BLOCK_SZ - 1 - 7);
}

#[test]
fn test_grow_record_below_empty_record() {
    let mut page = new_page();
    let a = page.add(b"AAAA").unwrap();
    let e = page.add(b"").unwrap();
    let c = page.add(b"CC").unwrap();

    page.put(c, b"CCCCCC").unwrap();
    page.put(a, b"AAAAAAAA").unwrap();

    assert_eq!(page.get(a).unwrap(), Some(b"AAAAAAAA".to_vec()));
    assert_eq!(page.get(e).unwrap(), Some(Vec::new()));
    assert_eq!(page.get(c).unwrap(), Some(b"CCCCCC".to_vec()));
}

#[test]
fn test_shrink_to_empty_keeps_neighbours() {
    let mut page = new_page();
    let a = page.add(b"AAAA").unwrap();
    let b = page.add(b"BBBB").unwrap();
    let c = page.add(b"CCCC").unwrap();

    page.put(b, b"").unwrap();

    assert_eq!(page.get(b).unwrap(), Some(Vec::new()));
    assert_eq!(page.get(a).unwrap(), Some(b"AAAA".to_vec()));
    assert_eq!(page.get(c).unwrap(), Some(b"CCCC".to_vec()));

    page.put(b, b"bb").unwrap();

    assert_eq!(page.get(a).unwrap(), Some(b"AAAA".to_vec()));
    assert_eq!(page.get(b).unwrap(), Some(b"bb".to_vec()));
    assert_eq!(page.get(c).unwrap(), Some(b"CCCC".to_vec()));
}

#[test]
fn test_delete_next_to_empty_record() {
    let mut page = new_page();
    let a = page.add(b"AAAA").unwrap();
    let e = page.add(b"").unwrap();
    let c = page.add(b"CCC").unwrap();

    page.del(a).unwrap();

    assert_eq!(page.get(e).unwrap(), Some(Vec::new()));
    assert_eq!(page.get(c).unwrap(), Some(b"CCC".to_vec()));

    page.put(e, b"now has data").unwrap();
    page.del(c).unwrap();

    assert_eq!(page.get(e).unwrap(), Some(b"now has data".to_vec()));
    assert_eq!(page.ids(), vec![e]);
    assert_eq!(page.end_free() as usize, BLOCK_SZ - 1 - 12);
}

#[test]
fn test_page_with_empty_records_reloads() {
    let mut page = new_page();
    let a = page.add(b"AAAA").unwrap();
    let e = page.add(b"").unwrap();
    page.del(a).unwrap();

    let reloaded = SlottedPage::from_block(page.block().to_vec(), 1).unwrap();

    assert_eq!(reloaded.get(e).unwrap(), Some(Vec::new()));
}

/// xorshift64 step for a reproducible operation sequence
fn next_random(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

#[test]
fn test_random_operations_match_model() {
    for seed in 1..=20u64 {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut page = new_page();
        let mut model: BTreeMap<u16, Vec<u8>> = BTreeMap::new();

        for step in 0..300 {
            let live: Vec<u16> = model.keys().copied().collect();
            let choice = next_random(&mut state) % 3;
            let size = (next_random(&mut state) % 60) as usize;
            let fill = (step % 251) as u8;

            if choice == 0 || live.is_empty() {
                if page.has_room(size) {
                    let id = page.add(&vec![fill; size]).unwrap();
                    model.insert(id, vec![fill; size]);
                }
            } else {
                let id = live[(next_random(&mut state) as usize) % live.len()];
                if choice == 1 {
                    let before = page.block().to_vec();
                    match page.put(id, &vec![fill; size]) {
                        Ok(()) => {
                            model.insert(id, vec![fill; size]);
                        }
                        Err(HeapError::NoRoom { .. }) => assert_eq!(page.block(), before.as_slice()),
                        Err(e) => panic!("seed {} step {}: unexpected error {:?}", seed, step, e),
                    }
                } else {
                    page.del(id).unwrap();
                    model.remove(&id);
                }
            }

            assert_eq!(page.ids(), model.keys().copied().collect::<Vec<_>>());
            for (id, data) in &model {
                assert_eq!(
                    page.get(*id).unwrap().as_ref(),
                    Some(data),
                    "seed {} step {} record {}",
                    seed,
                    step,
                    id
                );
            }
            let live_bytes: usize = model.values().map(Vec::len).sum();
            assert_eq!(page.end_free() as usize, BLOCK_SZ - 1 - live_bytes);
        }

        SlottedPage::from_block(page.block().to_vec(), 1).unwrap();
    }
}

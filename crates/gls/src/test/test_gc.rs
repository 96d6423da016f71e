//! GC scenarios (spec.md §8 "GC"); scope-pop migration of a single surviving
//! object is already covered by `gc::collector`'s own inline test.

use crate::gc::{Gc, GcConfig, HEADER_TAG_LARGE, RootEntry};
use crate::heap::{self, CoreTypes};
use crate::val::Val;

fn fresh() -> (Gc, CoreTypes) {
    let mut gc = Gc::init(GcConfig::default()).unwrap();
    let types = heap::install(&mut gc);
    (gc, types)
}

#[test]
fn minipage_count_recovers_after_popping_a_mostly_dead_scope() {
    let (mut gc, types) = fresh();
    let free_before = gc.free_minipagec();

    gc.push_scope().unwrap();
    let mut survivor = heap::cons(&mut gc, &types, Val::fixnum(1), crate::val::VAL_NIL).unwrap();
    for i in 0..64 {
        let _dead = heap::cons(&mut gc, &types, Val::fixnum(i), crate::val::VAL_NIL).unwrap();
    }

    let mark = gc.root_mark();
    gc.push_root(RootEntry::Direct { ptr: &mut survivor as *mut Val, len: 1 });
    gc.pop_scope().unwrap();
    gc.pop_root_to(mark);

    assert!(survivor.is_gc_ptr());
    assert_eq!(heap::car(survivor).as_sfix(), 1);
    assert!(gc.free_minipagec() + 1 >= free_before);
}

#[test]
fn write_barrier_keeps_an_older_field_pointing_at_the_forwarded_object() {
    let (mut gc, types) = fresh();

    let older = gc.alloc_in(0, types.pair).unwrap();
    heap::set_field_val(&mut gc, older, heap::PAIR_CDR_OFFSET, crate::val::VAL_NIL);

    gc.push_scope().unwrap();
    let young = heap::cons(&mut gc, &types, Val::fixnum(99), crate::val::VAL_NIL).unwrap();
    heap::set_field_val(&mut gc, older, heap::PAIR_CAR_OFFSET, young);

    gc.pop_scope().unwrap();

    let moved = heap::field_val(older, heap::PAIR_CAR_OFFSET);
    assert!(moved.is_gc_ptr());
    assert_ne!(moved.as_addr(), young.as_addr(), "trail graduation should have evacuated the young pair");
    assert_eq!(heap::car(moved).as_sfix(), 99);
}

#[test]
fn forced_large_allocation_lands_outside_the_minipage_pool() {
    let (mut gc, types) = fresh();
    gc.force_next_large();
    let v = gc.alloc(types.pair).unwrap();

    assert!(!gc.is_in_pool(v.as_addr()));
    let header = unsafe { *((v.as_addr() - 8) as *const u64) };
    assert_eq!((header & 0xFF) as u8, HEADER_TAG_LARGE);
}

//! Global symbol table (spec.md §4.4).
//!
//! The table's bucket array is kept on the host side as a plain
//! `Vec<Vec<Val>>` rather than as a further GC-managed hash table (see
//! `DESIGN.md` for why) — only the `Symbol` objects it points to are real
//! heap objects. Symbols are interned straight into generation 0, which is
//! never popped during normal operation, so the table needs no root
//! registration of its own.

use crate::error::GlsResult;
use crate::gc::Gc;
use crate::heap::{self, CoreTypes};
use crate::val::Val;

const BUCKET_COUNT: usize = 64;

pub struct SymbolTable {
    buckets: Vec<Vec<Val>>,
}

fn hash(name: &[u8]) -> usize {
    let mut acc: u32 = 0;
    for &b in name {
        acc = acc.wrapping_mul(31).wrapping_add(b as u32);
    }
    acc as usize % BUCKET_COUNT
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable { buckets: (0..BUCKET_COUNT).map(|_| Vec::new()).collect() }
    }

    fn find(&self, name: &[u8]) -> Option<Val> {
        for &sym in &self.buckets[hash(name)] {
            let name_obj = heap::field_val(sym, heap::SYMBOL_NAME_OFFSET);
            let existing = unsafe { heap::bytes_slice(name_obj) };
            if existing == name {
                return Some(sym);
            }
        }
        None
    }

    /// `intern(name) -> symbol`, creating one if absent (spec.md §4.4).
    pub fn intern(&mut self, gc: &mut Gc, types: &CoreTypes, name: &[u8]) -> GlsResult<Val> {
        if let Some(sym) = self.find(name) {
            return Ok(sym);
        }
        let name_obj = heap::alloc_bytes(gc, types, name)?;
        let sym = gc.alloc_in(0, types.symbol)?;
        heap::set_field_val(gc, sym, heap::SYMBOL_NAME_OFFSET, name_obj);
        heap::set_field_u8(sym, heap::SYMBOL_IS_MACRO_OFFSET, 0);
        // Self-referential "undefined" sentinel (spec.md §9).
        heap::set_field_val(gc, sym, heap::SYMBOL_VALUE_OFFSET, sym);
        self.buckets[hash(name)].push(sym);
        Ok(sym)
    }

    /// A fresh, uninterned symbol whose printed name is not guaranteed
    /// unique; still reachable through `reverse_lookup` only if later bound.
    pub fn gensym(&mut self, gc: &mut Gc, types: &CoreTypes, hint: &[u8], counter: u64) -> GlsResult<Val> {
        let mut name = hint.to_vec();
        name.push(b'-');
        let mut n = counter;
        let start = name.len();
        if n == 0 {
            name.push(b'0');
        }
        while n > 0 {
            name.insert(start, b'0' + (n % 10) as u8);
            n /= 10;
        }
        let name_obj = heap::alloc_bytes(gc, types, &name)?;
        let sym = gc.alloc_in(0, types.symbol)?;
        heap::set_field_val(gc, sym, heap::SYMBOL_NAME_OFFSET, name_obj);
        heap::set_field_u8(sym, heap::SYMBOL_IS_MACRO_OFFSET, 0);
        heap::set_field_val(gc, sym, heap::SYMBOL_VALUE_OFFSET, sym);
        // Gensyms are intentionally not interned into any bucket: they are
        // found again only by holding onto the returned `Val`.
        Ok(sym)
    }

    pub fn value(sym: Val) -> Val {
        heap::field_val(sym, heap::SYMBOL_VALUE_OFFSET)
    }

    pub fn is_undefined(sym: Val) -> bool {
        Self::value(sym) == sym
    }

    pub fn set_value(gc: &mut Gc, sym: Val, value: Val) {
        heap::set_field_val(gc, sym, heap::SYMBOL_VALUE_OFFSET, value);
    }

    pub fn is_macro(sym: Val) -> bool {
        heap::field_u8(sym, heap::SYMBOL_IS_MACRO_OFFSET) != 0
    }

    pub fn set_macro(sym: Val, is_macro: bool) {
        heap::set_field_u8(sym, heap::SYMBOL_IS_MACRO_OFFSET, is_macro as u8);
    }

    pub fn name(sym: Val) -> Val {
        heap::field_val(sym, heap::SYMBOL_NAME_OFFSET)
    }

    /// `reverseLookup(value) -> symbol?`, used to name closures in traces
    /// (spec.md §4.4).
    pub fn reverse_lookup(&self, value: Val) -> Option<Val> {
        for bucket in &self.buckets {
            for &sym in bucket {
                if Self::value(sym) == value {
                    return Some(sym);
                }
            }
        }
        None
    }
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        SymbolTable::new()
    }
}

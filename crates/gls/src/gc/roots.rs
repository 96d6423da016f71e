//! The root chain (spec.md §3 "GC allocator", §3 invariants).
//!
//! The reference implementation encodes an element's kind in the low two
//! bits of its `next` pointer and chases that linked list by hand. A plain
//! `Vec` used as a stack gives the same "strictly stack-disciplined" lifetime
//! (push on scope entry, truncate back to a saved length on scope exit)
//! without the pointer-tagging trick, which Rust has no sound way to express
//! outside a dedicated tagged-pointer type — see `DESIGN.md`.

use crate::val::Val;

/// Callback invoked once per scan: `mark` is handed each live `Val` the
/// callback is responsible for and returns its (possibly moved) replacement.
pub type RootVisitFn = unsafe fn(ctx: *mut (), mark: &mut dyn FnMut(Val) -> Val);

pub enum RootEntry {
    /// A contiguous array of tagged values (e.g. an interpreter operand
    /// stack or locals array living on the host stack).
    Direct { ptr: *mut Val, len: usize },
    /// An array of pointers, each to a further array of tagged values.
    Indirect { ptr: *mut *mut Val, len: usize },
    /// An array of naked (untagged) GC pointers.
    RawPtrArray { ptr: *mut *mut u8, len: usize },
    /// Host callback root; `ctx` is opaque state handed back to `visit`.
    Callback { visit: RootVisitFn, ctx: *mut () },
}

/// A saved position in the root chain, taken when a generation is pushed and
/// used to bound which roots belong to it on pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootMark(pub usize);

#[derive(Default)]
pub struct RootChain {
    stack: Vec<RootEntry>,
}

impl RootChain {
    pub fn new() -> RootChain {
        RootChain::default()
    }

    pub fn push(&mut self, entry: RootEntry) {
        self.stack.push(entry);
    }

    /// Pop back to a previously taken mark. Panics if `mark` is not at or
    /// before the current top — that would mean a parent frame's roots were
    /// popped before a child's, violating stack discipline (spec.md §3).
    pub fn pop_to(&mut self, mark: RootMark) {
        assert!(mark.0 <= self.stack.len(), "root chain popped out of stack order");
        self.stack.truncate(mark.0);
    }

    pub fn mark(&self) -> RootMark {
        RootMark(self.stack.len())
    }

    /// Entries pushed since `mark` was taken, in push order.
    pub fn entries_since(&self, mark: RootMark) -> &[RootEntry] {
        &self.stack[mark.0..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_discipline_round_trip() {
        let mut chain = RootChain::new();
        let outer = chain.mark();
        chain.push(RootEntry::Direct { ptr: std::ptr::null_mut(), len: 0 });
        let inner = chain.mark();
        chain.push(RootEntry::RawPtrArray { ptr: std::ptr::null_mut(), len: 0 });
        assert_eq!(chain.entries_since(inner).len(), 1);
        chain.pop_to(inner);
        assert_eq!(chain.entries_since(outer).len(), 1);
        chain.pop_to(outer);
        assert_eq!(chain.entries_since(outer).len(), 0);
    }

    #[test]
    #[should_panic]
    fn out_of_order_pop_panics() {
        let mut chain = RootChain::new();
        chain.push(RootEntry::Direct { ptr: std::ptr::null_mut(), len: 0 });
        let inner = chain.mark();
        chain.pop_to(RootMark(inner.0 + 1));
    }
}

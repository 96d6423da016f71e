//! Large objects: individually allocated, non-moving heap blocks (spec.md §3).
//!
//! Generation and colour for a large object live in the same 8-byte GC
//! object header every other heap object carries (spec.md §3 "Heap object"),
//! not in `LargeObjectHeader` below — that struct only carries the
//! allocator-private bookkeeping (list links, the size needed to `dealloc`)
//! that has no wire representation.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::mem::size_of;
use std::ptr;

use super::header::{header_colour, header_generation, set_colour as header_set_colour, set_generation as header_set_generation};
use super::minipage::MINI_PAGE_ALIGN;

#[repr(C)]
pub struct LargeObjectHeader {
    pub prev: *mut LargeObjectHeader,
    pub next: *mut LargeObjectHeader,
    /// Total bytes allocated for this block (header word + body), kept so
    /// the block can be freed with a matching `Layout`.
    pub alloc_size: u32,
}

pub const DATA_OFFSET: usize = {
    let raw = size_of::<LargeObjectHeader>();
    (raw + MINI_PAGE_ALIGN - 1) & !(MINI_PAGE_ALIGN - 1)
};

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct LargeObjectPtr(pub *mut LargeObjectHeader);

impl LargeObjectPtr {
    pub fn null() -> LargeObjectPtr {
        LargeObjectPtr(ptr::null_mut())
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Allocates a large object able to hold `body_size` bytes after the
    /// 8-byte object header (written by the caller).
    pub fn alloc(body_size: usize) -> LargeObjectPtr {
        let total = DATA_OFFSET + 8 + body_size;
        let layout = Layout::from_size_align(total, MINI_PAGE_ALIGN).expect("large object layout");
        // SAFETY: layout is nonzero size, correctly aligned.
        let raw = unsafe { alloc_zeroed(layout) };
        assert!(!raw.is_null(), "large object allocation failed");
        let header = raw as *mut LargeObjectHeader;
        unsafe {
            (*header).prev = ptr::null_mut();
            (*header).next = ptr::null_mut();
            (*header).alloc_size = total as u32;
        }
        LargeObjectPtr(header)
    }

    /// Recovers the owning `LargeObjectPtr` from an object body address
    /// previously returned by [`data`](Self::data).
    pub fn from_data(addr: u64) -> LargeObjectPtr {
        LargeObjectPtr((addr as usize - DATA_OFFSET - 8) as *mut LargeObjectHeader)
    }

    /// # Safety
    /// `self` must be a still-live pointer returned by [`alloc`](Self::alloc)
    /// that has not already been freed, and must have been unlinked from
    /// every list it was a member of.
    pub unsafe fn free(self) {
        let total = (*self.0).alloc_size as usize;
        let layout = Layout::from_size_align(total, MINI_PAGE_ALIGN).expect("large object layout");
        dealloc(self.0 as *mut u8, layout);
    }

    #[inline]
    pub fn object_header_ptr(self) -> *mut u8 {
        unsafe { (self.0 as *mut u8).add(DATA_OFFSET) }
    }

    #[inline]
    pub fn data(self) -> *mut u8 {
        unsafe { self.object_header_ptr().add(8) }
    }

    fn obj_header_word(self) -> *mut u64 {
        self.object_header_ptr() as *mut u64
    }

    pub fn generation(self) -> u16 {
        header_generation(unsafe { *self.obj_header_word() })
    }

    pub fn set_generation(self, gen: u16) {
        unsafe {
            let h = *self.obj_header_word();
            *self.obj_header_word() = header_set_generation(h, gen);
        }
    }

    pub fn colour(self) -> u8 {
        header_colour(unsafe { *self.obj_header_word() })
    }

    pub fn set_colour(self, colour: u8) {
        unsafe {
            let h = *self.obj_header_word();
            *self.obj_header_word() = header_set_colour(h, colour);
        }
    }

    #[inline]
    pub fn prev(self) -> LargeObjectPtr {
        LargeObjectPtr(unsafe { (*self.0).prev })
    }

    #[inline]
    pub fn set_prev(self, p: LargeObjectPtr) {
        unsafe { (*self.0).prev = p.0 }
    }

    #[inline]
    pub fn next(self) -> LargeObjectPtr {
        LargeObjectPtr(unsafe { (*self.0).next })
    }

    #[inline]
    pub fn set_next(self, p: LargeObjectPtr) {
        unsafe { (*self.0).next = p.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::super::header::{build_header, HEADER_TAG_LARGE};
    use super::*;

    #[test]
    fn fresh_large_object_round_trips_generation_and_colour() {
        let lo = LargeObjectPtr::alloc(64);
        unsafe {
            *lo.obj_header_word() = build_header(HEADER_TAG_LARGE, 0, 3, 7);
        }
        assert_eq!(lo.generation(), 3);
        assert_eq!(lo.colour(), 0);
        lo.set_colour(1);
        assert_eq!(lo.colour(), 1);
        lo.set_generation(9);
        assert_eq!(lo.generation(), 9);
        unsafe {
            assert_eq!(*lo.data(), 0);
            lo.free();
        }
    }

    #[test]
    fn from_data_recovers_owning_pointer() {
        let lo = LargeObjectPtr::alloc(32);
        let recovered = LargeObjectPtr::from_data(lo.data() as u64);
        assert_eq!(lo, recovered);
        unsafe { lo.free() };
    }
}

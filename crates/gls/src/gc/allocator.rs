//! `Gc`: the allocator half of the collector (spec.md §4.1 "Public contract",
//! "Allocation algorithm").

use std::alloc::{alloc_zeroed, dealloc, Layout};

use crate::error::{Error, GlsResult};
use crate::val::Val;

use super::generation::Generation;
use super::header::{build_header, header_generation, header_tag, header_type_index, HEADER_TAG_LARGE, HEADER_TAG_NORMAL};
use super::large::LargeObjectPtr;
use super::minipage::{MiniPagePtr, GC_MIN_PADDING, MINI_PAGE_MAX_OBJECT_SIZE, MINI_PAGE_SIZE};
use super::roots::{RootChain, RootEntry, RootMark};
use super::types::{GcFieldTag, TypeDescriptor, TypeIndex};

#[derive(Debug, Clone, Copy)]
pub struct GcConfig {
    pub scope_cap: u16,
    pub mini_pagec: u32,
}

impl Default for GcConfig {
    fn default() -> GcConfig {
        GcConfig { scope_cap: 32, mini_pagec: 32 }
    }
}

/// The garbage-collected heap: generations, the mini-page pool, registered
/// types, and the root chain. Process-wide in the reference implementation
/// (spec.md §5); embedders of this crate construct one `Gc` and share it
/// through their own context, matching the design note in spec.md §9.
pub struct Gc {
    pub(super) generations: Vec<Generation>,
    scope_cap: u16,

    pool_start: *mut u8,
    pool_len: usize,
    pub(super) free_head: MiniPagePtr,
    pub(super) free_count: u32,
    total_pages: u32,

    types: Vec<TypeDescriptor>,
    force_next_large: bool,

    pub(super) roots: RootChain,
}

// The pool is a single contiguous allocation owned exclusively by `Gc`.
unsafe impl Send for Gc {}

impl Gc {
    pub fn init(config: GcConfig) -> GlsResult<Gc> {
        let pool_len = config.mini_pagec as usize * MINI_PAGE_SIZE;
        let layout = Layout::from_size_align(pool_len.max(1), MINI_PAGE_SIZE)
            .map_err(|e| Error::runtime(format!("bad mini-page pool layout: {e}")))?;
        let pool_start = if pool_len == 0 {
            std::ptr::NonNull::dangling().as_ptr()
        } else {
            // SAFETY: layout is validated above and nonzero.
            let raw = unsafe { alloc_zeroed(layout) };
            if raw.is_null() {
                return Err(Error::runtime("failed to reserve mini-page pool"));
            }
            raw
        };

        let mut free_head = MiniPagePtr::null();
        for i in 0..config.mini_pagec {
            let page = MiniPagePtr(unsafe { pool_start.add(i as usize * MINI_PAGE_SIZE) } as *mut _);
            page.set_next(free_head);
            page.set_prev(MiniPagePtr::null());
            free_head = page;
        }

        let mut gc = Gc {
            generations: Vec::new(),
            scope_cap: config.scope_cap,
            pool_start,
            pool_len,
            free_head,
            free_count: config.mini_pagec,
            total_pages: config.mini_pagec,
            types: Vec::new(),
            force_next_large: false,
            roots: RootChain::new(),
        };
        gc.generations.push(Generation::new(0, gc.roots.mark()));
        Ok(gc)
    }

    /// Frees the mini-page pool and every remaining large object. `Gc`'s
    /// `Drop` impl calls this too, so letting a `Gc` simply go out of scope
    /// is equivalent to the reference implementation's explicit `dispose`.
    pub fn dispose(mut self) {
        self.dispose_in_place();
    }

    fn dispose_in_place(&mut self) {
        for gen in self.generations.drain(..) {
            let mut lo = gen.large_objects;
            while !lo.is_null() {
                let next = lo.next();
                unsafe { lo.free() };
                lo = next;
            }
        }
        if self.pool_len > 0 {
            let layout = Layout::from_size_align(self.pool_len, MINI_PAGE_SIZE).expect("pool layout");
            unsafe { dealloc(self.pool_start, layout) };
            self.pool_len = 0;
        }
    }

    pub fn push_type(&mut self, descriptor: TypeDescriptor) -> TypeIndex {
        self.types.push(descriptor);
        (self.types.len() - 1) as TypeIndex
    }

    pub fn type_descriptor(&self, index: TypeIndex) -> GlsResult<&TypeDescriptor> {
        self.types
            .get(index as usize)
            .ok_or_else(|| Error::runtime(format!("unknown type index {index}")))
    }

    /// Reads the type index out of a GC pointer's header. Undefined for
    /// values that aren't GC pointers (spec.md §4.1).
    pub fn type_of(&self, ptr: Val) -> TypeIndex {
        header_type_index(read_header(ptr.as_addr()))
    }

    pub fn force_next_large(&mut self) {
        self.force_next_large = true;
    }

    pub fn push_scope(&mut self) -> GlsResult<()> {
        if self.generations.len() >= self.scope_cap as usize {
            return Err(Error::runtime("scope depth exceeds configured cap"));
        }
        let index = self.generations.len() as u16;
        self.generations.push(Generation::new(index, self.roots.mark()));
        Ok(())
    }

    pub fn push_root(&mut self, entry: RootEntry) {
        self.roots.push(entry);
    }

    pub fn pop_root_to(&mut self, mark: RootMark) {
        self.roots.pop_to(mark);
    }

    pub fn root_mark(&self) -> RootMark {
        self.roots.mark()
    }

    /// Current generation index (the top of scope).
    pub fn top(&self) -> u16 {
        (self.generations.len() - 1) as u16
    }

    pub fn free_minipagec(&self) -> u32 {
        self.free_count
    }

    pub fn total_minipagec(&self) -> u32 {
        self.total_pages
    }

    pub fn is_in_pool(&self, addr: u64) -> bool {
        let addr = addr as usize;
        let start = self.pool_start as usize;
        addr >= start && addr < start + self.pool_len
    }

    /// Diagnostic summary used by the `dbg-dump-gc` primitive (SPEC_FULL.md
    /// §4.6).
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "gc: {} generations, {}/{} mini-pages free, {} types registered\n",
            self.generations.len(),
            self.free_count,
            self.total_pages,
            self.types.len()
        ));
        for gen in &self.generations {
            out.push_str(&format!(
                "  gen {}: {} mini-pages, large objects from {:#x}\n",
                gen.index,
                gen.minipagec,
                gen.large_objects.0 as usize
            ));
        }
        out
    }

    pub fn alloc(&mut self, type_index: TypeIndex) -> GlsResult<Val> {
        let top = self.top();
        self.alloc_sized(top, type_index, 0)
    }

    pub fn alloc_array(&mut self, type_index: TypeIndex, length: u32) -> GlsResult<Val> {
        {
            let descriptor = self.type_descriptor(type_index)?;
            if descriptor.resizable.is_none() {
                return Err(Error::runtime(format!("type {} has no resizable field", descriptor.name)));
            }
        }
        let top = self.top();
        self.alloc_sized(top, type_index, length)
    }

    /// Allocates directly into `gen_idx` rather than the current top of
    /// scope. Used to plant permanent objects — interned symbols, chiefly —
    /// into generation 0, which is never popped, so that they need no root
    /// registration of their own (spec.md §4.4).
    pub fn alloc_in(&mut self, gen_idx: u16, type_index: TypeIndex) -> GlsResult<Val> {
        self.alloc_sized(gen_idx, type_index, 0)
    }

    fn alloc_sized(&mut self, gen_idx: u16, type_index: TypeIndex, length: u32) -> GlsResult<Val> {
        let descriptor = self.type_descriptor(type_index)?.clone();
        let size = descriptor.size_for(length) as usize;
        let large = self.force_next_large || size > MINI_PAGE_MAX_OBJECT_SIZE;
        self.force_next_large = false;

        let body_ptr = if large {
            let lo = LargeObjectPtr::alloc(size);
            let header = build_header(HEADER_TAG_LARGE, super::header::COLOUR_WHITE, gen_idx, type_index);
            unsafe { *(lo.object_header_ptr() as *mut u64) = header };
            self.generations[gen_idx as usize].attach_large(lo);
            lo.data()
        } else {
            self.bump_alloc(gen_idx, type_index, descriptor.align, size)?
        };

        if let Some(resizable) = &descriptor.resizable {
            unsafe { *(body_ptr.add(resizable.length_offset as usize) as *mut u32) = length };
        }

        Ok(Val::gc_ptr(body_ptr as u64))
    }

    /// Bump-allocates `size` bytes (plus an 8-byte header) in `gen_idx`'s
    /// current mini-page, attaching a fresh page from the pool if needed.
    /// Returns a pointer to the object body (immediately past the header).
    pub(super) fn bump_alloc(&mut self, gen_idx: u16, type_index: TypeIndex, align: u32, size: usize) -> GlsResult<*mut u8> {
        let align = (align as usize).max(8);
        loop {
            let page = self.generations[gen_idx as usize].current;
            if page.is_null() {
                self.attach_fresh_page(gen_idx)?;
                continue;
            }
            let used = page.used() as usize;
            let mut start = align_up(used, align);
            if start > used && start - used < GC_MIN_PADDING {
                start += align;
            }
            let end = start + 8 + size;
            if end > super::minipage::MINI_PAGE_DATA_SIZE {
                self.attach_fresh_page(gen_idx)?;
                continue;
            }
            unsafe {
                std::ptr::write_bytes(page.data().add(used), super::minipage::PADDING_BYTE, start - used);
                let header_ptr = page.data().add(start) as *mut u64;
                *header_ptr = build_header(HEADER_TAG_NORMAL, super::header::COLOUR_WHITE, gen_idx, type_index);
                page.set_used(end as u32);
                return Ok((header_ptr as *mut u8).add(8));
            }
        }
    }

    fn attach_fresh_page(&mut self, gen_idx: u16) -> GlsResult<()> {
        if self.free_head.is_null() {
            return Err(Error::runtime("out of mini-pages"));
        }
        let page = self.free_head;
        self.free_head = page.next();
        self.free_count -= 1;
        self.generations[gen_idx as usize].attach_minipage(page);
        Ok(())
    }

    /// Records a trail entry if `written` belongs to a strictly younger
    /// generation than `base_obj` (spec.md §4.1 "Write barrier detail").
    ///
    /// The trail lives on `written`'s (younger) generation — it is the one
    /// that will be popped first and needs to know an older object still
    /// points at it — keyed by `base_obj`'s (older) generation, the
    /// eventual evacuation destination.
    pub fn write_barrier(&mut self, base_obj: Val, field_addr: u64, written: Val, tag: GcFieldTag) {
        if !written.is_gc_ptr() {
            return;
        }
        let base_gen = header_generation(read_header(base_obj.as_addr()));
        let written_gen = header_generation(read_header(written.as_addr()));
        if written_gen > base_gen {
            let entry = super::trail::TrailEntry::new(written.as_addr(), field_addr, tag);
            self.generations[written_gen as usize].trail.record(base_gen, entry);
        }
    }
}

impl Drop for Gc {
    fn drop(&mut self) {
        self.dispose_in_place();
    }
}

pub(super) fn align_up(x: usize, align: usize) -> usize {
    (x + align - 1) & !(align - 1)
}

/// Reads the 8-byte header immediately preceding a GC object's body.
pub(super) fn read_header(addr: u64) -> u64 {
    unsafe { *((addr as *const u64).sub(1)) }
}

/// Overwrites the 8-byte header immediately preceding a GC object's body.
pub(super) fn write_header(addr: u64, header: u64) {
    unsafe { *((addr as *mut u64).sub(1)) = header };
}

#[allow(dead_code)]
fn debug_assert_tag_is_sane(addr: u64) {
    debug_assert!(header_tag(read_header(addr)) <= HEADER_TAG_LARGE);
}

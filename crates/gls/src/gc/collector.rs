//! Minor collection, run on `popScope` (spec.md §4.1 "Collection algorithm").

use crate::error::{Error, GlsResult};
use crate::val::Val;

use super::allocator::{read_header, write_header, Gc};
use super::generation::GrayCursor;
use super::header::{
    forwarding_header, header_colour, header_generation, header_tag, header_type_index, read_forwarded, COLOUR_GRAY,
    COLOUR_WHITE, HEADER_TAG_FORWARDING, HEADER_TAG_LARGE, HEADER_TAG_NORMAL, HEADER_TAG_PADDING,
};
use super::large::LargeObjectPtr;
use super::minipage::PADDING_BYTE;
use super::roots::RootEntry;
use super::trail::TrailEntry;
use super::types::GcFieldTag;

impl Gc {
    /// Pops the current (youngest) generation, evacuating survivors into its
    /// parent and reclaiming everything else.
    pub fn pop_scope(&mut self) -> GlsResult<()> {
        let popped_idx = self.generations.len() - 1;
        if popped_idx == 0 {
            return Err(Error::runtime("cannot pop the outermost generation"));
        }
        let dst_idx = (popped_idx - 1) as u16;

        // Graduation of trail: oldest destination first.
        let mut trail = std::mem::take(&mut self.generations[popped_idx].trail);
        for (dest_gen, entries) in trail.drain_oldest_first() {
            self.reset_gray_frontier(dest_gen);
            for entry in entries {
                self.graduate_trail_entry(dest_gen, entry)?;
            }
            self.scan_grays(dest_gen)?;
        }

        // Mark roots of the popped generation into its parent.
        self.reset_gray_frontier(dst_idx);
        let root_mark = self.generations[popped_idx].root_mark;
        self.mark_roots(root_mark, dst_idx)?;
        self.scan_grays(dst_idx)?;

        self.reclaim(popped_idx);
        self.generations.pop();
        Ok(())
    }

    fn reset_gray_frontier(&mut self, gen_idx: u16) {
        let gen = &mut self.generations[gen_idx as usize];
        gen.first_gray = if gen.current.is_null() {
            None
        } else {
            Some(GrayCursor { page: gen.current, offset: gen.current.used() })
        };
        gen.first_non_gray_lo = gen.large_objects;
    }

    fn graduate_trail_entry(&mut self, dest_gen: u16, entry: TrailEntry) -> GlsResult<()> {
        let field_ptr = entry.field_addr() as *mut u64;
        let current = unsafe { *field_ptr };
        let still_points_here = match entry.field_tag() {
            GcFieldTag::Tagged => Val(current).is_gc_ptr() && Val(current).as_addr() == entry.object,
            _ => current == entry.object,
        };
        if !still_points_here {
            return Ok(());
        }

        let header = read_header(entry.object);
        let new_addr = match header_tag(header) {
            HEADER_TAG_FORWARDING => read_forwarded(header),
            HEADER_TAG_NORMAL => self.evacuate_addr(entry.object, dest_gen, true)?,
            HEADER_TAG_LARGE => {
                self.relink_large(entry.object, dest_gen)?;
                entry.object
            }
            _ => return Err(Error::runtime("corrupt header during trail graduation")),
        };

        unsafe {
            *field_ptr = match entry.field_tag() {
                GcFieldTag::Tagged => Val::gc_ptr(new_addr).0,
                _ => new_addr,
            };
        }
        Ok(())
    }

    /// Walks the root entries pushed since `root_mark`, evacuating every
    /// `Val` they reach out of `from_gen` into `dst_gen`.
    fn mark_roots(&mut self, root_mark: super::roots::RootMark, dst_gen: u16) -> GlsResult<()> {
        // SAFETY: single-threaded; no other access to `self.roots` occurs
        // while this raw pointer is live, and the closures below never
        // outlive this function.
        let gc_ptr: *mut Gc = self;
        let entries_ptr: *const [RootEntry] = self.roots.entries_since(root_mark) as *const [RootEntry];
        let entries = unsafe { &*entries_ptr };
        for entry in entries {
            match entry {
                RootEntry::Direct { ptr, len } => {
                    for i in 0..*len {
                        unsafe {
                            let slot = ptr.add(i);
                            *slot = (*gc_ptr).evacuate(*slot, dst_gen, false)?;
                        }
                    }
                }
                RootEntry::Indirect { ptr, len } => {
                    for i in 0..*len {
                        unsafe {
                            let sub = *ptr.add(i);
                            if sub.is_null() {
                                continue;
                            }
                            // Indirect roots describe arrays whose length is
                            // tracked by the owner; we conservatively treat
                            // each as a single slot, matching how the
                            // interpreter publishes one upvalue cell per
                            // indirect root entry.
                            *sub = (*gc_ptr).evacuate(*sub, dst_gen, false)?;
                        }
                    }
                }
                RootEntry::RawPtrArray { ptr, len } => {
                    for i in 0..*len {
                        unsafe {
                            let slot = ptr.add(i);
                            if (*slot).is_null() {
                                continue;
                            }
                            let new_addr = (*gc_ptr).evacuate_addr(*slot as u64, dst_gen, false)?;
                            *slot = new_addr as *mut u8;
                        }
                    }
                }
                RootEntry::Callback { visit, ctx } => unsafe {
                    let mut mark = |v: Val| -> Val { (*gc_ptr).evacuate(v, dst_gen, false).unwrap_or(v) };
                    visit(*ctx, &mut mark);
                },
            }
        }
        Ok(())
    }

    fn relink_large(&mut self, addr: u64, dst_gen: u16) -> GlsResult<()> {
        let header = read_header(addr);
        if header_colour(header) != COLOUR_WHITE {
            return Ok(());
        }
        let lo = LargeObjectPtr::from_data(addr);
        let obj_gen = lo.generation();
        self.generations[obj_gen as usize].unlink_large(lo);
        lo.set_colour(COLOUR_GRAY);
        self.generations[dst_gen as usize].attach_large(lo);
        Ok(())
    }

    /// Evacuates a tagged value out of a younger generation per the rule in
    /// spec.md §4.1 "Evacuation rule". Non-GC values pass through unchanged.
    pub(super) fn evacuate(&mut self, v: Val, dst_gen: u16, move_in_place: bool) -> GlsResult<Val> {
        if !v.is_gc_ptr() {
            return Ok(v);
        }
        Ok(Val::gc_ptr(self.evacuate_addr(v.as_addr(), dst_gen, move_in_place)?))
    }

    pub(super) fn evacuate_addr(&mut self, addr: u64, dst_gen: u16, move_in_place: bool) -> GlsResult<u64> {
        let header = read_header(addr);
        let min_move_gen = dst_gen + if move_in_place { 0 } else { 1 };
        match header_tag(header) {
            HEADER_TAG_FORWARDING => Ok(read_forwarded(header)),
            HEADER_TAG_NORMAL => {
                let obj_gen = header_generation(header);
                if obj_gen >= min_move_gen {
                    let new_addr = self.copy_normal_object(addr, header, dst_gen)?;
                    write_header(addr, forwarding_header(new_addr));
                    Ok(new_addr)
                } else {
                    Ok(addr)
                }
            }
            HEADER_TAG_LARGE => {
                let obj_gen = header_generation(header);
                if obj_gen > min_move_gen && header_colour(header) == COLOUR_WHITE {
                    self.relink_large(addr, dst_gen)?;
                }
                Ok(addr)
            }
            _ => Err(Error::runtime("corrupt object header during collection")),
        }
    }

    fn copy_normal_object(&mut self, addr: u64, header: u64, dst_gen: u16) -> GlsResult<u64> {
        let type_index = header_type_index(header);
        let descriptor = self.type_descriptor(type_index)?.clone();
        let length = match &descriptor.resizable {
            Some(r) => unsafe { *((addr as *const u8).add(r.length_offset as usize) as *const u32) },
            None => 0,
        };
        let size = descriptor.size_for(length) as usize;
        let body_ptr = self.bump_alloc(dst_gen, type_index, descriptor.align, size)?;
        unsafe { std::ptr::copy_nonoverlapping(addr as *const u8, body_ptr, size) };
        Ok(body_ptr as u64)
    }

    /// Scans gray objects in `dst_gen` to a fixed point, alternating between
    /// large objects and mini-pages since scanning one kind can make the
    /// other gray (spec.md §4.1 "Scan grays in destination").
    fn scan_grays(&mut self, dst_gen: u16) -> GlsResult<()> {
        loop {
            let a = self.scan_gray_large(dst_gen)?;
            let b = self.scan_gray_minipages(dst_gen)?;
            if !a && !b {
                break;
            }
        }
        Ok(())
    }

    /// Visits every large object between the generation's head and the
    /// frontier saved by [`reset_gray_frontier`](Self::reset_gray_frontier)
    /// — the ones prepended since, i.e. the gray ones (spec.md §4.1 "Scan
    /// grays in destination").
    fn scan_gray_large(&mut self, dst_gen: u16) -> GlsResult<bool> {
        let (head, boundary) = {
            let gen = &self.generations[dst_gen as usize];
            (gen.large_objects, gen.first_non_gray_lo)
        };
        let mut gray = Vec::new();
        let mut probe = head;
        while probe != boundary && !probe.is_null() {
            gray.push(probe);
            probe = probe.next();
        }
        if gray.is_empty() {
            return Ok(false);
        }
        for lo in &gray {
            self.scan_object_fields(lo.data() as u64, dst_gen)?;
            lo.set_colour(COLOUR_WHITE);
        }
        self.generations[dst_gen as usize].first_non_gray_lo = self.generations[dst_gen as usize].large_objects;
        Ok(true)
    }

    fn scan_gray_minipages(&mut self, dst_gen: u16) -> GlsResult<bool> {
        let mut progressed = false;
        let mut cursor = self.generations[dst_gen as usize].first_gray;
        while let Some(GrayCursor { page, mut offset }) = cursor {
            loop {
                // Skip padding bytes between objects.
                while (offset as usize) < page.used() as usize {
                    let byte = unsafe { *page.data().add(offset as usize) };
                    if byte == PADDING_BYTE {
                        offset += 1;
                    } else {
                        break;
                    }
                }
                if (offset as usize) >= page.used() as usize {
                    break;
                }
                let header_ptr = unsafe { page.data().add(offset as usize) as *mut u64 };
                let header = unsafe { *header_ptr };
                if header_tag(header) == HEADER_TAG_PADDING {
                    offset += 1;
                    continue;
                }
                let type_index = header_type_index(header);
                let body_addr = (header_ptr as u64) + 8;
                self.scan_object_fields(body_addr, dst_gen)?;
                progressed = true;
                let descriptor = self.type_descriptor(type_index)?.clone();
                let length = match &descriptor.resizable {
                    Some(r) => unsafe { *((body_addr as *const u8).add(r.length_offset as usize) as *const u32) },
                    None => 0,
                };
                let size = descriptor.size_for(length) as usize;
                offset += (8 + size) as u32;
            }
            cursor = if !page.prev().is_null() {
                Some(GrayCursor { page: page.prev(), offset: 0 })
            } else {
                None
            };
        }
        self.generations[dst_gen as usize].first_gray = {
            let gen = &self.generations[dst_gen as usize];
            if gen.current.is_null() {
                None
            } else {
                Some(GrayCursor { page: gen.current, offset: gen.current.used() })
            }
        };
        Ok(progressed)
    }

    /// Visits every GC-tagged/raw field of the object at `addr`, evacuating
    /// referents that are younger than `dst_gen` and rewriting the field in
    /// place.
    fn scan_object_fields(&mut self, addr: u64, dst_gen: u16) -> GlsResult<()> {
        let header = read_header(addr);
        let type_index = header_type_index(header);
        let descriptor = self.type_descriptor(type_index)?.clone();
        for field in &descriptor.fields {
            self.scan_field(addr, field.offset, field.size, field.gc_tag, dst_gen)?;
        }
        if let Some(r) = &descriptor.resizable {
            let length = unsafe { *((addr as *const u8).add(r.length_offset as usize) as *const u32) };
            let elems_start = descriptor.base_size;
            for i in 0..length {
                let offset = elems_start + i * r.element_size;
                self.scan_field(addr, offset, r.element_size, r.element_gc_tag, dst_gen)?;
            }
        }
        Ok(())
    }

    fn scan_field(&mut self, base_addr: u64, offset: u32, size: u32, tag: GcFieldTag, dst_gen: u16) -> GlsResult<()> {
        match tag {
            GcFieldTag::None => Ok(()),
            GcFieldTag::Tagged => {
                debug_assert_eq!(size, 8);
                let slot = (base_addr + offset as u64) as *mut u64;
                let v = Val(unsafe { *slot });
                let moved = self.evacuate(v, dst_gen, false)?;
                unsafe { *slot = moved.0 };
                Ok(())
            }
            GcFieldTag::Raw => {
                debug_assert_eq!(size, 8);
                let slot = (base_addr + offset as u64) as *mut u64;
                let addr = unsafe { *slot };
                if addr == 0 {
                    return Ok(());
                }
                let moved = self.evacuate_addr(addr, dst_gen, false)?;
                unsafe { *slot = moved };
                Ok(())
            }
        }
    }

    fn reclaim(&mut self, gen_idx: usize) {
        let (current, first, minipagec, mut lo) = {
            let gen = &self.generations[gen_idx];
            (gen.current, gen.first, gen.minipagec, gen.large_objects)
        };
        if !current.is_null() {
            first.set_next(self.free_head);
            self.free_head = current;
            self.free_count += minipagec;
        }
        while !lo.is_null() {
            let next = lo.next();
            unsafe { lo.free() };
            lo = next;
        }
        let gen = &mut self.generations[gen_idx];
        gen.current = super::minipage::MiniPagePtr::null();
        gen.first = super::minipage::MiniPagePtr::null();
        gen.minipagec = 0;
        gen.large_objects = super::large::LargeObjectPtr::null();
        gen.first_non_gray_lo = super::large::LargeObjectPtr::null();
        gen.first_gray = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::{FieldDescriptor, GcConfig, GcFieldTag as Tag, TypeDescriptor};

    fn pair_type(gc: &mut Gc) -> super::super::types::TypeIndex {
        gc.push_type(TypeDescriptor::fixed(
            "pair",
            8,
            16,
            vec![
                FieldDescriptor { offset: 0, size: 8, gc_tag: Tag::Tagged },
                FieldDescriptor { offset: 8, size: 8, gc_tag: Tag::Tagged },
            ],
        ))
    }

    #[test]
    fn surviving_object_migrates_to_parent_generation_on_pop() {
        let mut gc = Gc::init(GcConfig::default()).unwrap();
        let pair_ty = pair_type(&mut gc);
        gc.push_scope().unwrap();

        let pair = gc.alloc(pair_ty).unwrap();
        unsafe {
            let body = pair.as_addr() as *mut u64;
            *body = Val::fixnum(1).0;
            *body.add(1) = crate::val::VAL_NIL.0;
        }

        let mark = gc.root_mark();
        let mut root_slot = pair;
        gc.push_root(RootEntry::Direct { ptr: &mut root_slot as *mut Val, len: 1 });
        gc.pop_scope().unwrap();
        gc.pop_root_to(mark);

        assert!(root_slot.is_gc_ptr());
        let car = Val(unsafe { *(root_slot.as_addr() as *const u64) });
        assert_eq!(car.as_sfix(), 1);
    }
}

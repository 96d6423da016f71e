//! Generations (scopes): spec.md §3 "Generation (scope)".

use super::large::LargeObjectPtr;
use super::minipage::MiniPagePtr;
use super::roots::RootMark;
use super::trail::Trail;

/// A cursor into the mini-page scan frontier: the page plus a byte offset
/// into its data region at which the next unscanned (gray) object begins.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct GrayCursor {
    pub page: MiniPagePtr,
    pub offset: u32,
}

pub struct Generation {
    pub index: u16,
    /// Head of this generation's mini-page list (most recently attached).
    pub current: MiniPagePtr,
    /// Tail of the list (first mini-page ever attached to this generation).
    pub first: MiniPagePtr,
    pub minipagec: u32,

    /// Scan frontier within the mini-page list; `None` means nothing gray.
    pub first_gray: Option<GrayCursor>,

    /// Head of this generation's large-object list.
    pub large_objects: LargeObjectPtr,
    /// First non-gray (i.e. already-scanned or never-gray) large object;
    /// everything from `large_objects` up to (not including) this one is
    /// gray.
    pub first_non_gray_lo: LargeObjectPtr,

    /// Writes from this generation into older ones.
    pub trail: Trail,

    /// Root-chain position saved when this generation was pushed.
    pub root_mark: RootMark,
}

impl Generation {
    pub fn new(index: u16, root_mark: RootMark) -> Generation {
        Generation {
            index,
            current: MiniPagePtr::null(),
            first: MiniPagePtr::null(),
            minipagec: 0,
            first_gray: None,
            large_objects: LargeObjectPtr::null(),
            first_non_gray_lo: LargeObjectPtr::null(),
            trail: Trail::new(),
            root_mark,
        }
    }

    /// Attaches a freshly claimed mini-page as this generation's new head.
    pub fn attach_minipage(&mut self, page: MiniPagePtr) {
        page.set_generation(self.index);
        page.set_prev(MiniPagePtr::null());
        page.set_next(self.current);
        if !self.current.is_null() {
            self.current.set_prev(page);
        }
        self.current = page;
        if self.first.is_null() {
            self.first = page;
        }
        self.minipagec += 1;
        if self.first_gray.is_none() {
            self.first_gray = Some(GrayCursor { page, offset: 0 });
        }
    }

    /// Prepends a large object to this generation's list.
    pub fn attach_large(&mut self, lo: LargeObjectPtr) {
        lo.set_generation(self.index);
        lo.set_prev(LargeObjectPtr::null());
        lo.set_next(self.large_objects);
        if !self.large_objects.is_null() {
            self.large_objects.set_prev(lo);
        }
        self.large_objects = lo;
        if self.first_non_gray_lo.is_null() {
            self.first_non_gray_lo = self.large_objects;
        }
    }

    /// Unlinks a large object wherever it sits in this generation's list.
    pub fn unlink_large(&mut self, lo: LargeObjectPtr) {
        if self.first_non_gray_lo == lo {
            self.first_non_gray_lo = lo.next();
        }
        let prev = lo.prev();
        let next = lo.next();
        if !prev.is_null() {
            prev.set_next(next);
        } else {
            self.large_objects = next;
        }
        if !next.is_null() {
            next.set_prev(prev);
        }
    }

    pub fn has_gray(&self) -> bool {
        self.first_gray.is_some() || self.first_non_gray_lo != self.large_objects
    }
}

//! Scoped generational copying garbage collector (spec.md §3, §4.1).
//!
//! Mirrors the shape of the reference allocator: a pool of fixed-size
//! mini-pages bump-allocates small objects per generation, large objects are
//! allocated individually and never move, and popping a generation runs a
//! minor collection that evacuates survivors into its parent.

mod allocator;
mod collector;
mod generation;
mod header;
mod large;
mod minipage;
mod roots;
mod trail;
mod types;

pub use allocator::{Gc, GcConfig};
pub use header::{COLOUR_GRAY, COLOUR_WHITE, HEADER_TAG_FORWARDING, HEADER_TAG_LARGE, HEADER_TAG_NORMAL, HEADER_TAG_PADDING};
pub use minipage::{GC_MIN_PADDING, MINI_PAGE_DATA_SIZE, MINI_PAGE_MAX_OBJECT_SIZE, MINI_PAGE_SIZE};
pub use roots::{RootEntry, RootMark, RootVisitFn};
pub use types::{FieldDescriptor, GcFieldTag, ResizableField, TypeDescriptor, TypeIndex};

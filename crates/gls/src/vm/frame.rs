//! Shadow call stack used for trace reporting (spec.md §4.3 "Public contract",
//! "Error frames"; grounded on `original_source/src/rt/c/bytecode/interp.c`'s
//! `gs_shadow_stack`/`StackFrame`).

use crate::error::{Error, GlsResult};
use crate::val::Val;

/// Compile-time ceiling on interpreter recursion depth (spec.md §4.3).
pub const STACK_MAX_DEPTH: usize = 10_000;

pub struct ShadowStack {
    names: Vec<Val>,
}

impl ShadowStack {
    pub fn new() -> ShadowStack {
        ShadowStack { names: Vec::new() }
    }

    pub fn depth(&self) -> usize {
        self.names.len()
    }

    /// Pushes a frame for a closure named `name` (a symbol `Val`, or nil for
    /// `{unknown}`). Fails once depth reaches [`STACK_MAX_DEPTH`].
    pub fn push(&mut self, name: Val) -> GlsResult<()> {
        if self.names.len() >= STACK_MAX_DEPTH {
            return Err(Error::runtime("Stack overflow"));
        }
        self.names.push(name);
        Ok(())
    }

    pub fn pop(&mut self) {
        self.names.pop();
    }

    pub fn current_name(&self) -> Option<Val> {
        self.names.last().copied()
    }
}

impl Default for ShadowStack {
    fn default() -> ShadowStack {
        ShadowStack::new()
    }
}

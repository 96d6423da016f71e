//! Closure construction and predicates (spec.md §3 "Closure", §4.3).
//!
//! The reference implementation makes a closure callable by giving it a
//! leading function-pointer field; this translation instead dispatches on
//! the GC type index at the call site (see `interpreter::call`), since a
//! `fn` pointer baked into an object's layout has no stable meaning once
//! the value also has to survive being moved by a language-level `Copy`.
//! Symbols are callable the same way the original embeds an `invoke-closure`
//! field in `Symbol`: rather than add a back-pointer field purely to derive
//! "which symbol owns this function pointer" (spec.md §9's stated fallback
//! for languages without that pointer arithmetic), the call dispatcher
//! simply recognises a symbol-typed callee directly and derefs its value.

use crate::error::GlsResult;
use crate::gc::Gc;
use crate::heap::{self, CoreTypes};
use crate::val::Val;

pub fn make_native(gc: &mut Gc, types: &CoreTypes, primitive_index: u32) -> GlsResult<Val> {
    let c = gc.alloc(types.native_closure)?;
    heap::set_field_u32(c, heap::NATIVE_CLOSURE_INDEX_OFFSET, primitive_index);
    Ok(c)
}

pub fn native_index(c: Val) -> u32 {
    heap::field_u32(c, heap::NATIVE_CLOSURE_INDEX_OFFSET)
}

/// `image_index` indexes into the host-owned table of loaded images (see
/// `vm::Vm::images`) rather than holding a raw pointer to one.
pub fn make_interpreted(
    gc: &mut Gc,
    types: &CoreTypes,
    image_index: u32,
    code_index: u32,
    captured: &[Val],
) -> GlsResult<Val> {
    let c = gc.alloc_array(types.interpreted_closure, captured.len() as u32)?;
    heap::set_field_u64(c, heap::INTERP_CLOSURE_IMAGE_OFFSET, image_index as u64);
    heap::set_field_u32(c, heap::INTERP_CLOSURE_CODE_OFFSET, code_index);
    heap::set_field_val(gc, c, heap::INTERP_CLOSURE_NAME_OFFSET, crate::val::VAL_NIL);
    for (i, &v) in captured.iter().enumerate() {
        heap::set_array_tagged(gc, c, heap::INTERP_CLOSURE_CAPTURED_DATA_OFFSET, i as u32, v);
    }
    Ok(c)
}

pub fn interp_image_index(c: Val) -> u32 {
    heap::field_u64(c, heap::INTERP_CLOSURE_IMAGE_OFFSET) as u32
}

pub fn interp_code_index(c: Val) -> u32 {
    heap::field_u32(c, heap::INTERP_CLOSURE_CODE_OFFSET)
}

pub fn interp_name(c: Val) -> Val {
    heap::field_val(c, heap::INTERP_CLOSURE_NAME_OFFSET)
}

/// Records the symbol a closure was first bound to, for trace naming
/// (spec.md §4.3 "Error frames"). Only takes effect the first time, mirroring
/// the reference's `assignedTo` field, which is set once at `symbol-set-value!`
/// time and never overwritten.
pub fn set_interp_name_if_unset(gc: &mut Gc, types: &CoreTypes, c: Val, name: Val) {
    if gc.type_of(c) != types.interpreted_closure {
        return;
    }
    if interp_name(c).is_nil() {
        heap::set_field_val(gc, c, heap::INTERP_CLOSURE_NAME_OFFSET, name);
    }
}

pub fn interp_captured_len(c: Val) -> u32 {
    heap::field_u32(c, heap::INTERP_CLOSURE_CAPTURED_LEN_OFFSET)
}

pub fn interp_captured(c: Val, index: u32) -> Val {
    heap::array_tagged(c, heap::INTERP_CLOSURE_CAPTURED_DATA_OFFSET, index)
}

/// True for native closures, interpreted closures, and symbols (spec.md §3
/// "Symbol table": "calling a symbol dispatches to the value bound to it").
pub fn is_callable(gc: &Gc, types: &CoreTypes, v: Val) -> bool {
    if !v.is_gc_ptr() {
        return false;
    }
    let ty = gc.type_of(v);
    ty == types.native_closure || ty == types.interpreted_closure || ty == types.symbol
}

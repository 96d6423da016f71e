//! Registers the handful of GC type descriptors every other module builds
//! on: pairs, byte buffers (backing both strings and bytestrings), symbols,
//! boxes, and the two closure subtypes (spec.md §3 "Type descriptor",
//! "Closure").

use crate::error::GlsResult;
use crate::gc::{FieldDescriptor, Gc, GcFieldTag, ResizableField, TypeDescriptor, TypeIndex};
use crate::val::Val;

#[derive(Debug, Clone, Copy)]
pub struct CoreTypes {
    pub pair: TypeIndex,
    pub bytes: TypeIndex,
    pub string: TypeIndex,
    pub symbol: TypeIndex,
    pub box_cell: TypeIndex,
    pub native_closure: TypeIndex,
    pub interpreted_closure: TypeIndex,
}

// Field offsets, exposed so `val`/`vm`/`primitives` modules can read and
// write object bodies without re-deriving layout.
pub const PAIR_CAR_OFFSET: u32 = 0;
pub const PAIR_CDR_OFFSET: u32 = 8;

pub const BYTES_LEN_OFFSET: u32 = 0;
pub const BYTES_DATA_OFFSET: u32 = 8;

pub const SYMBOL_VALUE_OFFSET: u32 = 0;
pub const SYMBOL_NAME_OFFSET: u32 = 8;
pub const SYMBOL_IS_MACRO_OFFSET: u32 = 16;

pub const BOX_VALUE_OFFSET: u32 = 0;

pub const NATIVE_CLOSURE_INDEX_OFFSET: u32 = 0;

pub const INTERP_CLOSURE_IMAGE_OFFSET: u32 = 0;
pub const INTERP_CLOSURE_CODE_OFFSET: u32 = 8;
pub const INTERP_CLOSURE_NAME_OFFSET: u32 = 16;
pub const INTERP_CLOSURE_CAPTURED_LEN_OFFSET: u32 = 24;
pub const INTERP_CLOSURE_CAPTURED_DATA_OFFSET: u32 = 32;

pub fn install(gc: &mut Gc) -> CoreTypes {
    let pair = gc.push_type(TypeDescriptor::fixed(
        "pair",
        8,
        16,
        vec![
            FieldDescriptor { offset: PAIR_CAR_OFFSET, size: 8, gc_tag: GcFieldTag::Tagged },
            FieldDescriptor { offset: PAIR_CDR_OFFSET, size: 8, gc_tag: GcFieldTag::Tagged },
        ],
    ));

    let bytes = gc.push_type(TypeDescriptor::array(
        "bytestring",
        8,
        BYTES_DATA_OFFSET,
        ResizableField { length_offset: BYTES_LEN_OFFSET, element_size: 1, element_gc_tag: GcFieldTag::None },
        vec![],
    ));

    // `string` shares `bytestring`'s layout (length-prefixed bytes) but is a
    // distinct type so `string?`/`bytestring?` can tell them apart (spec.md
    // §6); strings hold UTF-8, bytestrings arbitrary octets.
    let string = gc.push_type(TypeDescriptor::array(
        "string",
        8,
        BYTES_DATA_OFFSET,
        ResizableField { length_offset: BYTES_LEN_OFFSET, element_size: 1, element_gc_tag: GcFieldTag::None },
        vec![],
    ));

    let symbol = gc.push_type(TypeDescriptor::fixed(
        "symbol",
        8,
        24,
        vec![
            FieldDescriptor { offset: SYMBOL_VALUE_OFFSET, size: 8, gc_tag: GcFieldTag::Tagged },
            FieldDescriptor { offset: SYMBOL_NAME_OFFSET, size: 8, gc_tag: GcFieldTag::Tagged },
            FieldDescriptor { offset: SYMBOL_IS_MACRO_OFFSET, size: 1, gc_tag: GcFieldTag::None },
        ],
    ));

    let box_cell = gc.push_type(TypeDescriptor::fixed(
        "box",
        8,
        8,
        vec![FieldDescriptor { offset: BOX_VALUE_OFFSET, size: 8, gc_tag: GcFieldTag::Tagged }],
    ));

    let native_closure = gc.push_type(TypeDescriptor::fixed(
        "native-closure",
        8,
        8,
        vec![FieldDescriptor { offset: NATIVE_CLOSURE_INDEX_OFFSET, size: 4, gc_tag: GcFieldTag::None }],
    ));

    let interpreted_closure = gc.push_type(TypeDescriptor::array(
        "interpreted-closure",
        8,
        INTERP_CLOSURE_CAPTURED_DATA_OFFSET,
        ResizableField {
            length_offset: INTERP_CLOSURE_CAPTURED_LEN_OFFSET,
            element_size: 8,
            element_gc_tag: GcFieldTag::Tagged,
        },
        vec![
            FieldDescriptor { offset: INTERP_CLOSURE_IMAGE_OFFSET, size: 8, gc_tag: GcFieldTag::None },
            FieldDescriptor { offset: INTERP_CLOSURE_CODE_OFFSET, size: 4, gc_tag: GcFieldTag::None },
            FieldDescriptor { offset: INTERP_CLOSURE_NAME_OFFSET, size: 8, gc_tag: GcFieldTag::Tagged },
        ],
    ));

    CoreTypes { pair, bytes, string, symbol, box_cell, native_closure, interpreted_closure }
}

#[inline]
pub fn field_val(obj: Val, offset: u32) -> Val {
    Val(unsafe { *((obj.as_addr() + offset as u64) as *const u64) })
}

#[inline]
pub fn set_field_val(gc: &mut Gc, obj: Val, offset: u32, value: Val) {
    let addr = obj.as_addr() + offset as u64;
    if value.is_gc_ptr() {
        gc.write_barrier(obj, addr, value, GcFieldTag::Tagged);
    }
    unsafe { *(addr as *mut u64) = value.0 };
}

#[inline]
pub fn field_u32(obj: Val, offset: u32) -> u32 {
    unsafe { *((obj.as_addr() + offset as u64) as *const u32) }
}

#[inline]
pub fn set_field_u32(obj: Val, offset: u32, value: u32) {
    unsafe { *((obj.as_addr() + offset as u64) as *mut u32) = value };
}

#[inline]
pub fn field_u8(obj: Val, offset: u32) -> u8 {
    unsafe { *((obj.as_addr() + offset as u64) as *const u8) }
}

#[inline]
pub fn set_field_u8(obj: Val, offset: u32, value: u8) {
    unsafe { *((obj.as_addr() + offset as u64) as *mut u8) = value };
}

#[inline]
pub fn field_u64(obj: Val, offset: u32) -> u64 {
    unsafe { *((obj.as_addr() + offset as u64) as *const u64) }
}

#[inline]
pub fn set_field_u64(obj: Val, offset: u32, value: u64) {
    unsafe { *((obj.as_addr() + offset as u64) as *mut u64) = value };
}

/// Reads the `index`th `Val` of a resizable `Tagged` array field starting at
/// `elements_offset`.
#[inline]
pub fn array_tagged(obj: Val, elements_offset: u32, index: u32) -> Val {
    field_val(obj, elements_offset + index * 8)
}

#[inline]
pub fn set_array_tagged(gc: &mut Gc, obj: Val, elements_offset: u32, index: u32, value: Val) {
    set_field_val(gc, obj, elements_offset + index * 8, value)
}

pub fn bytes_len(obj: Val) -> u32 {
    field_u32(obj, BYTES_LEN_OFFSET)
}

/// # Safety
/// The returned slice aliases GC-owned memory and is only valid until the
/// next allocation or scope transition, either of which may move `obj`.
/// Callers must copy out anything they need to keep past that point.
pub unsafe fn bytes_slice(obj: Val) -> &'static [u8] {
    let len = bytes_len(obj) as usize;
    std::slice::from_raw_parts((obj.as_addr() + BYTES_DATA_OFFSET as u64) as *const u8, len)
}

pub fn alloc_bytes(gc: &mut Gc, types: &CoreTypes, data: &[u8]) -> GlsResult<Val> {
    alloc_byte_array(gc, types.bytes, data)
}

pub fn alloc_string(gc: &mut Gc, types: &CoreTypes, data: &[u8]) -> GlsResult<Val> {
    alloc_byte_array(gc, types.string, data)
}

fn alloc_byte_array(gc: &mut Gc, ty: TypeIndex, data: &[u8]) -> GlsResult<Val> {
    let v = gc.alloc_array(ty, data.len() as u32)?;
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), (v.as_addr() + BYTES_DATA_OFFSET as u64) as *mut u8, data.len());
    }
    Ok(v)
}

pub fn cons(gc: &mut Gc, types: &CoreTypes, car: Val, cdr: Val) -> GlsResult<Val> {
    let pair = gc.alloc(types.pair)?;
    set_field_val(gc, pair, PAIR_CAR_OFFSET, car);
    set_field_val(gc, pair, PAIR_CDR_OFFSET, cdr);
    Ok(pair)
}

pub fn car(obj: Val) -> Val {
    field_val(obj, PAIR_CAR_OFFSET)
}

pub fn cdr(obj: Val) -> Val {
    field_val(obj, PAIR_CDR_OFFSET)
}

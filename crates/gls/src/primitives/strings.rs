//! String and bytestring access (spec.md §6; grounded on primitives_impl.c
//! lines 297-503 and 84-110).
//!
//! `string` holds UTF-8 text and indexes by byte, handing back a `char`;
//! `bytestring` holds arbitrary octets and hands back a fixnum. Both share
//! the same length-prefixed layout (`heap::BYTES_DATA_OFFSET`).

use crate::error::{Error, GlsResult};
use crate::heap;
use crate::val::Val;
use crate::vm::Vm;

use super::{check_arity, check_ret_arity, is_list0};

fn is_bytestring(vm: &Vm, v: Val) -> bool {
    v.is_gc_ptr() && vm.gc.type_of(v) == vm.types.bytes
}

fn is_string(vm: &Vm, v: Val) -> bool {
    v.is_gc_ptr() && vm.gc.type_of(v) == vm.types.string
}

pub fn new_bytestring(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !args[0].is_fixnum() {
        return Err(Error::runtime("Not a number"));
    }
    let len = args[0].as_ufix() as u32;
    // Fresh allocations always come back zeroed (spec.md §3 "mini-page"/
    // "large object"), so there is nothing further to initialise here.
    rets[0] = vm.gc.alloc_array(vm.types.bytes, len)?;
    Ok(())
}

pub fn bytestring_length(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !is_bytestring(vm, args[0]) {
        return Err(Error::raised(args[0], "Not a bytestring"));
    }
    rets[0] = Val::fixnum(heap::bytes_len(args[0]) as i64);
    Ok(())
}

pub fn bytestring_ref(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 2, retc, 1)?;
    if !is_bytestring(vm, args[0]) {
        return Err(Error::raised(args[0], "Not a bytestring"));
    }
    if !args[1].is_fixnum() {
        return Err(Error::raised(args[1], "Not a number"));
    }
    let len = heap::bytes_len(args[0]) as u64;
    let idx = args[1].as_ufix();
    if idx >= len {
        return Err(Error::raised(args[0], "Index out of bounds"));
    }
    let byte = unsafe { heap::bytes_slice(args[0]) }[idx as usize];
    rets[0] = Val::fixnum(byte as i64);
    Ok(())
}

pub fn string_length(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !is_string(vm, args[0]) {
        return Err(Error::raised(args[0], "Not a string"));
    }
    rets[0] = Val::fixnum(heap::bytes_len(args[0]) as i64);
    Ok(())
}

pub fn string_ref(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 2, retc, 1)?;
    if !is_string(vm, args[0]) {
        return Err(Error::raised(args[0], "Not a string"));
    }
    if !args[1].is_fixnum() {
        return Err(Error::raised(args[1], "Not a number"));
    }
    let len = heap::bytes_len(args[0]) as u64;
    let idx = args[1].as_ufix();
    if idx >= len {
        return Err(Error::raised(args[0], "Index out of bounds"));
    }
    let byte = unsafe { heap::bytes_slice(args[0]) }[idx as usize];
    rets[0] = Val::char(byte as u32);
    Ok(())
}

pub fn bytestring_set(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 3, retc, 1)?;
    let (bs, idx, value) = (args[0], args[1], args[2]);
    if !is_bytestring(vm, bs) {
        return Err(Error::raised(bs, "Not a bytestring"));
    }
    if !idx.is_fixnum() {
        return Err(Error::raised(idx, "Not a number"));
    }
    if !value.is_fixnum() {
        return Err(Error::raised(value, "Not a number"));
    }
    let len = heap::bytes_len(bs) as u64;
    let idx_v = idx.as_ufix();
    if idx_v >= len {
        return Err(Error::raised(bs, "Index out of bounds"));
    }
    // SAFETY: `idx_v < len`, just checked, and the byte array is owned data.
    unsafe {
        let ptr = (bs.as_addr() + heap::BYTES_DATA_OFFSET as u64) as *mut u8;
        *ptr.add(idx_v as usize) = value.as_ufix() as u8;
    }
    rets[0] = crate::val::VAL_NIL;
    Ok(())
}

pub fn bytestring_copy(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 5, retc, 1)?;
    let (dst, dst_start, src, src_start, len) = (args[0], args[1], args[2], args[3], args[4]);
    if !is_bytestring(vm, dst) {
        return Err(Error::runtime("Not a bytestring"));
    }
    if !dst_start.is_fixnum() {
        return Err(Error::runtime("Not a number"));
    }
    if !is_bytestring(vm, src) {
        return Err(Error::runtime("Not a bytestring"));
    }
    if !src_start.is_fixnum() {
        return Err(Error::runtime("Not a number"));
    }
    if !len.is_fixnum() {
        return Err(Error::runtime("Not a number"));
    }
    let dst_len = heap::bytes_len(dst) as u64;
    let src_len = heap::bytes_len(src) as u64;
    let dst_start_v = dst_start.as_ufix();
    let src_start_v = src_start.as_ufix();
    let len_v = len.as_ufix();
    if dst_start_v + len_v > dst_len {
        return Err(Error::raised(dst, "Destination region out of range"));
    }
    if src_start_v + len_v > src_len {
        return Err(Error::raised(src, "Source region out of range"));
    }
    // SAFETY: both regions were just bounds-checked above; `copy` (not
    // `copy_nonoverlapping`) since `dst` and `src` may be the same object.
    unsafe {
        let dst_ptr = (dst.as_addr() + heap::BYTES_DATA_OFFSET as u64) as *mut u8;
        let src_ptr = (src.as_addr() + heap::BYTES_DATA_OFFSET as u64) as *const u8;
        std::ptr::copy(src_ptr.add(src_start_v as usize), dst_ptr.add(dst_start_v as usize), len_v as usize);
    }
    rets[0] = crate::val::VAL_NIL;
    Ok(())
}

pub fn list_to_string(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    let list = args[0];
    if !is_list0(&vm.gc, &vm.types, list) {
        return Err(Error::raised(list, "Not a list"));
    }
    let mut bytes = Vec::new();
    let mut cur = list;
    while !cur.is_nil() {
        let c = heap::car(cur);
        if !c.is_char() {
            return Err(Error::runtime("Not a char"));
        }
        bytes.push(c.as_char() as u8);
        cur = heap::cdr(cur);
    }
    rets[0] = heap::alloc_string(&mut vm.gc, &vm.types, &bytes)?;
    Ok(())
}

pub fn substring(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_ret_arity(retc, 1)?;
    if argc < 2 || argc > 3 {
        return Err(Error::runtime("Bad arity"));
    }
    let str_v = args[0];
    let start = args[1];
    if !is_string(vm, str_v) {
        return Err(Error::raised(str_v, "Not a string"));
    }
    if !start.is_fixnum() {
        return Err(Error::raised(start, "Not a number"));
    }
    let len = heap::bytes_len(str_v) as u64;
    let start_v = start.as_ufix();
    if start_v > len {
        return Err(Error::raised(str_v, "Start index out of range"));
    }
    let len_v = if argc == 3 {
        let end = args[2];
        if !end.is_fixnum() {
            return Err(Error::raised(end, "Not a number"));
        }
        let end_v = end.as_ufix();
        if end_v > len - start_v {
            return Err(Error::raised(str_v, "End out of range"));
        }
        end_v
    } else {
        len - start_v
    };
    let slice = unsafe { heap::bytes_slice(str_v) }[start_v as usize..(start_v + len_v) as usize].to_vec();
    rets[0] = heap::alloc_string(&mut vm.gc, &vm.types, &slice)?;
    Ok(())
}

pub fn string_eq(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 2, retc, 1)?;
    let (lhs, rhs) = (args[0], args[1]);
    if !is_string(vm, lhs) || !is_string(vm, rhs) {
        return Err(Error::raised(lhs, "Not a string"));
    }
    let a = unsafe { heap::bytes_slice(lhs) };
    let b = unsafe { heap::bytes_slice(rhs) };
    rets[0] = Val::boolean(a == b);
    Ok(())
}

pub fn string_prefix(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 2, retc, 1)?;
    let (s, p) = (args[0], args[1]);
    if !is_string(vm, s) || !is_string(vm, p) {
        return Err(Error::raised(s, "Not a string"));
    }
    let sb = unsafe { heap::bytes_slice(s) };
    let pb = unsafe { heap::bytes_slice(p) };
    rets[0] = Val::boolean(sb.len() >= pb.len() && &sb[..pb.len()] == pb);
    Ok(())
}

pub fn char_whitespace(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    let _ = vm;
    check_arity(argc, 1, retc, 1)?;
    if !args[0].is_char() {
        return Err(Error::runtime("Not a char"));
    }
    let is_ws = char::from_u32(args[0].as_char()).is_some_and(|c| c.is_whitespace());
    rets[0] = Val::boolean(is_ws);
    Ok(())
}

pub fn string_to_number(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    let str_v = args[0];
    if !is_string(vm, str_v) {
        return Err(Error::runtime("Not a string"));
    }
    let bytes = unsafe { heap::bytes_slice(str_v) };
    if bytes.is_empty() {
        return Err(Error::runtime("Empty string"));
    }
    let mut idx = 0usize;
    let sign: i64 = match bytes[0] {
        b'-' => {
            idx += 1;
            -1
        }
        b'+' => {
            idx += 1;
            1
        }
        _ => 1,
    };
    let mut has_digits = false;
    let mut abs_val: u64 = 0;
    for &b in &bytes[idx..] {
        if b == b'_' {
            continue;
        }
        if !b.is_ascii_digit() {
            return Err(Error::runtime("Invalid character for number"));
        }
        has_digits = true;
        let new_val = abs_val.wrapping_mul(10).wrapping_add((b - b'0') as u64);
        if new_val < abs_val {
            return Err(Error::runtime("Integer literal too large"));
        }
        abs_val = new_val;
    }
    if !has_digits {
        return Err(Error::runtime("No digits"));
    }
    if abs_val >> 63 == 1 {
        return Err(Error::runtime("Integer literal too large"));
    }
    rets[0] = Val::fixnum(sign * abs_val as i64);
    Ok(())
}

pub fn string_to_bytestring(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !is_string(vm, args[0]) {
        return Err(Error::runtime("Not a string"));
    }
    let bytes = unsafe { heap::bytes_slice(args[0]) }.to_vec();
    rets[0] = heap::alloc_bytes(&mut vm.gc, &vm.types, &bytes)?;
    Ok(())
}

pub fn symbol_to_bytestring(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !args[0].is_gc_ptr() || vm.gc.type_of(args[0]) != vm.types.symbol {
        return Err(Error::runtime("Not a symbol"));
    }
    let name = crate::symtab::SymbolTable::name(args[0]);
    let bytes = unsafe { heap::bytes_slice(name) }.to_vec();
    rets[0] = heap::alloc_bytes(&mut vm.gc, &vm.types, &bytes)?;
    Ok(())
}

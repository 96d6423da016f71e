//! `open-file`/`write-file` (spec.md §7 "Host" errors; grounded on
//! primitives_impl.c lines 762-844).

use std::fs;

use crate::error::{Error, GlsResult};
use crate::heap;
use crate::val::Val;
use crate::vm::Vm;

use super::check_arity;

fn path_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Reads the whole file into a boxed list of chars, one per byte, matching
/// the reference's byte-at-a-time `cons` loop rather than building a string
/// (the result is mutated in place with further `cons`es by callers, which a
/// `string` could not support).
pub fn open_file(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !args[0].is_gc_ptr() || vm.gc.type_of(args[0]) != vm.types.string {
        return Err(Error::runtime("Not a string"));
    }
    let path = path_string(unsafe { heap::bytes_slice(args[0]) });
    let contents = fs::read(&path).map_err(|_| Error::host("Could not open file"))?;
    let mut list = crate::val::VAL_NIL;
    for &b in contents.iter().rev() {
        list = heap::cons(&mut vm.gc, &vm.types, Val::char(b as u32), list)?;
    }
    let b = vm.gc.alloc(vm.types.box_cell)?;
    heap::set_field_val(&mut vm.gc, b, heap::BOX_VALUE_OFFSET, list);
    rets[0] = b;
    Ok(())
}

pub fn write_file(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 2, retc, 1)?;
    let (name, bytes_v) = (args[0], args[1]);
    if !name.is_gc_ptr() || vm.gc.type_of(name) != vm.types.string {
        return Err(Error::raised(bytes_v, "Not a string"));
    }
    if !bytes_v.is_gc_ptr() || vm.gc.type_of(bytes_v) != vm.types.bytes {
        return Err(Error::raised(bytes_v, "Not a bytestring"));
    }
    let path = path_string(unsafe { heap::bytes_slice(name) });
    let data = unsafe { heap::bytes_slice(bytes_v) };
    fs::write(&path, data).map_err(|_| Error::host("Error writing to file"))?;
    rets[0] = crate::val::VAL_NIL;
    Ok(())
}

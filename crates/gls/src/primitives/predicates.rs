//! Type predicates (grounded on primitives_impl.c lines 165-220).

use crate::error::GlsResult;
use crate::val::Val;
use crate::vm::Vm;

use super::{check_arity, is_list0};

pub fn is_eq(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 2, retc, 1)?;
    rets[0] = Val::boolean(args[0] == args[1]);
    Ok(())
}

pub fn is_list(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    rets[0] = Val::boolean(is_list0(&vm.gc, &vm.types, args[0]));
    Ok(())
}

pub fn is_string(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    rets[0] = Val::boolean(args[0].is_gc_ptr() && vm.gc.type_of(args[0]) == vm.types.string);
    Ok(())
}

pub fn is_bytestring(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    rets[0] = Val::boolean(args[0].is_gc_ptr() && vm.gc.type_of(args[0]) == vm.types.bytes);
    Ok(())
}

pub fn is_symbol(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    rets[0] = Val::boolean(args[0].is_gc_ptr() && vm.gc.type_of(args[0]) == vm.types.symbol);
    Ok(())
}

pub fn is_number(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    let _ = vm;
    check_arity(argc, 1, retc, 1)?;
    rets[0] = Val::boolean(args[0].is_fixnum());
    Ok(())
}

pub fn is_char(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    let _ = vm;
    check_arity(argc, 1, retc, 1)?;
    rets[0] = Val::boolean(args[0].is_char());
    Ok(())
}

//! Symbol inspection and interning (grounded on primitives_impl.c lines
//! 49-82, 696-758, 934-949).

use crate::error::{Error, GlsResult};
use crate::heap;
use crate::symtab::SymbolTable;
use crate::val::Val;
use crate::vm::{set_interp_name_if_unset, Vm};

use super::check_arity;

fn is_symbol(vm: &Vm, v: Val) -> bool {
    v.is_gc_ptr() && vm.gc.type_of(v) == vm.types.symbol
}

fn is_string(vm: &Vm, v: Val) -> bool {
    v.is_gc_ptr() && vm.gc.type_of(v) == vm.types.string
}

pub fn symbol_set_value(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 2, retc, 1)?;
    if !is_symbol(vm, args[0]) {
        return Err(Error::raised(args[0], "Not a symbol"));
    }
    SymbolTable::set_value(&mut vm.gc, args[0], args[1]);
    set_interp_name_if_unset(&mut vm.gc, &vm.types, args[1], args[0]);
    rets[0] = args[0];
    Ok(())
}

pub fn symbol_set_macro(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 2, retc, 1)?;
    if !is_symbol(vm, args[0]) {
        return Err(Error::raised(args[0], "Not a symbol"));
    }
    SymbolTable::set_macro(args[0], args[1].is_truthy());
    rets[0] = args[0];
    Ok(())
}

pub fn symbol_macro_value(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !is_symbol(vm, args[0]) {
        return Err(Error::raised(args[0], "Not a symbol"));
    }
    rets[0] = if SymbolTable::is_macro(args[0]) { SymbolTable::value(args[0]) } else { crate::val::VAL_NIL };
    Ok(())
}

pub fn intern(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !is_string(vm, args[0]) {
        return Err(Error::runtime("Not a string"));
    }
    let bytes = unsafe { heap::bytes_slice(args[0]) }.to_vec();
    rets[0] = vm.symtab.intern(&mut vm.gc, &vm.types, &bytes)?;
    Ok(())
}

/// An uninterned symbol, never found again by [`intern`] (grounded on
/// `gs_gc_alloc(SYMBOL_TYPE, ...)` in the reference rather than
/// `gs_intern`). The name gains a numeric suffix for readability in traces —
/// a deliberate departure from the reference, which uses the hint verbatim
/// (see DESIGN.md).
pub fn gensym(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !is_string(vm, args[0]) {
        return Err(Error::runtime("Not a string"));
    }
    let hint = unsafe { heap::bytes_slice(args[0]) }.to_vec();
    let counter = vm.gensym_counter;
    vm.gensym_counter += 1;
    rets[0] = vm.symtab.gensym(&mut vm.gc, &vm.types, &hint, counter)?;
    Ok(())
}

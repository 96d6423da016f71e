//! `raise`, `apply`, `program-args`, `call-in-new-scope`, `eval`,
//! `index-image`, `new-image-closure` (grounded on primitives_impl.c lines
//! 39-46, 145-163, 222-256, 867-932).

use crate::error::{Error, GlsResult};
use crate::gc::RootEntry;
use crate::heap;
use crate::val::{Val, VAL_NIL};
use crate::vm::{call, is_callable, make_interpreted, Vm};

use super::{check_arg_arity, check_arity, is_list0};

pub fn raise(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    let _ = (vm, retc, rets);
    check_arg_arity(argc, 1)?;
    Err(Error::raised(args[0], "raised"))
}

/// `apply(f, a, b, ..., rest-list)`: calls `f` with the leading fixed
/// arguments followed by every element of `rest-list`.
pub fn apply(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    if argc < 2 {
        return Err(Error::runtime("Not enough arguments"));
    }
    let callee = args[0];
    if !is_callable(&vm.gc, &vm.types, callee) {
        return Err(Error::raised(callee, "Not a function"));
    }
    let arglist = args[argc as usize - 1];
    if !is_list0(&vm.gc, &vm.types, arglist) {
        return Err(Error::raised(arglist, "Not a list"));
    }
    let mut full_args: Vec<Val> = args[1..argc as usize - 1].to_vec();
    let mut cur = arglist;
    while !cur.is_nil() {
        full_args.push(heap::car(cur));
        cur = heap::cdr(cur);
    }
    if full_args.len() > u8::MAX as usize {
        return Err(Error::runtime("Integer overflow"));
    }
    call(vm, callee, full_args.len() as u8, &full_args, retc, rets)
}

pub fn program_args(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    let _ = args;
    check_arity(argc, 0, retc, 1)?;
    let mut list = VAL_NIL;
    for &arg in vm.program_args.clone().iter().rev() {
        list = heap::cons(&mut vm.gc, &vm.types, arg, list)?;
    }
    rets[0] = list;
    Ok(())
}

/// Pushes a fresh scope, calls the closure inside it, and pops the scope on
/// every path — roots the call's outputs (or the raised fault) across the
/// `popScope` so the collector can evacuate them before the scope's
/// generation goes away (spec.md §8 "Scope escape").
pub fn call_in_new_scope(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    if argc < 1 {
        return Err(Error::runtime("Not enough arguments"));
    }
    let callee = args[0];
    if !is_callable(&vm.gc, &vm.types, callee) {
        return Err(Error::runtime("Not a function"));
    }
    vm.gc.push_scope()?;
    let inner_argc = argc - 1;
    let inner_args = &args[1..];
    let mut inner_rets = vec![VAL_NIL; retc as usize];
    match call(vm, callee, inner_argc, inner_args, retc, &mut inner_rets) {
        Ok(()) => {
            let mark = vm.gc.root_mark();
            vm.gc.push_root(RootEntry::Direct { ptr: inner_rets.as_mut_ptr(), len: inner_rets.len() });
            vm.gc.pop_scope()?;
            vm.gc.pop_root_to(mark);
            rets[..retc as usize].copy_from_slice(&inner_rets);
            Ok(())
        }
        Err(mut e) => {
            let mut fault_slot = [e.fault.unwrap_or(VAL_NIL)];
            let mark = vm.gc.root_mark();
            vm.gc.push_root(RootEntry::Direct { ptr: fault_slot.as_mut_ptr(), len: 1 });
            vm.gc.pop_scope()?;
            vm.gc.pop_root_to(mark);
            if e.fault.is_some() {
                e.fault = Some(fault_slot[0]);
            }
            e.push_frame("call-in-new-scope", "", 0, "call-in-new-scope");
            Err(e)
        }
    }
}

/// Delegates to whatever is bound to the symbol `eval-0`: this runtime does
/// not implement `eval` itself, only the hook a self-hosted evaluator binds
/// into (spec.md §6's primitive list; grounded on the reference's identical
/// indirection through a fixed symbol name).
pub fn eval(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    let sym = vm.symtab.intern(&mut vm.gc, &vm.types, b"eval-0")?;
    call(vm, sym, argc, args, retc, rets)
}

/// Loads bytecode at runtime and returns a host-side handle: a fixnum index
/// into [`Vm::images`], since an `Image` here is entirely host-owned data
/// (see DESIGN.md) rather than a GC object as in the reference.
pub fn index_image(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    let bytes_v = args[0];
    if !bytes_v.is_gc_ptr() || vm.gc.type_of(bytes_v) != vm.types.bytes {
        return Err(Error::raised(bytes_v, "Not a bytestring"));
    }
    let bytes = unsafe { heap::bytes_slice(bytes_v) }.to_vec();
    let index = vm.load_image(&bytes)?;
    rets[0] = Val::fixnum(index as i64);
    Ok(())
}

pub fn new_image_closure(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    if retc != 1 {
        return Err(Error::runtime("Bad arity"));
    }
    if argc < 2 {
        return Err(Error::runtime("Not enough arguments"));
    }
    let img_v = args[0];
    let idx_v = args[1];
    if !img_v.is_fixnum() {
        return Err(Error::raised(img_v, "Not an image"));
    }
    if !idx_v.is_fixnum() {
        return Err(Error::raised(idx_v, "Not a number"));
    }
    let image_index = img_v.as_ufix() as usize;
    let code_index = idx_v.as_ufix() as u32;
    let codes_len = vm.images.get(image_index).map(|i| i.codes.len()).ok_or_else(|| Error::raised(img_v, "Not an image"))?;
    if code_index as usize >= codes_len {
        return Err(Error::raised(img_v, "Code out of range"));
    }
    let captured = &args[2..];
    let c = make_interpreted(&mut vm.gc, &vm.types, image_index as u32, code_index, captured)?;
    rets[0] = c;
    Ok(())
}

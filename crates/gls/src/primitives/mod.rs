//! Host-provided primitive procedures (spec.md §6), grounded on
//! `original_source/src/rt/c/bytecode/primitives_impl.c`.
//!
//! Each primitive is an ordinary [`crate::vm::NativeFn`]; [`install`] wires
//! every one of them to its interned symbol so bytecode that `SYM_DEREF`s
//! e.g. `cons` sees the native closure without needing an image binding.

mod boxes;
mod control;
mod diag;
mod fixnum;
mod io;
mod pairs;
mod predicates;
mod strings;
mod symbols;

use crate::error::{Error, GlsResult};
use crate::gc::Gc;
use crate::heap::CoreTypes;
use crate::val::Val;
use crate::vm::Vm;

/// `GS_CHECK_ARG_ARITY`: exact argument count, any return count.
pub(crate) fn check_arg_arity(argc: u8, expected: u8) -> GlsResult<()> {
    if argc != expected {
        return Err(Error::runtime("Bad arity"));
    }
    Ok(())
}

/// `GS_CHECK_RET_ARITY`: exact return count, any argument count.
pub(crate) fn check_ret_arity(retc: u8, expected: u8) -> GlsResult<()> {
    if retc != expected {
        return Err(Error::runtime("Bad arity"));
    }
    Ok(())
}

/// `GS_CHECK_ARITY`: exact argument and return counts.
pub(crate) fn check_arity(argc: u8, argc_expected: u8, retc: u8, retc_expected: u8) -> GlsResult<()> {
    check_arg_arity(argc, argc_expected)?;
    check_ret_arity(retc, retc_expected)?;
    Ok(())
}

/// True for `nil` and any chain of pairs terminating in `nil`. `cons`
/// enforces this on its second argument, matching the reference
/// implementation — this language's pairs are only ever used to build
/// proper lists.
pub(crate) fn is_list0(gc: &Gc, types: &CoreTypes, v: Val) -> bool {
    let mut cur = v;
    loop {
        if cur.is_nil() {
            return true;
        }
        if !cur.is_gc_ptr() || gc.type_of(cur) != types.pair {
            return false;
        }
        cur = crate::heap::cdr(cur);
    }
}

/// Registers every primitive on `vm` and binds each to its interned symbol.
pub fn install(vm: &mut Vm) -> GlsResult<()> {
    macro_rules! prim {
        ($name:expr, $f:expr) => {{
            let index = vm.register_primitive($name, $f);
            let closure = crate::vm::make_native(&mut vm.gc, &vm.types, index)?;
            let sym = vm.symtab.intern(&mut vm.gc, &vm.types, $name.as_bytes())?;
            crate::symtab::SymbolTable::set_value(&mut vm.gc, sym, closure);
        }};
    }

    prim!("cons", pairs::cons);
    prim!("car", pairs::car);
    prim!("cdr", pairs::cdr);

    prim!("box", boxes::make_box);
    prim!("unbox", boxes::unbox);
    prim!("box-set!", boxes::box_set);

    prim!("eq?", predicates::is_eq);
    prim!("list?", predicates::is_list);
    prim!("string?", predicates::is_string);
    prim!("bytestring?", predicates::is_bytestring);
    prim!("symbol?", predicates::is_symbol);
    prim!("number?", predicates::is_number);
    prim!("char?", predicates::is_char);

    prim!("+", fixnum::add);
    prim!("-", fixnum::sub);
    prim!("*", fixnum::mul);
    prim!("bitwise-and", fixnum::bitand);
    prim!("bitwise-ior", fixnum::bitor);
    prim!("bitwise-xor", fixnum::bitxor);
    prim!("arithmetic-shift", fixnum::shift);
    prim!("remainder", fixnum::remainder);
    prim!("modulo", fixnum::modulo);
    prim!("<", fixnum::lt);
    prim!("<=", fixnum::le);
    prim!(">", fixnum::gt);
    prim!(">=", fixnum::ge);
    prim!("=", fixnum::num_eq);
    prim!("char->integer", fixnum::char_to_integer);

    prim!("new-bytestring", strings::new_bytestring);
    prim!("bytestring-length", strings::bytestring_length);
    prim!("bytestring-ref", strings::bytestring_ref);
    prim!("bytestring-set!", strings::bytestring_set);
    prim!("bytestring-copy!", strings::bytestring_copy);
    prim!("string-length", strings::string_length);
    prim!("string-ref", strings::string_ref);
    prim!("list->string", strings::list_to_string);
    prim!("substring", strings::substring);
    prim!("string=?", strings::string_eq);
    prim!("string-prefix?", strings::string_prefix);
    prim!("char-whitespace?", strings::char_whitespace);
    prim!("string->number", strings::string_to_number);
    prim!("string->bytestring", strings::string_to_bytestring);
    prim!("symbol->bytestring", strings::symbol_to_bytestring);

    prim!("symbol-set-value!", symbols::symbol_set_value);
    prim!("symbol-set-macro!", symbols::symbol_set_macro);
    prim!("symbol-macro-value", symbols::symbol_macro_value);
    prim!("intern", symbols::intern);
    prim!("gensym", symbols::gensym);

    prim!("open-file", io::open_file);
    prim!("write-file", io::write_file);

    prim!("raise", control::raise);
    prim!("apply", control::apply);
    prim!("program-args", control::program_args);
    prim!("call-in-new-scope", control::call_in_new_scope);
    prim!("eval", control::eval);
    prim!("index-image", control::index_image);
    prim!("new-image-closure", control::new_image_closure);

    prim!("dbg", diag::dbg);
    prim!("dbg-suspend", diag::dbg_suspend);
    prim!("dbg-dump-gc", diag::dbg_dump_gc);
    prim!("dbg-dump-obj", diag::dbg_dump_obj);

    Ok(())
}

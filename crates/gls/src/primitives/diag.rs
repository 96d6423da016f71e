//! `dbg`, `dbg-suspend`, `dbg-dump-gc`, `dbg-dump-obj` (grounded on
//! primitives_impl.c lines 655-675, 846-866). The reference writes straight
//! to stderr; this port routes through `log` so verbosity is controlled the
//! same way as the rest of the runtime (spec.md's logging section).

use crate::error::{Error, GlsResult};
use crate::val::Val;
use crate::vm::Vm;

use super::check_arity;

fn describe(vm: &Vm, v: Val) -> String {
    if v.is_fixnum() {
        return v.as_sfix().to_string();
    }
    if v.is_char() {
        return format!("#\\{}", char::from_u32(v.as_char()).unwrap_or('?'));
    }
    if v.is_nil() {
        return "()".to_string();
    }
    if v.is_true() {
        return "#t".to_string();
    }
    if v.is_false() {
        return "#f".to_string();
    }
    if v.is_eof() {
        return "#<eof>".to_string();
    }
    if v.is_gc_ptr() {
        let ty = vm.gc.type_of(v);
        return format!("#<object type={ty}>");
    }
    format!("#<static {:#x}>", v.as_addr())
}

pub fn dbg(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    log::debug!("{}", describe(vm, args[0]));
    rets[0] = args[0];
    Ok(())
}

pub fn dbg_suspend(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    if retc != 1 {
        return Err(Error::runtime("Bad arity"));
    }
    if log::log_enabled!(log::Level::Debug) {
        let parts: Vec<String> = args[..argc as usize].iter().map(|&a| describe(vm, a)).collect();
        log::debug!("Breakpoint hit: args {}", parts.join(" "));
    }
    rets[0] = crate::val::VAL_NIL;
    Ok(())
}

pub fn dbg_dump_gc(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    let _ = args;
    check_arity(argc, 0, retc, 1)?;
    log::info!("{}", vm.gc.dump());
    rets[0] = crate::val::VAL_NIL;
    Ok(())
}

pub fn dbg_dump_obj(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    check_arity(argc, 1, retc, 1)?;
    if !args[0].is_gc_ptr() {
        return Err(Error::raised(args[0], "Not a GC object"));
    }
    log::info!("{}", describe(vm, args[0]));
    rets[0] = crate::val::VAL_NIL;
    Ok(())
}

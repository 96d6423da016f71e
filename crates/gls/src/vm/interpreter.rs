//! Bytecode dispatch loop (spec.md §4.3 "Interpretation"), grounded on
//! `original_source/src/rt/c/bytecode/interp.c`'s `gs_interp`.

use crate::error::{Error, GlsResult};
use crate::heap;
use crate::image::{self, format};
use crate::symtab::SymbolTable;
use crate::val::Val;

use super::closure;
use super::Vm;

/// `call(closure, args, retCount) -> outputs` (spec.md §4.3 "Public
/// contract"). Dispatches on the callee's GC type: native closures run their
/// host function directly; interpreted closures enter the bytecode loop;
/// symbols dereference their bound value and recurse (spec.md §3 "Symbol
/// table").
pub fn call(vm: &mut Vm, callee: Val, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    if !closure::is_callable(&vm.gc, &vm.types, callee) {
        return Err(Error::runtime("Not a function"));
    }
    let ty = vm.gc.type_of(callee);
    if ty == vm.types.native_closure {
        let index = closure::native_index(callee);
        let f = *vm
            .primitives
            .get(index as usize)
            .ok_or_else(|| Error::runtime("unknown primitive index"))?;
        f(vm, argc, args, retc, rets).map_err(|mut e| {
            if let Some(frame) = e.frames.first_mut() {
                if frame.function_name.is_empty() {
                    frame.function_name = vm.primitive_names[index as usize].to_string();
                }
            }
            e
        })
    } else if ty == vm.types.interpreted_closure {
        call_interpreted(vm, callee, argc, args, retc, rets)
    } else {
        if SymbolTable::is_undefined(callee) {
            let mut e = Error::runtime("Called an undefined symbol");
            if let Some(frame) = e.frames.first_mut() {
                frame.function_name = symbol_display_name(callee);
            }
            return Err(e);
        }
        let bound = SymbolTable::value(callee);
        call(vm, bound, argc, args, retc, rets)
    }
}

fn symbol_display_name(name: Val) -> String {
    if name.is_nil() {
        return "{unknown}".to_string();
    }
    let name_bytes = heap::field_val(name, heap::SYMBOL_NAME_OFFSET);
    // SAFETY: symbol names are heap-allocated once at intern time and never
    // resized or freed while the symbol is reachable.
    let bytes = unsafe { heap::bytes_slice(name_bytes) };
    String::from_utf8_lossy(bytes).into_owned()
}

fn call_interpreted(vm: &mut Vm, closure_val: Val, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    let name = closure::interp_name(closure_val);
    vm.shadow.push(name)?;
    let result = run_body(vm, closure_val, argc, args, retc, rets);
    vm.shadow.pop();
    if let Err(mut e) = result {
        e.push_frame(symbol_display_name(name), "<image>", 0, "lambda body");
        return Err(e);
    }
    Ok(())
}

/// SAFETY: `buffer` is a non-moving large GC object (spec.md §3 "Large
/// object"), so the byte range it returns stays valid for as long as the
/// image itself is reachable, unlike a mini-page-allocated object.
fn code_slice(buffer: Val, offset: u32, len: u32) -> &'static [u8] {
    let all = unsafe { heap::bytes_slice(buffer) };
    &all[offset as usize..offset as usize + len as usize]
}

fn run_body(vm: &mut Vm, closure_val: Val, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()> {
    let image_index = closure::interp_image_index(closure_val) as usize;
    let code_index = closure::interp_code_index(closure_val) as usize;

    image::bake(&mut vm.gc, &vm.types, &mut vm.symtab, &mut vm.images[image_index])?;

    let (buffer, code_offset, code_len, max_stack, locals) = {
        let img = &vm.images[image_index];
        let code = img
            .codes
            .get(code_index)
            .ok_or_else(|| Error::runtime("code index out of range"))?;
        (img.buffer, code.code_offset, code.code_len, code.max_stack, code.locals)
    };

    let code = code_slice(buffer, code_offset, code_len);
    let mut stack: Vec<Val> = Vec::with_capacity(max_stack as usize);
    let mut locs: Vec<Val> = vec![crate::val::VAL_NIL; locals as usize];
    let mut ip: usize = 0;

    loop {
        let op = code[ip];
        ip += 1;
        match op {
            format::OP_NOP => {}
            format::OP_DROP => {
                stack.pop();
            }
            format::OP_BR => {
                let off = format::read_i32_unchecked(code, ip);
                ip += 4;
                ip = (ip as i64 + off as i64) as usize;
            }
            format::OP_BR_IF_NOT => {
                let off = format::read_i32_unchecked(code, ip);
                ip += 4;
                let v = stack.pop().expect("verified: stack non-empty");
                if !v.is_truthy() {
                    ip = (ip as i64 + off as i64) as usize;
                }
            }
            format::OP_RET => {
                let n = code[ip] as usize;
                ip += 1;
                if n > retc as usize {
                    return Err(Error::runtime("Returning too many values"));
                }
                let start = stack.len() - n;
                rets[..n].copy_from_slice(&stack[start..]);
                return Ok(());
            }
            format::OP_LDC => {
                let idx = format::read_u32_unchecked(code, ip) as usize;
                ip += 4;
                stack.push(vm.images[image_index].constants_baked[idx]);
            }
            format::OP_SYM_DEREF => {
                let v = stack.pop().expect("verified: stack non-empty");
                if !v.is_gc_ptr() || vm.gc.type_of(v) != vm.types.symbol {
                    return Err(Error::raised(v, "Not a symbol"));
                }
                stack.push(SymbolTable::value(v));
            }
            format::OP_LAMBDA => {
                let target_code = format::read_u32_unchecked(code, ip);
                ip += 4;
                let arity = format::read_u16_unchecked(code, ip) as usize;
                ip += 2;
                let start = stack.len() - arity;
                let captured: Vec<Val> = stack[start..].to_vec();
                stack.truncate(start);
                let c = closure::make_interpreted(&mut vm.gc, &vm.types, image_index as u32, target_code, &captured)?;
                stack.push(c);
            }
            format::OP_CALL => {
                let call_argc = code[ip];
                ip += 1;
                let call_retc = code[ip];
                ip += 1;
                let start = stack.len() - call_argc as usize - 1;
                let callee = stack[start + call_argc as usize];
                let call_args: Vec<Val> = stack[start..start + call_argc as usize].to_vec();
                stack.truncate(start);
                let mut call_rets = vec![crate::val::VAL_NIL; call_retc as usize];
                call(vm, callee, call_argc, &call_args, call_retc, &mut call_rets)?;
                stack.extend(call_rets);
            }
            format::OP_LOCAL_REF => {
                let idx = code[ip] as usize;
                ip += 1;
                stack.push(locs[idx]);
            }
            format::OP_LOCAL_SET => {
                let idx = code[ip] as usize;
                ip += 1;
                locs[idx] = stack.pop().expect("verified: stack non-empty");
            }
            format::OP_ARG_REF => {
                let idx = code[ip] as usize;
                ip += 1;
                if idx >= argc as usize {
                    return Err(Error::runtime("Argument out of range"));
                }
                stack.push(args[idx]);
            }
            format::OP_RESTARG_REF => {
                let idx = code[ip] as usize;
                ip += 1;
                if idx > argc as usize {
                    return Err(Error::runtime("Rest argument out of range"));
                }
                let mut list = crate::val::VAL_NIL;
                for i in (idx..argc as usize).rev() {
                    list = heap::cons(&mut vm.gc, &vm.types, args[i], list)?;
                }
                stack.push(list);
            }
            format::OP_THIS_REF => stack.push(closure_val),
            format::OP_CLOSURE_REF => {
                let idx = code[ip] as u32;
                ip += 1;
                if idx >= closure::interp_captured_len(closure_val) {
                    return Err(Error::runtime("Captured value out of bounds"));
                }
                stack.push(closure::interp_captured(closure_val, idx));
            }
            other => return Err(Error::runtime(format!("Unrecognised opcode {other:#04x}"))),
        }
    }
}

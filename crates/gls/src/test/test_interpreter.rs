//! Interpreter scenarios (spec.md §8 "Interpreter").

use crate::gc::GcConfig;
use crate::image::format::*;
use crate::val::Val;
use crate::vm::{call, make_interpreted};

use super::fixtures::ImageBuilder;

#[test]
fn ldc_then_ret_returns_the_constant() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();

    let mut b = ImageBuilder::new();
    b.const_fixnum(42);
    let mut code = vec![OP_LDC];
    code.extend_from_slice(&0u32.to_le_bytes());
    code.push(OP_RET);
    code.push(1);
    b.code(1, 0, &code, &[]);

    let image_index = vm.load_image(&b.build()).unwrap();
    let closure = make_interpreted(&mut vm.gc, &vm.types, image_index, 0, &[]).unwrap();

    let mut rets = [Val::fixnum(0)];
    call(&mut vm, closure, 0, &[], 1, &mut rets).unwrap();
    assert_eq!(rets[0].as_sfix(), 42);
}

#[test]
fn applying_the_identity_lambda_through_a_spread_list_returns_its_argument() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();

    let mut b = ImageBuilder::new();
    b.code(1, 0, &[OP_ARG_REF, 0, OP_RET, 1], &[]);

    let image_index = vm.load_image(&b.build()).unwrap();
    let id = make_interpreted(&mut vm.gc, &vm.types, image_index, 0, &[]).unwrap();

    let seven = crate::heap::cons(&mut vm.gc, &vm.types, Val::fixnum(7), crate::val::VAL_NIL).unwrap();
    let apply = vm.symtab.intern(&mut vm.gc, &vm.types, b"apply").unwrap();
    let apply_fn = crate::symtab::SymbolTable::value(apply);

    let mut rets = [Val::fixnum(0)];
    call(&mut vm, apply_fn, 2, &[id, seven], 1, &mut rets).unwrap();
    assert_eq!(rets[0].as_sfix(), 7);
}

#[test]
fn call_in_new_scope_survives_the_scope_it_ran_in() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();

    // `(lambda () (cons 55 66))`, exercised through a symbol lookup so the
    // generated pair is only reachable via the call-in-new-scope return slot
    // once its scope pops.
    let mut b = ImageBuilder::new();
    b.const_fixnum(55);
    b.const_fixnum(66);
    b.const_symbol(b"cons");
    let mut code = Vec::new();
    code.push(OP_LDC);
    code.extend_from_slice(&0u32.to_le_bytes());
    code.push(OP_LDC);
    code.extend_from_slice(&1u32.to_le_bytes());
    code.push(OP_LDC);
    code.extend_from_slice(&2u32.to_le_bytes());
    code.push(OP_SYM_DEREF);
    code.push(OP_CALL);
    code.push(2);
    code.push(1);
    code.push(OP_RET);
    code.push(1);
    b.code(3, 0, &code, &[]);

    let image_index = vm.load_image(&b.build()).unwrap();
    let make_pair = make_interpreted(&mut vm.gc, &vm.types, image_index, 0, &[]).unwrap();

    let call_in_new_scope = vm.symtab.intern(&mut vm.gc, &vm.types, b"call-in-new-scope").unwrap();
    let call_in_new_scope_fn = crate::symtab::SymbolTable::value(call_in_new_scope);

    let mut rets = [Val::fixnum(0)];
    call(&mut vm, call_in_new_scope_fn, 1, &[make_pair], 1, &mut rets).unwrap();

    let pair = rets[0];
    assert!(pair.is_gc_ptr());
    assert_eq!(crate::heap::car(pair).as_sfix(), 55);
    assert_eq!(crate::heap::cdr(pair).as_sfix(), 66);
}

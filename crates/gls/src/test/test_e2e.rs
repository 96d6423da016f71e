//! End-to-end scenarios (spec.md §8 "End-to-end"), each one built as a
//! hand-assembled image run through a real [`crate::vm::Vm`].

use crate::gc::GcConfig;
use crate::image::format::*;
use crate::val::Val;
use crate::vm::{call, make_interpreted};

use super::fixtures::{empty_start_image, ImageBuilder};

#[test]
fn empty_start_image_runs_to_completion_with_no_output() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();
    let index = vm.load_image(&empty_start_image()).unwrap();
    vm.run_start(index).unwrap();
}

#[test]
fn one_plus_two_computes_three_through_the_plus_primitive() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();

    let mut b = ImageBuilder::new();
    b.const_fixnum(1);
    b.const_fixnum(2);
    b.const_symbol(b"+");
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
    b.start(0);

    let index = vm.load_image(&b.build()).unwrap();
    vm.apply_bindings(index).unwrap();
    let start_closure = make_interpreted(&mut vm.gc, &vm.types, index, 0, &[]).unwrap();
    let mut rets = [Val::fixnum(0)];
    call(&mut vm, start_closure, 0, &[], 1, &mut rets).unwrap();
    assert_eq!(rets[0].as_sfix(), 3);
}

#[test]
fn a_closure_sees_the_value_it_captured_at_creation() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();

    let mut b = ImageBuilder::new();
    b.const_fixnum(10);
    // body: CLOSURE_REF 0; RET 1 -- returns the single captured value.
    b.code(1, 0, &[OP_CLOSURE_REF, 0, OP_RET, 1], &[]);
    // outer: LDC 0 (push 10); LAMBDA target=1 arity=1 (pop 10, capture it); RET 1.
    let mut outer = Vec::new();
    outer.push(OP_LDC);
    outer.extend_from_slice(&0u32.to_le_bytes());
    outer.push(OP_LAMBDA);
    outer.extend_from_slice(&0u32.to_le_bytes());
    outer.extend_from_slice(&1u16.to_le_bytes());
    outer.push(OP_RET);
    outer.push(1);
    b.code(1, 0, &outer, &[]);

    let image_index = vm.load_image(&b.build()).unwrap();
    let outer_closure = make_interpreted(&mut vm.gc, &vm.types, image_index, 1, &[]).unwrap();

    let mut rets = [Val::fixnum(0)];
    call(&mut vm, outer_closure, 0, &[], 1, &mut rets).unwrap();
    let captured_closure = rets[0];

    let mut inner_rets = [Val::fixnum(0)];
    call(&mut vm, captured_closure, 0, &[], 1, &mut inner_rets).unwrap();
    assert_eq!(inner_rets[0].as_sfix(), 10);
}

#[test]
fn a_pair_built_inside_call_in_new_scope_survives_the_scope_popping() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();

    let mut b = ImageBuilder::new();
    b.const_fixnum(1);
    b.const_fixnum(2);
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
    assert_eq!(crate::heap::car(pair).as_sfix(), 1);
    assert_eq!(crate::heap::cdr(pair).as_sfix(), 2);
}

#[test]
fn taking_the_car_of_a_fixnum_raises_a_typed_fault_with_a_trace() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();

    let mut b = ImageBuilder::new();
    b.const_fixnum(5);
    b.const_symbol(b"car");
    let mut code = Vec::new();
    code.push(OP_LDC);
    code.extend_from_slice(&0u32.to_le_bytes());
    code.push(OP_LDC);
    code.extend_from_slice(&1u32.to_le_bytes());
    code.push(OP_SYM_DEREF);
    code.push(OP_CALL);
    code.push(1);
    code.push(1);
    code.push(OP_RET);
    code.push(1);
    b.code(2, 0, &code, &[]);

    let image_index = vm.load_image(&b.build()).unwrap();
    let body = make_interpreted(&mut vm.gc, &vm.types, image_index, 0, &[]).unwrap();

    let mut rets = [Val::fixnum(0)];
    let err = call(&mut vm, body, 0, &[], 1, &mut rets).unwrap_err();

    assert_eq!(err.fault.map(|f| f.as_sfix()), Some(5));
    assert!(!err.frames.is_empty());
    assert_eq!(format!("{err}"), "Not a pair");
}

#[test]
fn calling_an_undefined_symbol_is_a_runtime_error() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();
    let undefined = vm.symtab.intern(&mut vm.gc, &vm.types, b"no-such-function").unwrap();

    let mut rets: [Val; 0] = [];
    let err = call(&mut vm, undefined, 0, &[], 0, &mut rets).unwrap_err();
    assert_eq!(format!("{err}"), "Called an undefined symbol");
}

#[test]
fn an_undefined_symbol_called_through_a_binding_is_named_in_the_trace() {
    let mut vm = crate::new_vm(GcConfig::default()).unwrap();

    let mut b = ImageBuilder::new();
    let foo_sym = b.const_symbol(b"foo");
    let bar_sym = b.const_symbol(b"bar");
    let mut code = Vec::new();
    code.push(OP_LDC);
    code.extend_from_slice(&bar_sym.to_le_bytes());
    code.push(OP_SYM_DEREF);
    code.push(OP_CALL);
    code.push(0);
    code.push(0);
    code.push(OP_RET);
    code.push(0);
    let code_index = b.code(1, 0, &code, &[]);
    let lambda_const = b.const_lambda(code_index, &[]);
    b.binding(foo_sym, lambda_const);

    let index = vm.load_image(&b.build()).unwrap();
    vm.apply_bindings(index).unwrap();

    let foo = vm.symtab.intern(&mut vm.gc, &vm.types, b"foo").unwrap();
    let foo_fn = crate::symtab::SymbolTable::value(foo);

    let mut rets: [Val; 0] = [];
    let err = call(&mut vm, foo_fn, 0, &[], 0, &mut rets).unwrap_err();

    assert_eq!(format!("{err}"), "Called an undefined symbol");
    assert!(err.frames.iter().any(|f| f.function_name == "bar"), "frames: {:?}", err.frames);
}

//! Verifier accept/reject properties (spec.md §8 "Verifier").

use crate::gc::{Gc, GcConfig};
use crate::heap;
use crate::image::{self, format::*};

use super::fixtures::ImageBuilder;

fn index(bytes: &[u8]) -> crate::error::GlsResult<()> {
    let mut gc = Gc::init(GcConfig::default()).unwrap();
    let types = heap::install(&mut gc);
    image::index_image(&mut gc, &types, bytes).map(|_| ())
}

#[test]
fn drop_on_empty_stack_is_rejected() {
    let mut b = ImageBuilder::new();
    b.code(1, 0, &[OP_DROP], &[]);
    let err = index(&b.build()).unwrap_err();
    assert!(format!("{err}").contains("stack underflow"), "{err}");
}

#[test]
fn branch_target_missing_from_stack_map_is_rejected() {
    let mut b = ImageBuilder::new();
    // BR +0 (falls straight through to its own following byte) with no
    // stack-map entry recorded for the target offset.
    let mut code = vec![OP_BR];
    code.extend_from_slice(&0u32.to_le_bytes());
    b.code(0, 0, &code, &[]);
    let err = index(&b.build()).unwrap_err();
    assert!(format!("{err}").contains("branch target missing from stack map"), "{err}");
}

#[test]
fn falling_off_the_end_is_rejected() {
    let mut b = ImageBuilder::new();
    b.code(0, 0, &[OP_NOP], &[]);
    let err = index(&b.build()).unwrap_err();
    assert!(format!("{err}").contains("falls off the end"), "{err}");
}

#[test]
fn ldc_then_ret_is_accepted() {
    let mut b = ImageBuilder::new();
    b.const_fixnum(0);
    let mut code = vec![OP_LDC];
    code.extend_from_slice(&0u32.to_le_bytes());
    code.push(OP_RET);
    code.push(1);
    b.code(1, 0, &code, &[]);
    index(&b.build()).unwrap();
}

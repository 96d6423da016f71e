//! Image round-trip properties (spec.md §8 "Image round-trip").

use crate::gc::GcConfig;
use crate::vm::Vm;

use super::fixtures::{empty_start_image, ImageBuilder};

#[test]
fn well_formed_image_runs_start_to_completion() {
    let mut vm = Vm::new(GcConfig::default()).unwrap();
    let index = vm.load_image(&empty_start_image()).unwrap();
    vm.run_start(index).unwrap();
}

#[test]
fn corrupted_magic_is_rejected() {
    let mut vm = Vm::new(GcConfig::default()).unwrap();
    let mut bytes = empty_start_image();
    bytes[0] ^= 0xFF;
    let err = vm.load_image(&bytes).unwrap_err();
    assert!(format!("{err}").contains("missing magic header"), "{err}");
}

#[test]
fn self_referential_list_constant_is_rejected() {
    let mut b = ImageBuilder::new();
    let self_idx = b.next_const_index();
    b.const_list(&[self_idx]);
    let mut vm = Vm::new(GcConfig::default()).unwrap();
    let err = vm.load_image(&b.build()).unwrap_err();
    assert!(format!("{err}").contains("constant out of range"), "{err}");
}

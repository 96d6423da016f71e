//! The execution context: GC, symbol table, loaded images, and the native
//! primitive table, bundled the way spec.md §9 "Global mutable state"
//! recommends ("encapsulate these in a context object passed everywhere")
//! in place of the reference implementation's process-wide globals
//! (`gs_global_syms`, `gs_shadow_stack`, the default allocator).

mod closure;
mod frame;
mod interpreter;

pub use closure::{is_callable, make_interpreted, make_native, set_interp_name_if_unset};
pub use frame::{ShadowStack, STACK_MAX_DEPTH};
pub use interpreter::call;

use crate::error::GlsResult;
use crate::gc::{Gc, GcConfig};
use crate::heap::{self, CoreTypes};
use crate::image::Image;
use crate::symtab::SymbolTable;
use crate::val::Val;

/// Signature every host primitive is registered under (spec.md §4.3
/// "Calling conventions": caller-provided argument/return buffers, which may
/// overlap).
pub type NativeFn = fn(vm: &mut Vm, argc: u8, args: &[Val], retc: u8, rets: &mut [Val]) -> GlsResult<()>;

pub struct Vm {
    pub gc: Gc,
    pub types: CoreTypes,
    pub symtab: SymbolTable,
    pub images: Vec<Image>,
    pub primitives: Vec<NativeFn>,
    pub primitive_names: Vec<&'static str>,
    pub shadow: ShadowStack,
    pub program_args: Vec<Val>,
    pub gensym_counter: u64,
}

impl Vm {
    pub fn new(config: GcConfig) -> GlsResult<Vm> {
        let mut gc = Gc::init(config)?;
        let types = heap::install(&mut gc);
        Ok(Vm {
            gc,
            types,
            symtab: SymbolTable::new(),
            images: Vec::new(),
            primitives: Vec::new(),
            primitive_names: Vec::new(),
            shadow: ShadowStack::new(),
            program_args: Vec::new(),
            gensym_counter: 0,
        })
    }

    pub fn register_primitive(&mut self, name: &'static str, f: NativeFn) -> u32 {
        self.primitives.push(f);
        self.primitive_names.push(name);
        (self.primitives.len() - 1) as u32
    }

    /// Loads and indexes `bytes` into a new image, returning its index into
    /// [`Vm::images`].
    pub fn load_image(&mut self, bytes: &[u8]) -> GlsResult<u32> {
        let image = crate::image::index_image(&mut self.gc, &self.types, bytes)?;
        self.images.push(image);
        Ok((self.images.len() - 1) as u32)
    }

    /// Applies an image's bindings section: `symbol-set-value!` for each
    /// `(symbolConstIndex, bindingConstIndex)` pair (spec.md §4.2).
    pub fn apply_bindings(&mut self, image_index: u32) -> GlsResult<()> {
        crate::image::bake(&mut self.gc, &self.types, &mut self.symtab, &mut self.images[image_index as usize])?;
        let bindings = self.images[image_index as usize].bindings.clone();
        for binding in bindings {
            let image = &self.images[image_index as usize];
            let symbol = image.constants_baked[binding.symbol_const_index as usize];
            let value = image.constants_baked[binding.binding_const_index as usize];
            crate::symtab::SymbolTable::set_value(&mut self.gc, symbol, value);
            closure::set_interp_name_if_unset(&mut self.gc, &self.types, value, symbol);
        }
        Ok(())
    }

    /// Runs an image's start code block, if it has one, with zero arguments
    /// and zero expected returns.
    pub fn run_start(&mut self, image_index: u32) -> GlsResult<()> {
        self.apply_bindings(image_index)?;
        let start = self.images[image_index as usize].start;
        let Some(code_index) = start else { return Ok(()) };
        let closure = make_interpreted(&mut self.gc, &self.types, image_index, code_index, &[])?;
        call(self, closure, 0, &[], 0, &mut [])
    }
}

// gls runtime core
// Tagged-value bytecode image, scoped generational copying GC, and interpreter.

#[cfg(test)]
mod test;

pub mod error;
pub mod gc;
pub mod heap;
pub mod image;
pub mod primitives;
pub mod symtab;
pub mod val;
pub mod vm;

pub use error::{Error, ErrorKind, GlsResult};
pub use gc::GcConfig;
pub use image::Image;
pub use val::Val;
pub use vm::Vm;

/// Builds a [`Vm`], installs the native primitive table, and hands back a
/// context ready to load images into.
pub fn new_vm(config: GcConfig) -> GlsResult<Vm> {
    let mut vm = Vm::new(config)?;
    primitives::install(&mut vm)?;
    Ok(vm)
}

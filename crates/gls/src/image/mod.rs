//! Image loading, verification, and baking (spec.md §4.2).

mod baker;
pub mod format;
mod loader;
mod verifier;

pub use baker::bake;
pub use format::*;
pub use loader::{Binding, CodeBlock, ConstantKind, Image};
pub use verifier::verify_image;

use crate::error::GlsResult;
use crate::gc::Gc;
use crate::heap::CoreTypes;

/// `indexImage(bytes) -> image` (spec.md §4.2 "Public contract"): parses and
/// verifies, leaving constants unbaked.
pub fn index_image(gc: &mut Gc, types: &CoreTypes, bytes: &[u8]) -> GlsResult<Image> {
    let image = loader::index_image(gc, types, bytes)?;
    verify_image(&image)?;
    Ok(image)
}

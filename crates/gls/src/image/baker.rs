//! Converts wire constant payloads into live `Val`s (spec.md §4.2 "Baking").
//!
//! Idempotent: a second call is a no-op once `image.baked` is set, matching
//! the reference implementation's "run before every interpreter entry"
//! contract without redoing the work.

use crate::error::{Error, GlsResult};
use crate::gc::Gc;
use crate::heap::{self, CoreTypes};
use crate::symtab::SymbolTable;
use crate::val::Val;

use super::loader::{ConstantKind, Image};

pub fn bake(gc: &mut Gc, types: &CoreTypes, symtab: &mut SymbolTable, image: &mut Image) -> GlsResult<()> {
    if image.baked {
        return Ok(());
    }
    if gc.top() != 0 {
        // Baked constants are never re-rooted once baking finishes, so they
        // must be allocated where nothing will ever pop them: generation 0.
        // Drivers bake images before entering any scope.
        return Err(Error::runtime("bakeImage called below generation 0"));
    }

    for i in 0..image.constants.len() {
        let value = match &image.constants[i] {
            ConstantKind::Direct { lo, hi } => Val((*lo as u64) | ((*hi as u64) << 32)),
            ConstantKind::Symbol { name } => symtab.intern(gc, types, name)?,
            ConstantKind::Str { bytes } => heap::alloc_string(gc, types, bytes)?,
            ConstantKind::List { elements } => {
                let mut list = crate::val::VAL_NIL;
                for &idx in elements.iter().rev() {
                    let element = image.constants_baked[idx as usize];
                    list = heap::cons(gc, types, element, list)?;
                }
                list
            }
            ConstantKind::Lambda { .. } => crate::val::VAL_NIL,
        };
        // `constants_baked` lives outside the GC heap (it is a plain host
        // vector owned by `Image`), so there is no object header to barrier
        // against; the generation-0 allocation above is what keeps these
        // values alive without a trail entry.
        image.constants_baked[i] = value;
    }

    image.baked = true;
    Ok(())
}

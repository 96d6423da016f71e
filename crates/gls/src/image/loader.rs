//! Parses image bytes into an unverified, unbaked [`Image`] (spec.md §4.2
//! "Indexing").
//!
//! The wire buffer is copied once into a non-moving GC bytestring so that
//! code blocks can keep raw byte-range references into it for the lifetime
//! of the image (interpretation re-reads instruction bytes directly out of
//! that buffer rather than through an owned `Vec`). Constant payloads for
//! symbols and strings are short-lived during loading, so those are copied
//! out into owned buffers at parse time instead — simpler to reason about,
//! and cheap since each is read exactly once more, during bake.

use crate::error::{Error, GlsResult};
use crate::gc::Gc;
use crate::heap::{self, CoreTypes};
use crate::val::Val;

use super::format::*;

#[derive(Debug, Clone)]
pub enum ConstantKind {
    Lambda { code_index: u32, captured: Vec<u32> },
    List { elements: Vec<u32> },
    Direct { lo: u32, hi: u32 },
    Symbol { name: Vec<u8> },
    Str { bytes: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub max_stack: u32,
    pub locals: u32,
    /// Byte offset of this block's code within `buffer`, and its length.
    pub code_offset: u32,
    pub code_len: u32,
    /// `(bytecodePos, stackHeight)`, sorted strictly ascending by position.
    pub stack_map: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub symbol_const_index: u32,
    pub binding_const_index: u32,
}

pub struct Image {
    /// Non-moving GC bytestring holding a copy of the original wire bytes.
    pub buffer: Val,
    pub version: u32,
    pub constants: Vec<ConstantKind>,
    pub codes: Vec<CodeBlock>,
    pub bindings: Vec<Binding>,
    /// 0-based code index, or `None` if the image has no start section.
    pub start: Option<u32>,
    pub constants_baked: Vec<Val>,
    pub baked: bool,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Cursor<'a> {
        Cursor { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn fail(&self, what: &str) -> Error {
        Error::load(format!("{what} at byte offset {}", self.pos))
    }

    fn take(&mut self, n: usize) -> GlsResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(self.fail("unexpected end of image"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> GlsResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> GlsResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u16(&mut self) -> GlsResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn bytes_padded(&mut self, len: u32) -> GlsResult<Vec<u8>> {
        let padded = pad_to_4(len as usize);
        let raw = self.take(padded)?;
        Ok(raw[..len as usize].to_vec())
    }
}

/// Parses `bytes` into an [`Image`], performing every load-time structural
/// check (spec.md §7 kind "Load"): magic, version, strictly ascending
/// section ids, and every bounds/monotonicity invariant named in §4.2.
/// Does not verify code blocks or bake constants — callers run
/// [`super::verifier::verify_image`] and [`super::baker::bake`] afterward.
pub fn index_image(gc: &mut Gc, types: &CoreTypes, bytes: &[u8]) -> GlsResult<Image> {
    let mut cur = Cursor::new(bytes);

    let magic = cur.take(4)?;
    if magic != MAGIC {
        return Err(Error::load("missing magic header"));
    }
    let version = cur.u32()?;
    if version != VERSION {
        return Err(Error::load(format!("unsupported image version {version}")));
    }

    let mut constants: Vec<ConstantKind> = Vec::new();
    let mut codes: Vec<CodeBlock> = Vec::new();
    let mut bindings: Vec<Binding> = Vec::new();
    let mut start: Option<u32> = None;
    let mut last_section: u32 = 0;
    let mut max_code_index_referenced: u32 = 0;

    while cur.remaining() > 0 {
        let section_id = cur.u32()?;
        if section_id == 0 || section_id > SECTION_START || section_id <= last_section {
            return Err(cur.fail("section ids must be strictly ascending in 1..=4"));
        }
        last_section = section_id;

        match section_id {
            SECTION_CONSTANTS => {
                let count = cur.u32()?;
                for i in 0..count {
                    let tag = cur.u32()?;
                    let kind = match tag {
                        CONST_TAG_LAMBDA => {
                            let code_index = cur.u32()?;
                            max_code_index_referenced = max_code_index_referenced.max(code_index + 1);
                            let len = cur.u32()?;
                            let mut captured = Vec::with_capacity(len as usize);
                            for _ in 0..len {
                                let idx = cur.u32()?;
                                if idx >= i {
                                    return Err(cur.fail("constant out of range"));
                                }
                                captured.push(idx);
                            }
                            ConstantKind::Lambda { code_index, captured }
                        }
                        CONST_TAG_LIST => {
                            let len = cur.u32()?;
                            let mut elements = Vec::with_capacity(len as usize);
                            for _ in 0..len {
                                let idx = cur.u32()?;
                                if idx >= i {
                                    return Err(cur.fail("constant out of range"));
                                }
                                elements.push(idx);
                            }
                            ConstantKind::List { elements }
                        }
                        CONST_TAG_DIRECT => {
                            let lo = cur.u32()?;
                            let hi = cur.u32()?;
                            ConstantKind::Direct { lo, hi }
                        }
                        CONST_TAG_SYMBOL => {
                            let len = cur.u32()?;
                            ConstantKind::Symbol { name: cur.bytes_padded(len)? }
                        }
                        CONST_TAG_STRING => {
                            let len = cur.u32()?;
                            ConstantKind::Str { bytes: cur.bytes_padded(len)? }
                        }
                        other => return Err(cur.fail(&format!("unknown constant tag {other}"))),
                    };
                    constants.push(kind);
                }
            }
            SECTION_CODES => {
                let count = cur.u32()?;
                for _ in 0..count {
                    let len = cur.u32()?;
                    let max_stack = cur.u32()?;
                    let locals = cur.u32()?;
                    let stack_map_len = cur.u32()?;
                    let code_offset = cur.pos as u32;
                    let code_bytes = cur.take(pad_to_4(len as usize))?;
                    let _ = code_bytes;
                    let mut stack_map = Vec::with_capacity(stack_map_len as usize);
                    let mut last_pos: Option<u32> = None;
                    for _ in 0..stack_map_len {
                        let pos = cur.u32()?;
                        let height = cur.u32()?;
                        if let Some(lp) = last_pos {
                            if pos <= lp {
                                return Err(cur.fail("stack map entries must be strictly ascending"));
                            }
                        }
                        if pos >= len {
                            return Err(cur.fail("stack map entry out of code bounds"));
                        }
                        last_pos = Some(pos);
                        stack_map.push((pos, height));
                    }
                    codes.push(CodeBlock { max_stack, locals, code_offset, code_len: len, stack_map });
                }
            }
            SECTION_BINDINGS => {
                let count = cur.u32()?;
                for _ in 0..count {
                    let symbol_const_index = cur.u32()?;
                    let binding_const_index = cur.u32()?;
                    if symbol_const_index as usize >= constants.len() {
                        return Err(cur.fail("constant out of range"));
                    }
                    if !matches!(constants[symbol_const_index as usize], ConstantKind::Symbol { .. }) {
                        return Err(cur.fail("binding does not name a symbol constant"));
                    }
                    bindings.push(Binding { symbol_const_index, binding_const_index });
                }
            }
            SECTION_START => {
                let code_index = cur.u32()?;
                max_code_index_referenced = max_code_index_referenced.max(code_index + 1);
                start = Some(code_index);
            }
            _ => unreachable!(),
        }
    }

    if max_code_index_referenced as usize > codes.len() {
        return Err(Error::load("code index out of range"));
    }
    for c in &constants {
        if let ConstantKind::Lambda { code_index, .. } = c {
            if *code_index as usize >= codes.len() {
                return Err(Error::load("code index out of range"));
            }
        }
    }

    let buffer = heap::alloc_bytes(gc, types, bytes)?;
    let count = constants.len();
    Ok(Image {
        buffer,
        version,
        constants,
        codes,
        bindings,
        start,
        constants_baked: vec![crate::val::VAL_NIL; count],
        baked: false,
    })
}

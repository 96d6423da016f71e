//! Hand-assembled image byte buffers (spec.md §4.2 "Image file format"),
//! built in memory rather than checked in as binary blobs.

use crate::image::format::*;

fn pad(buf: &mut Vec<u8>, len: usize) {
    while buf.len() % 4 != 0 || buf.len() < len {
        buf.push(0);
    }
}

#[derive(Default)]
pub struct ImageBuilder {
    constants: Vec<Vec<u8>>,
    codes: Vec<Vec<u8>>,
    bindings: Vec<(u32, u32)>,
    start: Option<u32>,
}

impl ImageBuilder {
    pub fn new() -> ImageBuilder {
        ImageBuilder::default()
    }

    pub fn const_direct(&mut self, lo: u32, hi: u32) -> u32 {
        let mut c = Vec::new();
        c.extend_from_slice(&CONST_TAG_DIRECT.to_le_bytes());
        c.extend_from_slice(&lo.to_le_bytes());
        c.extend_from_slice(&hi.to_le_bytes());
        self.constants.push(c);
        (self.constants.len() - 1) as u32
    }

    pub fn const_fixnum(&mut self, n: i64) -> u32 {
        let raw = (n as u64) << 2;
        self.const_direct(raw as u32, (raw >> 32) as u32)
    }

    pub fn const_symbol(&mut self, name: &[u8]) -> u32 {
        let mut c = Vec::new();
        c.extend_from_slice(&CONST_TAG_SYMBOL.to_le_bytes());
        c.extend_from_slice(&(name.len() as u32).to_le_bytes());
        c.extend_from_slice(name);
        pad(&mut c, c.len());
        self.constants.push(c);
        (self.constants.len() - 1) as u32
    }

    pub fn const_string(&mut self, bytes: &[u8]) -> u32 {
        let mut c = Vec::new();
        c.extend_from_slice(&CONST_TAG_STRING.to_le_bytes());
        c.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        c.extend_from_slice(bytes);
        pad(&mut c, c.len());
        self.constants.push(c);
        (self.constants.len() - 1) as u32
    }

    /// Index the next constant pushed will land at, for building
    /// self/forward references in malformed fixtures.
    pub fn next_const_index(&self) -> u32 {
        self.constants.len() as u32
    }

    pub fn const_lambda(&mut self, code_index: u32, captured: &[u32]) -> u32 {
        let mut c = Vec::new();
        c.extend_from_slice(&CONST_TAG_LAMBDA.to_le_bytes());
        c.extend_from_slice(&code_index.to_le_bytes());
        c.extend_from_slice(&(captured.len() as u32).to_le_bytes());
        for &idx in captured {
            c.extend_from_slice(&idx.to_le_bytes());
        }
        self.constants.push(c);
        (self.constants.len() - 1) as u32
    }

    pub fn const_list(&mut self, elements: &[u32]) -> u32 {
        let mut c = Vec::new();
        c.extend_from_slice(&CONST_TAG_LIST.to_le_bytes());
        c.extend_from_slice(&(elements.len() as u32).to_le_bytes());
        for &e in elements {
            c.extend_from_slice(&e.to_le_bytes());
        }
        self.constants.push(c);
        (self.constants.len() - 1) as u32
    }

    /// `code`: the raw instruction bytes. `stack_map`: `(pos, height)` pairs.
    pub fn code(&mut self, max_stack: u32, locals: u32, code: &[u8], stack_map: &[(u32, u32)]) -> u32 {
        let mut c = Vec::new();
        c.extend_from_slice(&(code.len() as u32).to_le_bytes());
        c.extend_from_slice(&max_stack.to_le_bytes());
        c.extend_from_slice(&locals.to_le_bytes());
        c.extend_from_slice(&(stack_map.len() as u32).to_le_bytes());
        let mut body = code.to_vec();
        pad(&mut body, body.len());
        c.extend_from_slice(&body);
        for &(pos, height) in stack_map {
            c.extend_from_slice(&pos.to_le_bytes());
            c.extend_from_slice(&height.to_le_bytes());
        }
        self.codes.push(c);
        (self.codes.len() - 1) as u32
    }

    pub fn binding(&mut self, symbol_const_index: u32, binding_const_index: u32) {
        self.bindings.push((symbol_const_index, binding_const_index));
    }

    pub fn start(&mut self, code_index: u32) {
        self.start = Some(code_index);
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());

        if !self.constants.is_empty() {
            out.extend_from_slice(&SECTION_CONSTANTS.to_le_bytes());
            out.extend_from_slice(&(self.constants.len() as u32).to_le_bytes());
            for c in &self.constants {
                out.extend_from_slice(c);
            }
        }
        if !self.codes.is_empty() {
            out.extend_from_slice(&SECTION_CODES.to_le_bytes());
            out.extend_from_slice(&(self.codes.len() as u32).to_le_bytes());
            for c in &self.codes {
                out.extend_from_slice(c);
            }
        }
        if !self.bindings.is_empty() {
            out.extend_from_slice(&SECTION_BINDINGS.to_le_bytes());
            out.extend_from_slice(&(self.bindings.len() as u32).to_le_bytes());
            for &(s, b) in &self.bindings {
                out.extend_from_slice(&s.to_le_bytes());
                out.extend_from_slice(&b.to_le_bytes());
            }
        }
        if let Some(start) = self.start {
            out.extend_from_slice(&SECTION_START.to_le_bytes());
            out.extend_from_slice(&start.to_le_bytes());
        }
        out
    }
}

/// `{constants: [direct(nil)], codes: [ret-0], start: 0}`: the minimal
/// well-formed image used across several tests.
pub fn empty_start_image() -> Vec<u8> {
    let mut b = ImageBuilder::new();
    b.const_direct(crate::val::VAL_NIL.raw() as u32, (crate::val::VAL_NIL.raw() >> 32) as u32);
    b.code(0, 0, &[OP_RET, 0], &[]);
    b.start(0);
    b.build()
}

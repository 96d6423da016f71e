//! Abstract-interpretation bytecode verifier (spec.md §4.2 "Verification",
//! §7 kind "Verification").
//!
//! Runs once per code block at load time so the interpreter's dispatch loop
//! never has to re-check bounds or stack balance at run time.

use crate::error::{Error, GlsResult};

use super::format::*;
use super::loader::{CodeBlock, Image};

pub fn verify_image(image: &Image) -> GlsResult<()> {
    for (index, code) in image.codes.iter().enumerate() {
        verify_code(image, code).map_err(|mut e| {
            e.push_frame("indexImage", "", 0, format!("while verifying code block {index}"));
            e
        })?;
    }
    Ok(())
}

fn code_bytes<'a>(image: &'a Image, code: &CodeBlock) -> GlsResult<&'a [u8]> {
    // SAFETY: `image.buffer` is a non-moving GC bytestring allocated once
    // during `index_image` and never mutated; the byte range was validated
    // against its own `len` prefix while parsing.
    let all = unsafe { crate::heap::bytes_slice(image.buffer) };
    let start = code.code_offset as usize;
    let end = start + code.code_len as usize;
    all.get(start..end).ok_or_else(|| Error::verify("code block out of buffer bounds"))
}

fn read_u32(bytes: &[u8], pos: usize) -> GlsResult<u32> {
    let b = bytes.get(pos..pos + 4).ok_or_else(|| Error::verify("truncated immediate"))?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u16(bytes: &[u8], pos: usize) -> GlsResult<u16> {
    let b = bytes.get(pos..pos + 2).ok_or_else(|| Error::verify("truncated immediate"))?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn stack_map_height(code: &CodeBlock, pos: u32) -> Option<u32> {
    code.stack_map.iter().find(|(p, _)| *p == pos).map(|(_, h)| *h)
}

fn verify_code(image: &Image, code: &CodeBlock) -> GlsResult<()> {
    let bytes = code_bytes(image, code)?;
    let mut ip: usize = 0;
    let mut height: i64 = 0;
    let mut unreachable = false;
    let mut consumed_targets = 0usize;

    while ip < bytes.len() {
        if let Some(entry_height) = stack_map_height(code, ip as u32) {
            if !unreachable && height != entry_height as i64 {
                return Err(Error::verify(format!("mismatched branch height at offset {ip}")));
            }
            height = entry_height as i64;
            unreachable = false;
            consumed_targets += 1;
        } else if unreachable {
            return Err(Error::verify(format!("unreachable code falls through at offset {ip} without a stack-map entry")));
        }

        let op = bytes[ip];
        let op_start = ip;
        ip += 1;

        macro_rules! pop {
            ($n:expr) => {{
                height -= $n as i64;
                if height < 0 {
                    return Err(Error::verify(format!("stack underflow at offset {op_start}")));
                }
            }};
        }
        macro_rules! push {
            ($n:expr) => {{
                height += $n as i64;
                if height > code.max_stack as i64 {
                    return Err(Error::verify(format!("stack overflow at offset {op_start}")));
                }
            }};
        }

        match op {
            OP_NOP => {}
            OP_DROP => pop!(1),
            OP_RET => {
                let n = *bytes.get(ip).ok_or_else(|| Error::verify("truncated RET"))?;
                ip += 1;
                pop!(n);
                unreachable = true;
            }
            OP_BR => {
                let rel = read_u32(bytes, ip)? as i32;
                ip += 4;
                let target = (op_start as i64 + 1 + 4 + rel as i64) as i64;
                check_branch_target(code, bytes.len(), target, height)?;
                unreachable = true;
            }
            OP_BR_IF_NOT => {
                let rel = read_u32(bytes, ip)? as i32;
                ip += 4;
                pop!(1);
                let target = (op_start as i64 + 1 + 4 + rel as i64) as i64;
                check_branch_target(code, bytes.len(), target, height)?;
            }
            OP_LDC => {
                let idx = read_u32(bytes, ip)?;
                ip += 4;
                if idx as usize >= image.constants.len() {
                    return Err(Error::verify(format!("constant index {idx} out of range")));
                }
                push!(1);
            }
            OP_SYM_DEREF => {}
            OP_LAMBDA => {
                let code_index = read_u32(bytes, ip)?;
                ip += 4;
                let arity = read_u16(bytes, ip)?;
                ip += 2;
                if code_index as usize >= image.codes.len() {
                    return Err(Error::verify(format!("code index {code_index} out of range")));
                }
                pop!(arity as i64);
                push!(1);
            }
            OP_CALL => {
                let argc = *bytes.get(ip).ok_or_else(|| Error::verify("truncated CALL"))?;
                let retc = *bytes.get(ip + 1).ok_or_else(|| Error::verify("truncated CALL"))?;
                ip += 2;
                pop!(argc as i64 + 1);
                push!(retc as i64);
            }
            OP_LOCAL_REF => {
                let idx = *bytes.get(ip).ok_or_else(|| Error::verify("truncated LOCAL_REF"))?;
                ip += 1;
                if idx as u32 >= code.locals {
                    return Err(Error::verify(format!("local index {idx} out of range")));
                }
                push!(1);
            }
            OP_LOCAL_SET => {
                let idx = *bytes.get(ip).ok_or_else(|| Error::verify("truncated LOCAL_SET"))?;
                ip += 1;
                if idx as u32 >= code.locals {
                    return Err(Error::verify(format!("local index {idx} out of range")));
                }
                pop!(1);
            }
            OP_ARG_REF => {
                ip += 1;
                push!(1);
            }
            OP_RESTARG_REF => {
                ip += 1;
                push!(1);
            }
            OP_THIS_REF => push!(1),
            OP_CLOSURE_REF => {
                ip += 1;
                push!(1);
            }
            other => return Err(Error::verify(format!("unknown opcode {other:#04x} at offset {op_start}"))),
        }
    }

    if !unreachable {
        return Err(Error::verify("code block falls off the end without an unreachable instruction"));
    }
    if consumed_targets != code.stack_map.len() {
        return Err(Error::verify("stack map entries not all consumed"));
    }
    Ok(())
}

fn check_branch_target(code: &CodeBlock, code_len: usize, target: i64, height: i64) -> GlsResult<()> {
    if target < 0 || target as usize > code_len {
        return Err(Error::verify("branch target out of bounds"));
    }
    match stack_map_height(code, target as u32) {
        Some(h) if h as i64 == height => Ok(()),
        Some(_) => Err(Error::verify("branch target height mismatch")),
        None => Err(Error::verify("branch target missing from stack map")),
    }
}

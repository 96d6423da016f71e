//! Error kinds and the bounded trace buffer (spec.md §7).
//!
//! Mirrors the reference implementation's `Err`/`ErrFrame` (a fault value
//! plus an append-only, bounded vector of frames) rather than reaching for
//! `thiserror`: the kind is a small `Copy` enum, the message text and frames
//! live alongside it, and callers thread `Result<T, Error>` with `?` the way
//! the original threads `Err *`.

use crate::val::Val;
use std::fmt;

/// Maximum number of frames kept in a trace; overflow frames are dropped
/// from display, but the true count is still tracked (spec.md §7).
pub const MAX_TRACE_FRAMES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad magic/version/section order, out-of-range index, overflow, alignment.
    Load,
    /// Stack under/overflow, mismatched branch height, missing stack-map entry.
    Verify,
    /// Type mismatch, arity mismatch, division by zero, OOB, stack overflow,
    /// allocation failure, raised user value.
    Runtime,
    /// I/O failure from `open-file`/`write-file`.
    Host,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Load => "load error",
            ErrorKind::Verify => "verification error",
            ErrorKind::Runtime => "runtime error",
            ErrorKind::Host => "host error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub message: String,
    pub function_name: String,
    pub file_name: String,
    pub line: u32,
}

/// A raised error: the fault value (possibly nil, when no Lisp-level value
/// was raised) plus the append-only frame trace. `frame_count` keeps growing
/// past `MAX_TRACE_FRAMES` even once `frames` stops accepting new entries, so
/// the "N omitted" count in the top-level report is exact.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub fault: Option<Val>,
    pub frames: Vec<Frame>,
    pub frame_count: u32,
}

pub type GlsResult<T> = Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Error {
        Error {
            kind,
            fault: None,
            frames: vec![Frame {
                message: message.into(),
                function_name: String::new(),
                file_name: String::new(),
                line: 0,
            }],
            frame_count: 1,
        }
    }

    pub fn load(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Load, message)
    }

    pub fn verify(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Verify, message)
    }

    pub fn runtime(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Runtime, message)
    }

    pub fn host(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Host, message)
    }

    /// A runtime error carrying a raised Lisp value (e.g. from the `raise`
    /// primitive) rather than just a host-side message.
    pub fn raised(fault: Val, message: impl Into<String>) -> Error {
        let mut e = Error::runtime(message);
        e.fault = Some(fault);
        e
    }

    /// Append a frame, dropping it from the stored trace once the bound is
    /// hit but always incrementing `frame_count` (spec.md §7).
    pub fn push_frame(&mut self, function_name: impl Into<String>, file_name: impl Into<String>, line: u32, message: impl Into<String>) {
        if self.frames.len() < MAX_TRACE_FRAMES {
            self.frames.push(Frame {
                message: message.into(),
                function_name: function_name.into(),
                file_name: file_name.into(),
                line,
            });
        }
        self.frame_count += 1;
    }

    pub fn omitted(&self) -> u32 {
        self.frame_count - self.frames.len() as u32
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(top) = self.frames.first() {
            write!(f, "{}", top.message)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl std::error::Error for Error {}

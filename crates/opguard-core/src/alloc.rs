//! Fail-fast allocation.
//!
//! None of these return a failure to the caller. If the allocator refuses a
//! request the process logs FATAL and terminates.

use std::collections::TryReserveError;

use crate::errno::{ErrorContext, OsErrno};
use crate::logger::{self, Logger};

#[cold]
#[inline(never)]
fn out_of_memory(logger: &Logger, what: &str, size: usize, err: TryReserveError) -> ! {
    let message = ErrorContext::capture(&OsErrno)
        .append_to(format!("{} fail: size={} ({})", what, size, err));
    logger.fatal(&message)
}

/// Zeroed buffer of `size` bytes.
pub fn allocate(size: usize) -> Vec<u8> {
    allocate_with(&logger::global(), size)
}

pub fn allocate_with(logger: &Logger, size: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Err(err) = buf.try_reserve_exact(size) {
        out_of_memory(logger, "Malloc", size, err);
    }
    buf.resize(size, 0);
    buf
}

/// Grow (zero-filled) or shrink `buf` to `size` bytes.
pub fn reallocate(buf: Vec<u8>, size: usize) -> Vec<u8> {
    reallocate_with(&logger::global(), buf, size)
}

pub fn reallocate_with(logger: &Logger, mut buf: Vec<u8>, size: usize) -> Vec<u8> {
    if let Some(extra) = size.checked_sub(buf.len()) {
        if let Err(err) = buf.try_reserve_exact(extra) {
            out_of_memory(logger, "Realloc", size, err);
        }
    }
    buf.resize(size, 0);
    buf
}

pub fn duplicate_string(s: &str) -> String {
    duplicate_string_with(&logger::global(), s)
}

pub fn duplicate_string_with(logger: &Logger, s: &str) -> String {
    let mut out = String::new();
    if let Err(err) = out.try_reserve_exact(s.len()) {
        out_of_memory(logger, "Strdup", s.len(), err);
    }
    out.push_str(s);
    out
}

/// Copy of at most `n` bytes of `s`, cut back to a char boundary.
pub fn duplicate_string_n(s: &str, n: usize) -> String {
    duplicate_string_n_with(&logger::global(), s, n)
}

pub fn duplicate_string_n_with(logger: &Logger, s: &str, n: usize) -> String {
    let mut end = n.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    duplicate_string_with(logger, &s[..end])
}

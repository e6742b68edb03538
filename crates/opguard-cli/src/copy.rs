//! Guarded file copy over raw descriptors.
//!
//! Every step jumps to the one cleanup point on failure. Descriptors are
//! released by `OwnedFd` on every exit path; the cleanup closure only has to
//! remove a half-written destination.

use std::cell::Cell;
use std::ffi::CString;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use opguard_core::{alloc, call_or_err, call_or_jump, check_or_jump, Activation, Bail, GuardError, Instrumentor};

pub const DEFAULT_CHUNK: usize = 64 * 1024;

fn c_path(act: &mut Activation<'_>, path: &Path) -> Result<CString, Bail> {
    let c = CString::new(path.as_os_str().as_bytes()).ok();
    check_or_jump!(act, "path" => c.is_some(), "{}", path.display());
    Ok(c.unwrap_or_default())
}

fn open_fd(act: &mut Activation<'_>, path: &CString, flags: libc::c_int, shown: &Path) -> Result<OwnedFd, Bail> {
    let mut raw = -1;
    call_or_jump!(
        act,
        "open" => {
            raw = unsafe { libc::open(path.as_ptr(), flags | libc::O_CLOEXEC, 0o644 as libc::c_uint) };
            raw != -1
        },
        "path={} flags={:#x}",
        shown.display(),
        flags
    );
    // open returned a fresh descriptor that nothing else owns
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

fn write_all(act: &mut Activation<'_>, fd: &OwnedFd, data: &[u8]) -> Result<(), Bail> {
    let mut off = 0usize;
    while off < data.len() {
        let mut written: isize = 0;
        call_or_jump!(
            act,
            "write" => {
                let rest = &data[off..];
                written = unsafe { libc::write(fd.as_raw_fd(), rest.as_ptr().cast(), rest.len()) };
                written > 0
            },
            "fd={} len={}",
            fd.as_raw_fd(),
            data.len() - off
        );
        off += written as usize;
    }
    Ok(())
}

/// `(st_dev, st_ino)` of an open descriptor.
fn file_id(act: &mut Activation<'_>, fd: &OwnedFd) -> Result<(u64, u64), Bail> {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    call_or_jump!(
        act,
        "fstat" => unsafe { libc::fstat(fd.as_raw_fd(), &mut st) } == 0,
        "fd={}",
        fd.as_raw_fd()
    );
    Ok((st.st_dev as u64, st.st_ino as u64))
}

/// Copy `src` to `dst` in `chunk`-sized reads. Returns the byte count.
pub fn copy_file(inst: &Instrumentor, src: &Path, dst: &Path, chunk: usize) -> Result<u64, GuardError> {
    let created = Cell::new(false);

    inst.guarded(
        "copy_file",
        |act| {
            let src_c = c_path(act, src)?;
            let dst_c = c_path(act, dst)?;

            let input = open_fd(act, &src_c, libc::O_RDONLY, src)?;
            // no O_TRUNC yet: dst may be src under another name
            let output = open_fd(act, &dst_c, libc::O_WRONLY | libc::O_CREAT, dst)?;
            let same = file_id(act, &input)? == file_id(act, &output)?;
            check_or_jump!(
                act,
                "same_file" => !same,
                "src={} dst={}",
                src.display(),
                dst.display()
            );
            created.set(true);
            call_or_jump!(
                act,
                "ftruncate" => unsafe { libc::ftruncate(output.as_raw_fd(), 0) } == 0,
                "fd={}",
                output.as_raw_fd()
            );

            let mut buf = alloc::allocate_with(act.instrumentor().logger(), chunk.max(1));
            let mut total = 0u64;
            loop {
                let mut n: isize = 0;
                call_or_jump!(
                    act,
                    "read" => {
                        n = unsafe { libc::read(input.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
                        n >= 0
                    },
                    "fd={}",
                    input.as_raw_fd()
                );
                if n == 0 {
                    break;
                }
                let n = n as usize;
                write_all(act, &output, &buf[..n])?;
                total += n as u64;
            }

            // close(2) on the destination can surface deferred write errors
            let raw = output.into_raw_fd();
            call_or_err!(act, "close" => unsafe { libc::close(raw) } == 0, "fd={}", raw);
            Ok(total)
        },
        |outcome| {
            if outcome.is_failed() && created.get() {
                inst.call_or_warn(
                    "remove_file",
                    || std::fs::remove_file(dst).is_ok(),
                    format_args!("dst={}", dst.display()),
                );
            }
        },
    )
}

//! Single instrumented `open(2)` of a path.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use opguard_core::{call_or_warn, instrumented, Instrumentor, Severity};

/// Open and close `path`. Failures are logged with errno context.
pub fn probe(inst: &Instrumentor, path: &Path, writable: bool) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        inst.logger().log_fmt(
            Severity::Error,
            format_args!("open: path={} contains NUL", path.display()),
        );
        return false;
    };
    let flags = if writable { libc::O_WRONLY } else { libc::O_RDONLY };

    let mut fd = -1;
    let opened = instrumented!(
        inst,
        "open" => {
            fd = unsafe { libc::open(c_path.as_ptr(), flags | libc::O_CLOEXEC) };
            fd != -1
        },
        Severity::Info,
        Severity::Error,
        "path={} writable={}",
        path.display(),
        writable
    );
    if opened {
        call_or_warn!(inst, "close" => unsafe { libc::close(fd) } == 0, "fd={}", fd);
    }
    opened
}

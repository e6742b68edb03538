//! Ambient OS error indicator access and the error-context suffix.
//!
//! All reads and writes of errno done by the guard layer go through
//! [`ErrorIndicator`], so tests can substitute their own indicator and the
//! instrumentor can bracket every call with capture/restore.

use std::ffi::CStr;
use std::fmt;

use libc::c_int;

/// The thread's "last error" value.
pub trait ErrorIndicator {
    fn read(&self) -> i32;
    fn write(&self, code: i32);
    /// Human-readable text for `code`.
    fn describe(&self, code: i32) -> String;
}

/// Thread-local libc `errno`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsErrno;

#[cfg(any(target_os = "linux", target_os = "emscripten", target_os = "redox"))]
unsafe fn errno_location() -> *mut c_int {
    libc::__errno_location()
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
unsafe fn errno_location() -> *mut c_int {
    libc::__error()
}

impl ErrorIndicator for OsErrno {
    #[inline]
    fn read(&self) -> i32 {
        // errno_location always points at this thread's errno slot
        unsafe { *errno_location() }
    }

    #[inline]
    fn write(&self, code: i32) {
        unsafe { *errno_location() = code }
    }

    fn describe(&self, code: i32) -> String {
        strerror(code)
    }
}

/// `strerror_r` into an owned string. Does not restore errno.
pub fn strerror(code: i32) -> String {
    let mut buf = [0 as libc::c_char; 256];
    let rc = unsafe { libc::strerror_r(code, buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return format!("Unknown error {}", code);
    }
    // strerror_r NUL-terminates on success
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Captures the indicator on construction and writes it back on drop.
pub struct ErrnoGuard<'a, E: ErrorIndicator + ?Sized> {
    indicator: &'a E,
    saved: i32,
}

impl<'a, E: ErrorIndicator + ?Sized> ErrnoGuard<'a, E> {
    pub fn capture(indicator: &'a E) -> Self {
        Self {
            saved: indicator.read(),
            indicator,
        }
    }

    pub fn saved(&self) -> i32 {
        self.saved
    }
}

impl<E: ErrorIndicator + ?Sized> Drop for ErrnoGuard<'_, E> {
    fn drop(&mut self) {
        self.indicator.write(self.saved);
    }
}

/// Snapshot of the indicator, present iff the code is positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub code: i32,
    pub description: String,
    pub present: bool,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self {
            code: 0,
            description: String::new(),
            present: false,
        }
    }

    pub fn from_code<E: ErrorIndicator + ?Sized>(indicator: &E, code: i32) -> Self {
        if code > 0 {
            Self {
                code,
                description: indicator.describe(code),
                present: true,
            }
        } else {
            Self::none()
        }
    }

    /// Read the indicator once and restore it after describing.
    pub fn capture<E: ErrorIndicator + ?Sized>(indicator: &E) -> Self {
        let guard = ErrnoGuard::capture(indicator);
        Self::from_code(indicator, guard.saved())
    }

    pub fn append_to(&self, mut message: String) -> String {
        if self.present {
            use std::fmt::Write;
            let _ = write!(message, "{}", self);
        }
        message
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.present {
            write!(f, ",strerror({}):{}", self.code, self.description)
        } else {
            Ok(())
        }
    }
}

/// Append `,strerror(<code>):<text>` when the indicator is set.
/// The indicator reads the same before and after.
pub fn format_error_context<E: ErrorIndicator + ?Sized>(indicator: &E, message: String) -> String {
    ErrorContext::capture(indicator).append_to(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Indicator that counts describe calls and clobbers itself while describing.
    #[derive(Default)]
    struct NoisyIndicator {
        value: Cell<i32>,
        describes: Cell<u32>,
    }

    impl ErrorIndicator for NoisyIndicator {
        fn read(&self) -> i32 {
            self.value.get()
        }
        fn write(&self, code: i32) {
            self.value.set(code)
        }
        fn describe(&self, code: i32) -> String {
            self.describes.set(self.describes.get() + 1);
            self.value.set(999);
            format!("err{}", code)
        }
    }

    #[test]
    fn test_os_errno_roundtrip() {
        OsErrno.write(libc::ENOENT);
        assert_eq!(OsErrno.read(), libc::ENOENT);
        OsErrno.write(0);
        assert_eq!(OsErrno.read(), 0);
    }

    #[test]
    fn test_os_errno_is_thread_local() {
        OsErrno.write(libc::EPIPE);
        std::thread::spawn(|| OsErrno.write(libc::EACCES)).join().unwrap();
        assert_eq!(OsErrno.read(), libc::EPIPE);
        OsErrno.write(0);
    }

    #[test]
    fn test_strerror_broken_pipe() {
        assert_eq!(strerror(32), "Broken pipe");
    }

    #[test]
    fn test_format_without_error_is_unchanged() {
        OsErrno.write(0);
        assert_eq!(format_error_context(&OsErrno, "write: fd=3".into()), "write: fd=3");
    }

    #[test]
    fn test_format_appends_and_restores() {
        OsErrno.write(32);
        let msg = format_error_context(&OsErrno, "write: fd=3".into());
        assert_eq!(msg, "write: fd=3,strerror(32):Broken pipe");
        assert_eq!(OsErrno.read(), 32);
        OsErrno.write(0);
    }

    #[test]
    fn test_negative_code_is_not_present() {
        let ind = NoisyIndicator::default();
        ind.write(-1);
        assert_eq!(format_error_context(&ind, "x".into()), "x");
        assert_eq!(ind.describes.get(), 0);
    }

    #[test]
    fn test_capture_restores_after_describe_clobbers() {
        let ind = NoisyIndicator::default();
        ind.write(5);
        let ctx = ErrorContext::capture(&ind);
        assert_eq!(ctx.code, 5);
        assert_eq!(ctx.description, "err5");
        assert_eq!(ind.read(), 5);
        assert_eq!(ind.describes.get(), 1);
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let ind = NoisyIndicator::default();
        ind.write(7);
        {
            let guard = ErrnoGuard::capture(&ind);
            ind.write(11);
            assert_eq!(guard.saved(), 7);
        }
        assert_eq!(ind.read(), 7);
    }
}

//! # opguard-core
//!
//! Call-site instrumentation for systems code.
//!
//! Each guarded operation gets a pre-call line, failure classification with
//! errno context, and a single cleanup point per routine:
//!
//! ```ignore
//! use opguard_core::{call_or_jump, check_or_jump, Instrumentor};
//!
//! let inst = opguard_core::instrument::global();
//! let copied = inst.guarded(
//!     "copy_block",
//!     |act| {
//!         check_or_jump!(act, !src.is_empty(), "src_len={}", src.len());
//!         call_or_jump!(act, "write" => write_all(fd, src), "fd={}", fd);
//!         Ok(src.len())
//!     },
//!     |outcome| release(fd, outcome),
//! )?;
//! ```
//!
//! Supporting pieces: the leveled [`Logger`] (FATAL terminates), fail-fast
//! allocation in [`alloc`], and `SeqCst` counters in [`atomic`].

// Macros must be defined before modules that use them
#[macro_use]
pub mod macros;

pub mod alloc;
pub mod atomic;
pub mod errno;
pub mod instrument;
pub mod logger;
pub mod namer;
pub mod outcome;
pub mod severity;

pub use atomic::{memory_barrier, AtomicCounter};
pub use errno::{format_error_context, ErrnoGuard, ErrorContext, ErrorIndicator, OsErrno};
pub use instrument::{Activation, Bail, GuardError, Instrumentor};
pub use logger::{LogLine, LogSink, Logger, MemorySink, TracingSink};
pub use namer::{extract_label, parse_call, CallShape};
pub use outcome::{Outcome, Status};
pub use severity::Severity;

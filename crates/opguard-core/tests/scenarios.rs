//! End-to-end behaviour of the instrumentation layer against the real
//! thread-local errno.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use opguard_core::logger::{unwind_on_fatal, FatalExit};
use opguard_core::{
    call_or_err, call_or_jump, call_or_warn, check_or_jump, extract_label, guard_assert, instrumented,
    AtomicCounter, ErrorIndicator, GuardError, Instrumentor, Logger, MemorySink, OsErrno, Severity,
};

fn rig() -> (Arc<MemorySink>, Instrumentor) {
    let sink = Arc::new(MemorySink::new());
    let inst = Instrumentor::new(Logger::new(sink.clone()).with_fatal_hook(unwind_on_fatal));
    (sink, inst)
}

/// Stand-in for write(2) that always comes up one byte short with EPIPE.
fn write(_fd: i32, buf: &[u8], len: usize) -> usize {
    OsErrno.write(libc::EPIPE);
    buf.len().min(len).saturating_sub(1)
}

#[test]
fn test_short_write_is_reported_with_strerror() {
    let (sink, inst) = rig();
    let buf = [7u8; 16];
    let (fd, len) = (5, buf.len());

    OsErrno.write(0);
    let ok = instrumented!(
        inst,
        write(fd, &buf, len) == len,
        Severity::Trace,
        Severity::Error,
        "fd={} len={}",
        fd,
        len
    );

    assert!(!ok);
    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].severity, Severity::Trace);
    assert!(lines[0].message.starts_with("write: "));
    assert_eq!(lines[1].severity, Severity::Error);
    assert!(lines[1].message.contains("write"));
    assert!(lines[1].message.contains("strerror(32)"));
    assert!(lines[1].message.ends_with("Broken pipe"));
    OsErrno.write(0);
}

#[test]
fn test_real_broken_pipe() {
    let (sink, inst) = rig();
    let mut fds = [0 as libc::c_int; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    let [rd, wr] = fds;
    unsafe { libc::close(rd) };

    let payload = b"data";
    let ok = instrumented!(
        inst,
        "write" => unsafe { libc::write(wr, payload.as_ptr().cast(), payload.len()) } == payload.len() as isize,
        Severity::Trace,
        Severity::Error,
        "fd={}",
        wr
    );
    unsafe { libc::close(wr) };

    assert!(!ok);
    let error = &sink.lines()[1];
    assert_eq!(error.message, format!("write: fd={},strerror(32):Broken pipe", wr));
}

#[test]
fn test_success_never_leaks_errno() {
    let (_sink, inst) = rig();
    OsErrno.write(libc::EINTR);
    let ok = inst.call(
        "probe",
        Severity::Trace,
        Severity::Error,
        || {
            let _ = std::fs::File::open("/definitely/not/here");
            true
        },
        format_args!(""),
    );
    assert!(ok);
    assert_eq!(OsErrno.read(), libc::EINTR);
    OsErrno.write(0);
}

/// Stand-in for malloc: `None` plays the null pointer.
fn malloc(size: usize) -> Option<Vec<u8>> {
    (size <= 1024).then(|| vec![0u8; size])
}

fn load(inst: &Instrumentor, size: usize, reached: &mut bool) -> Result<usize, GuardError> {
    inst.guarded(
        "load",
        |act| {
            let block = malloc(size);
            check_or_jump!(act, block.is_some(), "size={}", size);
            *reached = true;
            Ok(block.map_or(0, |b| b.len()))
        },
        |_| {},
    )
}

#[test]
fn test_check_or_jump_over_allocation() {
    let (sink, inst) = rig();

    let mut reached = false;
    assert_eq!(load(&inst, 64, &mut reached), Ok(64));
    assert!(reached);
    assert_eq!(sink.count(Severity::Error), 0);

    let mut reached = false;
    let result = load(&inst, 4096, &mut reached);
    assert!(!reached);
    assert_eq!(
        result,
        Err(GuardError::Failed {
            routine: "load".into()
        })
    );
    assert_eq!(sink.count(Severity::Error), 1);
}

#[test]
fn test_failed_outcome_is_never_cleared() {
    let (_sink, inst) = rig();
    let mut final_ok = None;
    let result = inst.guarded(
        "mixed",
        |act| {
            call_or_err!(act, "stat" => false);
            for _ in 0..5 {
                call_or_jump!(act, "noop" => true);
            }
            Ok(())
        },
        |outcome| final_ok = Some(outcome.is_ok()),
    );
    assert_eq!(final_ok, Some(false));
    assert!(result.is_err());
}

#[test]
fn test_fatal_terminates_after_exactly_one_line() {
    let (sink, inst) = rig();
    let result = catch_unwind(AssertUnwindSafe(|| {
        guard_assert!(inst, 1 + 1 == 3, "arithmetic broke: {}", 2);
        inst.logger().log(Severity::Info, "unreachable");
    }));

    let payload = result.expect_err("invariant failure must terminate");
    assert!(payload.downcast_ref::<FatalExit>().is_some());
    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].severity, Severity::Fatal);
    assert!(lines[0].message.starts_with("invariant violated: arithmetic broke: 2"));
}

#[test]
fn test_labels_for_both_call_shapes() {
    for name in ["open", "read", "mmap", "pthread_create"] {
        let plain = format!("{}(a, b) != -1", name);
        assert_eq!(extract_label(&plain), name);
        let assigned = format!("(rc = {}(a, b)) != -1", name);
        assert_eq!(extract_label(&assigned), "rc");
    }
}

#[test]
fn test_concurrent_increments_are_linearizable() {
    const THREADS: u64 = 8;
    const ITERS: u64 = 10_000;

    let counter = Arc::new(AtomicU64::new(0));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let counter = Arc::clone(&counter);
            std::thread::spawn(move || {
                (0..ITERS)
                    .map(|_| {
                        let new = counter.add_fetch_new(1);
                        (new - 1, new)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for (old, new) in handle.join().unwrap() {
            assert_eq!(new, old + 1);
            assert!(seen.insert(new), "value {} handed out twice", new);
        }
    }

    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), THREADS * ITERS);
    assert_eq!(seen.len() as u64, THREADS * ITERS);
    assert!(seen.iter().all(|&v| (1..=THREADS * ITERS).contains(&v)));
}

#[test]
fn test_global_macros_use_installed_logger() {
    let sink = Arc::new(MemorySink::new());
    opguard_core::logger::install(
        Logger::new(sink.clone())
            .with_min_severity(Severity::Info)
            .with_fatal_hook(unwind_on_fatal),
    );

    opguard_core::guard_debug!("filtered {}", 1);
    opguard_core::guard_info!("ready: workers={}", 4);
    opguard_core::guard_prompt!("overwrite {}?", "out.bin");
    let result = catch_unwind(AssertUnwindSafe(|| {
        opguard_core::guard_fatal!("state corrupt at {}", 9);
    }));
    assert!(result.is_err());

    let lines = sink.take();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].message, "ready: workers=4");
    assert_eq!(lines[1].severity, Severity::Warn);
    assert_eq!(lines[2].severity, Severity::Fatal);
    assert_eq!(lines[2].message, "state corrupt at 9");
}

#[test]
fn test_derived_label_macros_evaluate_instrumentor_once() {
    let (sink, inst) = rig();
    let builds = std::cell::Cell::new(0);
    let make = || {
        builds.set(builds.get() + 1);
        inst.clone()
    };
    let ready = |n: i32| n > 0;

    assert!(instrumented!(make(), ready(1), Severity::Debug, Severity::Error));
    assert_eq!(builds.get(), 1);
    assert!(!call_or_warn!(make(), ready(0), "n={}", 0));
    assert_eq!(builds.get(), 2);

    let lines = sink.lines();
    assert_eq!(lines[0].message, "ready");
    assert_eq!(lines.last().map(|l| l.severity), Some(Severity::Warn));
}

//! Guard macros.
//!
//! The call macros take the operation label from `stringify!` of the
//! expression, or from an explicit `"label" =>` prefix:
//!
//! ```ignore
//! let ok = call_or_warn!(inst, unsafe { libc::unlink(p.as_ptr()) } == 0, "path={}", path);
//! call_or_jump!(act, "write" => n == len as isize, "fd={} len={}", fd, len);
//! check_or_jump!(act, !buf.is_empty());
//! ```

#[doc(hidden)]
#[macro_export]
macro_rules! __guard_context {
    () => { format_args!("") };
    ($($fmt:tt)+) => { format_args!($($fmt)+) };
}

/// `Instrumentor::call` with caller-chosen levels. Evaluates to `bool`.
#[macro_export]
macro_rules! instrumented {
    ($inst:expr, $label:literal => $op:expr, $level:expr, $fail:expr $(, $($fmt:tt)+)?) => {
        $inst.call($label, $level, $fail, || $op, $crate::__guard_context!($($($fmt)+)?))
    };
    ($inst:expr, $op:expr, $level:expr, $fail:expr $(, $($fmt:tt)+)?) => {{
        let inst = &$inst;
        inst.call(inst.label_for(stringify!($op)), $level, $fail, || $op, $crate::__guard_context!($($($fmt)+)?))
    }};
}

#[macro_export]
macro_rules! call_or_warn {
    ($inst:expr, $label:literal => $op:expr $(, $($fmt:tt)+)?) => {
        $inst.call_or_warn($label, || $op, $crate::__guard_context!($($($fmt)+)?))
    };
    ($inst:expr, $op:expr $(, $($fmt:tt)+)?) => {{
        let inst = &$inst;
        inst.call_or_warn(inst.label_for(stringify!($op)), || $op, $crate::__guard_context!($($($fmt)+)?))
    }};
}

/// Marks the activation failed on `false`, keeps going.
#[macro_export]
macro_rules! call_or_err {
    ($act:expr, $label:literal => $op:expr $(, $($fmt:tt)+)?) => {
        $act.call_or_err($label, || $op, $crate::__guard_context!($($($fmt)+)?))
    };
    ($act:expr, $op:expr $(, $($fmt:tt)+)?) => {{
        let label = $act.label_for(stringify!($op));
        $act.call_or_err(label, || $op, $crate::__guard_context!($($($fmt)+)?))
    }};
}

/// Marks the activation failed on `false` and returns `Err(Bail)` from the
/// enclosing function.
#[macro_export]
macro_rules! call_or_jump {
    ($act:expr, $label:literal => $op:expr $(, $($fmt:tt)+)?) => {
        $act.call_or_jump($label, || $op, $crate::__guard_context!($($($fmt)+)?))?
    };
    ($act:expr, $op:expr $(, $($fmt:tt)+)?) => {{
        let label = $act.label_for(stringify!($op));
        $act.call_or_jump(label, || $op, $crate::__guard_context!($($($fmt)+)?))?
    }};
}

#[macro_export]
macro_rules! check_or_jump {
    ($act:expr, $label:literal => $op:expr $(, $($fmt:tt)+)?) => {
        $act.check($label, || $op, $crate::__guard_context!($($($fmt)+)?))?
    };
    ($act:expr, $op:expr $(, $($fmt:tt)+)?) => {{
        let label = $act.label_for(stringify!($op));
        $act.check(label, || $op, $crate::__guard_context!($($($fmt)+)?))?
    }};
}

/// Invariant check: FATAL and terminate when `$cond` is false.
#[macro_export]
macro_rules! guard_assert {
    ($inst:expr, $cond:expr $(,)?) => {
        $inst.ensure($cond, format_args!("{}", stringify!($cond)))
    };
    ($inst:expr, $cond:expr, $($fmt:tt)+) => {
        $inst.ensure($cond, format_args!($($fmt)+))
    };
}

#[macro_export]
macro_rules! guard_log {
    ($sev:expr, $($arg:tt)+) => {
        $crate::logger::global().log_fmt($sev, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! guard_trace { ($($arg:tt)+) => { $crate::guard_log!($crate::Severity::Trace, $($arg)+) }; }
#[macro_export]
macro_rules! guard_debug { ($($arg:tt)+) => { $crate::guard_log!($crate::Severity::Debug, $($arg)+) }; }
#[macro_export]
macro_rules! guard_info { ($($arg:tt)+) => { $crate::guard_log!($crate::Severity::Info, $($arg)+) }; }
#[macro_export]
macro_rules! guard_warn { ($($arg:tt)+) => { $crate::guard_log!($crate::Severity::Warn, $($arg)+) }; }
#[macro_export]
macro_rules! guard_error { ($($arg:tt)+) => { $crate::guard_log!($crate::Severity::Error, $($arg)+) }; }
#[macro_export]
macro_rules! guard_prompt { ($($arg:tt)+) => { $crate::guard_log!($crate::Severity::Prompt, $($arg)+) }; }

/// Log FATAL through the global logger and terminate. Evaluates to `!`.
#[macro_export]
macro_rules! guard_fatal {
    ($($arg:tt)+) => {
        $crate::logger::global().fatal_fmt(format_args!($($arg)+))
    };
}

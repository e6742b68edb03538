//! Call instrumentation and the single-cleanup-point protocol.
//!
//! [`Instrumentor::call`] wraps one boolean-convertible operation with a
//! pre-call line, failure classification and errno context. An
//! [`Activation`] owns the [`Outcome`] of one guarded routine; its
//! `check`/`call_or_jump` return `Err(Bail)` so `?` carries control to the
//! routine's cleanup, which [`Instrumentor::guarded`] runs exactly once.
//!
//! Every method leaves the thread's error indicator as it found it when the
//! operation succeeds.

use std::fmt;
use std::sync::Arc;

use opguard_config::Config;

use crate::errno::{ErrorContext, ErrorIndicator, OsErrno};
use crate::logger::{self, Logger};
use crate::namer;
use crate::outcome::Outcome;
use crate::severity::Severity;

/// Jump token: "abandon the remaining steps and go to cleanup".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bail;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("{routine} failed")]
    Failed { routine: String },
}

impl From<GuardError> for Bail {
    fn from(_: GuardError) -> Self {
        Bail
    }
}

/// `"<label>: <context>"`, or just the label when the context is empty.
struct Line<'a, 'b> {
    label: &'a str,
    context: &'a fmt::Arguments<'b>,
}

impl fmt::Display for Line<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.as_str() == Some("") {
            f.write_str(self.label)
        } else {
            write!(f, "{}: {}", self.label, self.context)
        }
    }
}

#[derive(Clone)]
pub struct Instrumentor {
    logger: Logger,
    indicator: Arc<dyn ErrorIndicator + Send + Sync>,
    trace_calls: bool,
    label_max: usize,
}

impl fmt::Debug for Instrumentor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentor")
            .field("logger", &self.logger)
            .field("trace_calls", &self.trace_calls)
            .field("label_max", &self.label_max)
            .finish_non_exhaustive()
    }
}

impl Default for Instrumentor {
    fn default() -> Self {
        Self::new(Logger::default())
    }
}

impl Instrumentor {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            indicator: Arc::new(OsErrno),
            trace_calls: true,
            label_max: namer::LABEL_MAX,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Logger::from_config(&config.guard))
            .with_trace_calls(config.guard.trace_calls)
            .with_label_max(config.guard.label_max)
    }

    pub fn with_indicator(mut self, indicator: Arc<dyn ErrorIndicator + Send + Sync>) -> Self {
        self.indicator = indicator;
        self
    }

    pub fn with_trace_calls(mut self, trace_calls: bool) -> Self {
        self.trace_calls = trace_calls;
        self
    }

    pub fn with_label_max(mut self, label_max: usize) -> Self {
        self.label_max = label_max;
        self
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn indicator(&self) -> &(dyn ErrorIndicator + Send + Sync) {
        &*self.indicator
    }

    /// Operation label for stringified call text.
    pub fn label_for<'t>(&self, text: &'t str) -> &'t str {
        namer::extract_label_with_max(text, self.label_max)
    }

    /// Pre-call line at `level`. Leaves the indicator at `saved`.
    fn announce(&self, level: Severity, line: &Line<'_, '_>, saved: i32) {
        if self.trace_calls {
            self.logger.log_fmt(level, format_args!("{}", line));
            self.indicator.write(saved);
        }
    }

    /// Log a failed step at `fail_level` with errno context.
    /// Leaves the indicator at the value the operation produced.
    fn report_failure(&self, fail_level: Severity, line: &Line<'_, '_>) -> i32 {
        let code = self.indicator.read();
        let message = ErrorContext::from_code(self.indicator(), code).append_to(line.to_string());
        self.indicator.write(code);
        self.logger.log(fail_level, &message);
        self.indicator.write(code);
        code
    }

    /// Instrumented call.
    ///
    /// Logs `"<label>: <context>"` at `level`, runs `op`, and on `false`
    /// logs at `fail_level` with `,strerror(<n>):<text>` appended when errno
    /// is set. On `true` errno is restored to its value before the call.
    pub fn call<F>(
        &self,
        label: &str,
        level: Severity,
        fail_level: Severity,
        op: F,
        context: fmt::Arguments<'_>,
    ) -> bool
    where
        F: FnOnce() -> bool,
    {
        let saved = self.indicator.read();
        let line = Line {
            label,
            context: &context,
        };
        self.announce(level, &line, saved);

        if op() {
            self.indicator.write(saved);
            return true;
        }

        self.report_failure(fail_level, &line);
        false
    }

    /// `call` at TRACE, failures at WARN.
    pub fn call_or_warn<F>(&self, label: &str, op: F, context: fmt::Arguments<'_>) -> bool
    where
        F: FnOnce() -> bool,
    {
        self.call(label, Severity::Trace, Severity::Warn, op, context)
    }

    /// `call`, then `on_fail` after the failure line is logged.
    pub fn call_or_else<F, H>(
        &self,
        label: &str,
        fail_level: Severity,
        op: F,
        context: fmt::Arguments<'_>,
        on_fail: H,
    ) -> bool
    where
        F: FnOnce() -> bool,
        H: FnOnce(),
    {
        let ok = self.call(label, Severity::Trace, fail_level, op, context);
        if !ok {
            on_fail();
        }
        ok
    }

    /// Invariant check. A false `cond` is a programming error: log FATAL
    /// and terminate.
    pub fn ensure(&self, cond: bool, context: fmt::Arguments<'_>) {
        if cond {
            return;
        }
        let message = ErrorContext::capture(self.indicator())
            .append_to(format!("invariant violated: {}", context));
        self.logger.fatal(&message)
    }

    /// Open an activation for `routine`.
    pub fn begin<'a>(&'a self, routine: &'a str) -> Activation<'a> {
        let saved = self.indicator.read();
        self.logger
            .log_fmt(Severity::Trace, format_args!("{}: enter", routine));
        self.indicator.write(saved);
        Activation {
            inst: self,
            routine,
            outcome: Outcome::begin(),
        }
    }

    /// Run `body` as one guarded routine.
    ///
    /// `cleanup` runs exactly once whichever step failed. The return value
    /// is decided by the outcome after cleanup: a body that returned `Ok`
    /// but marked the outcome failed still yields `Err`.
    pub fn guarded<T, B, C>(&self, routine: &str, body: B, cleanup: C) -> Result<T, GuardError>
    where
        B: FnOnce(&mut Activation<'_>) -> Result<T, Bail>,
        C: FnOnce(&Outcome),
    {
        let mut act = self.begin(routine);
        let result = body(&mut act);
        if result.is_err() {
            act.outcome.mark_failed();
        }
        cleanup(&act.outcome);
        act.finish(result)
    }
}

/// Outcome scope of one routine activation.
#[derive(Debug)]
pub struct Activation<'a> {
    inst: &'a Instrumentor,
    routine: &'a str,
    outcome: Outcome,
}

impl<'a> Activation<'a> {
    pub fn routine(&self) -> &'a str {
        self.routine
    }

    pub fn instrumentor(&self) -> &'a Instrumentor {
        self.inst
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn mark_failed(&mut self) {
        self.outcome.mark_failed();
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn label_for<'t>(&self, text: &'t str) -> &'t str {
        self.inst.label_for(text)
    }

    /// Checked-or-jump.
    ///
    /// On `false`: mark failed, log at ERROR with errno context, restore
    /// errno to its value before the check, and return `Err(Bail)`.
    pub fn check<F>(&mut self, label: &str, op: F, context: fmt::Arguments<'_>) -> Result<(), Bail>
    where
        F: FnOnce() -> bool,
    {
        let saved = self.inst.indicator.read();
        let line = Line {
            label,
            context: &context,
        };
        self.inst.announce(Severity::Trace, &line, saved);

        if op() {
            self.inst.indicator.write(saved);
            return Ok(());
        }

        self.outcome.mark_failed();
        self.inst.report_failure(Severity::Error, &line);
        self.inst.indicator.write(saved);
        Err(Bail)
    }

    pub fn call<F>(
        &mut self,
        label: &str,
        level: Severity,
        fail_level: Severity,
        op: F,
        context: fmt::Arguments<'_>,
    ) -> bool
    where
        F: FnOnce() -> bool,
    {
        self.inst.call(label, level, fail_level, op, context)
    }

    pub fn call_or_warn<F>(&mut self, label: &str, op: F, context: fmt::Arguments<'_>) -> bool
    where
        F: FnOnce() -> bool,
    {
        self.inst.call_or_warn(label, op, context)
    }

    /// `call` at TRACE/ERROR; a failure marks the outcome but does not jump.
    pub fn call_or_err<F>(&mut self, label: &str, op: F, context: fmt::Arguments<'_>) -> bool
    where
        F: FnOnce() -> bool,
    {
        let ok = self
            .inst
            .call(label, Severity::Trace, Severity::Error, op, context);
        if !ok {
            self.outcome.mark_failed();
        }
        ok
    }

    /// `call` at TRACE/ERROR; a failure marks the outcome and jumps.
    pub fn call_or_jump<F>(&mut self, label: &str, op: F, context: fmt::Arguments<'_>) -> Result<(), Bail>
    where
        F: FnOnce() -> bool,
    {
        if self.call_or_err(label, op, context) {
            Ok(())
        } else {
            Err(Bail)
        }
    }

    /// Turn a nested routine's failure into a failure of this one.
    pub fn propagate<T>(&mut self, result: Result<T, GuardError>) -> Result<T, Bail> {
        result.map_err(|err| {
            self.outcome.mark_failed();
            let saved = self.inst.indicator.read();
            self.inst
                .logger
                .log_fmt(Severity::Error, format_args!("{}: {}", self.routine, err));
            self.inst.indicator.write(saved);
            Bail
        })
    }

    /// Consult the outcome and produce the routine's return value.
    pub fn finish<T>(mut self, result: Result<T, Bail>) -> Result<T, GuardError> {
        if result.is_err() {
            self.outcome.mark_failed();
        }
        let saved = self.inst.indicator.read();
        self.inst.logger.log_fmt(
            Severity::Trace,
            format_args!("{}: exit {}", self.routine, self.outcome.status()),
        );
        self.inst.indicator.write(saved);

        match result {
            Ok(value) if self.outcome.is_ok() => Ok(value),
            _ => Err(GuardError::Failed {
                routine: self.routine.to_owned(),
            }),
        }
    }
}

/// Instrumentor over the process-wide logger and the loaded config.
pub fn global() -> Instrumentor {
    let logger = logger::global();
    let config = opguard_config::config();
    Instrumentor::new(logger)
        .with_trace_calls(config.guard.trace_calls)
        .with_label_max(config.guard.label_max)
}

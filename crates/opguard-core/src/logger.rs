//! Leveled logger behind every guard message.
//!
//! The logger never formats on behalf of the caller and never reports sink
//! failures. `Severity::Fatal` logs once and then hands control to the fatal
//! hook, which must not return.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::Lazy;
use opguard_config::logging::Component;
use opguard_config::GuardConfig;

use crate::severity::Severity;

/// Destination for finished log lines.
pub trait LogSink: Send + Sync {
    /// Deliver one line. Must not panic on transport errors.
    fn emit(&self, severity: Severity, message: &str);

    /// Whether the sink has a channel for `Severity::Prompt`.
    /// Without one, prompts are delivered as `Severity::Warn`.
    fn supports_prompt(&self) -> bool {
        false
    }
}

/// Called after the FATAL line has been emitted.
pub type FatalHook = fn(&str) -> !;

/// Default fatal hook.
pub fn abort_process(_message: &str) -> ! {
    std::process::abort()
}

/// Panic payload raised by [`unwind_on_fatal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalExit(pub String);

/// Fatal hook for harnesses that need to observe termination.
/// Unwinds with a [`FatalExit`] payload instead of aborting.
pub fn unwind_on_fatal(message: &str) -> ! {
    std::panic::panic_any(FatalExit(message.to_owned()))
}

#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    min_severity: Severity,
    on_fatal: FatalHook,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("min_severity", &self.min_severity)
            .field("supports_prompt", &self.sink.supports_prompt())
            .finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            min_severity: Severity::Trace,
            on_fatal: abort_process,
        }
    }

    /// Logger configured from the `[guard]` config section, writing to `tracing`.
    pub fn from_config(config: &GuardConfig) -> Self {
        let min_severity = config.min_severity.parse().unwrap_or_else(|err| {
            tracing::warn!(component = Component::GUARD, "{}, falling back to TRACE", err);
            Severity::Trace
        });
        Self::default().with_min_severity(min_severity)
    }

    pub fn with_min_severity(mut self, min_severity: Severity) -> Self {
        self.min_severity = min_severity;
        self
    }

    pub fn with_fatal_hook(mut self, hook: FatalHook) -> Self {
        self.on_fatal = hook;
        self
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    /// Whether a line at `severity` reaches the sink. FATAL always does.
    pub fn enabled(&self, severity: Severity) -> bool {
        match severity {
            Severity::Fatal => true,
            Severity::Prompt => Severity::Warn >= self.min_severity,
            other => other >= self.min_severity,
        }
    }

    pub fn log(&self, severity: Severity, message: &str) {
        if severity.is_fatal() {
            self.fatal(message);
        }
        if !self.enabled(severity) {
            return;
        }
        let severity = if severity == Severity::Prompt && !self.sink.supports_prompt() {
            Severity::Warn
        } else {
            severity
        };
        self.sink.emit(severity, message);
    }

    /// Like [`Logger::log`], but skips formatting for filtered lines.
    pub fn log_fmt(&self, severity: Severity, args: fmt::Arguments<'_>) {
        if !self.enabled(severity) {
            return;
        }
        match args.as_str() {
            Some(s) => self.log(severity, s),
            None => self.log(severity, &args.to_string()),
        }
    }

    /// Emit one FATAL line and terminate through the fatal hook.
    pub fn fatal(&self, message: &str) -> ! {
        self.sink.emit(Severity::Fatal, message);
        (self.on_fatal)(message)
    }

    pub fn fatal_fmt(&self, args: fmt::Arguments<'_>) -> ! {
        self.fatal(&args.to_string())
    }
}

/// Routes guard lines into `tracing`. Transport and filtering belong to the
/// installed subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Trace => tracing::trace!(component = Component::GUARD, "{}", message),
            Severity::Debug => tracing::debug!(component = Component::GUARD, "{}", message),
            Severity::Info => tracing::info!(component = Component::GUARD, "{}", message),
            Severity::Warn => tracing::warn!(component = Component::GUARD, "{}", message),
            Severity::Error => tracing::error!(component = Component::GUARD, "{}", message),
            Severity::Fatal => tracing::error!(component = Component::GUARD, fatal = true, "{}", message),
            Severity::Prompt => tracing::warn!(component = Component::GUARD, prompt = true, "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub severity: Severity,
    pub message: String,
}

/// In-memory sink. Keeps every line in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<LogLine>>,
    prompt_channel: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that keeps PROMPT lines as PROMPT.
    pub fn with_prompt_channel() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            prompt_channel: true,
        }
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lock().clone()
    }

    pub fn take(&self) -> Vec<LogLine> {
        std::mem::take(&mut *self.lock())
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.lock().iter().filter(|l| l.severity == severity).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogLine>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn emit(&self, severity: Severity, message: &str) {
        self.lock().push(LogLine {
            severity,
            message: message.to_owned(),
        });
    }

    fn supports_prompt(&self) -> bool {
        self.prompt_channel
    }
}

/// Process-wide default logger
static GLOBAL: Lazy<RwLock<Logger>> =
    Lazy::new(|| RwLock::new(Logger::from_config(&opguard_config::config().guard)));

/// Current process-wide logger.
pub fn global() -> Logger {
    GLOBAL.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
}

/// Replace the process-wide logger.
pub fn install(logger: Logger) {
    *GLOBAL.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = logger;
}

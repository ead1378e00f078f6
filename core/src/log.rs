//! Injectable logging (spec §9 Design Notes): "replace [the original's]
//! package-scoped logger with a verbosity field on the device (or an
//! injected log sink); no process-wide mutable state in the core."
//!
//! `no_std` rules out the `log` facade (it assumes a process-wide global
//! logger). Callers that want their messages routed into `log`/`tracing`
//! implement [`LogSink`] with a couple of lines forwarding to those crates
//! -- see `linux-bus` for the concrete adapter used by the three binaries.

/// Mirrors the original driver's `Log_level` (`rpi/logging.go`), most chatty
/// first: a message emits when the device's configured level is `<=` the
/// message's own level, i.e. configuring `Warn` silences `RegIo`/`Debug`/
/// `Info` but still lets `Warn`/`Error` through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    RegIo,
    Debug,
    Info,
    Warn,
    Error,
}

/// A log sink the device calls into. Implement this once per host
/// environment (e.g. forwarding to the `log` crate) and pass it to
/// [`crate::RadioDevice::new`].
pub trait LogSink {
    fn log(&mut self, level: LogLevel, msg: &str);
}

/// Default sink used when the caller doesn't want any log output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&mut self, _level: LogLevel, _msg: &str) {}
}

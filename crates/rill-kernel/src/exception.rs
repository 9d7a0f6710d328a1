//! The exception taxonomy.
//!
//! Every failure in the evaluator is an [`Exception`]: a [`Cause`] drawn
//! from a closed set, plus a traceback of source positions. Non-local
//! control flow (`return`, `break`, `continue`) travels the same way —
//! as causes that their designated constructs intercept and convert back
//! to normal completion. The success path never constructs one.

use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// Result type used throughout the evaluator.
pub type EvalResult<T = ()> = Result<T, Exception>;

/// A script-level failure: cause plus traceback.
///
/// Exceptions are first-class values (`Value::Error`); `try`/`?(…)` can
/// observe them, and pipelines aggregate them across stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub cause: Cause,
    pub traceback: Vec<TracebackEntry>,
    /// Secondary exceptions from sibling pipeline stages, in stage order.
    pub related: Vec<Exception>,
}

/// One frame of the traceback: source unit name and byte offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct TracebackEntry {
    pub name: String,
    pub begin: usize,
    pub end: usize,
}

impl Exception {
    pub fn new(cause: Cause) -> Self {
        Self { cause, traceback: Vec::new(), related: Vec::new() }
    }

    /// Append a traceback entry and return self (builder-style, used while
    /// an exception unwinds through op frames).
    pub fn at(mut self, name: &str, begin: usize, end: usize) -> Self {
        self.traceback.push(TracebackEntry { name: name.to_string(), begin, end });
        self
    }

    /// True for the `return`/`break`/`continue` control-flow markers.
    ///
    /// These are intercepted by closures and loops; everything else unwinds
    /// to `try`, `?(…)` or the top level.
    pub fn is_control_flow(&self) -> bool {
        matches!(self.cause, Cause::Return | Cause::Break | Cause::Continue)
    }

    /// True for the benign upstream-termination signal: a write into a port
    /// whose peer has gone away.
    pub fn is_port_closed(&self) -> bool {
        matches!(self.cause, Cause::PortClosed)
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self::new(Cause::Fail(msg.into()))
    }

    pub fn arity(msg: impl Into<String>) -> Self {
        Self::new(Cause::Arity(msg.into()))
    }

    pub fn arg_kind(msg: impl Into<String>) -> Self {
        Self::new(Cause::ArgKind(msg.into()))
    }

    pub fn compile(msg: impl Into<String>) -> Self {
        Self::new(Cause::Compile(msg.into()))
    }

    pub fn io(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            Self::new(Cause::PortClosed)
        } else {
            Self::new(Cause::Io(err.to_string()))
        }
    }

    /// Wrap into a value for `except` bindings and `kind-of`.
    pub fn into_value(self) -> Value {
        Value::error(self)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)?;
        for entry in &self.traceback {
            write!(f, "\n  at {} [{}-{}]", entry.name, entry.begin, entry.end)?;
        }
        Ok(())
    }
}

impl std::error::Error for Exception {}

/// The closed cause taxonomy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Cause {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("compile error: {0}")]
    Compile(String),
    #[error("arity mismatch: {0}")]
    Arity(String),
    #[error("bad argument: {0}")]
    ArgKind(String),
    #[error("variable ${0} not found")]
    UndefinedVariable(String),
    #[error("command not found: {0}")]
    UndefinedCommand(String),
    #[error("not callable: {0}")]
    NotCallable(String),
    #[error("command {cmd} exited with status {code}")]
    ExternalCmd { cmd: String, code: i32 },
    #[error("wildcard has no match")]
    WildcardNoMatch,
    #[error("io error: {0}")]
    Io(String),
    #[error("json error: {0}")]
    Json(String),
    /// Raised by the `fail` builtin.
    #[error("{0}")]
    Fail(String),
    /// Writing to a port whose reader has gone away. Pipeline executors
    /// treat this as benign termination of the writing stage.
    #[error("port closed")]
    PortClosed,
    /// Control-flow markers, intercepted by their constructs.
    #[error("return")]
    Return,
    #[error("break")]
    Break,
    #[error("continue")]
    Continue,
}

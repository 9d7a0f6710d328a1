//! The callable protocol.
//!
//! Native builtins and user closures share one trait, [`Fun`], so command
//! dispatch, `$f` invocation, and `each`-style higher-order builtins never
//! care which they hold. Builtins are described by an arity range and an
//! option-name set; closures bind positional, rest, and named-option
//! parameters into a fresh frame.

use std::collections::HashMap;

use crate::compile::Op;
use crate::exception::{Cause, EvalResult, Exception};
use crate::interp::{EvalCtx, Namespace};
use crate::value::{self, Value};

/// Anything invokable with positional arguments and named options.
pub trait Fun: Send + Sync {
    /// The display name, used in reprs and error messages.
    fn name(&self) -> &str;

    /// Invoke with the caller's context. Output goes to `ec`'s ports.
    fn call(&self, ec: &mut EvalCtx, args: Vec<Value>, opts: HashMap<String, Value>)
        -> EvalResult<()>;
}

/// Implementation signature of a native builtin.
pub type BuiltinImpl = fn(&mut EvalCtx, Args) -> EvalResult<()>;

/// A native builtin with its dispatch schema.
pub struct Builtin {
    name: &'static str,
    min_arity: usize,
    max_arity: usize,
    opt_names: &'static [&'static str],
    any_opts: bool,
    func: BuiltinImpl,
}

impl Builtin {
    pub const fn new(name: &'static str, func: BuiltinImpl) -> Self {
        Self { name, min_arity: 0, max_arity: 0, opt_names: &[], any_opts: false, func }
    }

    /// Accept between `min` and `max` positional arguments.
    pub const fn arity(mut self, min: usize, max: usize) -> Self {
        self.min_arity = min;
        self.max_arity = max;
        self
    }

    /// Accept any number of positional arguments (at least `min`).
    pub const fn variadic(mut self, min: usize) -> Self {
        self.min_arity = min;
        self.max_arity = usize::MAX;
        self
    }

    /// Declare the accepted option names.
    pub const fn opts(mut self, names: &'static [&'static str]) -> Self {
        self.opt_names = names;
        self
    }

    /// Accept arbitrary options (only `nop` wants this).
    pub const fn any_opts(mut self) -> Self {
        self.any_opts = true;
        self
    }
}

impl Fun for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, ec: &mut EvalCtx, args: Vec<Value>, opts: HashMap<String, Value>)
        -> EvalResult<()> {
        if args.len() < self.min_arity || args.len() > self.max_arity {
            return Err(Exception::arity(format!(
                "{} got {} argument(s)",
                self.name,
                args.len()
            )));
        }
        if !self.any_opts {
            for key in opts.keys() {
                if !self.opt_names.contains(&key.as_str()) {
                    return Err(Exception::arg_kind(format!(
                        "{} accepts no option &{}",
                        self.name, key
                    )));
                }
            }
        }
        (self.func)(ec, Args { positional: args, opts })
    }
}

/// Bound arguments handed to a builtin implementation.
pub struct Args {
    pub positional: Vec<Value>,
    pub opts: HashMap<String, Value>,
}

impl Args {
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    pub fn at(&self, i: usize) -> &Value {
        &self.positional[i]
    }

    pub fn str_at(&self, i: usize) -> EvalResult<&str> {
        match &self.positional[i] {
            Value::Str(s) => Ok(s),
            other => Err(Exception::arg_kind(format!(
                "expected string, got {}",
                other.kind()
            ))),
        }
    }

    pub fn num_at(&self, i: usize) -> EvalResult<f64> {
        value::num_of(&self.positional[i])
    }

    pub fn int_at(&self, i: usize) -> EvalResult<i64> {
        let s = self.str_at(i)?;
        value::parse_int(s)
            .ok_or_else(|| Exception::arg_kind(format!("not an integer: {}", s)))
    }

    pub fn opt(&self, name: &str) -> Option<&Value> {
        self.opts.get(name)
    }
}

/// A user closure: parameters, option defaults, a compiled body, and the
/// captured upvalue namespace.
pub struct Closure {
    pub name: String,
    pub params: Vec<String>,
    pub rest: Option<String>,
    pub opt_defaults: Vec<(String, Value)>,
    pub body: Op,
    pub captured: Namespace,
}

impl Fun for Closure {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, ec: &mut EvalCtx, args: Vec<Value>, mut opts: HashMap<String, Value>)
        -> EvalResult<()> {
        if args.len() < self.params.len()
            || (self.rest.is_none() && args.len() > self.params.len())
        {
            return Err(Exception::arity(format!(
                "{} takes {} argument(s), got {}",
                self.name,
                self.params.len(),
                args.len()
            )));
        }

        let local = Namespace::new();
        let mut args = args.into_iter();
        for param in &self.params {
            let v = args.next().expect("arity checked above");
            local.define(param.clone(), v);
        }
        if let Some(rest) = &self.rest {
            local.define(rest.clone(), Value::list(args));
        }

        for (key, default) in &self.opt_defaults {
            let v = opts.remove(key).unwrap_or_else(|| default.clone());
            local.define(key.clone(), v);
        }
        if let Some(key) = opts.keys().next() {
            return Err(Exception::arg_kind(format!(
                "{} accepts no option &{}",
                self.name, key
            )));
        }

        let mut frame = ec.closure_frame(local, self.captured.clone());
        match self.body.exec(&mut frame) {
            // `return` unwinds to here and completes the call normally.
            Err(e) if matches!(e.cause, Cause::Return) => Ok(()),
            other => other,
        }
    }
}

//! The builtin library.
//!
//! Builtins live in the builtin namespace under the `name~` convention
//! used by command lookup, next to the builtin variables `true`, `false`,
//! and `pid`. Each submodule registers one category.

mod container;
mod fileops;
mod flow;
mod io;
mod iter;
mod num;
mod strs;

use std::sync::Arc;

use crate::exception::EvalResult;
use crate::fun::Fun;
use crate::interp::{split_lines, EvalCtx, Namespace};
use crate::port::Port;
use crate::value::Value;

/// Build the builtin namespace.
pub fn namespace() -> Namespace {
    let ns = Namespace::new();
    ns.define("true", Value::Bool(true));
    ns.define("false", Value::Bool(false));
    ns.define("pid", Value::str(std::process::id().to_string()));

    let mut funs: Vec<Arc<dyn Fun>> = Vec::new();
    io::register(&mut funs);
    iter::register(&mut funs);
    num::register(&mut funs);
    strs::register(&mut funs);
    container::register(&mut funs);
    flow::register(&mut funs);
    fileops::register(&mut funs);

    for fun in funs {
        let key = format!("{}~", fun.name());
        ns.define(key, Value::fun(fun));
    }
    ns
}

/// Iterator over a frame's input: channel values in emission order, then
/// byte input split on newlines.
pub(crate) struct InputIter {
    port: Port,
    lines: Option<std::vec::IntoIter<String>>,
}

impl Iterator for InputIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if self.lines.is_none() {
            if let Some(v) = self.port.chan.recv() {
                return Some(v);
            }
            let bytes = self.port.file.read_all().unwrap_or_default();
            self.lines = Some(split_lines(&bytes).into_iter());
        }
        self.lines.as_mut().and_then(|lines| lines.next()).map(Value::str)
    }
}

/// Input iterator over the frame's stdin port. The port is a cheap clone,
/// so the caller keeps `ec` free for invoking callables per item.
pub(crate) fn input(ec: &EvalCtx) -> InputIter {
    InputIter { port: ec.ports[0].clone(), lines: None }
}

pub(crate) fn out_send(ec: &EvalCtx, v: Value) -> EvalResult {
    ec.out().chan.send(v)
}

pub(crate) fn out_write(ec: &EvalCtx, text: &str) -> EvalResult {
    ec.out().file.write_all(text.as_bytes())
}

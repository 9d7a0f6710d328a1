//! Control and failure builtins: `fail`, `return`, `break`, `continue`,
//! `nop`, `bool`, `run-parallel`.

use std::sync::Arc;

use crate::exception::{Cause, EvalResult, Exception};
use crate::fun::{Args, Builtin, Fun};
use crate::interp::EvalCtx;
use crate::sched;
use crate::value::Value;

use super::out_send;

pub(super) fn register(out: &mut Vec<Arc<dyn Fun>>) {
    out.push(Arc::new(Builtin::new("fail", fail).arity(1, 1)));
    out.push(Arc::new(Builtin::new("return", return_fn)));
    out.push(Arc::new(Builtin::new("break", break_fn)));
    out.push(Arc::new(Builtin::new("continue", continue_fn)));
    out.push(Arc::new(Builtin::new("nop", nop).variadic(0).any_opts()));
    out.push(Arc::new(Builtin::new("bool", bool_fn).arity(1, 1)));
    out.push(Arc::new(Builtin::new("run-parallel", run_parallel).variadic(1)));
}

fn fail(_ec: &mut EvalCtx, args: Args) -> EvalResult {
    Err(Exception::new(Cause::Fail(args.at(0).to_display())))
}

fn return_fn(_ec: &mut EvalCtx, _args: Args) -> EvalResult {
    Err(Exception::new(Cause::Return))
}

fn break_fn(_ec: &mut EvalCtx, _args: Args) -> EvalResult {
    Err(Exception::new(Cause::Break))
}

fn continue_fn(_ec: &mut EvalCtx, _args: Args) -> EvalResult {
    Err(Exception::new(Cause::Continue))
}

fn nop(_ec: &mut EvalCtx, _args: Args) -> EvalResult {
    Ok(())
}

fn bool_fn(ec: &mut EvalCtx, args: Args) -> EvalResult {
    out_send(ec, Value::Bool(args.at(0).as_bool()))
}

/// Run each block concurrently; aggregate failures like a pipeline, but
/// without wiring outputs between them.
fn run_parallel(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let mut blocks = Vec::with_capacity(args.len());
    for v in &args.positional {
        match v {
            Value::Fn(f) => blocks.push(f.clone()),
            other => {
                return Err(Exception::new(Cause::NotCallable(other.repr())));
            }
        }
    }
    sched::run_parallel(ec, &blocks)
}

//! Iteration builtins: `each`, `range`, `take`, `drop`, `count`, `all`,
//! `repeat`, `constantly`, `explode`.

use std::sync::Arc;

use crate::compile::call_value;
use crate::exception::{Cause, EvalResult, Exception};
use crate::fun::{Args, Builtin, Fun};
use crate::interp::EvalCtx;
use crate::value::{fmt_num, Value};

use super::{input, out_send};

pub(super) fn register(out: &mut Vec<Arc<dyn Fun>>) {
    out.push(Arc::new(Builtin::new("each", each).arity(1, 2)));
    out.push(Arc::new(Builtin::new("range", range).arity(1, 2).opts(&["step"])));
    out.push(Arc::new(Builtin::new("take", take).arity(1, 1)));
    out.push(Arc::new(Builtin::new("drop", drop_n).arity(1, 1)));
    out.push(Arc::new(Builtin::new("count", count).arity(0, 1)));
    out.push(Arc::new(Builtin::new("all", all)));
    out.push(Arc::new(Builtin::new("repeat", repeat).arity(2, 2)));
    out.push(Arc::new(Builtin::new("constantly", constantly).variadic(0)));
    out.push(Arc::new(Builtin::new("explode", explode).arity(1, 1)));
}

/// Apply a callable to each item: an explicit list when given, otherwise
/// the input stream. `break` ends the loop, `continue` skips to the next
/// item; other failures propagate.
fn each(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let f = args.at(0).clone();
    let items: Box<dyn Iterator<Item = Value>> = if args.len() == 2 {
        match args.at(1) {
            Value::List(items) => {
                Box::new(items.iter().cloned().collect::<Vec<_>>().into_iter())
            }
            other => {
                return Err(Exception::arg_kind(format!(
                    "cannot iterate a {}",
                    other.kind()
                )))
            }
        }
    } else {
        Box::new(input(ec))
    };

    for item in items {
        match call_value(ec, &f, vec![item]) {
            Ok(()) => {}
            Err(e) if matches!(e.cause, Cause::Break) => break,
            Err(e) if matches!(e.cause, Cause::Continue) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// `range n` → 0..n; `range a b` → a..b; `&step` sets the stride.
fn range(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let (start, end) = if args.len() == 2 {
        (args.num_at(0)?, args.num_at(1)?)
    } else {
        (0.0, args.num_at(0)?)
    };
    let step = match args.opt("step") {
        Some(v) => crate::value::num_of(v)?,
        None => 1.0,
    };
    if step == 0.0 {
        return Err(Exception::arg_kind("step must be non-zero"));
    }

    let mut current = start;
    while (step > 0.0 && current < end) || (step < 0.0 && current > end) {
        out_send(ec, Value::str(fmt_num(current)))?;
        current += step;
    }
    Ok(())
}

fn take(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let n = args.int_at(0)?.max(0) as usize;
    for (i, v) in input(ec).enumerate() {
        if i >= n {
            break;
        }
        out_send(ec, v)?;
    }
    Ok(())
}

fn drop_n(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let n = args.int_at(0)?.max(0) as usize;
    for (i, v) in input(ec).enumerate() {
        if i >= n {
            out_send(ec, v)?;
        }
    }
    Ok(())
}

/// Count input items, or the elements of an explicit list.
fn count(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let n = if args.len() == 1 {
        match args.at(0) {
            Value::List(items) => items.len(),
            Value::Str(s) => s.chars().count(),
            other => {
                return Err(Exception::arg_kind(format!(
                    "cannot count a {}",
                    other.kind()
                )))
            }
        }
    } else {
        input(ec).count()
    };
    out_send(ec, Value::str(n.to_string()))
}

/// Pass the input through: channel values first, then raw bytes.
fn all(ec: &mut EvalCtx, _args: Args) -> EvalResult {
    while let Some(v) = ec.ports[0].chan.recv() {
        out_send(ec, v)?;
    }
    let bytes = ec.ports[0].file.read_all()?;
    if !bytes.is_empty() {
        ec.out().file.write_all(&bytes)?;
    }
    Ok(())
}

fn repeat(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let n = args.int_at(0)?.max(0);
    let v = args.at(1);
    for _ in 0..n {
        out_send(ec, v.clone())?;
    }
    Ok(())
}

/// Return a callable that emits the given values every time.
fn constantly(ec: &mut EvalCtx, args: Args) -> EvalResult {
    out_send(ec, Value::fun(Arc::new(ConstantlyFn { values: args.positional })))
}

struct ConstantlyFn {
    values: Vec<Value>,
}

impl Fun for ConstantlyFn {
    fn name(&self) -> &str {
        "constantly"
    }

    fn call(
        &self,
        ec: &mut EvalCtx,
        args: Vec<Value>,
        opts: std::collections::HashMap<String, Value>,
    ) -> EvalResult {
        if !args.is_empty() {
            return Err(Exception::arity(format!(
                "constant function got {} argument(s)",
                args.len()
            )));
        }
        if let Some(key) = opts.keys().next() {
            return Err(Exception::arg_kind(format!(
                "constant function accepts no option &{}",
                key
            )));
        }
        for v in &self.values {
            out_send(ec, v.clone())?;
        }
        Ok(())
    }
}

fn explode(ec: &mut EvalCtx, args: Args) -> EvalResult {
    match args.at(0) {
        Value::List(items) => {
            for v in items.iter() {
                out_send(ec, v.clone())?;
            }
            Ok(())
        }
        other => Err(Exception::arg_kind(format!("cannot explode a {}", other.kind()))),
    }
}

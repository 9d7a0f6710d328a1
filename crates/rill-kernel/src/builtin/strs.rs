//! String builtins: `==s`, `<s`, `has-prefix`, `has-suffix`, `joins`,
//! `splits`, `replaces`, `path-base`.

use std::sync::Arc;

use crate::exception::{EvalResult, Exception};
use crate::fun::{Args, Builtin, Fun};
use crate::interp::EvalCtx;
use crate::value::Value;

use super::out_send;

pub(super) fn register(out: &mut Vec<Arc<dyn Fun>>) {
    out.push(Arc::new(Builtin::new("==s", str_eq).variadic(2)));
    out.push(Arc::new(Builtin::new("<s", str_lt).variadic(2)));
    out.push(Arc::new(Builtin::new("has-prefix", has_prefix).arity(2, 2)));
    out.push(Arc::new(Builtin::new("has-suffix", has_suffix).arity(2, 2)));
    out.push(Arc::new(Builtin::new("joins", joins).arity(2, 2)));
    out.push(Arc::new(Builtin::new("splits", splits).arity(2, 2)));
    out.push(Arc::new(Builtin::new("replaces", replaces).arity(3, 3).opts(&["max"])));
    out.push(Arc::new(Builtin::new("path-base", path_base).arity(1, 1)));
}

fn strings(args: &Args) -> EvalResult<Vec<&str>> {
    let mut out = Vec::with_capacity(args.len());
    for i in 0..args.len() {
        out.push(args.str_at(i)?);
    }
    Ok(out)
}

fn str_eq(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let ss = strings(&args)?;
    let equal = ss.windows(2).all(|w| w[0] == w[1]);
    out_send(ec, Value::Bool(equal))
}

fn str_lt(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let ss = strings(&args)?;
    let ordered = ss.windows(2).all(|w| w[0] < w[1]);
    out_send(ec, Value::Bool(ordered))
}

fn has_prefix(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let found = args.str_at(0)?.starts_with(args.str_at(1)?);
    out_send(ec, Value::Bool(found))
}

fn has_suffix(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let found = args.str_at(0)?.ends_with(args.str_at(1)?);
    out_send(ec, Value::Bool(found))
}

/// `joins sep list` — concatenate list elements with the separator.
fn joins(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let sep = args.str_at(0)?;
    let items = match args.at(1) {
        Value::List(items) => items,
        other => {
            return Err(Exception::arg_kind(format!("cannot join a {}", other.kind())))
        }
    };
    let parts: Vec<String> = items.iter().map(Value::to_display).collect();
    out_send(ec, Value::str(parts.join(sep)))
}

/// `splits sep s` — emit each separator-delimited part.
fn splits(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let sep = args.str_at(0)?;
    if sep.is_empty() {
        return Err(Exception::arg_kind("empty separator"));
    }
    let parts: Vec<Value> = args.str_at(1)?.split(sep).map(Value::str).collect();
    for part in parts {
        out_send(ec, part)?;
    }
    Ok(())
}

/// `replaces [&max=n] old new s`.
fn replaces(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let old = args.str_at(0)?;
    let new = args.str_at(1)?;
    let subject = args.str_at(2)?;
    let replaced = match args.opt("max") {
        Some(v) => {
            let max = match v {
                Value::Str(s) => crate::value::parse_int(s)
                    .ok_or_else(|| Exception::arg_kind(format!("not an integer: {}", s)))?,
                other => {
                    return Err(Exception::arg_kind(format!(
                        "&max must be an integer, got {}",
                        other.kind()
                    )))
                }
            };
            subject.replacen(old, new, max.max(0) as usize)
        }
        None => subject.replace(old, new),
    };
    out_send(ec, Value::str(replaced))
}

/// The final path component.
fn path_base(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let path = args.str_at(0)?;
    let base = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    out_send(ec, Value::str(base))
}

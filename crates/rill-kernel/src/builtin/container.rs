//! Container and equality builtins: `keys`, `has-key`, `has-value`,
//! `assoc`, `dissoc`, `kind-of`, `is`, `eq`.

use std::sync::Arc;

use crate::exception::{EvalResult, Exception};
use crate::fun::{Args, Builtin, Fun};
use crate::interp::EvalCtx;
use crate::value::Value;

use super::out_send;

pub(super) fn register(out: &mut Vec<Arc<dyn Fun>>) {
    out.push(Arc::new(Builtin::new("keys", keys).arity(1, 1)));
    out.push(Arc::new(Builtin::new("has-key", has_key).arity(2, 2)));
    out.push(Arc::new(Builtin::new("has-value", has_value).arity(2, 2)));
    out.push(Arc::new(Builtin::new("assoc", assoc).arity(3, 3)));
    out.push(Arc::new(Builtin::new("dissoc", dissoc).arity(2, 2)));
    out.push(Arc::new(Builtin::new("kind-of", kind_of).variadic(1)));
    out.push(Arc::new(Builtin::new("is", is).variadic(2)));
    out.push(Arc::new(Builtin::new("eq", eq).variadic(2)));
}

/// Emit a map's keys, sorted by repr for stable output.
fn keys(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let entries = match args.at(0) {
        Value::Map(entries) => entries,
        other => {
            return Err(Exception::arg_kind(format!(
                "cannot list keys of a {}",
                other.kind()
            )))
        }
    };
    let mut keyed: Vec<(String, Value)> =
        entries.iter().map(|(k, _)| (k.repr(), k.clone())).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    for (_, key) in keyed {
        out_send(ec, key)?;
    }
    Ok(())
}

/// Key membership: map keys, or list indices/slices in range.
fn has_key(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let found = match args.at(0) {
        Value::Map(entries) => entries.contains_key(args.at(1)),
        Value::List(_) => args.at(0).index(args.at(1)).is_ok(),
        other => {
            return Err(Exception::arg_kind(format!(
                "cannot test keys of a {}",
                other.kind()
            )))
        }
    };
    out_send(ec, Value::Bool(found))
}

/// Value membership: map values, list elements, or substrings.
fn has_value(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let needle = args.at(1);
    let found = match args.at(0) {
        Value::Map(entries) => entries.iter().any(|(_, v)| v == needle),
        Value::List(items) => items.iter().any(|v| v == needle),
        Value::Str(haystack) => match needle {
            Value::Str(sub) => haystack.contains(sub.as_str()),
            _ => false,
        },
        other => {
            return Err(Exception::arg_kind(format!(
                "cannot search a {}",
                other.kind()
            )))
        }
    };
    out_send(ec, Value::Bool(found))
}

fn assoc(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let updated = args.at(0).assoc(args.at(1), args.at(2).clone())?;
    out_send(ec, updated)
}

fn dissoc(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let updated = args.at(0).dissoc(args.at(1))?;
    out_send(ec, updated)
}

fn kind_of(ec: &mut EvalCtx, args: Args) -> EvalResult {
    for v in &args.positional {
        out_send(ec, Value::str(v.kind()))?;
    }
    Ok(())
}

/// Identity comparison across all arguments.
fn is(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let same = args.positional.windows(2).all(|w| w[0].identical(&w[1]));
    out_send(ec, Value::Bool(same))
}

/// Structural equality across all arguments.
fn eq(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let equal = args.positional.windows(2).all(|w| w[0] == w[1]);
    out_send(ec, Value::Bool(equal))
}

//! Output and coder builtins: `put`, `print`, `echo`, `pprint`, `slurp`,
//! `from-lines`, `to-lines`, `from-json`, `to-json`.

use std::sync::Arc;

use crate::exception::{Cause, EvalResult, Exception};
use crate::fun::{Args, Builtin, Fun};
use crate::interp::{split_lines, EvalCtx};
use crate::value::Value;

use super::{input, out_send, out_write};

pub(super) fn register(out: &mut Vec<Arc<dyn Fun>>) {
    out.push(Arc::new(Builtin::new("put", put).variadic(0)));
    out.push(Arc::new(Builtin::new("print", print).variadic(0)));
    out.push(Arc::new(Builtin::new("echo", echo).variadic(0)));
    out.push(Arc::new(Builtin::new("pprint", pprint).variadic(0)));
    out.push(Arc::new(Builtin::new("slurp", slurp)));
    out.push(Arc::new(Builtin::new("from-lines", from_lines)));
    out.push(Arc::new(Builtin::new("to-lines", to_lines)));
    out.push(Arc::new(Builtin::new("from-json", from_json)));
    out.push(Arc::new(Builtin::new("to-json", to_json)));
}

/// Emit each argument on the value channel.
fn put(ec: &mut EvalCtx, args: Args) -> EvalResult {
    for v in args.positional {
        out_send(ec, v)?;
    }
    Ok(())
}

/// Write the text of the arguments, concatenated, no newline.
fn print(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let text: String = args.positional.iter().map(Value::to_display).collect();
    out_write(ec, &text)
}

/// Write the arguments separated by spaces, newline-terminated.
fn echo(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let words: Vec<String> = args.positional.iter().map(Value::to_display).collect();
    out_write(ec, &format!("{}\n", words.join(" ")))
}

fn pprint(ec: &mut EvalCtx, args: Args) -> EvalResult {
    for v in &args.positional {
        out_write(ec, &format!("{}\n", v.pretty(0)))?;
    }
    Ok(())
}

/// Join all byte input into one string value.
fn slurp(ec: &mut EvalCtx, _args: Args) -> EvalResult {
    let bytes = ec.ports[0].file.read_all()?;
    out_send(ec, Value::str(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Split byte input on newlines; the trailing empty line is suppressed.
fn from_lines(ec: &mut EvalCtx, _args: Args) -> EvalResult {
    let bytes = ec.ports[0].file.read_all()?;
    for line in split_lines(&bytes) {
        out_send(ec, Value::str(line))?;
    }
    Ok(())
}

/// Write each input value as one line.
fn to_lines(ec: &mut EvalCtx, _args: Args) -> EvalResult {
    for v in input(ec) {
        out_write(ec, &format!("{}\n", v.to_display()))?;
    }
    Ok(())
}

/// Decode whitespace-separated JSON documents from byte input.
fn from_json(ec: &mut EvalCtx, _args: Args) -> EvalResult {
    let bytes = ec.ports[0].file.read_all()?;
    let text = String::from_utf8_lossy(&bytes);
    for doc in serde_json::Deserializer::from_str(&text).into_iter::<serde_json::Value>() {
        let doc = doc.map_err(|e| Exception::new(Cause::Json(e.to_string())))?;
        out_send(ec, Value::from_json(&doc))?;
    }
    Ok(())
}

/// Encode each input value as one JSON document per line.
fn to_json(ec: &mut EvalCtx, _args: Args) -> EvalResult {
    for v in input(ec) {
        let json = v.to_json()?;
        let text = serde_json::to_string(&json)
            .map_err(|e| Exception::new(Cause::Json(e.to_string())))?;
        out_write(ec, &format!("{}\n", text))?;
    }
    Ok(())
}

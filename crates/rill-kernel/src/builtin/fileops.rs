//! File and pipe lifecycle builtins: `fopen`, `fclose`, `pipe`,
//! `prclose`, `pwclose`.

use std::sync::Arc;

use crate::exception::{EvalResult, Exception};
use crate::fun::{Args, Builtin, Fun};
use crate::interp::EvalCtx;
use crate::value::{FileValue, PipeValue, Value};

use super::out_send;

pub(super) fn register(out: &mut Vec<Arc<dyn Fun>>) {
    out.push(Arc::new(Builtin::new("fopen", fopen).arity(1, 1)));
    out.push(Arc::new(Builtin::new("fclose", fclose).arity(1, 1)));
    out.push(Arc::new(Builtin::new("pipe", pipe).arity(0, 0)));
    out.push(Arc::new(Builtin::new("prclose", prclose).arity(1, 1)));
    out.push(Arc::new(Builtin::new("pwclose", pwclose).arity(1, 1)));
}

fn fopen(ec: &mut EvalCtx, args: Args) -> EvalResult {
    let path = args.str_at(0)?;
    let resolved = ec.evaler.resolve_path(path);
    let file = std::fs::File::open(&resolved).map_err(|e| {
        Exception::new(crate::exception::Cause::Io(format!("{}: {}", path, e)))
    })?;
    out_send(ec, Value::file(FileValue::new(path, file)))
}

fn fclose(_ec: &mut EvalCtx, args: Args) -> EvalResult {
    match args.at(0) {
        Value::File(file) => file.close(),
        other => Err(Exception::arg_kind(format!("cannot fclose a {}", other.kind()))),
    }
}

fn pipe(ec: &mut EvalCtx, _args: Args) -> EvalResult {
    let (reader, writer) = std::io::pipe().map_err(Exception::io)?;
    out_send(ec, Value::pipe(PipeValue::new(reader, writer)))
}

fn prclose(_ec: &mut EvalCtx, args: Args) -> EvalResult {
    match args.at(0) {
        Value::Pipe(pipe) => pipe.close_reader(),
        other => Err(Exception::arg_kind(format!("cannot prclose a {}", other.kind()))),
    }
}

fn pwclose(_ec: &mut EvalCtx, args: Args) -> EvalResult {
    match args.at(0) {
        Value::Pipe(pipe) => pipe.close_writer(),
        other => Err(Exception::arg_kind(format!("cannot pwclose a {}", other.kind()))),
    }
}

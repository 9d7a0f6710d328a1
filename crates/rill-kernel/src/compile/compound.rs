//! Compilation of compound words and their primaries.
//!
//! A compound concatenates the values of its parts as a cartesian product;
//! a single-part compound passes values through untouched, which is what
//! keeps lists, captures, and splices multi-valued.

use std::sync::Arc;

use rill_ast::{Compound, Lambda, Primary, Redir, RedirMode, Span};

use crate::exception::{Cause, EvalResult, Exception};
use crate::fun::Closure;
use crate::interp::{EvalCtx, Namespace};
use crate::port::{Chan, Port, PortFile};
use crate::value::Value;
use crate::wildcard;

use super::{Compiler, ValuesOp};

/// A values op constrained to produce exactly one value.
#[derive(Clone)]
pub(crate) struct SingleValueOp {
    inner: ValuesOp,
}

impl SingleValueOp {
    pub fn exec(&self, ec: &mut EvalCtx) -> EvalResult<Value> {
        let mut values = self.inner.exec(ec)?;
        if values.len() == 1 {
            Ok(values.pop().expect("length checked"))
        } else {
            Err(Exception::arity(format!(
                "needs exactly one value, got {}",
                values.len()
            )))
        }
    }
}

pub(crate) fn single_value(inner: ValuesOp) -> SingleValueOp {
    SingleValueOp { inner }
}

pub(crate) fn compile_compound(cp: &mut Compiler, compound: &Compound) -> EvalResult<ValuesOp> {
    if compound.parts.len() == 1 {
        return compile_primary(cp, &compound.parts[0], compound.span);
    }
    let mut parts = Vec::with_capacity(compound.parts.len());
    for part in &compound.parts {
        parts.push(compile_primary(cp, part, compound.span)?);
    }
    Ok(ValuesOp::new(compound.span, move |ec| {
        let mut acc = vec![Value::str("")];
        for part in &parts {
            let values = part.exec(ec)?;
            let mut next = Vec::with_capacity(acc.len().max(1) * values.len().max(1));
            for left in &acc {
                for right in &values {
                    next.push(concat(left, right)?);
                }
            }
            acc = next;
        }
        Ok(acc)
    }))
}

fn concat(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{}{}", a, b))),
        (a, b) => Err(Exception::arg_kind(format!(
            "cannot concatenate {} and {}",
            a.kind(),
            b.kind()
        ))),
    }
}

fn compile_primary(cp: &mut Compiler, primary: &Primary, span: Span) -> EvalResult<ValuesOp> {
    match primary {
        Primary::Str(s) => {
            let v = Value::str(s.clone());
            Ok(ValuesOp::new(span, move |_| Ok(vec![v.clone()])))
        }
        Primary::Var { name, splice } => compile_var(cp, name, *splice, span),
        Primary::Wildcard { pattern, nomatch_ok } => {
            let pattern = pattern.clone();
            let nomatch_ok = *nomatch_ok;
            Ok(ValuesOp::new(span, move |ec| wildcard::expand(ec, &pattern, nomatch_ok)))
        }
        Primary::Tilde => Ok(ValuesOp::new(span, move |_| {
            Ok(vec![Value::str(std::env::var("HOME").unwrap_or_default())])
        })),
        Primary::Braced(alternatives) => {
            let mut ops = Vec::with_capacity(alternatives.len());
            for alt in alternatives {
                ops.push(compile_compound(cp, alt)?);
            }
            Ok(ValuesOp::new(span, move |ec| {
                let mut out = Vec::new();
                for op in &ops {
                    out.extend(op.exec(ec)?);
                }
                Ok(out)
            }))
        }
        Primary::List(items) => {
            let mut ops = Vec::with_capacity(items.len());
            for item in items {
                ops.push(compile_compound(cp, item)?);
            }
            Ok(ValuesOp::new(span, move |ec| {
                let mut elems = Vec::new();
                for op in &ops {
                    elems.extend(op.exec(ec)?);
                }
                Ok(vec![Value::list(elems)])
            }))
        }
        Primary::Map(pairs) => {
            let mut ops = Vec::with_capacity(pairs.len());
            for (key, val) in pairs {
                ops.push((
                    single_value(compile_compound(cp, key)?),
                    single_value(compile_compound(cp, val)?),
                ));
            }
            Ok(ValuesOp::new(span, move |ec| {
                let mut entries = Vec::new();
                for (key, val) in &ops {
                    entries.push((key.exec(ec)?, val.exec(ec)?));
                }
                Ok(vec![Value::map(entries)])
            }))
        }
        Primary::Lambda(lambda) => compile_lambda(cp, lambda, None),
        Primary::Index { head, indices } => {
            let head = single_value(compile_primary(cp, head, span)?);
            let mut index_ops = Vec::with_capacity(indices.len());
            for index in indices {
                index_ops.push(single_value(compile_compound(cp, index)?));
            }
            Ok(ValuesOp::new(span, move |ec| {
                let mut value = head.exec(ec)?;
                for index in &index_ops {
                    let idx = index.exec(ec)?;
                    value = value.index(&idx)?;
                }
                Ok(vec![value])
            }))
        }
        Primary::OutputCapture(chunk) => {
            let op = cp.chunk(chunk)?;
            Ok(ValuesOp::new(span, move |ec| ec.capture_output(&op)))
        }
        Primary::ErrorCapture(chunk) => {
            let op = cp.chunk(chunk)?;
            Ok(ValuesOp::new(span, move |ec| Ok(vec![ec.capture_exception(&op)?])))
        }
    }
}

fn compile_var(cp: &mut Compiler, name: &str, splice: bool, span: Span) -> EvalResult<ValuesOp> {
    cp.note_reference(name);

    enum Lookup {
        Env(String),
        Local(String),
        Up(String),
        Frame(String),
    }

    let lookup = if let Some(env) = name.strip_prefix("E:") {
        Lookup::Env(env.to_string())
    } else if let Some(local) = name.strip_prefix("local:") {
        Lookup::Local(local.to_string())
    } else if let Some(up) = name.strip_prefix("up:") {
        Lookup::Up(up.to_string())
    } else {
        Lookup::Frame(name.to_string())
    };

    Ok(ValuesOp::new(span, move |ec| {
        let value = match &lookup {
            Lookup::Env(name) => Value::str(std::env::var(name).unwrap_or_default()),
            Lookup::Local(name) => ec
                .local
                .get(name)
                .ok_or_else(|| Exception::new(Cause::UndefinedVariable(format!("local:{}", name))))?
                .get(),
            Lookup::Up(name) => ec
                .up
                .get(name)
                .ok_or_else(|| Exception::new(Cause::UndefinedVariable(format!("up:{}", name))))?
                .get(),
            Lookup::Frame(name) => ec
                .resolve(name)
                .ok_or_else(|| Exception::new(Cause::UndefinedVariable(name.clone())))?
                .get(),
        };
        if splice {
            match value {
                Value::List(items) => Ok(items.iter().cloned().collect()),
                other => Err(Exception::arg_kind(format!(
                    "cannot splice a {}",
                    other.kind()
                ))),
            }
        } else {
            Ok(vec![value])
        }
    }))
}

/// Compile a lambda literal. Option defaults are compiled in the enclosing
/// scope and evaluated when the closure value is constructed; the body gets
/// its own scope level whose free names become the capture set.
pub(crate) fn compile_lambda(
    cp: &mut Compiler,
    lambda: &Lambda,
    name: Option<&str>,
) -> EvalResult<ValuesOp> {
    let mut opt_default_ops = Vec::with_capacity(lambda.opts.len());
    for (key, compound) in &lambda.opts {
        opt_default_ops.push((key.clone(), single_value(compile_compound(cp, compound)?)));
    }
    let opt_names: Vec<String> = lambda.opts.iter().map(|(k, _)| k.clone()).collect();

    let (body, captures) =
        cp.in_lambda(&lambda.params, lambda.rest.as_ref(), &opt_names, &lambda.body)?;

    let params = lambda.params.clone();
    let rest = lambda.rest.clone();
    let display = name.map(str::to_string).unwrap_or_else(|| "<lambda>".to_string());

    Ok(ValuesOp::new(lambda.span, move |ec| {
        // Snapshot references to the captured slots, not their values:
        // mutations stay visible in both directions.
        let captured = Namespace::new();
        for cap in &captures {
            if let Some(slot) = ec.local.get(cap).or_else(|| ec.up.get(cap)) {
                captured.bind(cap.clone(), slot);
            }
        }
        let mut opt_defaults = Vec::with_capacity(opt_default_ops.len());
        for (key, op) in &opt_default_ops {
            opt_defaults.push((key.clone(), op.exec(ec)?));
        }
        Ok(vec![Value::fun(Arc::new(Closure {
            name: display.clone(),
            params: params.clone(),
            rest: rest.clone(),
            opt_defaults,
            body: body.clone(),
            captured,
        }))])
    }))
}

/// A compiled redirection.
pub(crate) struct RedirC {
    mode: RedirMode,
    fd: usize,
    target: SingleValueOp,
}

pub(crate) fn compile_redirs(cp: &mut Compiler, redirs: &[Redir]) -> EvalResult<Vec<RedirC>> {
    let mut out = Vec::with_capacity(redirs.len());
    for redir in redirs {
        out.push(RedirC {
            mode: redir.mode,
            fd: redir.fd,
            target: single_value(compile_compound(cp, &redir.target)?),
        });
    }
    Ok(out)
}

/// Rewire the context's ports per the compiled redirections. The caller is
/// responsible for restoring the saved ports afterwards.
pub(crate) fn apply_redirs(ec: &mut EvalCtx, redirs: &[RedirC]) -> EvalResult<()> {
    for redir in redirs {
        let target = redir.target.exec(ec)?;
        let port = redir_port(ec, redir.mode, &target)?;
        if ec.ports.len() <= redir.fd {
            ec.ports.resize_with(redir.fd + 1, Port::output_null);
        }
        ec.ports[redir.fd] = port;
    }
    Ok(())
}

fn redir_port(ec: &EvalCtx, mode: RedirMode, target: &Value) -> EvalResult<Port> {
    let reading = matches!(mode, RedirMode::Read | RedirMode::ReadWrite);
    let chan = if reading { Chan::Closed } else { Chan::Blackhole };
    let file = match target {
        Value::Str(path) => {
            let resolved = ec.evaler.resolve_path(path);
            let file = match mode {
                RedirMode::Read => std::fs::File::open(&resolved),
                RedirMode::Write => std::fs::File::create(&resolved),
                RedirMode::Append => {
                    std::fs::OpenOptions::new().create(true).append(true).open(&resolved)
                }
                RedirMode::ReadWrite => std::fs::OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(&resolved),
            }
            .map_err(|e| Exception::new(Cause::Io(format!("{}: {}", path, e))))?;
            PortFile::file(file)
        }
        Value::File(file) => PortFile::file(file.clone_handle()?),
        Value::Pipe(pipe) => match mode {
            RedirMode::Read => PortFile::pipe_read(pipe.clone_reader()?),
            RedirMode::Write | RedirMode::Append => PortFile::pipe_write(pipe.clone_writer()?),
            RedirMode::ReadWrite => {
                return Err(Exception::arg_kind("cannot open a pipe read-write"))
            }
        },
        other => {
            return Err(Exception::arg_kind(format!(
                "cannot redirect to a {}",
                other.kind()
            )))
        }
    };
    Ok(Port { file, chan })
}

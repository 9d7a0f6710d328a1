//! Assignment compilation.
//!
//! One code path serves plain, multi-target, spacey, and indexed
//! assignments; temporary assignments reuse it with a restore journal that
//! unwinds on every exit path, failures and control-flow markers included.

use rill_ast::{Assign, AssignTarget, Span};

use crate::exception::{Cause, EvalResult, Exception};
use crate::interp::{EvalCtx, Namespace, Slot};
use crate::value::Value;

use super::compound::{compile_compound, single_value, SingleValueOp};
use super::{Compiler, Op, ValuesOp};

enum TargetKind {
    /// `local:x` — a fresh slot in the current scope, unconditionally.
    Local(String),
    /// `up:x` — the nearest enclosing scope's slot; must exist.
    Up(String),
    /// `E:NAME` — the process environment.
    Env(String),
    /// Unqualified or module-qualified: nearest scope that binds the name,
    /// else a fresh local slot.
    Plain(String),
}

struct TargetC {
    kind: TargetKind,
    indices: Vec<SingleValueOp>,
    rest: bool,
}

/// A journal entry undoing one effect of a temporary assignment.
enum Restore {
    /// Put a previous value back into a surviving slot.
    SlotValue { slot: Slot, old: Value },
    /// Re-bind (or unbind) a name in a namespace, preserving slot identity.
    Binding { ns: Namespace, name: String, old: Option<Slot> },
    /// Restore an environment variable.
    Env { name: String, old: Option<String> },
}

pub(crate) fn compile_assign(cp: &mut Compiler, assign: &Assign) -> EvalResult<Op> {
    let targets = compile_targets(cp, &assign.targets)?;
    let values = compile_values(cp, &assign.values)?;
    Ok(Op::new(assign.span, move |ec| {
        let vals = eval_values(ec, &values)?;
        bind_all(ec, &targets, vals, &mut None)
    }))
}

/// Wrap `inner` with one or more temporary assignments. The restores run in
/// reverse order whether `inner` succeeds, fails, or unwinds a control-flow
/// marker.
pub(crate) fn compile_temp_assigns(
    cp: &mut Compiler,
    assigns: &[Assign],
    inner: Op,
    span: Span,
) -> EvalResult<Op> {
    let mut compiled = Vec::with_capacity(assigns.len());
    for assign in assigns {
        let targets = compile_targets(cp, &assign.targets)?;
        let values = compile_values(cp, &assign.values)?;
        compiled.push((targets, values));
    }
    Ok(Op::new(span, move |ec| {
        let mut restores = Some(Vec::new());
        for (targets, values) in &compiled {
            let installed = eval_values(ec, values)
                .and_then(|vals| bind_all(ec, targets, vals, &mut restores));
            if let Err(e) = installed {
                undo(restores.take().unwrap_or_default());
                return Err(e);
            }
        }
        let result = inner.exec(ec);
        undo(restores.take().unwrap_or_default());
        result
    }))
}

fn compile_targets(cp: &mut Compiler, targets: &[AssignTarget]) -> EvalResult<Vec<TargetC>> {
    if targets.iter().filter(|t| t.rest).count() > 1 {
        return Err(Exception::compile("multiple rest targets in one assignment"));
    }
    let mut out = Vec::with_capacity(targets.len());
    for target in targets {
        cp.note_assign_target(&target.name);
        let kind = if let Some(name) = target.name.strip_prefix("local:") {
            TargetKind::Local(name.to_string())
        } else if let Some(name) = target.name.strip_prefix("up:") {
            TargetKind::Up(name.to_string())
        } else if let Some(name) = target.name.strip_prefix("E:") {
            TargetKind::Env(name.to_string())
        } else {
            TargetKind::Plain(target.name.clone())
        };
        let mut indices = Vec::with_capacity(target.indices.len());
        for index in &target.indices {
            indices.push(single_value(compile_compound(cp, index)?));
        }
        out.push(TargetC { kind, indices, rest: target.rest });
    }
    Ok(out)
}

fn compile_values(
    cp: &mut Compiler,
    values: &[rill_ast::Compound],
) -> EvalResult<Vec<ValuesOp>> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        out.push(compile_compound(cp, value)?);
    }
    Ok(out)
}

fn eval_values(ec: &mut EvalCtx, ops: &[ValuesOp]) -> EvalResult<Vec<Value>> {
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        out.extend(op.exec(ec)?);
    }
    Ok(out)
}

fn bind_all(
    ec: &mut EvalCtx,
    targets: &[TargetC],
    values: Vec<Value>,
    restores: &mut Option<Vec<Restore>>,
) -> EvalResult {
    let non_rest = targets.iter().filter(|t| !t.rest).count();
    let has_rest = targets.iter().any(|t| t.rest);
    if (has_rest && values.len() < non_rest) || (!has_rest && values.len() != non_rest) {
        return Err(Exception::arity(format!(
            "assignment of {} value(s) to {} target(s)",
            values.len(),
            targets.len()
        )));
    }

    let rest_len = values.len() - non_rest;
    let mut values = values.into_iter();
    for target in targets {
        let value = if target.rest {
            Value::list(values.by_ref().take(rest_len).collect::<Vec<_>>())
        } else {
            values.next().expect("arity checked above")
        };
        bind_one(ec, target, value, restores)?;
    }
    Ok(())
}

fn bind_one(
    ec: &mut EvalCtx,
    target: &TargetC,
    value: Value,
    restores: &mut Option<Vec<Restore>>,
) -> EvalResult {
    let mut indices = Vec::with_capacity(target.indices.len());
    for index in &target.indices {
        indices.push(index.exec(ec)?);
    }

    match &target.kind {
        TargetKind::Env(name) => {
            if !indices.is_empty() {
                return Err(Exception::arg_kind("cannot index an environment variable"));
            }
            if let Some(journal) = restores {
                journal.push(Restore::Env {
                    name: name.clone(),
                    old: std::env::var(name).ok(),
                });
            }
            std::env::set_var(name, value.to_display());
            Ok(())
        }
        TargetKind::Local(name) => {
            if indices.is_empty() {
                if let Some(journal) = restores {
                    journal.push(Restore::Binding {
                        ns: ec.local.clone(),
                        name: name.clone(),
                        old: ec.local.get(name),
                    });
                }
                ec.local.define(name.clone(), value);
                Ok(())
            } else {
                let slot = ec.local.get(name).ok_or_else(|| {
                    Exception::new(Cause::UndefinedVariable(format!("local:{}", name)))
                })?;
                set_slot(&slot, &indices, value, restores)
            }
        }
        TargetKind::Up(name) => {
            let slot = ec.up.get(name).ok_or_else(|| {
                Exception::new(Cause::UndefinedVariable(format!("up:{}", name)))
            })?;
            set_slot(&slot, &indices, value, restores)
        }
        TargetKind::Plain(name) => {
            match ec.local.get(name).or_else(|| ec.up.get(name)) {
                Some(slot) => set_slot(&slot, &indices, value, restores),
                None if indices.is_empty() => {
                    if let Some(journal) = restores {
                        journal.push(Restore::Binding {
                            ns: ec.local.clone(),
                            name: name.clone(),
                            old: None,
                        });
                    }
                    ec.local.define(name.clone(), value);
                    Ok(())
                }
                None => Err(Exception::new(Cause::UndefinedVariable(name.clone()))),
            }
        }
    }
}

fn set_slot(
    slot: &Slot,
    indices: &[Value],
    value: Value,
    restores: &mut Option<Vec<Restore>>,
) -> EvalResult {
    if let Some(journal) = restores {
        journal.push(Restore::SlotValue { slot: slot.clone(), old: slot.get() });
    }
    if indices.is_empty() {
        slot.set(value);
    } else {
        let updated = assoc_path(&slot.get(), indices, value)?;
        slot.set(updated);
    }
    Ok(())
}

/// Indexed assignment is sugar for nested functional updates: the rebinding
/// lands in whichever slot owns the outermost container.
fn assoc_path(base: &Value, path: &[Value], value: Value) -> EvalResult<Value> {
    if path.len() == 1 {
        base.assoc(&path[0], value)
    } else {
        let inner = base.index(&path[0])?;
        let updated = assoc_path(&inner, &path[1..], value)?;
        base.assoc(&path[0], updated)
    }
}

fn undo(restores: Vec<Restore>) {
    for restore in restores.into_iter().rev() {
        match restore {
            Restore::SlotValue { slot, old } => slot.set(old),
            Restore::Binding { ns, name, old } => match old {
                Some(slot) => ns.bind(name, slot),
                None => {
                    ns.remove(&name);
                }
            },
            Restore::Env { name, old } => match old {
                Some(value) => std::env::set_var(&name, value),
                None => std::env::remove_var(&name),
            },
        }
    }
}

/// Resolve a loop variable: the nearest scope that binds it, else a fresh
/// local slot.
pub(crate) fn find_or_create(ec: &EvalCtx, name: &str) -> Slot {
    ec.local
        .get(name)
        .or_else(|| ec.up.get(name))
        .unwrap_or_else(|| ec.local.define(name.to_string(), Value::str("")))
}

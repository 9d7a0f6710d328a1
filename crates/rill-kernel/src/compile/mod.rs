//! The compiler: lowers AST nodes into executable ops.
//!
//! An [`Op`] is a closure over the lexical skeleton built at compile time;
//! invoking it with a runtime context executes its effect. [`ValuesOp`] is
//! the value-producing variant used for compound words and conditions.
//!
//! Compilation tracks a stack of static scopes. Every lambda pushes a
//! level; free variables that resolve to an enclosing level are recorded
//! as upvalues, and the lambda op snapshots references to those slots when
//! the closure value is constructed.

mod assign;
mod compound;

use std::collections::HashSet;
use std::sync::Arc;

use rill_ast::{Chunk, Cmd, ExceptArm, Form, FormKind, IfArm, Pipeline, Span};
use tracing::trace;

use crate::exception::{Cause, EvalResult, Exception};
use crate::fun::Fun;
use crate::interp::{EvalCtx, Evaler};
use crate::value::Value;
use crate::{modules, sched};

pub(crate) use assign::{compile_assign, compile_temp_assigns};
pub(crate) use compound::{compile_compound, compile_lambda, single_value};

/// A compiled, side-effecting procedure bound to source offsets.
#[derive(Clone)]
pub struct Op {
    func: Arc<dyn Fn(&mut EvalCtx) -> EvalResult + Send + Sync>,
    pub begin: usize,
    pub end: usize,
}

impl Op {
    pub fn new(
        span: Span,
        f: impl Fn(&mut EvalCtx) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        Self { func: Arc::new(f), begin: span.begin, end: span.end }
    }

    pub fn exec(&self, ec: &mut EvalCtx) -> EvalResult {
        ec.span = (self.begin, self.end);
        (self.func)(ec)
    }
}

/// A compiled procedure that produces values.
#[derive(Clone)]
pub struct ValuesOp {
    func: Arc<dyn Fn(&mut EvalCtx) -> EvalResult<Vec<Value>> + Send + Sync>,
    pub begin: usize,
    pub end: usize,
}

impl ValuesOp {
    pub fn new(
        span: Span,
        f: impl Fn(&mut EvalCtx) -> EvalResult<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self { func: Arc::new(f), begin: span.begin, end: span.end }
    }

    pub fn exec(&self, ec: &mut EvalCtx) -> EvalResult<Vec<Value>> {
        ec.span = (self.begin, self.end);
        (self.func)(ec)
    }
}

/// Compile a top-level chunk. The static scope is seeded with the names
/// already present in the evaler's global namespace, so closures compiled
/// in a later evaluation capture slots defined in an earlier one.
pub(crate) fn compile(
    chunk: &Chunk,
    name: &str,
    _text: &str,
    evaler: &Evaler,
) -> EvalResult<Op> {
    let mut cp = Compiler::new();
    for (global, _) in evaler.global.entries() {
        cp.declare(&global);
    }
    trace!(name, "compile chunk");
    cp.chunk(chunk)
}

/// Compile a module body: same pass, empty root scope.
pub(crate) fn compile_module(chunk: &Chunk, name: &str, _text: &str) -> EvalResult<Op> {
    let mut cp = Compiler::new();
    trace!(name, "compile module");
    cp.chunk(chunk)
}

/// Where a name resolved during compilation.
enum VarWhere {
    /// Declared in the innermost lambda scope (or at the top level when
    /// compiling top-level code).
    Here,
    /// Declared in an enclosing lambda scope; recorded as an upvalue.
    Capture,
    /// Unknown at compile time; resolved against the frame at run time.
    Dynamic,
}

/// One static scope level. Level 0 is the top of the compilation unit;
/// every lambda pushes a new level with its own capture set.
struct ScopeLevel {
    names: HashSet<String>,
    use_prefixes: HashSet<String>,
    captures: HashSet<String>,
}

impl ScopeLevel {
    fn new() -> Self {
        Self { names: HashSet::new(), use_prefixes: HashSet::new(), captures: HashSet::new() }
    }

    fn binds(&self, name: &str) -> bool {
        if self.names.contains(name) {
            return true;
        }
        self.use_prefixes
            .iter()
            .any(|p| name.len() > p.len() + 1 && name.starts_with(p) && name.as_bytes()[p.len()] == b':')
    }
}

pub(crate) struct Compiler {
    scopes: Vec<ScopeLevel>,
}

impl Compiler {
    fn new() -> Self {
        Self { scopes: vec![ScopeLevel::new()] }
    }

    /// Record a name as declared in the innermost scope.
    pub(crate) fn declare(&mut self, name: &str) {
        if let Some(level) = self.scopes.last_mut() {
            level.names.insert(name.to_string());
        }
    }

    /// Record a module prefix bound by `use` in the innermost scope.
    pub(crate) fn declare_use_prefix(&mut self, prefix: &str) {
        if let Some(level) = self.scopes.last_mut() {
            level.use_prefixes.insert(prefix.to_string());
        }
    }

    /// Resolve a name against the static scopes, marking it as an upvalue
    /// in every lambda boundary it crosses.
    fn note_var(&mut self, name: &str) -> VarWhere {
        let top = self.scopes.len() - 1;
        for depth in (0..=top).rev() {
            if self.scopes[depth].binds(name) {
                if depth == top {
                    return VarWhere::Here;
                }
                for level in &mut self.scopes[depth + 1..] {
                    level.captures.insert(name.to_string());
                }
                return VarWhere::Capture;
            }
        }
        VarWhere::Dynamic
    }

    /// Like [`note_var`](Self::note_var), but skips the innermost scope:
    /// used for explicit `up:` references, which must come from an
    /// enclosing scope even when the name is shadowed locally.
    fn note_var_up(&mut self, name: &str) {
        let top = self.scopes.len() - 1;
        for depth in (0..top).rev() {
            if self.scopes[depth].binds(name) {
                for level in &mut self.scopes[depth + 1..] {
                    level.captures.insert(name.to_string());
                }
                return;
            }
        }
    }

    /// Track whether a name reference should be captured; shared by reads
    /// and assignments.
    pub(crate) fn note_reference(&mut self, name: &str) {
        if let Some(stripped) = name.strip_prefix("up:") {
            self.note_var_up(stripped);
        } else if let Some(stripped) = name.strip_prefix("local:") {
            self.declare(stripped);
        } else if !name.starts_with("E:") {
            let _ = self.note_var(name);
        }
    }

    /// Note an assignment target: unqualified names unknown to any scope
    /// are declared in the innermost one.
    pub(crate) fn note_assign_target(&mut self, name: &str) {
        if name.starts_with("E:") {
            return;
        }
        if let Some(stripped) = name.strip_prefix("local:") {
            self.declare(stripped);
            return;
        }
        if let Some(stripped) = name.strip_prefix("up:") {
            self.note_var_up(stripped);
            return;
        }
        if matches!(self.note_var(name), VarWhere::Dynamic) && !name.contains(':') {
            self.declare(name);
        }
    }

    fn push_lambda(&mut self) {
        self.scopes.push(ScopeLevel::new());
    }

    fn pop_lambda(&mut self) -> Vec<String> {
        let level = self.scopes.pop().expect("scope stack underflow");
        let mut captures: Vec<String> = level.captures.into_iter().collect();
        captures.sort();
        captures
    }

    /// Compile a lambda body inside a fresh scope level, returning the body
    /// op and the sorted capture set.
    pub(crate) fn in_lambda(
        &mut self,
        params: &[String],
        rest: Option<&String>,
        opt_names: &[String],
        body: &Chunk,
    ) -> EvalResult<(Op, Vec<String>)> {
        self.push_lambda();
        for p in params {
            self.declare(p);
        }
        if let Some(r) = rest {
            self.declare(r);
        }
        for o in opt_names {
            self.declare(o);
        }
        let result = self.chunk(body);
        let captures = self.pop_lambda();
        Ok((result?, captures))
    }

    /// Compile a chunk: pipelines in order, abort on first failure.
    pub(crate) fn chunk(&mut self, chunk: &Chunk) -> EvalResult<Op> {
        let mut ops = Vec::with_capacity(chunk.pipelines.len());
        for pipeline in &chunk.pipelines {
            ops.push(self.pipeline(pipeline)?);
        }
        Ok(Op::new(chunk.span, move |ec| {
            for op in &ops {
                op.exec(ec)?;
            }
            Ok(())
        }))
    }

    /// Compile a pipeline: one form runs inline, several run in parallel
    /// with ports wired between neighbours.
    fn pipeline(&mut self, pipeline: &Pipeline) -> EvalResult<Op> {
        let mut ops = Vec::with_capacity(pipeline.forms.len());
        for form in &pipeline.forms {
            ops.push(self.form(form)?);
        }
        if ops.len() == 1 {
            return Ok(ops.into_iter().next().expect("one op"));
        }
        Ok(Op::new(pipeline.span, move |ec| sched::run_pipeline(ec, &ops)))
    }

    /// Compile a form: kind core, wrapped by redirections, wrapped by
    /// temporary assignments, wrapped by traceback annotation.
    pub(crate) fn form(&mut self, form: &Form) -> EvalResult<Op> {
        let core = self.form_kind(&form.kind, form.span)?;

        let with_redirs = if form.redirs.is_empty() {
            core
        } else {
            let redirs = compound::compile_redirs(self, &form.redirs)?;
            Op::new(form.span, move |ec| {
                let saved = ec.ports.clone();
                let result = compound::apply_redirs(ec, &redirs)
                    .and_then(|()| core.exec(ec));
                ec.ports = saved;
                result
            })
        };

        let with_temp = if form.temp_assigns.is_empty() {
            with_redirs
        } else {
            compile_temp_assigns(self, &form.temp_assigns, with_redirs, form.span)?
        };

        let (begin, end) = (form.span.begin, form.span.end);
        Ok(Op::new(form.span, move |ec| {
            with_temp.exec(ec).map_err(|e| {
                if e.traceback.is_empty() && !e.is_control_flow() && !e.is_port_closed() {
                    e.at(&ec.name, begin, end)
                } else {
                    e
                }
            })
        }))
    }

    fn form_kind(&mut self, kind: &FormKind, span: Span) -> EvalResult<Op> {
        match kind {
            FormKind::Cmd(cmd) => self.cmd(cmd, span),
            FormKind::Assign(assign) => compile_assign(self, assign),
            FormKind::If { arms, alt } => self.if_form(arms, alt.as_ref(), span),
            FormKind::While { cond, body, alt } => self.while_form(cond, body, alt.as_ref(), span),
            FormKind::For { var, seq, body, alt } => {
                self.for_form(var, seq, body, alt.as_ref(), span)
            }
            FormKind::Try { body, except, alt } => {
                self.try_form(body, except.as_ref(), alt.as_ref(), span)
            }
            FormKind::Fn { name, lambda } => {
                let fn_slot = format!("{}~", name);
                let lambda_op = single_value(compile_lambda(self, lambda, Some(name))?);
                self.declare(&fn_slot);
                Ok(Op::new(span, move |ec| {
                    let closure = lambda_op.exec(ec)?;
                    ec.local.define(fn_slot.clone(), closure);
                    Ok(())
                }))
            }
            FormKind::Use { spec } => {
                let prefix = spec.rsplit('/').next().unwrap_or(spec).to_string();
                self.declare_use_prefix(&prefix);
                let spec = spec.clone();
                Ok(Op::new(span, move |ec| modules::use_module(ec, &spec)))
            }
            FormKind::Del { targets } => self.del_form(targets, span),
        }
    }

    /// Compile an ordinary command form.
    fn cmd(&mut self, cmd: &Cmd, span: Span) -> EvalResult<Op> {
        let head = self.head(&cmd.head)?;

        let mut arg_ops = Vec::with_capacity(cmd.args.len());
        for arg in &cmd.args {
            arg_ops.push(compile_compound(self, arg)?);
        }
        let mut opt_ops = Vec::with_capacity(cmd.opts.len());
        for (name, compound) in &cmd.opts {
            opt_ops.push((name.clone(), single_value(compile_compound(self, compound)?)));
        }

        Ok(Op::new(span, move |ec| {
            let mut args = Vec::new();
            for op in &arg_ops {
                args.extend(op.exec(ec)?);
            }
            let mut opts = std::collections::HashMap::new();
            for (name, op) in &opt_ops {
                opts.insert(name.clone(), op.exec(ec)?);
            }
            match &head {
                Head::External(name) => sched::exec_external(ec, name, &args),
                Head::Word(word) => invoke_value(ec, &Value::str(word.clone()), args, opts),
                Head::Dynamic(op) => {
                    let callee = op.exec(ec)?;
                    invoke_value(ec, &callee, args, opts)
                }
            }
        }))
    }

    fn head(&mut self, head: &rill_ast::Compound) -> EvalResult<Head> {
        if head.parts.len() == 1 {
            if let rill_ast::Primary::Str(word) = &head.parts[0] {
                if let Some(external) = word.strip_prefix("e:") {
                    return Ok(Head::External(external.to_string()));
                }
                self.note_reference(&format!("{}~", word));
                return Ok(Head::Word(word.clone()));
            }
        }
        Ok(Head::Dynamic(single_value(compile_compound(self, head)?)))
    }

    fn if_form(&mut self, arms: &[IfArm], alt: Option<&Chunk>, span: Span) -> EvalResult<Op> {
        let mut compiled = Vec::with_capacity(arms.len());
        for arm in arms {
            let cond = compile_compound(self, &arm.cond)?;
            let body = self.chunk(&arm.body)?;
            compiled.push((cond, body));
        }
        let alt = match alt {
            Some(chunk) => Some(self.chunk(chunk)?),
            None => None,
        };
        Ok(Op::new(span, move |ec| {
            for (cond, body) in &compiled {
                if truthy(&cond.exec(ec)?) {
                    return body.exec(ec);
                }
            }
            match &alt {
                Some(body) => body.exec(ec),
                None => Ok(()),
            }
        }))
    }

    fn while_form(
        &mut self,
        cond: &rill_ast::Compound,
        body: &Chunk,
        alt: Option<&Chunk>,
        span: Span,
    ) -> EvalResult<Op> {
        let cond = compile_compound(self, cond)?;
        let body = self.chunk(body)?;
        let alt = match alt {
            Some(chunk) => Some(self.chunk(chunk)?),
            None => None,
        };
        Ok(Op::new(span, move |ec| {
            let mut ran = false;
            while truthy(&cond.exec(ec)?) {
                ran = true;
                match body.exec(ec) {
                    Ok(()) => {}
                    Err(e) if matches!(e.cause, Cause::Break) => return Ok(()),
                    Err(e) if matches!(e.cause, Cause::Continue) => continue,
                    Err(e) => return Err(e),
                }
            }
            match &alt {
                Some(body) if !ran => body.exec(ec),
                _ => Ok(()),
            }
        }))
    }

    fn for_form(
        &mut self,
        var: &str,
        seq: &rill_ast::Compound,
        body: &Chunk,
        alt: Option<&Chunk>,
        span: Span,
    ) -> EvalResult<Op> {
        let seq = single_value(compile_compound(self, seq)?);
        self.note_reference(var);
        self.declare(var);
        let var = var.to_string();
        let body = self.chunk(body)?;
        let alt = match alt {
            Some(chunk) => Some(self.chunk(chunk)?),
            None => None,
        };
        Ok(Op::new(span, move |ec| {
            let seq = match seq.exec(ec)? {
                Value::List(items) => items,
                other => {
                    return Err(Exception::arg_kind(format!(
                        "cannot iterate a {}",
                        other.kind()
                    )))
                }
            };
            let slot = assign::find_or_create(ec, &var);
            let mut ran = false;
            for item in seq.iter() {
                ran = true;
                slot.set(item.clone());
                match body.exec(ec) {
                    Ok(()) => {}
                    Err(e) if matches!(e.cause, Cause::Break) => return Ok(()),
                    Err(e) if matches!(e.cause, Cause::Continue) => continue,
                    Err(e) => return Err(e),
                }
            }
            match &alt {
                Some(body) if !ran => body.exec(ec),
                _ => Ok(()),
            }
        }))
    }

    fn try_form(
        &mut self,
        body: &Chunk,
        except: Option<&ExceptArm>,
        alt: Option<&Chunk>,
        span: Span,
    ) -> EvalResult<Op> {
        let body = self.chunk(body)?;
        let except = match except {
            Some(arm) => {
                if let Some(var) = &arm.var {
                    self.declare(var);
                }
                Some((arm.var.clone(), self.chunk(&arm.body)?))
            }
            None => None,
        };
        let alt = match alt {
            Some(chunk) => Some(self.chunk(chunk)?),
            None => None,
        };
        Ok(Op::new(span, move |ec| {
            match body.exec(ec) {
                Ok(()) => match &alt {
                    Some(body) => body.exec(ec),
                    None => Ok(()),
                },
                Err(e) if e.is_control_flow() => Err(e),
                Err(e) => match &except {
                    Some((var, handler)) => {
                        if let Some(var) = var {
                            ec.local.define(var.clone(), e.into_value());
                        }
                        handler.exec(ec)
                    }
                    None => Err(e),
                },
            }
        }))
    }

    fn del_form(&mut self, targets: &[String], span: Span) -> EvalResult<Op> {
        let targets = targets.to_vec();
        Ok(Op::new(span, move |ec| {
            for target in &targets {
                if let Some(env) = target.strip_prefix("E:") {
                    std::env::remove_var(env);
                } else if ec.local.remove(target).is_none() {
                    return Err(Exception::new(Cause::UndefinedVariable(target.clone())));
                }
            }
            Ok(())
        }))
    }
}

enum Head {
    /// `e:cmd` — always an external command.
    External(String),
    /// A bare word: function if `word~` resolves, external otherwise.
    Word(String),
    /// Anything else: evaluated to a callable or a command name.
    Dynamic(compound::SingleValueOp),
}

/// A condition holds when every produced value is truthy.
fn truthy(values: &[Value]) -> bool {
    values.iter().all(Value::as_bool)
}

/// Invoke a callable value: a function directly, or a string resolved
/// through the `name~` convention and falling back to an external command.
pub(crate) fn invoke_value(
    ec: &mut EvalCtx,
    callee: &Value,
    args: Vec<Value>,
    opts: std::collections::HashMap<String, Value>,
) -> EvalResult {
    match callee {
        Value::Fn(f) => f.call(ec, args, opts),
        Value::Str(name) => match ec.resolve(&format!("{}~", name)) {
            Some(slot) => match slot.get() {
                Value::Fn(f) => f.call(ec, args, opts),
                other => Err(Exception::new(Cause::NotCallable(other.repr()))),
            },
            None => {
                if !opts.is_empty() {
                    return Err(Exception::arg_kind("external commands take no options"));
                }
                sched::exec_external(ec, name, &args)
            }
        },
        other => Err(Exception::new(Cause::NotCallable(other.repr()))),
    }
}

/// Apply a callable to arguments without options, used by builtins that
/// take function arguments (`each`).
pub(crate) fn call_value(ec: &mut EvalCtx, callee: &Value, args: Vec<Value>) -> EvalResult {
    invoke_value(ec, callee, args, std::collections::HashMap::new())
}

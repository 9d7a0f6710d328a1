//! Shared test harness.
//!
//! Tests build ASTs through the helpers below (the parser is an external
//! collaborator) and run them through an `Evaler`, collecting the value
//! channel, the byte stream, and the result.

#![allow(dead_code, unused_imports)]

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use rill_ast::{
    Assign, AssignTarget, Chunk, Cmd, Compound, ExceptArm, Form, FormKind, IfArm, Lambda,
    Pipeline, Primary, Redir, RedirMode,
};
use rill_kernel::{Chan, Evaler, Exception, Port, PortFile, SourceParser, Value};

/// Everything observable from one evaluation.
pub struct Outcome {
    pub values: Vec<Value>,
    pub bytes: Vec<u8>,
    pub result: Result<(), Exception>,
}

impl Outcome {
    pub fn ok(&self) -> &Self {
        if let Err(e) = &self.result {
            panic!("evaluation failed: {}", e);
        }
        self
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

pub fn evaler_in(data_dir: &Path) -> Arc<Evaler> {
    Arc::new(Evaler::new(data_dir, Arc::new(StubParser)))
}

pub fn evaler() -> Arc<Evaler> {
    evaler_in(Path::new("/nonexistent-data-dir"))
}

/// Evaluate one chunk against a fresh evaler.
pub fn eval(chunk: Chunk) -> Outcome {
    eval_chunks(&evaler(), vec![chunk])
}

/// Install a `RUST_LOG`-driven subscriber once, so failing tests can be
/// rerun with tracing enabled.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

/// Evaluate chunks in order against one evaler, sharing its global frame.
/// Collects channel values, byte output, and the last chunk's result.
pub fn eval_chunks(ev: &Arc<Evaler>, chunks: Vec<Chunk>) -> Outcome {
    init_logging();
    let (tx, rx) = crossbeam_channel::bounded(1024);
    let (reader, writer) = std::io::pipe().expect("pipe");

    let value_thread = thread::spawn(move || {
        let mut values = Vec::new();
        while let Ok(v) = rx.recv() {
            values.push(v);
        }
        values
    });
    let byte_thread = thread::spawn(move || {
        let mut reader = reader;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).ok();
        bytes
    });

    let out = Port { file: PortFile::pipe_write(writer), chan: Chan::Send(tx) };
    let mut result = Ok(());
    for chunk in &chunks {
        match ev.compile(chunk, "<test>", "") {
            Ok(op) => {
                let ports = vec![Port::input_closed(), out.clone(), Port::output_null()];
                result = ev.eval(&op, ports, "<test>", "");
            }
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    drop(out);

    let values = value_thread.join().expect("value collector");
    let bytes = byte_thread.join().expect("byte collector");
    Outcome { values, bytes, result }
}

pub fn strs(items: &[&str]) -> Vec<Value> {
    items.iter().map(|s| Value::str(*s)).collect()
}

pub fn bools(items: &[bool]) -> Vec<Value> {
    items.iter().map(|b| Value::Bool(*b)).collect()
}

// ---------------------------------------------------------------------------
// AST builders
// ---------------------------------------------------------------------------

pub fn ch(pipelines: Vec<Pipeline>) -> Chunk {
    Chunk::new(pipelines)
}

/// A single-form pipeline.
pub fn p1(form: Form) -> Pipeline {
    Pipeline::new(vec![form])
}

pub fn pl(forms: Vec<Form>) -> Pipeline {
    Pipeline::new(forms)
}

/// `head arg…`
pub fn cmd(head: &str, args: Vec<Compound>) -> Form {
    Form::new(FormKind::Cmd(Cmd { head: Compound::word(head), args, opts: Vec::new() }))
}

/// `head arg… &opt=value…`
pub fn cmdo(head: &str, args: Vec<Compound>, opts: Vec<(&str, Compound)>) -> Form {
    let opts = opts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Form::new(FormKind::Cmd(Cmd { head: Compound::word(head), args, opts }))
}

/// A form with a computed head, e.g. `$f` or `{ … }`.
pub fn cmdc(head: Compound, args: Vec<Compound>) -> Form {
    Form::new(FormKind::Cmd(Cmd { head, args, opts: Vec::new() }))
}

/// A computed-head form with options.
pub fn cmdco(head: Compound, args: Vec<Compound>, opts: Vec<(&str, Compound)>) -> Form {
    let opts = opts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Form::new(FormKind::Cmd(Cmd { head, args, opts }))
}

/// Bare word.
pub fn w(s: &str) -> Compound {
    Compound::word(s)
}

/// `$name`
pub fn v(name: &str) -> Compound {
    Compound::var(name)
}

/// `$@name`
pub fn vs(name: &str) -> Compound {
    Compound::new(vec![Primary::Var { name: name.to_string(), splice: true }])
}

/// Multi-part compound word.
pub fn parts(parts: Vec<Primary>) -> Compound {
    Compound::new(parts)
}

pub fn pstr(s: &str) -> Primary {
    Primary::Str(s.to_string())
}

pub fn pvar(name: &str) -> Primary {
    Primary::Var { name: name.to_string(), splice: false }
}

pub fn braced(alts: Vec<Compound>) -> Primary {
    Primary::Braced(alts)
}

/// `[a b c]`
pub fn list(items: Vec<Compound>) -> Compound {
    Compound::new(vec![Primary::List(items)])
}

/// `[&k=v …]`
pub fn map(pairs: Vec<(Compound, Compound)>) -> Compound {
    Compound::new(vec![Primary::Map(pairs)])
}

/// `[]{ body }`
pub fn lam(body: Vec<Pipeline>) -> Compound {
    Compound::new(vec![Primary::Lambda(Lambda::new(Vec::new(), ch(body)))])
}

/// `[params]{ body }`
pub fn lamp(params: Vec<&str>, body: Vec<Pipeline>) -> Compound {
    let params = params.into_iter().map(str::to_string).collect();
    Compound::new(vec![Primary::Lambda(Lambda::new(params, ch(body)))])
}

/// `[params @rest &opts]{ body }`
pub fn lam_full(
    params: Vec<&str>,
    rest: Option<&str>,
    opts: Vec<(&str, Compound)>,
    body: Vec<Pipeline>,
) -> Compound {
    let mut lambda = Lambda::new(params.into_iter().map(str::to_string).collect(), ch(body));
    lambda.rest = rest.map(str::to_string);
    lambda.opts = opts.into_iter().map(|(k, c)| (k.to_string(), c)).collect();
    Compound::new(vec![Primary::Lambda(lambda)])
}

/// `( pipelines )`
pub fn ocap(pipelines: Vec<Pipeline>) -> Compound {
    Compound::new(vec![Primary::OutputCapture(ch(pipelines))])
}

/// `?( pipelines )`
pub fn ecap(pipelines: Vec<Pipeline>) -> Compound {
    Compound::new(vec![Primary::ErrorCapture(ch(pipelines))])
}

/// `$name[i]…`
pub fn vidx(name: &str, indices: Vec<Compound>) -> Compound {
    Compound::new(vec![Primary::Index {
        head: Box::new(Primary::Var { name: name.to_string(), splice: false }),
        indices,
    }])
}

/// Index a literal primary, e.g. `[a b c][2]`.
pub fn pidx(head: Primary, indices: Vec<Compound>) -> Compound {
    Compound::new(vec![Primary::Index { head: Box::new(head), indices }])
}

pub fn plist(items: Vec<Compound>) -> Primary {
    Primary::List(items)
}

pub fn pmap(pairs: Vec<(Compound, Compound)>) -> Primary {
    Primary::Map(pairs)
}

/// A wildcard word.
pub fn wild(pattern: &str, nomatch_ok: bool) -> Compound {
    Compound::new(vec![Primary::Wildcard { pattern: pattern.to_string(), nomatch_ok }])
}

pub fn tilde() -> Primary {
    Primary::Tilde
}

/// `name = value`
pub fn set(name: &str, value: Compound) -> Form {
    Form::new(FormKind::Assign(Assign::new(
        vec![AssignTarget::plain(name)],
        vec![value],
    )))
}

/// Multi-target assignment.
pub fn set_many(targets: Vec<AssignTarget>, values: Vec<Compound>) -> Form {
    Form::new(FormKind::Assign(Assign::new(targets, values)))
}

/// `name[i]… = value`
pub fn set_idx(name: &str, indices: Vec<Compound>, value: Compound) -> Form {
    Form::new(FormKind::Assign(Assign::new(
        vec![AssignTarget::indexed(name, indices)],
        vec![value],
    )))
}

/// Build an assignment node for use as a temporary.
pub fn assign(name: &str, value: Compound) -> Assign {
    Assign::new(vec![AssignTarget::plain(name)], vec![value])
}

pub fn assign_idx(name: &str, indices: Vec<Compound>, value: Compound) -> Assign {
    Assign::new(vec![AssignTarget::indexed(name, indices)], vec![value])
}

pub fn assign_many(targets: Vec<AssignTarget>, values: Vec<Compound>) -> Assign {
    Assign::new(targets, values)
}

/// Attach temporary assignments to a form.
pub fn temp(assigns: Vec<Assign>, form: Form) -> Form {
    form.with_temp(assigns)
}

/// `fn name [params]{ body }`
pub fn fn_form(name: &str, params: Vec<&str>, body: Vec<Pipeline>) -> Form {
    let params = params.into_iter().map(str::to_string).collect();
    Form::new(FormKind::Fn {
        name: name.to_string(),
        lambda: Lambda::new(params, ch(body)),
    })
}

pub fn if_form(arms: Vec<(Compound, Vec<Pipeline>)>, alt: Option<Vec<Pipeline>>) -> Form {
    Form::new(FormKind::If {
        arms: arms
            .into_iter()
            .map(|(cond, body)| IfArm { cond, body: ch(body) })
            .collect(),
        alt: alt.map(ch),
    })
}

pub fn while_form(cond: Compound, body: Vec<Pipeline>) -> Form {
    Form::new(FormKind::While { cond, body: ch(body), alt: None })
}

pub fn for_form(
    var: &str,
    seq: Compound,
    body: Vec<Pipeline>,
    alt: Option<Vec<Pipeline>>,
) -> Form {
    Form::new(FormKind::For {
        var: var.to_string(),
        seq,
        body: ch(body),
        alt: alt.map(ch),
    })
}

pub fn try_form(
    body: Vec<Pipeline>,
    except: Option<(Option<&str>, Vec<Pipeline>)>,
    alt: Option<Vec<Pipeline>>,
) -> Form {
    Form::new(FormKind::Try {
        body: ch(body),
        except: except.map(|(var, body)| ExceptArm {
            var: var.map(str::to_string),
            body: ch(body),
        }),
        alt: alt.map(ch),
    })
}

pub fn use_form(spec: &str) -> Form {
    Form::new(FormKind::Use { spec: spec.to_string() })
}

pub fn del_form(targets: Vec<&str>) -> Form {
    Form::new(FormKind::Del { targets: targets.into_iter().map(str::to_string).collect() })
}

/// Attach redirections to a form.
pub fn redirected(form: Form, redirs: Vec<Redir>) -> Form {
    form.with_redirs(redirs)
}

pub fn rd(mode: RedirMode, target: Compound) -> Redir {
    let fd = mode.default_fd();
    Redir::new(mode, fd, target)
}

// ---------------------------------------------------------------------------
// Stub parser for module fixtures
// ---------------------------------------------------------------------------

/// The external parser collaborator, reduced to the directives module
/// fixtures need:
///
/// ```text
/// let NAME WORD     NAME = WORD ($-prefixed words are variable refs)
/// fn-put NAME VAR   fn NAME []{ put $VAR }
/// use SPEC          use SPEC
/// emit WORD         put WORD
/// ```
pub struct StubParser;

impl SourceParser for StubParser {
    fn parse(&self, name: &str, text: &str) -> Result<Chunk, Exception> {
        let mut pipelines = Vec::new();
        for line in text.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                [] => {}
                ["let", var, value] => pipelines.push(p1(set(var, word_or_var(value)))),
                ["fn-put", fn_name, var] => pipelines.push(p1(fn_form(
                    fn_name,
                    vec![],
                    vec![p1(cmd("put", vec![v(var)]))],
                ))),
                ["use", spec] => pipelines.push(p1(use_form(spec))),
                ["emit", value] => pipelines.push(p1(cmd("put", vec![word_or_var(value)]))),
                other => {
                    return Err(Exception::new(rill_kernel::Cause::Parse(format!(
                        "{}: bad directive {:?}",
                        name, other
                    ))))
                }
            }
        }
        Ok(ch(pipelines))
    }
}

fn word_or_var(token: &str) -> Compound {
    match token.strip_prefix('$') {
        Some(name) => v(name),
        None => w(token),
    }
}

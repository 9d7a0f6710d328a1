//! The evaluator: shared state and per-frame contexts.
//!
//! [`Evaler`] owns everything that survives across evaluations — the
//! builtin namespace, the persistent global namespace, the module cache,
//! and the working directory. [`EvalCtx`] is one activation frame: local
//! and upvalue namespaces, the ports triple, and source metadata for
//! tracebacks. Compiled ops execute against an `EvalCtx`.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::compile::{self, Op};
use crate::exception::{EvalResult, Exception};
use crate::fun::Fun;
use crate::modules::{ModuleState, SourceParser};
use crate::port::{Chan, Port, PortFile, CHAN_CAP};
use crate::value::Value;

use super::scope::{Namespace, Slot};

/// Shared evaluator state, usually held in an `Arc`.
pub struct Evaler {
    /// The builtin namespace: `put~`, `each~`, …, plus the variables
    /// `true`, `false`, and `pid`.
    pub builtin: Namespace,
    /// The persistent top-level namespace; survives across `eval` calls.
    pub global: Namespace,
    /// Root directory for module resolution (`use`).
    pub data_dir: PathBuf,
    /// The external parser collaborator, used only by the module loader.
    pub parser: Arc<dyn SourceParser>,
    /// Working directory for wildcards, redirections, and spawned commands.
    pub cwd: RwLock<PathBuf>,
    /// Module cache keyed by canonical file path.
    pub(crate) modules: Mutex<HashMap<PathBuf, ModuleState>>,
    /// The exception most recently swallowed by a `?(…)` capture.
    pub last_exception: Mutex<Option<Exception>>,
}

impl Evaler {
    pub fn new(data_dir: impl Into<PathBuf>, parser: Arc<dyn SourceParser>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self {
            builtin: crate::builtin::namespace(),
            global: Namespace::new(),
            data_dir: data_dir.into(),
            parser,
            cwd: RwLock::new(cwd),
            modules: Mutex::new(HashMap::new()),
            last_exception: Mutex::new(None),
        }
    }

    /// Lower a chunk into an executable op.
    pub fn compile(&self, chunk: &rill_ast::Chunk, name: &str, text: &str) -> EvalResult<Op> {
        compile::compile(chunk, name, text, self)
    }

    /// Execute an op against the persistent global frame with the given
    /// ports triple.
    pub fn eval(
        self: &Arc<Self>,
        op: &Op,
        ports: Vec<Port>,
        name: &str,
        text: &str,
    ) -> EvalResult<()> {
        debug!(name, "eval chunk");
        let mut ec = EvalCtx::root(self.clone(), name, text, ports);
        op.exec(&mut ec)
    }

    /// Resolve a path against the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_absolute() {
            p
        } else {
            self.cwd.read().join(p)
        }
    }
}

/// One activation frame.
pub struct EvalCtx {
    pub evaler: Arc<Evaler>,
    /// Source unit name, e.g. `<repl>` or a module path.
    pub name: Arc<str>,
    pub text: Arc<str>,
    /// Slots declared in this frame.
    pub local: Namespace,
    /// The lexical upvalue chain snapshot (not the dynamic caller).
    pub up: Namespace,
    /// stdin, stdout, stderr, plus any redirected extras.
    pub ports: Vec<Port>,
    /// Span of the op currently executing, for tracebacks.
    pub span: (usize, usize),
    /// Directory of the source file, for relative `use` resolution.
    pub src_dir: PathBuf,
}

impl EvalCtx {
    pub fn root(evaler: Arc<Evaler>, name: &str, text: &str, ports: Vec<Port>) -> Self {
        let src_dir = evaler.data_dir.clone();
        let local = evaler.global.clone();
        Self {
            evaler,
            name: Arc::from(name),
            text: Arc::from(text),
            local,
            up: Namespace::new(),
            ports,
            span: (0, 0),
            src_dir,
        }
    }

    /// A sibling frame sharing namespaces, for pipeline stages and
    /// `run-parallel` blocks. Ports are cloned; the caller rewires them.
    pub fn fork(&self) -> Self {
        Self {
            evaler: self.evaler.clone(),
            name: self.name.clone(),
            text: self.text.clone(),
            local: self.local.clone(),
            up: self.up.clone(),
            ports: self.ports.clone(),
            span: self.span,
            src_dir: self.src_dir.clone(),
        }
    }

    /// A fresh frame for a closure body: new locals, the closure's captured
    /// namespace as upvalues, the caller's ports.
    pub fn closure_frame(&self, local: Namespace, up: Namespace) -> Self {
        Self {
            evaler: self.evaler.clone(),
            name: self.name.clone(),
            text: self.text.clone(),
            local,
            up,
            ports: self.ports.clone(),
            span: self.span,
            src_dir: self.src_dir.clone(),
        }
    }

    pub fn input(&self) -> &Port {
        &self.ports[0]
    }

    pub fn out(&self) -> &Port {
        &self.ports[1]
    }

    /// Resolve an unqualified or module-qualified name against this frame:
    /// local, then upvalues, then builtins.
    pub fn resolve(&self, name: &str) -> Option<Slot> {
        self.local
            .get(name)
            .or_else(|| self.up.get(name))
            .or_else(|| self.evaler.builtin.get(name))
    }

    /// Invoke a callable with the shared calling convention, optionally
    /// against a different ports triple.
    pub fn call(
        &mut self,
        callee: &Arc<dyn Fun>,
        args: Vec<Value>,
        opts: HashMap<String, Value>,
        ports: Option<Vec<Port>>,
    ) -> EvalResult<()> {
        match ports {
            None => callee.call(self, args, opts),
            Some(ports) => {
                let mut frame = self.fork();
                frame.ports = ports;
                callee.call(&mut frame, args, opts)
            }
        }
    }

    /// Run an op with stdout captured: returns channel values in emission
    /// order followed by the byte output split on newlines.
    pub fn capture_output(&mut self, op: &Op) -> EvalResult<Vec<Value>> {
        let (tx, rx) = bounded(CHAN_CAP);
        let (reader, writer) = std::io::pipe().map_err(Exception::io)?;

        let value_thread = thread::spawn(move || {
            let mut values = Vec::new();
            while let Ok(v) = rx.recv() {
                values.push(v);
            }
            values
        });
        let byte_thread = thread::spawn(move || {
            let mut reader = reader;
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).ok();
            buf
        });

        let capture = Port { file: PortFile::pipe_write(writer), chan: Chan::Send(tx) };
        let saved = std::mem::replace(&mut self.ports[1], capture);
        let result = op.exec(self);
        // Dropping the capture port closes both write halves, which lets
        // the collector threads run to completion.
        self.ports[1] = saved;

        let mut values = value_thread.join().unwrap_or_default();
        let bytes = byte_thread.join().unwrap_or_default();
        result?;

        for line in split_lines(&bytes) {
            values.push(Value::str(line));
        }
        Ok(values)
    }

    /// Run an op, converting any non-control failure into `$false` and
    /// normal completion into `$true`. Control-flow markers pass through.
    pub fn capture_exception(&mut self, op: &Op) -> EvalResult<Value> {
        match op.exec(self) {
            Ok(()) => Ok(Value::Bool(true)),
            Err(e) if e.is_control_flow() => Err(e),
            Err(e) => {
                debug!(cause = %e.cause, "exception captured");
                *self.evaler.last_exception.lock() = Some(e);
                Ok(Value::Bool(false))
            }
        }
    }
}

/// Split byte output into lines, suppressing the trailing empty line.
pub fn split_lines(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

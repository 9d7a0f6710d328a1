//! The module loader.
//!
//! `use SPEC` resolves SPEC to a file under the data directory (colons map
//! to path separators; `./`/`../` resolve against the importing module),
//! parses it through the injected [`SourceParser`], compiles and executes
//! it against a fresh namespace, and caches the namespace by canonical
//! path. Module bodies run at most once per evaluator; re-binding under a
//! different prefix shares the cached slots. Bindings are installed in the
//! importing frame only.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::ThreadId;

use rill_ast::Chunk;
use tracing::debug;

use crate::compile;
use crate::exception::{Cause, EvalResult, Exception};
use crate::interp::{EvalCtx, Namespace};

/// The parser collaborator. The evaluator consumes ASTs; only the module
/// loader ever needs to turn source text into one.
pub trait SourceParser: Send + Sync {
    fn parse(&self, name: &str, text: &str) -> EvalResult<Chunk>;
}

/// A parser stub for hosts that never load modules.
pub struct NoParser;

impl SourceParser for NoParser {
    fn parse(&self, name: &str, _text: &str) -> EvalResult<Chunk> {
        Err(Exception::new(Cause::Parse(format!("no parser available for {}", name))))
    }
}

/// Module file extension.
pub const MODULE_EXT: &str = "rl";

pub(crate) enum ModuleState {
    /// Being evaluated by the named thread; a second hit from the same
    /// thread is a cyclic import.
    Loading(ThreadId),
    Loaded(Namespace),
}

pub fn use_module(ec: &mut EvalCtx, spec: &str) -> EvalResult<()> {
    // The binding prefix is the part after the last slash, colons kept;
    // the file path is the whole spec with colons as separators.
    let prefix = spec.rsplit('/').next().unwrap_or(spec).to_string();
    let relative = spec.replace(':', "/");
    let base = if spec.starts_with("./") || spec.starts_with("../") {
        ec.src_dir.clone()
    } else {
        ec.evaler.data_dir.clone()
    };
    let file = base.join(format!("{}.{}", relative, MODULE_EXT));
    let canon = file.canonicalize().map_err(|e| {
        Exception::new(Cause::Io(format!("cannot resolve module {}: {}", spec, e)))
    })?;

    loop {
        {
            let mut cache = ec.evaler.modules.lock();
            match cache.get(&canon) {
                Some(ModuleState::Loaded(ns)) => {
                    let ns = ns.clone();
                    drop(cache);
                    install(ec, &prefix, &ns);
                    return Ok(());
                }
                Some(ModuleState::Loading(owner)) => {
                    if *owner == std::thread::current().id() {
                        return Err(Exception::compile(format!(
                            "cyclic use of module {}",
                            spec
                        )));
                    }
                    // Another worker is evaluating this module; wait for it.
                }
                None => {
                    cache.insert(canon.clone(), ModuleState::Loading(std::thread::current().id()));
                    break;
                }
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }

    match load(ec, &canon) {
        Ok(ns) => {
            ec.evaler
                .modules
                .lock()
                .insert(canon, ModuleState::Loaded(ns.clone()));
            install(ec, &prefix, &ns);
            Ok(())
        }
        Err(e) => {
            ec.evaler.modules.lock().remove(&canon);
            Err(e)
        }
    }
}

/// Read, parse, compile, and execute a module body against a fresh
/// namespace. Output flows to the importing frame's ports.
fn load(ec: &mut EvalCtx, path: &Path) -> EvalResult<Namespace> {
    debug!(path = %path.display(), "load module");
    let text = std::fs::read_to_string(path).map_err(Exception::io)?;
    let name = path.display().to_string();
    let chunk = ec.evaler.parser.parse(&name, &text)?;
    let op = compile::compile_module(&chunk, &name, &text)?;

    let exports = Namespace::new();
    let mut module_ec = EvalCtx {
        evaler: ec.evaler.clone(),
        name: Arc::from(name.as_str()),
        text: Arc::from(text.as_str()),
        local: exports.clone(),
        up: Namespace::new(),
        ports: ec.ports.clone(),
        span: (0, 0),
        src_dir: path.parent().map(PathBuf::from).unwrap_or_else(|| ec.evaler.data_dir.clone()),
    };
    op.exec(&mut module_ec)?;
    Ok(exports)
}

/// Install every exported slot under `prefix:name` in the importing frame.
/// The slots are shared with the cache, so two bindings of one module see
/// each other's mutations.
fn install(ec: &mut EvalCtx, prefix: &str, exports: &Namespace) {
    for (name, slot) in exports.entries() {
        ec.local.bind(format!("{}:{}", prefix, name), slot);
    }
}

//! rill-kernel: the evaluator core of the rill shell language.
//!
//! This crate provides:
//!
//! - **Value**: the immutable tagged value model with persistent containers
//! - **Exception**: the closed failure taxonomy, control flow included
//! - **Port**: paired byte + value I/O endpoints with close semantics
//! - **Compile**: lowering of AST nodes into executable ops
//! - **Interp**: frames, slots, namespaces, and output/exception capture
//! - **Sched**: the parallel pipeline executor and external processes
//! - **Builtin**: the standard function library
//! - **Modules**: the `use` loader and its cache
//! - **Wildcard**: `*`/`?` expansion against the working directory
//!
//! The parser is an external collaborator: hosts hand the evaluator ASTs
//! (see `rill-ast`) and a [`modules::SourceParser`] for module loading.

pub mod builtin;
pub mod compile;
pub mod exception;
pub mod fun;
pub mod interp;
pub mod modules;
pub mod port;
pub mod sched;
pub mod value;
pub mod wildcard;

pub use compile::{Op, ValuesOp};
pub use exception::{Cause, EvalResult, Exception};
pub use fun::{Builtin, Closure, Fun};
pub use interp::{EvalCtx, Evaler, Namespace, Slot};
pub use modules::{NoParser, SourceParser};
pub use port::{Chan, Port, PortFile, CHAN_CAP};
pub use value::Value;

//! The evaluator runtime: frames, slots, namespaces, and the shared
//! evaluator state.

mod eval;
mod scope;

pub use eval::{split_lines, EvalCtx, Evaler};
pub use scope::{Namespace, Slot};

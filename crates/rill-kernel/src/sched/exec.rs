//! External command execution.
//!
//! A form whose head names no function in scope (or carries the `e:`
//! prefix) spawns a process. Its stdio comes from the form's byte ports,
//! so externals participate in pipelines exactly like builtins.

use std::process::Command;

use tracing::debug;

use crate::exception::{Cause, EvalResult, Exception};
use crate::interp::EvalCtx;
use crate::value::Value;

pub fn exec_external(ec: &mut EvalCtx, name: &str, args: &[Value]) -> EvalResult {
    let mut cmd = Command::new(name);
    for arg in args {
        cmd.arg(arg.to_display());
    }
    cmd.current_dir(&*ec.evaler.cwd.read());
    cmd.stdin(ec.ports[0].file.to_stdio()?);
    cmd.stdout(ec.ports[1].file.to_stdio()?);
    match ec.ports.get(2) {
        Some(port) => cmd.stderr(port.file.to_stdio()?),
        None => cmd.stderr(std::process::Stdio::inherit()),
    };

    debug!(command = name, "spawn external");
    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Exception::new(Cause::UndefinedCommand(name.to_string()))
        } else {
            Exception::io(e)
        }
    })?;

    let status = child.wait().map_err(Exception::io)?;
    if status.success() {
        return Ok(());
    }
    // A child killed by SIGPIPE lost its reader; that is benign
    // termination, the same as a builtin writing into a closed port.
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(libc_sigpipe()) {
            return Err(Exception::new(Cause::PortClosed));
        }
    }
    Err(Exception::new(Cause::ExternalCmd {
        cmd: name.to_string(),
        code: status.code().unwrap_or(-1),
    }))
}

#[cfg(unix)]
fn libc_sigpipe() -> i32 {
    // SIGPIPE is 13 on every unix rill targets.
    13
}

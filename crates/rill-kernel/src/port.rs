//! Ports: paired byte + value I/O endpoints.
//!
//! Every frame carries three ports (stdin, stdout, stderr). A port has a
//! byte half — an OS file, a pipe end, a standard stream, or null — and a
//! value half — a bounded channel endpoint, a blackhole, or closed.
//!
//! Close semantics are ownership-based: write halves close when the last
//! clone of the port drops, which is what gives downstream readers EOF and
//! channel disconnect. Writing into a half whose peer has gone away
//! surfaces [`Cause::PortClosed`], which pipeline executors treat as
//! benign termination of the writer.

use std::fs;
use std::io::{self, Read, Write};
use std::io::{PipeReader, PipeWriter};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::exception::{Cause, EvalResult, Exception};
use crate::value::Value;

/// Capacity of the value channel between pipeline stages.
pub const CHAN_CAP: usize = 32;

/// A byte+value I/O endpoint.
#[derive(Clone)]
pub struct Port {
    pub file: PortFile,
    pub chan: Chan,
}

impl Port {
    /// An input port that yields nothing: byte EOF, closed channel.
    pub fn input_closed() -> Self {
        Self { file: PortFile::null(), chan: Chan::Closed }
    }

    /// An output port that discards everything.
    pub fn output_null() -> Self {
        Self { file: PortFile::null(), chan: Chan::Blackhole }
    }

    /// An output port writing bytes to the process stderr, discarding values.
    pub fn stderr() -> Self {
        Self { file: PortFile::stderr(), chan: Chan::Blackhole }
    }
}

/// The byte half of a port.
///
/// Cloning shares the underlying state: an explicit [`close`](Self::close)
/// is observed by every clone, and the file descriptor drops exactly once.
#[derive(Clone)]
pub struct PortFile(Arc<Mutex<FileState>>);

enum FileState {
    Null,
    Stdout,
    Stderr,
    File(fs::File),
    PipeRead(PipeReader),
    PipeWrite(PipeWriter),
    Closed,
}

impl PortFile {
    pub fn null() -> Self {
        Self(Arc::new(Mutex::new(FileState::Null)))
    }

    pub fn stdout() -> Self {
        Self(Arc::new(Mutex::new(FileState::Stdout)))
    }

    pub fn stderr() -> Self {
        Self(Arc::new(Mutex::new(FileState::Stderr)))
    }

    pub fn file(f: fs::File) -> Self {
        Self(Arc::new(Mutex::new(FileState::File(f))))
    }

    pub fn pipe_read(r: PipeReader) -> Self {
        Self(Arc::new(Mutex::new(FileState::PipeRead(r))))
    }

    pub fn pipe_write(w: PipeWriter) -> Self {
        Self(Arc::new(Mutex::new(FileState::PipeWrite(w))))
    }

    /// Write bytes to the sink. Null discards; broken pipes surface as
    /// `PortClosed`.
    pub fn write_all(&self, buf: &[u8]) -> EvalResult<()> {
        let mut state = self.0.lock();
        let result = match &mut *state {
            FileState::Null => Ok(()),
            FileState::Stdout => io::stdout().write_all(buf),
            FileState::Stderr => io::stderr().write_all(buf),
            FileState::File(f) => f.write_all(buf),
            FileState::PipeWrite(w) => w.write_all(buf),
            FileState::PipeRead(_) => {
                return Err(Exception::new(Cause::Io("port is not writable".into())))
            }
            FileState::Closed => return Err(Exception::new(Cause::PortClosed)),
        };
        result.map_err(Exception::io)
    }

    /// Read the source to EOF.
    pub fn read_all(&self) -> EvalResult<Vec<u8>> {
        let mut state = self.0.lock();
        let mut buf = Vec::new();
        let result = match &mut *state {
            FileState::Null | FileState::Closed => return Ok(buf),
            FileState::File(f) => f.read_to_end(&mut buf),
            FileState::PipeRead(r) => r.read_to_end(&mut buf),
            _ => return Err(Exception::new(Cause::Io("port is not readable".into()))),
        };
        result.map_err(Exception::io)?;
        Ok(buf)
    }

    /// Duplicate the descriptor for a spawned process's stdio.
    pub fn to_stdio(&self) -> EvalResult<std::process::Stdio> {
        let state = self.0.lock();
        Ok(match &*state {
            FileState::Null | FileState::Closed => std::process::Stdio::null(),
            FileState::Stdout | FileState::Stderr => std::process::Stdio::inherit(),
            FileState::File(f) => f.try_clone().map_err(Exception::io)?.into(),
            FileState::PipeRead(r) => r.try_clone().map_err(Exception::io)?.into(),
            FileState::PipeWrite(w) => w.try_clone().map_err(Exception::io)?.into(),
        })
    }

    /// Drop the underlying descriptor. All clones observe the close;
    /// closing twice is a no-op at this layer.
    pub fn close(&self) {
        *self.0.lock() = FileState::Closed;
    }
}

/// The value half of a port.
#[derive(Clone)]
pub enum Chan {
    /// No values will ever arrive; sends fail.
    Closed,
    /// Sends are silently discarded.
    Blackhole,
    Send(Sender<Value>),
    Recv(Receiver<Value>),
}

impl Chan {
    /// Send a value downstream. Disconnected receivers surface as
    /// `PortClosed`.
    pub fn send(&self, v: Value) -> EvalResult<()> {
        match self {
            Chan::Send(tx) => tx.send(v).map_err(|_| Exception::new(Cause::PortClosed)),
            Chan::Blackhole => Ok(()),
            Chan::Closed | Chan::Recv(_) => Err(Exception::new(Cause::PortClosed)),
        }
    }

    /// Receive the next value, or `None` once every sender has dropped.
    pub fn recv(&self) -> Option<Value> {
        match self {
            Chan::Recv(rx) => rx.recv().ok(),
            _ => None,
        }
    }

    /// Drain the channel to disconnect.
    pub fn drain(&self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(v) = self.recv() {
            out.push(v);
        }
        out
    }
}

//! The pipeline executor.
//!
//! An n-stage pipeline gets n−1 connectors, each an OS byte pipe plus a
//! bounded value channel. Every stage runs on its own scoped thread; each
//! stage owns its port set and drops it on exit, which closes exactly the
//! write halves it holds — byte EOF and channel disconnect then propagate
//! to the downstream reader. A stage that writes into a vanished peer
//! fails with `PortClosed`, which aggregation treats as benign.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use tracing::debug;

use crate::compile::Op;
use crate::exception::{EvalResult, Exception};
use crate::fun::Fun;
use crate::interp::EvalCtx;
use crate::port::{Chan, Port, PortFile, CHAN_CAP};

/// Run every stage concurrently, join them all, and aggregate failures:
/// the first failing stage (in stage order) wins, the rest are attached.
pub fn run_pipeline(ec: &mut EvalCtx, ops: &[Op]) -> EvalResult {
    let n = ops.len();
    debug!(stages = n, "pipeline start");

    let mut stages = Vec::with_capacity(n);
    let mut pending: Option<(std::io::PipeReader, crossbeam_channel::Receiver<_>)> = None;
    for i in 0..n {
        let mut stage = ec.fork();
        if let Some((reader, rx)) = pending.take() {
            stage.ports[0] = Port { file: PortFile::pipe_read(reader), chan: Chan::Recv(rx) };
        }
        if i < n - 1 {
            let (reader, writer) = std::io::pipe().map_err(Exception::io)?;
            let (tx, rx) = bounded(CHAN_CAP);
            stage.ports[1] = Port { file: PortFile::pipe_write(writer), chan: Chan::Send(tx) };
            pending = Some((reader, rx));
        }
        stages.push(stage);
    }

    let results: Vec<EvalResult> = thread::scope(|scope| {
        let handles: Vec<_> = ops
            .iter()
            .zip(stages)
            .map(|(op, mut stage)| {
                scope.spawn(move || {
                    let result = op.exec(&mut stage);
                    // `stage` drops here, closing the write halves this
                    // stage owns.
                    result
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Exception::fail("pipeline stage panicked")))
            })
            .collect()
    });

    debug!(stages = n, "pipeline joined");
    aggregate(results)
}

/// Run each callable concurrently against a fork of the current frame,
/// with the same ports. Aggregation matches the pipeline policy.
pub fn run_parallel(ec: &mut EvalCtx, blocks: &[Arc<dyn Fun>]) -> EvalResult {
    let results: Vec<EvalResult> = thread::scope(|scope| {
        let handles: Vec<_> = blocks
            .iter()
            .map(|block| {
                let mut stage = ec.fork();
                let block = block.clone();
                scope.spawn(move || block.call(&mut stage, Vec::new(), HashMap::new()))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Exception::fail("parallel block panicked")))
            })
            .collect()
    });
    aggregate(results)
}

fn aggregate(results: Vec<EvalResult>) -> EvalResult {
    let mut primary: Option<Exception> = None;
    let mut rest = Vec::new();
    for result in results {
        if let Err(e) = result {
            if e.is_port_closed() {
                continue;
            }
            if primary.is_none() {
                primary = Some(e);
            } else {
                rest.push(e);
            }
        }
    }
    match primary {
        None => Ok(()),
        Some(mut e) => {
            e.related.extend(rest);
            Err(e)
        }
    }
}

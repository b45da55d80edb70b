//! Byte duplication.
//!
//! A single pump task owns the read half of the channel and forwards every
//! chunk it reads to two unbounded branch queues. A slow branch only grows
//! its own queue; the pump and the other branch keep going.

use crate::port::{BoxedReader, PortError};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// One read from the source, shared by both branches.
pub type Chunk = Arc<[u8]>;

const RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeeOptions {
    /// Upper bound for a single read.
    pub chunk_size: usize,
    /// Consecutive transient read errors tolerated before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for TeeOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            max_consecutive_errors: 8,
        }
    }
}

/// Why the pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The cancellation token fired.
    Cancelled,
    /// The source reported EOF or a fatal channel error.
    EndOfStream,
    /// Too many transient errors in a row.
    TooManyErrors,
}

/// One consumer's view of the duplicated stream.
#[derive(Debug)]
pub struct Branch {
    rx: mpsc::UnboundedReceiver<Chunk>,
}

impl Branch {
    /// Next chunk, or `None` once the pump has stopped and the queue is empty.
    pub async fn next(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }

    /// Drain the branch until the pump stops.
    pub async fn collect(mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk);
        }
        out
    }
}

/// A running duplication stage.
#[derive(Debug)]
pub struct Tee {
    pub raw: Branch,
    pub text: Branch,
    pub task: JoinHandle<PumpExit>,
    /// Cancelled when the pump exits, for whatever reason.
    pub ended: CancellationToken,
}

impl Tee {
    /// Spawn the pump over `reader`. Cancelling `token` stops it even while
    /// a read is pending.
    pub fn spawn(reader: BoxedReader, options: TeeOptions, token: CancellationToken) -> Self {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (text_tx, text_rx) = mpsc::unbounded_channel();
        let ended = CancellationToken::new();
        let task = tokio::spawn(pump(
            reader,
            [raw_tx, text_tx],
            options,
            token,
            ended.clone(),
        ));
        Self {
            raw: Branch { rx: raw_rx },
            text: Branch { rx: text_rx },
            task,
            ended,
        }
    }
}

async fn pump(
    mut reader: BoxedReader,
    branches: [mpsc::UnboundedSender<Chunk>; 2],
    options: TeeOptions,
    token: CancellationToken,
    ended: CancellationToken,
) -> PumpExit {
    let _ended = ended.drop_guard();
    let mut buf = vec![0u8; options.chunk_size.max(1)];
    let mut error_streak: u32 = 0;

    loop {
        // Dropping the read future is what unblocks a read that would
        // otherwise wait forever on a vanished device.
        let read = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("byte pump cancelled");
                return PumpExit::Cancelled;
            }
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!("byte source reached end of stream");
                return PumpExit::EndOfStream;
            }
            Ok(n) => {
                error_streak = 0;
                trace!(bytes = n, "read chunk");
                let chunk: Chunk = Arc::from(&buf[..n]);
                for branch in &branches {
                    // A closed branch means its loop is gone; the other one
                    // still gets every byte.
                    let _ = branch.send(Arc::clone(&chunk));
                }
            }
            Err(e) => {
                let e = PortError::from(e);
                if e.is_end_of_stream() {
                    debug!(error = %e, "byte source closed");
                    return PumpExit::EndOfStream;
                }

                error_streak += 1;
                warn!(error = %e, streak = error_streak, "transient read error");
                if error_streak >= options.max_consecutive_errors {
                    warn!(
                        limit = options.max_consecutive_errors,
                        "giving up after consecutive read errors"
                    );
                    return PumpExit::TooManyErrors;
                }

                tokio::select! {
                    biased;
                    _ = token.cancelled() => return PumpExit::Cancelled,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
}

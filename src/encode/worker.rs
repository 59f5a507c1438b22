use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};

use crate::encode::encoder::{EncoderSession, check_order};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::raster::buffer::Raster;

enum Command {
    Frame(FrameIndex, Arc<Raster>),
    Close,
    Abort,
}

/// Terminal message from the writer thread.
enum Outcome {
    Closed(LayercastResult<PathBuf>),
    Failed(LayercastError),
    Aborted,
}

/// Single writer thread in front of an [`EncoderSession`].
///
/// Frames are queued on a bounded channel; every hand-off and the final close wait at most
/// `timeout`. A stuck encoder turns into a [`LayercastError::Timeout`] instead of a hang.
pub struct EncoderWorker {
    tx: Option<Sender<Command>>,
    outcome_rx: Receiver<Outcome>,
    aborting: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    timeout: Duration,
    last: Option<FrameIndex>,
    submitted: u64,
}

impl std::fmt::Debug for EncoderWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderWorker")
            .field("timeout", &self.timeout)
            .field("last", &self.last)
            .field("submitted", &self.submitted)
            .finish()
    }
}

impl EncoderWorker {
    pub fn spawn(
        session: Box<dyn EncoderSession>,
        capacity: usize,
        timeout: Duration,
    ) -> LayercastResult<Self> {
        let (tx, rx) = bounded::<Command>(capacity.max(1));
        let (outcome_tx, outcome_rx) = bounded::<Outcome>(1);
        let aborting = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&aborting);
        let handle = std::thread::Builder::new()
            .name("layercast-encoder".to_string())
            .spawn(move || run(session, &rx, &outcome_tx, &flag))
            .map_err(|e| LayercastError::encoder(format!("failed to spawn encoder thread: {e}")))?;
        Ok(Self {
            tx: Some(tx),
            outcome_rx,
            aborting,
            handle: Some(handle),
            timeout,
            last: None,
            submitted: 0,
        })
    }

    /// Frames accepted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Queue one frame. Indices must strictly increase.
    pub fn submit(&mut self, index: FrameIndex, frame: Arc<Raster>) -> LayercastResult<()> {
        check_order(self.last, index)?;
        if let Ok(outcome) = self.outcome_rx.try_recv() {
            return Err(self.unexpected(outcome));
        }
        let Some(tx) = self.tx.as_ref() else {
            return Err(LayercastError::encoder_at(index.0, "encoder worker is closed"));
        };
        match tx.send_timeout(Command::Frame(index, frame), self.timeout) {
            Ok(()) => {
                self.last = Some(index);
                self.submitted += 1;
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => Err(LayercastError::timeout(format!(
                "encoder did not accept frame {} within {:?}",
                index.0, self.timeout
            ))),
            Err(SendTimeoutError::Disconnected(_)) => match self.outcome_rx.try_recv() {
                Ok(outcome) => Err(self.unexpected(outcome)),
                Err(_) => Err(LayercastError::encoder_at(index.0, "encoder worker stopped")),
            },
        }
    }

    /// Flush queued frames and finalise the output.
    ///
    /// On timeout the writer is told to abort: remaining frames are dropped and the partial
    /// output is discarded once the writer gets to it.
    pub fn finish(mut self) -> LayercastResult<PathBuf> {
        let Some(tx) = self.tx.take() else {
            return Err(LayercastError::encoder("encoder worker is closed"));
        };
        // Close goes behind every queued frame, so allow one timeout per frame plus the close.
        let budget = self.timeout.saturating_mul(u32::try_from(tx.len() + 1).unwrap_or(u32::MAX));
        if let Err(SendTimeoutError::Timeout(_)) = tx.send_timeout(Command::Close, self.timeout) {
            self.aborting.store(true, Ordering::SeqCst);
            return Err(LayercastError::timeout(format!(
                "encoder did not accept close within {:?}",
                self.timeout
            )));
        }
        drop(tx);
        let outcome = match self.outcome_rx.recv_timeout(budget) {
            Ok(o) => o,
            Err(RecvTimeoutError::Timeout) => {
                // The writer drops what is left and discards the output instead of closing it.
                self.aborting.store(true, Ordering::SeqCst);
                return Err(LayercastError::timeout(format!(
                    "encoder did not finish within {budget:?}"
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(LayercastError::encoder("encoder worker exited without a result"));
            }
        };
        self.join();
        match outcome {
            Outcome::Closed(result) => result,
            other => Err(self.unexpected(other)),
        }
    }

    /// Discard the output. Queued frames are dropped unwritten; waits at most one timeout for
    /// the writer to acknowledge.
    pub fn abort(mut self) {
        self.aborting.store(true, Ordering::SeqCst);
        if let Some(tx) = self.tx.take()
            && tx.send_timeout(Command::Abort, self.timeout).is_err()
        {
            tracing::warn!("encoder did not accept abort; leaving writer thread detached");
            return;
        }
        match self.outcome_rx.recv_timeout(self.timeout) {
            Ok(_) | Err(RecvTimeoutError::Disconnected) => self.join(),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("encoder did not acknowledge abort within {:?}", self.timeout);
            }
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("encoder thread panicked");
        }
    }

    fn unexpected(&mut self, outcome: Outcome) -> LayercastError {
        self.tx = None;
        self.join();
        match outcome {
            Outcome::Failed(e) => e,
            Outcome::Closed(Err(e)) => e,
            Outcome::Closed(Ok(_)) => LayercastError::encoder("encoder closed early"),
            Outcome::Aborted => LayercastError::encoder("encoder was aborted"),
        }
    }
}

fn run(
    mut session: Box<dyn EncoderSession>,
    rx: &Receiver<Command>,
    outcome: &Sender<Outcome>,
    aborting: &AtomicBool,
) {
    loop {
        match rx.recv() {
            Ok(Command::Frame(..)) if aborting.load(Ordering::SeqCst) => {}
            Ok(Command::Frame(index, frame)) => {
                if let Err(e) = session.write_frame(index, &frame) {
                    tracing::error!(frame = index.0, error = %e, "encoder write failed");
                    session.abort();
                    let _ = outcome.send(Outcome::Failed(e));
                    return;
                }
            }
            Ok(Command::Close) if aborting.load(Ordering::SeqCst) => {
                tracing::warn!("encoder close arrived after abort; discarding output");
                session.abort();
                let _ = outcome.send(Outcome::Aborted);
                return;
            }
            Ok(Command::Close) => {
                let written = session.frames_written();
                let result = session.close();
                if let Ok(path) = &result {
                    tracing::info!(frames = written, path = %path.display(), "encoder closed");
                }
                let _ = outcome.send(Outcome::Closed(result));
                return;
            }
            Ok(Command::Abort) | Err(_) => {
                session.abort();
                let _ = outcome.send(Outcome::Aborted);
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/worker.rs"]
mod tests;

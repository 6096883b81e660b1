use std::io;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::caption::CaptionRegistry;
use crate::cancel::CancellationToken;
use crate::error::{PhotoError, Result};
use crate::{process_with_control, Event, ProcessControl, ProcessOptions, ProcessResult};

/// A processing run on its own thread.
pub struct WorkerHandle {
    token: CancellationToken,
    handle: JoinHandle<Result<ProcessResult>>,
}

impl WorkerHandle {
    /// Stop before the next file. The file in flight completes.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<ProcessResult> {
        self.handle
            .join()
            .map_err(|_| PhotoError::Io(io::Error::other("processing thread panicked")))?
    }
}

/// Start processing in the background. Events are delivered on the
/// worker thread, so `events` must forward them if the caller needs them
/// elsewhere.
pub fn spawn<F>(options: ProcessOptions, captioners: CaptionRegistry, events: F) -> WorkerHandle
where
    F: Fn(Event) + Send + Sync + 'static,
{
    spawn_with_token(options, captioners, CancellationToken::new(), events)
}

/// Like [`spawn`], observing a token the caller created beforehand (e.g. one
/// already wired to a signal handler).
pub fn spawn_with_token<F>(
    options: ProcessOptions,
    captioners: CaptionRegistry,
    token: CancellationToken,
    events: F,
) -> WorkerHandle
where
    F: Fn(Event) + Send + Sync + 'static,
{
    let control = ProcessControl::new().with_cancel_token(token.clone());
    let handle = thread::spawn(move || {
        debug!("Worker started for [{}]", options.source.display());
        process_with_control(&options, &captioners, &control, &events)
    });
    WorkerHandle { token, handle }
}

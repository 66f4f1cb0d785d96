use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

/// Handle to control and join a background worker.
///
/// Dropping the handle stops the worker as well; `shutdown` makes that
/// explicit at the call site.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: Option<mpsc::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    ///
    /// A task that is mid-run finishes first; no further runs start.
    pub fn shutdown(mut self) {
        self.stop();
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fixed-delay repeating job on a dedicated thread.
///
/// The next run is scheduled `interval` after the previous one finishes, so
/// runs of the same worker never overlap.
#[derive(Debug)]
pub struct PeriodicWorker;

impl PeriodicWorker {
    /// Spawn a named worker thread that calls `task` every `interval`.
    ///
    /// - `run_immediately`: run once right away instead of waiting a full interval
    pub fn spawn<F>(
        name: &'static str,
        interval: Duration,
        run_immediately: bool,
        mut task: F,
    ) -> io::Result<WorkerHandle>
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, interval, run_immediately, shutdown_rx, &mut task))?;

        Ok(WorkerHandle {
            name,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        })
    }
}

fn worker_loop<F>(
    name: &'static str,
    interval: Duration,
    run_immediately: bool,
    shutdown_rx: mpsc::Receiver<()>,
    task: &mut F,
) where
    F: FnMut(),
{
    info!(worker = name, interval_ms = interval.as_millis() as u64, "periodic worker started");

    if run_immediately {
        task();
    }

    loop {
        match shutdown_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                debug!(worker = name, "periodic worker tick");
                task();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(worker = name, "periodic worker stopped");
}

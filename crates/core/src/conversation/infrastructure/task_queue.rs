use std::panic::AssertUnwindSafe;
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TaskError {
    #[error("task did not finish within {0:?}")]
    Timeout(Duration),
    #[error("task failed: {0}")]
    Failed(String),
    #[error("task queue is shut down")]
    Disconnected,
}

/// Pending result of a job submitted to a [`TaskQueue`].
#[must_use = "a task future does nothing unless waited on"]
pub struct TaskFuture<T> {
    result_rx: Receiver<Result<T, String>>,
}

impl<T> TaskFuture<T> {
    /// Blocks until the job finishes or `timeout` elapses. A timed-out job
    /// keeps running on the worker; its result is discarded.
    pub fn wait(self, timeout: Duration) -> Result<T, TaskError> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(TaskError::Failed(message)),
            Err(RecvTimeoutError::Timeout) => Err(TaskError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Disconnected),
        }
    }
}

/// Named executor running submitted jobs one at a time on a single thread.
pub struct TaskQueue {
    name: String,
    job_tx: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let thread_name = name.to_string();
        let handle = std::thread::Builder::new()
            .name(format!("{name}-queue"))
            .spawn(move || {
                for job in job_rx.iter() {
                    job();
                }
                log::debug!("Task queue {thread_name} drained");
            })?;

        Ok(Self {
            name: name.to_string(),
            job_tx: Mutex::new(Some(job_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues `f`. After shutdown the returned future reports
    /// [`TaskError::Disconnected`].
    pub fn submit<T, F>(&self, f: F) -> TaskFuture<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move || {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message);
            let _ = result_tx.send(outcome);
        });

        let sender = self.job_tx.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(tx) => {
                if tx.send(job).is_err() {
                    log::warn!("Task queue {} worker is gone", self.name);
                }
            }
            None => log::debug!("Task submitted to {} after shutdown", self.name),
        }
        TaskFuture { result_rx }
    }

    /// Stops accepting work, lets queued jobs finish and joins the worker.
    /// Idempotent.
    pub fn shutdown(&self) {
        self.job_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Task queue {} worker panicked", self.name);
            }
            log::info!("Task queue {} stopped", self.name);
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

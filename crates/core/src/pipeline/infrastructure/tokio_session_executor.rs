use crate::pipeline::session_executor::{SessionExecutor, SessionJob, SessionTask};
use crate::shared::error::BoxError;

/// Runs sessions on a tokio runtime's blocking pool.
///
/// The capture loop blocks on device reads, so it goes through
/// `spawn_blocking` rather than onto an async worker.
pub struct TokioSessionExecutor {
    runtime: tokio::runtime::Runtime,
}

impl TokioSessionExecutor {
    pub fn new() -> Result<Self, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("eyeon-runtime")
            .build()?;
        Ok(Self { runtime })
    }
}

impl SessionExecutor for TokioSessionExecutor {
    fn spawn(&self, name: &str, job: SessionJob) -> Result<Box<dyn SessionTask>, BoxError> {
        log::debug!("Scheduling {name} on the tokio blocking pool");
        let handle = self.runtime.spawn_blocking(job);
        Ok(Box::new(TokioTask {
            handle,
            runtime: self.runtime.handle().clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "tokio"
    }
}

struct TokioTask {
    handle: tokio::task::JoinHandle<()>,
    runtime: tokio::runtime::Handle,
}

impl SessionTask for TokioTask {
    fn join(self: Box<Self>) -> Result<(), BoxError> {
        let TokioTask { handle, runtime } = *self;
        runtime.block_on(handle).map_err(|e| -> BoxError { Box::new(e) })
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_job_runs_on_blocking_pool() {
        let executor = TokioSessionExecutor::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        let task = executor
            .spawn("test-session", Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        task.join().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(executor.name(), "tokio");
    }

    #[test]
    fn test_panicking_job_reports_error() {
        let executor = TokioSessionExecutor::new().unwrap();
        let task = executor.spawn("test-panic", Box::new(|| panic!("boom"))).unwrap();
        assert!(task.join().is_err());
    }
}

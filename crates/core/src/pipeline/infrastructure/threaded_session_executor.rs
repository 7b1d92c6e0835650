use std::thread::JoinHandle;

use crate::pipeline::session_executor::{SessionExecutor, SessionJob, SessionTask};
use crate::shared::error::BoxError;

/// Runs each session on its own named OS thread.
#[derive(Default)]
pub struct ThreadedSessionExecutor;

impl ThreadedSessionExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl SessionExecutor for ThreadedSessionExecutor {
    fn spawn(&self, name: &str, job: SessionJob) -> Result<Box<dyn SessionTask>, BoxError> {
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(job)?;
        Ok(Box::new(ThreadTask(handle)))
    }

    fn name(&self) -> &'static str {
        "thread"
    }
}

struct ThreadTask(JoinHandle<()>);

impl SessionTask for ThreadTask {
    fn join(self: Box<Self>) -> Result<(), BoxError> {
        self.0
            .join()
            .map_err(|_| -> BoxError { "session thread panicked".into() })
    }

    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_job_runs_and_joins() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let task = ThreadedSessionExecutor::new()
            .spawn("test-session", Box::new(move || flag.store(true, Ordering::SeqCst)))
            .unwrap();

        task.join().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panicking_job_reports_error() {
        let task = ThreadedSessionExecutor::new()
            .spawn("test-panic", Box::new(|| panic!("boom")))
            .unwrap();
        assert!(task.join().is_err());
    }

    #[test]
    fn test_thread_is_named() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let task = ThreadedSessionExecutor::new()
            .spawn(
                "eyeon-session-u1",
                Box::new(move || {
                    let _ = tx.send(std::thread::current().name().map(str::to_string));
                }),
            )
            .unwrap();
        task.join().unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("eyeon-session-u1"));
    }
}

use crate::shared::error::BoxError;

/// Work run by an executor: one complete capture session.
pub type SessionJob = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a running session job.
pub trait SessionTask: Send {
    /// Blocks until the job returns. Errors when the job panicked.
    fn join(self: Box<Self>) -> Result<(), BoxError>;

    fn is_finished(&self) -> bool;
}

/// Abstracts where a session's blocking capture loop runs.
///
/// This is a port. Infrastructure provides a dedicated OS thread backend and
/// a tokio blocking-pool backend; the loop itself is the same for both.
pub trait SessionExecutor: Send + Sync {
    fn spawn(&self, name: &str, job: SessionJob) -> Result<Box<dyn SessionTask>, BoxError>;

    fn name(&self) -> &'static str;
}

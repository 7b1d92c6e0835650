pub mod threaded_session_executor;
pub mod tokio_session_executor;

/// Boxed error used at port boundaries; `Send + Sync` so failures can cross
/// session threads.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Construction-time failures shared by every queue variant.
///
/// Full and empty are never errors: those are reported through the
/// `Result<(), T>` / `Option<T>` return of each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("queue capacity {requested} leaves no room for the sentinel slot")]
    CapacityOverflow { requested: usize },
}

use thiserror::Error;

/// Errors surfaced to a caller of [`crate::Engine::select`] or
/// [`crate::Engine::commit`].
///
/// Only [`StorageError::Backend`] is ever returned to a *read*; everything
/// else either never reaches a reader (invariant violations abort the
/// process) or only reaches a committer in disabled-cache mode, where
/// commits are synchronous.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend reported a failure while servicing `select` or, in
    /// disabled-cache mode, a synchronous `commit`.
    #[error("backend storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// The engine has already observed a fatal backend failure and is no
    /// longer accepting commits.
    #[error("storage engine is no longer running (a previous commit killed the flusher)")]
    StorageDead,
}

/// Invariant violations are programmer errors in the upstream layer that
/// prepares commit data (a dirty entry referencing an id that was never
/// allocated, a new entry mistakenly carrying an id, a restored cache slot
/// that doesn't match the one the index held). These abort the process
/// rather than unwind: a caught panic on the flusher or evictor thread
/// would otherwise leave the engine running with eviction or durability
/// silently disabled, continuing to accept commits it can no longer
/// honor. We centralize the abort here so all call sites read the same
/// way and a crash dump always carries this message.
#[track_caller]
pub(crate) fn fatal(msg: impl std::fmt::Display) -> ! {
    tracing::error!(%msg, "fatal cached-storage invariant violation");
    eprintln!("cached-storage: fatal invariant violation: {msg}");
    std::process::abort();
}

use thiserror::Error;

/// Error returned by [`crate::Store`] operations.
///
/// `Acquired` and `Done` are expected outcomes of a contested or completed
/// resource, not faults: callers are expected to match on them rather than
/// log-and-bail. Everything else is a genuine backend fault and should be
/// surfaced unchanged by upstack callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The resource is currently held by an alive lease.
    #[error("resource already acquired")]
    Acquired,

    /// The resource is terminal; it will never be acquirable again.
    #[error("resource marked done")]
    Done,

    /// `renew`/`done` found no row matching `id AND owner AND done_at IS NULL`.
    #[error("invalid handle")]
    InvalidHandle,

    /// Anything else: connection faults, serialization errors, and so on.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

use thiserror::Error;

/// Error kinds a `Client`/`Handle` caller can see.
///
/// `Acquired` and `Done` are expected outcomes, not transport failures; `Closed`
/// is purely client-local, raised once a handle has been done/discarded.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("resource already acquired")]
    Acquired,

    #[error("resource marked done")]
    Done,

    #[error("handle closed")]
    Closed,

    #[error("invalid handle")]
    InvalidHandle,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transport error: {0}")]
    Transport(tonic::Status),

    #[error("transport connect error: {0}")]
    Connect(#[from] tonic::transport::Error),

    #[error("cache error: {0}")]
    Cache(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tonic::Status> for ClientError {
    /// Recovers the semantic variants a `Store`-backed service maps its
    /// errors onto (see `ward-service`'s `store_err_to_status`), so a
    /// `GrpcTransport` caller sees the same `ClientError` a `DirectTransport`
    /// caller would for the same underlying condition.
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::FailedPrecondition => ClientError::InvalidHandle,
            tonic::Code::InvalidArgument => ClientError::InvalidArgument(status.message().to_string()),
            _ => ClientError::Transport(status),
        }
    }
}

impl From<ward_core::StoreError> for ClientError {
    fn from(err: ward_core::StoreError) -> Self {
        match err {
            ward_core::StoreError::Acquired => ClientError::Acquired,
            ward_core::StoreError::Done => ClientError::Done,
            ward_core::StoreError::InvalidHandle => ClientError::InvalidHandle,
            ward_core::StoreError::Backend(err) => ClientError::Backend(err),
        }
    }
}

//! The interchangeable wire boundary. `ward-client` programs against
//! [`Rpc`], not `tonic` or [`ward_core::Store`] directly, so the same
//! `Client`/`Handle` logic drives either a real service over the network
//! or the in-process bypass used by tests.

mod direct;
mod grpc;

pub use direct::DirectTransport;
pub use grpc::GrpcTransport;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use ward_core::ListFilter;

use crate::ClientError;

/// One acquired/refused/already-done outcome, mirroring the wire's
/// `AcquireResponse` without committing callers to `ward-proto` types.
pub enum AcquireOutcome {
    Ok {
        id: Uuid,
        expires_at: DateTime<Utc>,
        metadata: HashMap<String, String>,
    },
    Held,
    Done,
}

/// A listed resource as the client sees it: exactly the fields the wire
/// wire `Handle` message carries. Unlike [`ward_core::HandleRecord`]
/// it has no `owner`/`created_at`/`updated_at` — those never cross the
/// wire, so a `Client` has no business pretending to know them.
#[derive(Debug, Clone)]
pub struct ListedHandle {
    pub id: Uuid,
    pub namespace: String,
    pub name: String,
    pub expires_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
    pub num_acquired: u32,
    pub metadata: HashMap<String, String>,
}

/// Whether a list consumer wants more records; see [`ward_core::ControlFlow`],
/// which this mirrors for the client side of the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListControlFlow {
    Continue,
    Break,
}

#[async_trait]
pub trait RpcListSink: Send {
    async fn visit(&mut self, handle: ListedHandle) -> Result<ListControlFlow, ClientError>;
}

#[async_trait]
impl<F> RpcListSink for F
where
    F: FnMut(ListedHandle) -> ListControlFlow + Send,
{
    async fn visit(&mut self, handle: ListedHandle) -> Result<ListControlFlow, ClientError> {
        Ok((self)(handle))
    }
}

#[async_trait]
pub trait Rpc: Send + Sync {
    async fn acquire(
        &self,
        owner: &str,
        namespace: &str,
        name: &str,
        ttl_seconds: u32,
        metadata: HashMap<String, String>,
    ) -> Result<AcquireOutcome, ClientError>;

    async fn renew(
        &self,
        owner: &str,
        id: Uuid,
        ttl_seconds: u32,
        metadata: HashMap<String, String>,
    ) -> Result<(), ClientError>;

    async fn done(
        &self,
        owner: &str,
        id: Uuid,
        metadata: HashMap<String, String>,
    ) -> Result<(), ClientError>;

    async fn list(
        &self,
        filter: ListFilter,
        offset: u64,
        sink: &mut dyn RpcListSink,
    ) -> Result<(), ClientError>;
}

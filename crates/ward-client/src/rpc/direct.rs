//! In-process bypass wired straight to a [`Store`]. Skips the tonic
//! transport entirely, so it is useful wherever a test wants a `Client`
//! without standing up a server; not meant for production use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;
use ward_core::{AcquireParams, ControlFlow, HandleRecord, ListFilter, ListSink, Store, StoreError};

use super::{AcquireOutcome, ListControlFlow, ListedHandle, Rpc, RpcListSink};
use crate::ClientError;

pub struct DirectTransport {
    store: Arc<dyn Store>,
}

impl DirectTransport {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Rpc for DirectTransport {
    async fn acquire(
        &self,
        owner: &str,
        namespace: &str,
        name: &str,
        ttl_seconds: u32,
        metadata: HashMap<String, String>,
    ) -> Result<AcquireOutcome, ClientError> {
        let params = AcquireParams {
            owner: owner.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(ttl_seconds as i64),
            metadata,
        };

        match self.store.acquire(params).await {
            Ok(record) => Ok(AcquireOutcome::Ok {
                id: record.id,
                expires_at: record.expires_at,
                metadata: record.metadata,
            }),
            Err(StoreError::Acquired) => Ok(AcquireOutcome::Held),
            Err(StoreError::Done) => Ok(AcquireOutcome::Done),
            Err(other) => Err(other.into()),
        }
    }

    async fn renew(
        &self,
        owner: &str,
        id: Uuid,
        ttl_seconds: u32,
        metadata: HashMap<String, String>,
    ) -> Result<(), ClientError> {
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl_seconds as i64);
        self.store
            .renew(owner, id, expires_at, metadata)
            .await
            .map_err(Into::into)
    }

    async fn done(
        &self,
        owner: &str,
        id: Uuid,
        metadata: HashMap<String, String>,
    ) -> Result<(), ClientError> {
        self.store.done(owner, id, metadata).await.map_err(Into::into)
    }

    async fn list(
        &self,
        filter: ListFilter,
        offset: u64,
        sink: &mut dyn RpcListSink,
    ) -> Result<(), ClientError> {
        let mut adapter = SinkAdapter { sink };
        self.store.list(filter, offset, &mut adapter).await.map_err(Into::into)
    }
}

/// Narrows the store's full `HandleRecord` down to the fields that
/// actually cross the wire, so direct and gRPC transports hand callers
/// the same shape.
struct SinkAdapter<'a> {
    sink: &'a mut dyn RpcListSink,
}

#[async_trait]
impl ListSink for SinkAdapter<'_> {
    async fn visit(&mut self, record: HandleRecord) -> Result<ControlFlow, StoreError> {
        let listed = ListedHandle {
            id: record.id,
            namespace: record.namespace,
            name: record.name,
            expires_at: record.expires_at,
            done_at: record.done_at,
            num_acquired: record.num_acquired,
            metadata: record.metadata,
        };
        match self.sink.visit(listed).await {
            Ok(ListControlFlow::Continue) => Ok(ControlFlow::Continue),
            Ok(ListControlFlow::Break) => Ok(ControlFlow::Break),
            Err(err) => Err(StoreError::backend(err)),
        }
    }
}

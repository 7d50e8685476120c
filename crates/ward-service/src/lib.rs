//! Wire-boundary service: request validation, `Store` outcome translation,
//! and the health-check task, built around an `Arc<dyn Store>`.

mod health;

use std::sync::Arc;

use chrono::Utc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status as TonicStatus};
use ward_core::{AcquireParams, ControlFlow, ListSink, Store, StoreError};
use ward_proto::v1::ward_server::Ward;
use ward_proto::v1::{
    AcquireRequest, AcquireResponse, DoneRequest, DoneResponse, Handle, ListRequest, RenewRequest,
    RenewResponse, Status as WireStatus,
};

pub use health::run_health_check;

/// Serves the `Ward` gRPC service atop a [`Store`].
const MAX_NAMESPACE_LEN: usize = 100;
const MAX_NAME_LEN: usize = 255;

pub struct WardService {
    store: Arc<dyn Store>,
}

impl WardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }
}

fn invalid_argument(msg: &str) -> TonicStatus {
    TonicStatus::invalid_argument(msg.to_string())
}

fn store_err_to_status(err: StoreError) -> TonicStatus {
    match err {
        StoreError::InvalidHandle => TonicStatus::failed_precondition("invalid handle"),
        StoreError::Acquired | StoreError::Done => {
            // These are mapped to response enum values by their call
            // sites, never surfaced as transport errors; reaching here
            // would be a bug in the call site, not an expected outcome.
            TonicStatus::internal("unexpected store outcome")
        }
        StoreError::Backend(err) => TonicStatus::internal(err.to_string()),
    }
}

#[tonic::async_trait]
impl Ward for WardService {
    async fn acquire(
        &self,
        request: Request<AcquireRequest>,
    ) -> Result<Response<AcquireResponse>, TonicStatus> {
        let req = request.into_inner();
        if req.owner.is_empty() {
            return Err(invalid_argument("invalid owner"));
        }
        if req.name.is_empty() {
            return Err(invalid_argument("invalid name"));
        }
        if req.namespace.len() > MAX_NAMESPACE_LEN {
            return Err(invalid_argument("namespace too long"));
        }
        if req.name.len() > MAX_NAME_LEN {
            return Err(invalid_argument("name too long"));
        }

        let params = AcquireParams {
            owner: req.owner,
            namespace: req.namespace,
            name: req.name,
            expires_at: Utc::now() + chrono::Duration::seconds(req.ttl_seconds as i64),
            metadata: req.metadata,
        };

        match self.store.acquire(params).await {
            Ok(record) => Ok(Response::new(AcquireResponse {
                status: WireStatus::Ok as i32,
                handle: Some(Handle::from(&record)),
            })),
            Err(StoreError::Acquired) => Ok(Response::new(AcquireResponse {
                status: WireStatus::Held as i32,
                handle: None,
            })),
            Err(StoreError::Done) => Ok(Response::new(AcquireResponse {
                status: WireStatus::Done as i32,
                handle: None,
            })),
            Err(other) => Err(store_err_to_status(other)),
        }
    }

    async fn renew(
        &self,
        request: Request<RenewRequest>,
    ) -> Result<Response<RenewResponse>, TonicStatus> {
        let req = request.into_inner();
        if req.owner.is_empty() {
            return Err(invalid_argument("invalid owner"));
        }
        let handle_id = ward_proto::parse_handle_id(&req.handle_id)
            .ok_or_else(|| invalid_argument("invalid handle ID"))?;

        let expires_at = Utc::now() + chrono::Duration::seconds(req.ttl_seconds as i64);
        self.store
            .renew(&req.owner, handle_id, expires_at, req.metadata)
            .await
            .map_err(store_err_to_status)?;
        Ok(Response::new(RenewResponse {}))
    }

    async fn done(
        &self,
        request: Request<DoneRequest>,
    ) -> Result<Response<DoneResponse>, TonicStatus> {
        let req = request.into_inner();
        if req.owner.is_empty() {
            return Err(invalid_argument("invalid owner"));
        }
        let handle_id = ward_proto::parse_handle_id(&req.handle_id)
            .ok_or_else(|| invalid_argument("invalid handle ID"))?;

        self.store
            .done(&req.owner, handle_id, req.metadata)
            .await
            .map_err(store_err_to_status)?;
        Ok(Response::new(DoneResponse {}))
    }

    type ListStream = ReceiverStream<Result<Handle, TonicStatus>>;

    async fn list(
        &self,
        request: Request<ListRequest>,
    ) -> Result<Response<Self::ListStream>, TonicStatus> {
        let req = request.into_inner();
        let filter = req.filter.map(Into::into).unwrap_or_default();
        let store = self.store.clone();

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            let mut sink = ChannelSink { tx };
            if let Err(err) = store.list(filter, req.offset, &mut sink).await {
                let _ = sink.tx.send(Err(store_err_to_status(err))).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

struct ChannelSink {
    tx: tokio::sync::mpsc::Sender<Result<Handle, TonicStatus>>,
}

#[tonic::async_trait]
impl ListSink for ChannelSink {
    async fn visit(
        &mut self,
        record: ward_core::HandleRecord,
    ) -> Result<ControlFlow, StoreError> {
        let handle = Handle::from(&record);
        // The client disconnecting drops the receiver, which makes `send`
        // fail; that's our signal to stop the backend's stream early.
        match self.tx.send(Ok(handle)).await {
            Ok(()) => Ok(ControlFlow::Continue),
            Err(_) => Ok(ControlFlow::Break),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_stream::StreamExt;
    use ward_store_memory::MemoryStore;

    fn service() -> WardService {
        WardService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn rejects_empty_owner() {
        let svc = service();
        let err = svc
            .acquire(Request::new(AcquireRequest {
                owner: String::new(),
                name: "res".into(),
                namespace: String::new(),
                ttl_seconds: 60,
                metadata: HashMap::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn rejects_empty_name_on_acquire() {
        let svc = service();
        let err = svc
            .acquire(Request::new(AcquireRequest {
                owner: "owner-a".into(),
                name: String::new(),
                namespace: String::new(),
                ttl_seconds: 60,
                metadata: HashMap::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn rejects_malformed_handle_id() {
        let svc = service();
        let err = svc
            .renew(Request::new(RenewRequest {
                owner: "owner-a".into(),
                handle_id: vec![1, 2, 3],
                ttl_seconds: 60,
                metadata: HashMap::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn maps_contention_and_completion_to_response_status_not_errors() {
        let svc = service();
        let acquire = |owner: &str| {
            Request::new(AcquireRequest {
                owner: owner.to_string(),
                name: "res".into(),
                namespace: String::new(),
                ttl_seconds: 60,
                metadata: HashMap::new(),
            })
        };

        let first = svc.acquire(acquire("owner-a")).await.unwrap().into_inner();
        assert_eq!(first.status, WireStatus::Ok as i32);
        let handle = first.handle.unwrap();

        let held = svc.acquire(acquire("owner-b")).await.unwrap().into_inner();
        assert_eq!(held.status, WireStatus::Held as i32);

        svc.done(Request::new(DoneRequest {
            owner: "owner-a".into(),
            handle_id: handle.id,
            metadata: HashMap::new(),
        }))
        .await
        .unwrap();

        let done = svc.acquire(acquire("owner-c")).await.unwrap().into_inner();
        assert_eq!(done.status, WireStatus::Done as i32);
    }

    #[tokio::test]
    async fn list_stream_reflects_acquired_handles() {
        let svc = service();
        svc.acquire(Request::new(AcquireRequest {
            owner: "owner-a".into(),
            name: "res".into(),
            namespace: "ns".into(),
            ttl_seconds: 60,
            metadata: HashMap::new(),
        }))
        .await
        .unwrap();

        let mut stream = svc
            .list(Request::new(ListRequest {
                filter: None,
                offset: 0,
            }))
            .await
            .unwrap()
            .into_inner();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.name, "res");
        assert!(stream.next().await.is_none());
    }
}

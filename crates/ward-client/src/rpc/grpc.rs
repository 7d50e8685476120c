//! Transport over a real `Ward` service, using `tonic`'s generated client.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tonic::transport::Channel;
use uuid::Uuid;
use ward_core::ListFilter;
use ward_proto::v1::ward_client::WardClient;
use ward_proto::v1::{
    AcquireRequest, DoneRequest, ListRequest, RenewRequest, Status as WireStatus,
};

use super::{AcquireOutcome, ListControlFlow, ListedHandle, Rpc, RpcListSink};
use crate::ClientError;

pub struct GrpcTransport {
    client: Mutex<WardClient<Channel>>,
}

impl GrpcTransport {
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        let client = WardClient::connect(endpoint.into()).await?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

#[async_trait]
impl Rpc for GrpcTransport {
    async fn acquire(
        &self,
        owner: &str,
        namespace: &str,
        name: &str,
        ttl_seconds: u32,
        metadata: HashMap<String, String>,
    ) -> Result<AcquireOutcome, ClientError> {
        let request = AcquireRequest {
            owner: owner.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            ttl_seconds,
            metadata,
        };
        let response = self
            .client
            .lock()
            .await
            .acquire(request)
            .await?
            .into_inner();

        match WireStatus::try_from(response.status).unwrap_or(WireStatus::Ok) {
            WireStatus::Ok => {
                let handle = response
                    .handle
                    .ok_or_else(|| ClientError::InvalidArgument("missing handle in OK response".into()))?;
                let id = ward_proto::parse_handle_id(&handle.id)
                    .ok_or_else(|| ClientError::InvalidArgument("invalid handle ID".into()))?;
                let expires_at = ward_proto::from_millis(handle.exp_tms)
                    .ok_or_else(|| ClientError::InvalidArgument("invalid expiry".into()))?;
                Ok(AcquireOutcome::Ok {
                    id,
                    expires_at,
                    metadata: handle.metadata,
                })
            }
            WireStatus::Held => Ok(AcquireOutcome::Held),
            WireStatus::Done => Ok(AcquireOutcome::Done),
        }
    }

    async fn renew(
        &self,
        owner: &str,
        id: Uuid,
        ttl_seconds: u32,
        metadata: HashMap<String, String>,
    ) -> Result<(), ClientError> {
        let request = RenewRequest {
            owner: owner.to_string(),
            handle_id: id.as_bytes().to_vec(),
            ttl_seconds,
            metadata,
        };
        self.client.lock().await.renew(request).await?;
        Ok(())
    }

    async fn done(
        &self,
        owner: &str,
        id: Uuid,
        metadata: HashMap<String, String>,
    ) -> Result<(), ClientError> {
        let request = DoneRequest {
            owner: owner.to_string(),
            handle_id: id.as_bytes().to_vec(),
            metadata,
        };
        self.client.lock().await.done(request).await?;
        Ok(())
    }

    async fn list(
        &self,
        filter: ListFilter,
        offset: u64,
        sink: &mut dyn RpcListSink,
    ) -> Result<(), ClientError> {
        let request = ListRequest {
            filter: Some(filter.into()),
            offset,
        };
        let mut stream = self.client.lock().await.list(request).await?.into_inner();

        while let Some(handle) = stream.message().await? {
            let id = ward_proto::parse_handle_id(&handle.id)
                .ok_or_else(|| ClientError::InvalidArgument("invalid handle ID".into()))?;
            let expires_at = ward_proto::from_millis(handle.exp_tms)
                .ok_or_else(|| ClientError::InvalidArgument("invalid expiry".into()))?;
            let done_at = ward_proto::from_millis(handle.done_tms);

            let listed = ListedHandle {
                id,
                namespace: handle.namespace,
                name: handle.name,
                expires_at,
                done_at,
                num_acquired: handle.num_acquired,
                metadata: handle.metadata,
            };

            if sink.visit(listed).await? == ListControlFlow::Break {
                break;
            }
        }
        Ok(())
    }
}

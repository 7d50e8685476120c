//! A usable API over the `Ward` service: done-set-cached acquisition plus
//! the lifecycle management a lease maintainer needs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use ward_core::{ListFilter, Status, Store};

use crate::cache::Cache;
use crate::handle::Handle;
use crate::options::ClientOptions;
use crate::rpc::{AcquireOutcome, DirectTransport, GrpcTransport, ListControlFlow, ListedHandle, Rpc};
use crate::ClientError;

/// A usable, done-set-cached API over a `Ward` deployment.
///
/// Handles created from a `Client` must not outlive it: dropping the
/// client does not currently stop their background renewal tasks, since
/// each task holds only the pieces of state it needs (`Handle`'s own
/// cancellation path is independent of `Client`).
pub struct Client {
    rpc: Arc<dyn Rpc>,
    cache: Cache,
    owner: String,
    namespace: String,
    default_metadata: HashMap<String, String>,
    ttl: Duration,
    on_error: Option<Arc<dyn Fn(ClientError) + Send + Sync>>,
}

impl Client {
    /// Dials `endpoint` over gRPC, opens the done-set cache, and runs
    /// done-catchup before returning.
    pub async fn connect(endpoint: impl Into<String>, options: ClientOptions) -> Result<Self, ClientError> {
        let rpc = GrpcTransport::connect(endpoint).await?;
        Self::new(Arc::new(rpc), options).await
    }

    /// Skips the network and drives `store` in-process. Intended for
    /// tests; use `connect` in production.
    pub async fn direct(store: Arc<dyn Store>, options: ClientOptions) -> Result<Self, ClientError> {
        let rpc = DirectTransport::new(store);
        Self::new(Arc::new(rpc), options).await
    }

    async fn new(rpc: Arc<dyn Rpc>, options: ClientOptions) -> Result<Self, ClientError> {
        std::fs::create_dir_all(&options.dir)?;
        let cache_dir = options.dir.join(format!("ward-client-{}", Uuid::new_v4()));
        let cache = Cache::open(&cache_dir)?;

        let client = Self {
            rpc,
            cache,
            owner: options.owner,
            namespace: options.namespace,
            default_metadata: options.metadata,
            ttl: options.ttl,
            on_error: options.on_error,
        };

        client.done_catchup().await?;
        Ok(client)
    }

    /// Lists names already done in this namespace and populates the local
    /// cache from them, via a single batched write. Runs once, exactly at
    /// construction, before the client is usable.
    async fn done_catchup(&self) -> Result<(), ClientError> {
        let filter = ListFilter {
            status: Status::Done,
            prefix: self.namespace.clone(),
            metadata: HashMap::new(),
        };

        let mut batch = self.cache.add_batch();
        let mut sink = |handle: ListedHandle| {
            // The store only prefix-matches `namespace`, so a sibling
            // namespace sharing this prefix (e.g. "team-ab" under "team-a")
            // can show up here too; only exact matches belong in our cache.
            if handle.namespace == self.namespace {
                batch.add(&handle.name);
            }
            ListControlFlow::Continue
        };
        self.rpc.list(filter, 0, &mut sink).await?;
        batch.flush()
    }

    /// Step by step: a cache hit short-circuits without
    /// an RPC; `HELD`/`DONE` responses become errors (`DONE` also updates
    /// the local cache so a repeat acquire of the same name short-circuits
    /// too); `OK` becomes a live [`Handle`] with a running renewal task.
    pub async fn acquire(
        &self,
        name: impl Into<String>,
        metadata: HashMap<String, String>,
    ) -> Result<Handle, ClientError> {
        let name = name.into();
        if self.cache.contains(&name)? {
            return Err(ClientError::Done);
        }

        let merged = ward_proto::merge_metadata_caller_wins(&self.default_metadata, metadata);
        let ttl_seconds = self.ttl.as_secs().min(u32::MAX as u64) as u32;

        match self
            .rpc
            .acquire(&self.owner, &self.namespace, &name, ttl_seconds, merged)
            .await?
        {
            AcquireOutcome::Held => Err(ClientError::Acquired),
            AcquireOutcome::Done => {
                self.cache.add(&name)?;
                Err(ClientError::Done)
            }
            AcquireOutcome::Ok { id, metadata, .. } => Ok(Handle::spawn(
                id,
                self.owner.clone(),
                self.ttl,
                metadata,
                self.rpc.clone(),
                self.on_error.clone(),
            )),
        }
    }

    /// Releases the done-set cache. Any owned transport connection is
    /// dropped along with the client.
    pub fn close(self) {
        self.cache.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ward_core::{AcquireParams, HandleRecord, ListSink, StoreError};
    use ward_store_memory::MemoryStore;

    /// Wraps a `Store` and counts `acquire` calls, so a cache short-circuit
    /// has something concrete to assert on.
    struct RecordingStore {
        inner: MemoryStore,
        acquire_calls: AtomicUsize,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                acquire_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Store for RecordingStore {
        async fn acquire(&self, params: AcquireParams) -> Result<HandleRecord, StoreError> {
            self.acquire_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.acquire(params).await
        }

        async fn renew(
            &self,
            owner: &str,
            id: Uuid,
            expires_at: chrono::DateTime<chrono::Utc>,
            metadata: HashMap<String, String>,
        ) -> Result<(), StoreError> {
            self.inner.renew(owner, id, expires_at, metadata).await
        }

        async fn done(
            &self,
            owner: &str,
            id: Uuid,
            metadata: HashMap<String, String>,
        ) -> Result<(), StoreError> {
            self.inner.done(owner, id, metadata).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<HandleRecord>, StoreError> {
            self.inner.get(id).await
        }

        async fn list(
            &self,
            filter: ListFilter,
            offset: u64,
            sink: &mut dyn ListSink,
        ) -> Result<(), StoreError> {
            self.inner.list(filter, offset, sink).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    fn options() -> ClientOptions {
        ClientOptions::default().dir(std::env::temp_dir())
    }

    #[tokio::test]
    async fn acquire_then_done_then_reacquire_fails() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let client = Client::direct(store, options()).await.unwrap();

        let handle = client.acquire("res", HashMap::new()).await.unwrap();
        handle.done(HashMap::new()).await.unwrap();

        let err = client.acquire("res", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Done));
    }

    #[tokio::test]
    async fn second_owner_sees_acquired() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let a = Client::direct(store.clone(), options().owner("owner-a")).await.unwrap();
        let b = Client::direct(store, options().owner("owner-b")).await.unwrap();

        let _handle = a.acquire("res", HashMap::new()).await.unwrap();
        let err = b.acquire("res", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Acquired));
    }

    #[tokio::test]
    async fn cache_short_circuits_after_done_response_with_zero_rpcs() {
        let store = Arc::new(RecordingStore::new());
        let owner_a = Client::direct(store.clone(), options().owner("owner-a")).await.unwrap();
        let handle = owner_a.acquire("res", HashMap::new()).await.unwrap();
        handle.done(HashMap::new()).await.unwrap();

        // A fresh client in the same namespace does catchup, then its own
        // acquire of the already-done name must short-circuit locally.
        let owner_b = Client::direct(store.clone(), options().owner("owner-b")).await.unwrap();
        let before = store.acquire_calls.load(Ordering::SeqCst);
        let err = owner_b.acquire("res", HashMap::new()).await.unwrap_err();
        let after = store.acquire_calls.load(Ordering::SeqCst);

        assert!(matches!(err, ClientError::Done));
        assert_eq!(before, after, "acquire should not have reached the store");
    }

    #[tokio::test]
    async fn closed_handle_rejects_every_method() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let client = Client::direct(store, options()).await.unwrap();
        let handle = client.acquire("res", HashMap::new()).await.unwrap();

        handle.discard().await.unwrap();

        assert!(matches!(
            handle.renew(HashMap::new()).await.unwrap_err(),
            ClientError::Closed
        ));
        assert!(matches!(
            handle.done(HashMap::new()).await.unwrap_err(),
            ClientError::Closed
        ));
        assert!(matches!(handle.discard().await.unwrap_err(), ClientError::Closed));
    }

    #[tokio::test]
    async fn discard_releases_the_lease_for_another_owner() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let a = Client::direct(store.clone(), options().owner("owner-a")).await.unwrap();
        let b = Client::direct(store, options().owner("owner-b")).await.unwrap();

        let handle = a.acquire("res", HashMap::new()).await.unwrap();
        handle.discard().await.unwrap();

        b.acquire("res", HashMap::new()).await.unwrap();
    }
}

//! The client-side object mediating one lease lifecycle: periodic
//! background renewal plus the terminal `done`/`discard` transitions.
//! A [`CancellationToken`] owned by the `Handle` and watched by its
//! renewal task stops that task deterministically, avoiding cyclic
//! ownership between a handle and its own background task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::rpc::Rpc;
use crate::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Live,
    Closed,
}

struct Inner {
    metadata: HashMap<String, String>,
    state: LifecycleState,
}

/// A lease held by this process. `Handle` is observationally identical
/// whether it ended via `done` or `discard`: both are terminal, and every
/// method fails fast with [`ClientError::Closed`] afterward.
pub struct Handle {
    id: Uuid,
    owner: String,
    ttl: Duration,
    rpc: Arc<dyn Rpc>,
    inner: Arc<Mutex<Inner>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Handle {
    pub(crate) fn spawn(
        id: Uuid,
        owner: String,
        ttl: Duration,
        metadata: HashMap<String, String>,
        rpc: Arc<dyn Rpc>,
        on_error: Option<Arc<dyn Fn(ClientError) + Send + Sync>>,
    ) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            metadata,
            state: LifecycleState::Live,
        }));
        let cancel = CancellationToken::new();

        tokio::spawn(run_renewal(
            owner.clone(),
            id,
            ttl,
            rpc.clone(),
            inner.clone(),
            cancel.clone(),
            on_error,
        ));

        Self {
            id,
            owner,
            ttl,
            rpc,
            inner,
            cancel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// A snapshot of the handle's metadata; never aliases internal state.
    pub async fn metadata(&self) -> HashMap<String, String> {
        self.inner.lock().await.metadata.clone()
    }

    /// Sets a metadata key locally. Persisted to the store on the next
    /// `renew` or `done`, not before.
    pub async fn set_meta(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.lock().await.metadata.insert(key.into(), value.into());
    }

    /// Merges `extra_meta`, then renews with the full metadata snapshot
    /// and the handle's configured TTL.
    pub async fn renew(&self, extra_meta: HashMap<String, String>) -> Result<(), ClientError> {
        let mut guard = self.inner.lock().await;
        if guard.state == LifecycleState::Closed {
            return Err(ClientError::Closed);
        }
        guard.metadata.extend(extra_meta);
        let snapshot = guard.metadata.clone();
        let ttl_seconds = ttl_seconds(self.ttl);
        self.rpc.renew(&self.owner, self.id, ttl_seconds, snapshot).await
    }

    /// Merges `extra_meta`, sends a done RPC with the full snapshot.
    /// Transitions to closed only if that RPC succeeds.
    pub async fn done(&self, extra_meta: HashMap<String, String>) -> Result<(), ClientError> {
        let mut guard = self.inner.lock().await;
        if guard.state == LifecycleState::Closed {
            return Err(ClientError::Closed);
        }
        guard.metadata.extend(extra_meta);
        let snapshot = guard.metadata.clone();
        self.rpc.done(&self.owner, self.id, snapshot).await?;
        guard.state = LifecycleState::Closed;
        drop(guard);
        self.cancel.cancel();
        Ok(())
    }

    /// Releases the lease cooperatively without marking it done, via a
    /// renew with TTL = 0. Transitions to closed regardless of RPC
    /// outcome.
    pub async fn discard(&self) -> Result<(), ClientError> {
        let mut guard = self.inner.lock().await;
        if guard.state == LifecycleState::Closed {
            return Err(ClientError::Closed);
        }
        let snapshot = guard.metadata.clone();
        let _ = self.rpc.renew(&self.owner, self.id, 0, snapshot).await;
        guard.state = LifecycleState::Closed;
        drop(guard);
        self.cancel.cancel();
        Ok(())
    }
}

fn ttl_seconds(ttl: Duration) -> u32 {
    ttl.as_secs().min(u32::MAX as u64) as u32
}

async fn run_renewal(
    owner: String,
    id: Uuid,
    ttl: Duration,
    rpc: Arc<dyn Rpc>,
    inner: Arc<Mutex<Inner>>,
    cancel: CancellationToken,
    on_error: Option<Arc<dyn Fn(ClientError) + Send + Sync>>,
) {
    let period = ttl.mul_f64(0.3).max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await; // the first tick fires immediately; the lease is already fresh

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let mut guard = inner.lock().await;
                if guard.state == LifecycleState::Closed {
                    return;
                }
                let snapshot = guard.metadata.clone();
                let result = rpc.renew(&owner, id, ttl_seconds(ttl), snapshot).await;
                drop(guard);

                if let Err(err) = result {
                    // `Closed` can only mean a teardown raced this tick; expected, not reported.
                    if !matches!(err, ClientError::Closed) {
                        if let Some(sink) = &on_error {
                            sink(err);
                        }
                    }
                }
            }
        }
    }
}

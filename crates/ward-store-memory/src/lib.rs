//! In-process [`Store`] implementation for testing, the direct client
//! bypass, and small deployments that don't need a Postgres backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use ward_core::{AcquireParams, HandleRecord, ListFilter, ListSink, Store, StoreError};

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct FullName {
    namespace: String,
    name: String,
}

#[derive(Default)]
struct Inner {
    by_name: HashMap<FullName, HandleRecord>,
    by_id: HashMap<Uuid, FullName>,
    /// Insertion order, oldest first; never reordered by takeover (a
    /// takeover keeps the slot its first acquire occupied). `list` walks
    /// this in reverse for newest-first ordering.
    as_list: Vec<FullName>,
}

/// An in-memory, single-process [`Store`].
///
/// An `Arc<RwLock<HashMap<...>>>`-backed `Store`, but
/// keys records by both `(namespace, name)` and `id` so `get` and `acquire`
/// don't need a linear scan.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn acquire(&self, params: AcquireParams) -> Result<HandleRecord, StoreError> {
        let key = FullName {
            namespace: params.namespace.clone(),
            name: params.name.clone(),
        };
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.by_name.get(&key) {
            if existing.is_done() {
                return Err(StoreError::Done);
            }
            if existing.is_alive(now) {
                return Err(StoreError::Acquired);
            }
        }

        let record = match inner.by_name.get(&key) {
            Some(prior) => HandleRecord {
                id: Uuid::new_v4(),
                namespace: params.namespace,
                name: params.name,
                owner: params.owner,
                created_at: prior.created_at,
                updated_at: now,
                expires_at: params.expires_at,
                done_at: None,
                num_acquired: prior.num_acquired + 1,
                metadata: {
                    let mut merged = prior.metadata.clone();
                    merged.extend(params.metadata);
                    merged
                },
            },
            None => HandleRecord {
                id: Uuid::new_v4(),
                namespace: params.namespace,
                name: params.name,
                owner: params.owner,
                created_at: now,
                updated_at: now,
                expires_at: params.expires_at,
                done_at: None,
                num_acquired: 1,
                metadata: params.metadata,
            },
        };

        if let Some(prior_id) = inner.by_name.get(&key).map(|prior| prior.id) {
            inner.by_id.remove(&prior_id);
        } else {
            inner.as_list.push(key.clone());
        }
        inner.by_id.insert(record.id, key.clone());
        inner.by_name.insert(key, record.clone());
        Ok(record)
    }

    async fn renew(
        &self,
        owner: &str,
        id: Uuid,
        expires_at: chrono::DateTime<Utc>,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = inner.by_id.get(&id).cloned().ok_or(StoreError::InvalidHandle)?;
        let record = inner.by_name.get_mut(&key).ok_or(StoreError::InvalidHandle)?;
        if record.owner != owner || record.is_done() {
            return Err(StoreError::InvalidHandle);
        }
        record.expires_at = expires_at;
        record.updated_at = Utc::now();
        record.merge_metadata(metadata);
        Ok(())
    }

    async fn done(
        &self,
        owner: &str,
        id: Uuid,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = inner.by_id.get(&id).cloned().ok_or(StoreError::InvalidHandle)?;
        let record = inner.by_name.get_mut(&key).ok_or(StoreError::InvalidHandle)?;
        if record.owner != owner || record.is_done() {
            return Err(StoreError::InvalidHandle);
        }
        let now = Utc::now();
        record.done_at = Some(now);
        record.updated_at = now;
        record.merge_metadata(metadata);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<HandleRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_id
            .get(&id)
            .and_then(|key| inner.by_name.get(key))
            .cloned())
    }

    async fn list(
        &self,
        filter: ListFilter,
        offset: u64,
        sink: &mut dyn ListSink,
    ) -> Result<(), StoreError> {
        let inner = self.inner.read().await;
        let mut skipped = 0u64;
        for key in inner.as_list.iter().rev() {
            let Some(record) = inner.by_name.get(key) else { continue };
            if !filter.matches(record) {
                continue;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            if sink.visit(record.clone()).await? == ward_core::ControlFlow::Break {
                break;
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_compliance_suite() {
        let store = MemoryStore::new();
        ward_store_testsuite::run_compliance_tests(&store).await;
    }
}

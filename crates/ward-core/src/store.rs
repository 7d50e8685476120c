use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{AcquireParams, HandleRecord, ListFilter, StoreError};

/// Whether a [`ListSink`] wants more records.
///
/// `Break` is the Rust analog of an iterator stop sentinel: a
/// sink returns it to end the stream cleanly after having seen everything
/// it needed to see (e.g. the first matching record, or a disconnected
/// client on the service side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Break,
}

/// Receives records from [`Store::list`] in newest-first order.
#[async_trait]
pub trait ListSink: Send {
    async fn visit(&mut self, record: HandleRecord) -> Result<ControlFlow, StoreError>;
}

#[async_trait]
impl<F> ListSink for F
where
    F: FnMut(HandleRecord) -> ControlFlow + Send,
{
    async fn visit(&mut self, record: HandleRecord) -> Result<ControlFlow, StoreError> {
        Ok((self)(record))
    }
}

/// Durable storage for handle records.
///
/// Implementations must make `acquire` a single atomic, race-free
/// operation with respect to concurrent callers racing on the same
/// `(namespace, name)` — see the decision table on [`Store::acquire`].
/// Reading the prior state and then writing a decision in a second,
/// separate step is a correctness bug, not an optimization to make later.
#[async_trait]
pub trait Store: Send + Sync {
    /// Atomic acquire-or-takeover-or-refuse:
    ///
    /// - Unheld or already-owned-by-this-owner: grant, incrementing `num_acquired`
    ///   only on a genuine takeover of someone else's record.
    /// - Held and alive by another owner: refuse with `StoreError::Acquired`.
    /// - Done: refuse with `StoreError::Done`.
    /// - Held but expired, not done: takeover — new id, new owner, metadata merged
    ///   from the prior record.
    ///
    /// On success, the returned record's `(id, owner)` identifies the
    /// caller that won any race; callers that lost a takeover race can
    /// detect this by comparing the returned owner/id against what they
    /// attempted, but implementations are expected to already resolve this
    /// internally and return `StoreError::Acquired` rather than a winning
    /// record belonging to someone else.
    async fn acquire(&self, params: AcquireParams) -> Result<HandleRecord, StoreError>;

    /// Extends `expires_at` and unions `metadata` on the record matching
    /// `id AND owner AND done_at IS NULL`. `expires_at` may be in the past
    /// (releases the lease immediately — used by `discard`).
    async fn renew(
        &self,
        owner: &str,
        id: Uuid,
        expires_at: DateTime<Utc>,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Sets `done_at` and unions `metadata`, atomically, on the record
    /// matching `id AND owner AND done_at IS NULL`.
    async fn done(
        &self,
        owner: &str,
        id: Uuid,
        metadata: HashMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Looks up a record by id. `None` (not an error) for unknown ids.
    async fn get(&self, id: Uuid) -> Result<Option<HandleRecord>, StoreError>;

    /// Streams records newest-first (by `created_at` descending, ties
    /// broken by `id`), skipping `offset`, filtering by `filter`, calling
    /// `sink.visit` for each match.
    async fn list(
        &self,
        filter: ListFilter,
        offset: u64,
        sink: &mut dyn ListSink,
    ) -> Result<(), StoreError>;

    /// Health check used by the service's supervised ping task.
    async fn ping(&self) -> Result<(), StoreError>;
}

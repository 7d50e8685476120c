use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A persisted handle on a named resource within a namespace.
///
/// `(namespace, name)` is unique among records for which `done_at` has
/// never been set to a non-null value for any record sharing that pair
/// (the uniqueness constraint lives on the row itself: once done, a record
/// is immutable and a later acquire of the same pair is simply refused).
#[derive(Debug, Clone, PartialEq)]
pub struct HandleRecord {
    pub id: Uuid,
    pub namespace: String,
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
    pub num_acquired: u32,
    pub metadata: HashMap<String, String>,
}

impl HandleRecord {
    /// A handle is alive iff it isn't done and its lease hasn't expired.
    ///
    /// Expiry uses `<`, not `<=`: a record whose `expires_at` equals `now`
    /// exactly is still alive.
    pub fn is_alive(&self, now: DateTime<Utc>) -> bool {
        self.done_at.is_none() && self.expires_at > now
    }

    pub fn is_done(&self) -> bool {
        self.done_at.is_some()
    }

    /// Union `other` into this record's metadata: conflicting keys take
    /// `other`'s value, keys absent from `other` are left untouched.
    pub fn merge_metadata(&mut self, other: HashMap<String, String>) {
        self.metadata.extend(other);
    }
}

/// Parameters for [`crate::Store::acquire`].
#[derive(Debug, Clone)]
pub struct AcquireParams {
    pub owner: String,
    pub namespace: String,
    pub name: String,
    pub expires_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

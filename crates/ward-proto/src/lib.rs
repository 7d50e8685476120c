//! Wire messages and `tonic`-generated client/server stubs for the `Ward`
//! gRPC service, plus the conversions between them and `ward-core`'s
//! domain types.
//!
//! The boundary other crates program against is
//! [`v1::ward_server::Ward`] / [`v1::ward_client::WardClient`], not
//! `tonic` itself — swapping the transport means reimplementing those
//! traits, not touching every caller.

pub mod v1 {
    tonic::include_proto!("ward.v1");
}

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;
use ward_core::{HandleRecord, ListFilter, Status};

/// Converts a `DateTime<Utc>` to epoch-milliseconds for the wire.
///
/// This truncates sub-millisecond precision — exact equality checks on a
/// timestamp that has crossed the wire are unsafe.
pub fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

/// The inverse of [`to_millis`]. `0` is treated as "unset" (used for
/// `done_tms`, which is `0` when a handle isn't done).
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

impl From<&HandleRecord> for v1::Handle {
    fn from(record: &HandleRecord) -> Self {
        v1::Handle {
            id: record.id.as_bytes().to_vec(),
            namespace: record.namespace.clone(),
            name: record.name.clone(),
            exp_tms: to_millis(record.expires_at),
            done_tms: record.done_at.map(to_millis).unwrap_or(0),
            num_acquired: record.num_acquired,
            metadata: record.metadata.clone(),
        }
    }
}

/// Parses a 16-byte handle id out of a wire `Handle`/`Renew`/`Done`
/// request field. Returns `None` if the bytes aren't a valid UUID, which
/// callers should map to the service's `InvalidArgument("invalid handle
/// ID")` validation error.
pub fn parse_handle_id(bytes: &[u8]) -> Option<Uuid> {
    Uuid::from_slice(bytes).ok()
}

impl From<v1::list_request::FilterStatus> for Status {
    fn from(value: v1::list_request::FilterStatus) -> Self {
        match value {
            v1::list_request::FilterStatus::Any => Status::Any,
            v1::list_request::FilterStatus::Pending => Status::Pending,
            v1::list_request::FilterStatus::Done => Status::Done,
        }
    }
}

impl From<Status> for v1::list_request::FilterStatus {
    fn from(value: Status) -> Self {
        match value {
            Status::Any => v1::list_request::FilterStatus::Any,
            Status::Pending => v1::list_request::FilterStatus::Pending,
            Status::Done => v1::list_request::FilterStatus::Done,
        }
    }
}

impl From<v1::list_request::Filter> for ListFilter {
    fn from(filter: v1::list_request::Filter) -> Self {
        ListFilter {
            status: v1::list_request::FilterStatus::try_from(filter.status)
                .unwrap_or(v1::list_request::FilterStatus::Any)
                .into(),
            prefix: filter.prefix,
            metadata: filter.metadata,
        }
    }
}

impl From<ListFilter> for v1::list_request::Filter {
    fn from(filter: ListFilter) -> Self {
        v1::list_request::Filter {
            status: v1::list_request::FilterStatus::from(filter.status) as i32,
            prefix: filter.prefix,
            metadata: filter.metadata,
        }
    }
}

/// Unions `caller` beneath `defaults`: `caller`'s values win on conflict.
pub fn merge_metadata_caller_wins(
    defaults: &HashMap<String, String>,
    caller: HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = defaults.clone();
    merged.extend(caller);
    merged
}

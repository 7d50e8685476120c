//! Domain model and storage contract for the ward lease system.
//!
//! This crate has no I/O of its own: it defines [`HandleRecord`], the
//! [`Store`] trait every backend implements, and the error/filter types
//! shared by the service and client layers. Concrete backends live in
//! `ward-store-memory` and `ward-store-postgres`.

mod error;
mod filter;
mod record;
mod store;

pub use error::StoreError;
pub use filter::{ListFilter, Status};
pub use record::{AcquireParams, HandleRecord};
pub use store::{ControlFlow, ListSink, Store};

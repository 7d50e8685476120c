//! Client-side lease maintainer: done-set-cached acquisition, a per-handle
//! renewal task, and handle lifecycle guarantees.

mod cache;
mod client;
mod error;
mod handle;
mod options;
mod rpc;

pub use cache::{BatchWriter, Cache};
pub use client::Client;
pub use error::ClientError;
pub use handle::Handle;
pub use options::ClientOptions;
pub use rpc::{AcquireOutcome, DirectTransport, GrpcTransport, ListControlFlow, ListedHandle, Rpc, RpcListSink};

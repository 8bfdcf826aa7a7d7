//! transport component
//!
//! The node-aware HTTP request transport: a connection pool over one or
//! more cluster endpoints, health tracking and resurrection, cluster
//! discovery via sniffing, and a single `request` entry point that encodes
//! bodies, merges headers, retries per status code, and reports outcomes
//! through an injectable event sink.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod auth;
mod config;
mod events;
mod pool;
mod request;
mod transport;
mod user_agent;
mod warning;

pub use auth::Credentials;
pub use config::{parse_duration, TransportConfig};
pub use events::{no_op_sink, Event, EventSink};
pub use pool::Pool;
pub use request::{
    BulkBody, BulkBodyItem, ByteStream, RequestBody, RequestOptions, RequestParams, ResponseBody,
    ResponseMeta, SniffMeta, TransportResponse,
};
pub use transport::Transport;
pub use user_agent::user_agent;
pub use warning::parse_warning_values;

// Re-exported so downstream crates can build pools/connections without
// depending on `transport-pool`/`transport-connection` directly.
pub use transport_connection::AbortHandle;
pub use transport_errors::{ResponseErrorMeta, TransportError, TransportResult};
pub use transport_pool::{
    parse_cloud_id, CloudConnectionPool, ConnectionContext, DefaultNodeFilter, ExecutorFactory,
    NodeFilter, PoolConfig, RandomSelector, ResurrectOutcome, RoundRobinSelector, Selector,
    StandardPool,
};
pub use transport_types::{
    Compression, ConnectionStatus, NodeDescriptor, NodeRole, RequestId, ResurrectStrategy, RoleSet,
    SniffNodesMap, SniffReason,
};

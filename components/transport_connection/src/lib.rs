//! transport_connection component
//!
//! One HTTP/1.1 connection per endpoint: request execution, path/query
//! resolution, and the health bookkeeping (`status`, `deadCount`,
//! `resurrectTimeout`) that the pool reads and mutates.
//!
//! The HTTP layer itself is injected via [`HttpExecutor`], matching the
//! teacher's pattern of keeping sockets behind a trait object so tests never
//! need to bind one.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod abort;
mod connection;
mod executor;
mod hyper_executor;
mod path;

/// Scripted [`HttpExecutor`] for tests, behind `test-support`.
#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use abort::AbortHandle;
pub use connection::{header, response_is_stream, Connection, RequestParams, TlsOptions, TlsVersion};
pub use executor::{HttpExecutor, InboundResponse, OutboundRequest, RequestPayload, ResponsePayload};
pub use hyper_executor::{hyper_executor, HyperExecutor, SharedExecutor};
pub use path::build_request_url;

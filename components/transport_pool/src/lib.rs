//! transport_pool component
//!
//! Connection set management, health tracking, resurrection, and selection:
//! [`BaseConnectionPool`] for identity-preserving construction/update,
//! [`StandardPool`] for the health/resurrection/selection layer most
//! deployments use, and [`CloudConnectionPool`] for the single-endpoint
//! cloud variant.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod base;
mod cloud;
mod filter;
mod selector;
mod standard;

pub use base::{BaseConnectionPool, ExecutorFactory};
pub use cloud::{parse_cloud_id, CloudConnectionPool};
pub use filter::{DefaultNodeFilter, NodeFilter};
pub use selector::{RandomSelector, RoundRobinSelector, Selector};
pub use standard::{ConnectionContext, PoolConfig, ResurrectOutcome, StandardPool};

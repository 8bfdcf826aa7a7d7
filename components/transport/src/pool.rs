//! Pool-variant polymorphism
//!
//! The distilled spec expresses `StandardPool`/`CloudConnectionPool` as two
//! implementations of one pool trait. An enum plays that role here instead
//! of a `dyn Trait`: `StandardPool::get_connection` takes `self: &Arc<Self>`
//! (so it can spawn its own fire-and-forget resurrection task), which is
//! awkward to express as a trait object; a closed, two-variant enum gives
//! the transport the same uniform surface without it.

use std::sync::Arc;

use transport_connection::Connection;
use transport_errors::TransportError;
use transport_pool::{CloudConnectionPool, ConnectionContext, StandardPool};
use transport_types::NodeDescriptor;

/// The connection pool backing a [`crate::Transport`].
pub enum Pool {
    /// Health-tracked, resurrecting, selectable multi-endpoint pool.
    Standard(Arc<StandardPool>),
    /// Single cached connection resolved from an Elastic Cloud id.
    Cloud(Arc<CloudConnectionPool>),
}

impl Pool {
    /// Select a connection for this request, per the variant's own rules.
    pub async fn get_connection(&self, ctx: ConnectionContext) -> Option<Arc<Connection>> {
        match self {
            Pool::Standard(pool) => pool.get_connection(ctx).await,
            Pool::Cloud(pool) => pool.get_connection().await,
        }
    }

    /// Record `conn` as healthy.
    pub async fn mark_alive(&self, conn: &Connection) {
        match self {
            Pool::Standard(pool) => pool.mark_alive(conn).await,
            Pool::Cloud(_) => conn.mark_alive(),
        }
    }

    /// Record `conn` as unhealthy, honoring whatever backoff/immortality
    /// rule the variant applies.
    pub async fn mark_dead(&self, conn: &Connection, base: std::time::Duration, cutoff: u32) {
        match self {
            Pool::Standard(pool) => pool.mark_dead(conn).await,
            Pool::Cloud(_) => conn.mark_dead(base, cutoff),
        }
    }

    /// Reconcile membership with a fresh node list (a no-op for the cloud
    /// variant, which never grows past its one connection).
    pub async fn update(&self, nodes: Vec<NodeDescriptor>) -> Result<(), TransportError> {
        match self {
            Pool::Standard(pool) => pool.update(nodes).await,
            Pool::Cloud(_) => Ok(()),
        }
    }

    /// Close every connection this pool holds.
    pub async fn empty(&self) {
        match self {
            Pool::Standard(pool) => pool.empty().await,
            Pool::Cloud(pool) => pool.empty().await,
        }
    }
}

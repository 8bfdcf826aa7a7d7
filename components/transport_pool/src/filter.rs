use transport_connection::Connection;

/// Decides whether a connection is eligible for selection.
pub trait NodeFilter: Send + Sync {
    /// Return true to keep `conn` in the candidate set.
    fn accepts(&self, conn: &Connection) -> bool;
}

impl<F> NodeFilter for F
where
    F: Fn(&Connection) -> bool + Send + Sync,
{
    fn accepts(&self, conn: &Connection) -> bool {
        self(conn)
    }
}

/// Excludes nodes whose role set is exactly `{master}` (master-only nodes
/// do not serve data requests).
pub struct DefaultNodeFilter;

impl NodeFilter for DefaultNodeFilter {
    fn accepts(&self, conn: &Connection) -> bool {
        !conn.roles.is_master_only()
    }
}

//! transport_types component
//!
//! Shared vocabulary for the transport: node roles, connection health state,
//! resurrection strategy, sniff reasons, and the descriptor shape used both
//! for user-supplied endpoints and for endpoints discovered via sniffing.
//!
//! This component is intentionally inert: it defines data, not behavior.
//! The pool and transport crates own the state machines that operate on
//! these types.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Monotonically increasing identifier assigned to each request for log
/// correlation and event ordering.
pub type RequestId = u64;

/// The four node roles a cluster endpoint may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Eligible to hold the master/coordinator role.
    Master,
    /// Holds indexed data and serves reads/writes for it.
    Data,
    /// Pre-processes documents before indexing.
    Ingest,
    /// Runs machine-learning jobs.
    Ml,
}

impl NodeRole {
    /// All known roles, in a stable order.
    pub const ALL: [NodeRole; 4] = [NodeRole::Master, NodeRole::Data, NodeRole::Ingest, NodeRole::Ml];

    /// Parse a role name as used in sniff responses and descriptors.
    ///
    /// # Errors
    /// Returns the original string if it does not name a known role.
    pub fn parse(name: &str) -> Result<NodeRole, String> {
        match name {
            "master" => Ok(NodeRole::Master),
            "data" => Ok(NodeRole::Data),
            "ingest" => Ok(NodeRole::Ingest),
            "ml" => Ok(NodeRole::Ml),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeRole::Master => "master",
            NodeRole::Data => "data",
            NodeRole::Ingest => "ingest",
            NodeRole::Ml => "ml",
        };
        f.write_str(s)
    }
}

/// The set of roles a connection advertises.
///
/// Defaults to `{master, data, ingest}` enabled and `ml` disabled, matching
/// a typical cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    /// Whether the `master` role is enabled.
    pub master: bool,
    /// Whether the `data` role is enabled.
    pub data: bool,
    /// Whether the `ingest` role is enabled.
    pub ingest: bool,
    /// Whether the `ml` role is enabled.
    pub ml: bool,
}

impl Default for RoleSet {
    fn default() -> Self {
        Self {
            master: true,
            data: true,
            ingest: true,
            ml: false,
        }
    }
}

impl RoleSet {
    /// A role set with every role disabled.
    pub fn none() -> Self {
        Self {
            master: false,
            data: false,
            ingest: false,
            ml: false,
        }
    }

    /// Whether `role` is currently enabled.
    pub fn is_enabled(&self, role: NodeRole) -> bool {
        match role {
            NodeRole::Master => self.master,
            NodeRole::Data => self.data,
            NodeRole::Ingest => self.ingest,
            NodeRole::Ml => self.ml,
        }
    }

    /// Enable or disable `role`.
    pub fn set(&mut self, role: NodeRole, enabled: bool) {
        match role {
            NodeRole::Master => self.master = enabled,
            NodeRole::Data => self.data = enabled,
            NodeRole::Ingest => self.ingest = enabled,
            NodeRole::Ml => self.ml = enabled,
        }
    }

    /// True when `master` is the only enabled role. This is the default
    /// node filter's exclusion criterion: master-only nodes do not serve
    /// data requests.
    pub fn is_master_only(&self) -> bool {
        self.master && !self.data && !self.ingest && !self.ml
    }

    /// Build a role set from the role names present in a sniff response
    /// (`["master", "data"]`); roles absent from the list are disabled.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = RoleSet::none();
        for name in names {
            if let Ok(role) = NodeRole::parse(name.as_ref()) {
                set.set(role, true);
            }
        }
        set
    }
}

/// Health state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Eligible for selection.
    Alive,
    /// Excluded from selection until resurrected.
    Dead,
}

/// How the pool attempts to bring a dead connection back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResurrectStrategy {
    /// Never attempt resurrection; dead connections stay dead until
    /// replaced by a pool `update`.
    None,
    /// Probe with `HEAD /` before declaring a connection alive again.
    #[default]
    Ping,
    /// Declare the connection alive again without probing it.
    Optimistic,
}

/// Outgoing body compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    /// Gzip-compress request bodies and advertise `Content-Encoding: gzip`.
    Gzip,
}

/// Why a sniff round was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffReason {
    /// Fired once from the transport constructor.
    OnStart,
    /// Fired because the sniff interval elapsed.
    Interval,
    /// Fired after a transport-level failure, when enabled.
    OnConnectionFault,
    /// Fired by an explicit caller-initiated sniff.
    Default,
}

impl SniffReason {
    /// The wire/log string constant for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            SniffReason::OnStart => "sniff-on-start",
            SniffReason::Interval => "sniff-interval",
            SniffReason::OnConnectionFault => "sniff-on-connection-fault",
            SniffReason::Default => "default",
        }
    }
}

impl fmt::Display for SniffReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-supplied or discovered endpoint description, as accepted by
/// `BaseConnectionPool::create_connection`/`update`.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    /// Absolute endpoint URL (scheme + host, optional port/userinfo).
    pub url: Url,
    /// Explicit id; defaults to the URL with userinfo stripped.
    pub id: Option<String>,
    /// Role set; defaults to [`RoleSet::default`] when absent.
    pub roles: Option<RoleSet>,
    /// Extra headers to merge onto the connection (e.g. from a descriptor,
    /// not from pool-level defaults).
    pub headers: HashMap<String, String>,
}

impl NodeDescriptor {
    /// A descriptor built from a bare URL, with no overrides.
    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            id: None,
            roles: None,
            headers: HashMap::new(),
        }
    }
}

/// The shape of one entry in a sniff response's `nodes` map, before
/// `publish_address` has been split into host/port and defaulted to a
/// scheme.
#[derive(Debug, Clone, Deserialize)]
pub struct SniffedNode {
    /// `host:port` or `fqdn/ip:port`.
    pub http: SniffedNodeHttp,
    /// Raw role names as reported by the cluster.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The `http` sub-object of a [`SniffedNode`].
#[derive(Debug, Clone, Deserialize)]
pub struct SniffedNodeHttp {
    /// `host:port` or `fqdn/ip:port`.
    pub publish_address: String,
}

/// The `nodes` field of a sniff response: node id -> node description.
pub type SniffNodesMap = HashMap<String, SniffedNode>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_set_default_excludes_ml() {
        let roles = RoleSet::default();
        assert!(roles.master && roles.data && roles.ingest);
        assert!(!roles.ml);
        assert!(!roles.is_master_only());
    }

    #[test]
    fn master_only_detection() {
        let mut roles = RoleSet::none();
        roles.set(NodeRole::Master, true);
        assert!(roles.is_master_only());
        roles.set(NodeRole::Data, true);
        assert!(!roles.is_master_only());
    }

    #[test]
    fn role_set_from_names_ignores_unknown() {
        let roles = RoleSet::from_names(["data", "ingest", "bogus"]);
        assert!(roles.data && roles.ingest);
        assert!(!roles.master && !roles.ml);
    }

    #[test]
    fn node_role_parse_round_trips_display() {
        for role in NodeRole::ALL {
            assert_eq!(NodeRole::parse(&role.to_string()).unwrap(), role);
        }
        assert!(NodeRole::parse("coordinator").is_err());
    }

    #[test]
    fn sniff_reason_constants_match_wire_strings() {
        assert_eq!(SniffReason::OnStart.as_str(), "sniff-on-start");
        assert_eq!(SniffReason::Interval.as_str(), "sniff-interval");
        assert_eq!(SniffReason::OnConnectionFault.as_str(), "sniff-on-connection-fault");
        assert_eq!(SniffReason::Default.as_str(), "default");
    }
}

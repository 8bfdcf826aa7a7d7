use std::collections::HashMap;
use std::sync::Arc;

use http::HeaderMap;
use transport_connection::{Connection, HttpExecutor};
use transport_errors::TransportError;
use transport_types::{NodeDescriptor, RoleSet, SniffNodesMap};
use url::Url;

/// Builds the [`HttpExecutor`] a newly created [`Connection`] should use.
/// Production pools pass `transport_connection::hyper_executor`; tests pass
/// a factory that always returns the same `MockExecutor`.
pub type ExecutorFactory = Arc<dyn Fn(&Url) -> Arc<dyn HttpExecutor> + Send + Sync>;

/// Connection set management shared by every pool variant: deterministic
/// construction and identity-preserving `update`.
pub struct BaseConnectionPool {
    connections: Vec<Arc<Connection>>,
    auth_headers: HeaderMap,
    executor_factory: ExecutorFactory,
}

impl BaseConnectionPool {
    /// Construct an empty pool. `auth_headers` are merged onto every
    /// connection created from a bare URL (pool-level auth); a descriptor
    /// carrying userinfo in its URL overrides them for that connection.
    pub fn new(executor_factory: ExecutorFactory, auth_headers: HeaderMap) -> Self {
        Self {
            connections: Vec::new(),
            auth_headers,
            executor_factory,
        }
    }

    /// All connections, in stable order.
    pub fn connections(&self) -> &[Arc<Connection>] {
        &self.connections
    }

    /// Number of connections currently held.
    pub fn size(&self) -> usize {
        self.connections.len()
    }

    fn id_for(descriptor: &NodeDescriptor) -> String {
        descriptor.id.clone().unwrap_or_else(|| id_from_url(&descriptor.url))
    }

    fn build_connection(&self, descriptor: NodeDescriptor) -> Result<Arc<Connection>, TransportError> {
        if !matches!(descriptor.url.scheme(), "http" | "https") {
            return Err(TransportError::Configuration(format!(
                "unsupported connection scheme {:?}",
                descriptor.url.scheme()
            )));
        }

        let id = Self::id_for(&descriptor);
        let roles = descriptor.roles.unwrap_or_default();

        let mut headers = if descriptor.url.username().is_empty() && descriptor.url.password().is_none() {
            self.auth_headers.clone()
        } else {
            HeaderMap::new()
        };
        for (key, value) in &descriptor.headers {
            if let Ok((name, val)) = transport_connection::header(key, value.clone()) {
                headers.insert(name, val);
            }
        }

        let mut origin = descriptor.url.clone();
        let _ = origin.set_username("");
        let _ = origin.set_password(None);

        let executor = (self.executor_factory)(&origin);
        Ok(Arc::new(Connection::new(id, origin, roles, headers, None, executor)))
    }

    /// Create a single connection. Fails if its resolved id is already
    /// present in the pool.
    pub fn create_connection(&mut self, descriptor: NodeDescriptor) -> Result<Arc<Connection>, TransportError> {
        let id = Self::id_for(&descriptor);
        if self.connections.iter().any(|c| c.id == id) {
            return Err(TransportError::Configuration(format!(
                "duplicate connection id {id:?}"
            )));
        }
        let conn = self.build_connection(descriptor)?;
        self.connections.push(conn.clone());
        Ok(conn)
    }

    /// Add connections, rejecting on duplicate id or duplicate URL.
    pub async fn add_connections(&mut self, descriptors: Vec<NodeDescriptor>) -> Result<(), TransportError> {
        for descriptor in &descriptors {
            let id = Self::id_for(descriptor);
            let duplicate = self
                .connections
                .iter()
                .any(|c| c.id == id || c.url == descriptor.url);
            if duplicate {
                return Err(TransportError::Configuration(format!(
                    "duplicate connection id or url for {id:?}"
                )));
            }
        }
        let mut nodes: Vec<NodeDescriptor> = self
            .connections
            .iter()
            .map(|c| NodeDescriptor {
                url: c.url.clone(),
                id: Some(c.id.clone()),
                roles: Some(c.roles),
                headers: HashMap::new(),
            })
            .collect();
        nodes.extend(descriptors);
        self.update(nodes).await
    }

    /// Remove one connection by id, closing it first.
    pub async fn remove_connection(&mut self, id: &str) -> Result<(), TransportError> {
        let remaining: Vec<NodeDescriptor> = self
            .connections
            .iter()
            .filter(|c| c.id != id)
            .map(|c| NodeDescriptor {
                url: c.url.clone(),
                id: Some(c.id.clone()),
                roles: Some(c.roles),
                headers: HashMap::new(),
            })
            .collect();
        self.update(remaining).await
    }

    /// Reconcile the connection set with `nodes`: reuse by id, then by url,
    /// else create; drop anything no longer present; mark all survivors
    /// alive.
    pub async fn update(&mut self, nodes: Vec<NodeDescriptor>) -> Result<(), TransportError> {
        let mut next = Vec::with_capacity(nodes.len());
        let mut consumed = vec![false; self.connections.len()];

        for descriptor in nodes {
            let wanted_id = Self::id_for(&descriptor);

            let by_id = self
                .connections
                .iter()
                .enumerate()
                .find(|(i, c)| !consumed[*i] && c.id == wanted_id);

            if let Some((i, conn)) = by_id {
                consumed[i] = true;
                conn.mark_alive();
                next.push(conn.clone());
                continue;
            }

            let by_url = self
                .connections
                .iter()
                .enumerate()
                .find(|(i, c)| !consumed[*i] && c.url == descriptor.url);

            if let Some((i, conn)) = by_url {
                consumed[i] = true;
                conn.mark_alive();
                next.push(conn.clone());
                continue;
            }

            next.push(self.build_connection(descriptor)?);
        }

        for (i, conn) in self.connections.iter().enumerate() {
            if !consumed[i] {
                conn.close().await;
            }
        }

        self.connections = next;
        Ok(())
    }

    /// Close every connection and clear the set.
    pub async fn empty(&mut self) {
        for conn in self.connections.drain(..) {
            conn.close().await;
        }
    }

    /// Convert a sniff response's `nodes` mapping into descriptors.
    /// `publish_address` is either `host:port` or `fqdn/ip:port`; when a
    /// `/` is present, the hostname comes from the part before it and the
    /// port from the suffix. Addresses never carry a scheme, so
    /// `protocol_default` is always prefixed.
    pub fn nodes_to_host(
        nodes: &SniffNodesMap,
        protocol_default: &str,
    ) -> Result<Vec<NodeDescriptor>, TransportError> {
        let mut descriptors = Vec::with_capacity(nodes.len());
        for (id, node) in nodes {
            let address = &node.http.publish_address;
            let (hostname, port_source) = match address.split_once('/') {
                Some((fqdn_or_ip, port_part)) => (fqdn_or_ip.to_string(), port_part.to_string()),
                None => {
                    let host = address
                        .rsplit_once(':')
                        .map(|(h, _)| h.to_string())
                        .unwrap_or_else(|| address.clone());
                    (host, address.clone())
                }
            };
            let port = port_source.rsplit_once(':').map(|(_, p)| p).unwrap_or(&port_source);

            let url = Url::parse(&format!("{protocol_default}://{hostname}:{port}"))
                .map_err(|e| TransportError::Configuration(format!("bad sniff address {address:?}: {e}")))?;

            descriptors.push(NodeDescriptor {
                url,
                id: Some(id.clone()),
                roles: Some(RoleSet::from_names(&node.roles)),
                headers: HashMap::new(),
            });
        }
        Ok(descriptors)
    }
}

fn id_from_url(url: &Url) -> String {
    let mut stripped = url.clone();
    let _ = stripped.set_username("");
    let _ = stripped.set_password(None);
    stripped.to_string()
}

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::Mutex;
use transport_connection::{Connection, TlsOptions, TlsVersion};
use transport_errors::TransportError;
use transport_types::NodeDescriptor;
use url::Url;

use crate::base::ExecutorFactory;

/// Decode an Elastic Cloud id of the form `name:<base64>`, where the
/// decoded payload is `host$id1$id2`. The effective endpoint is
/// `https://<id1>.<host>`; TLS defaults to TLSv1.2.
///
/// # Errors
/// Returns [`TransportError::Configuration`] if the id is malformed.
pub fn parse_cloud_id(cloud_id: &str) -> Result<Url, TransportError> {
    let (_name, encoded) = cloud_id
        .split_once(':')
        .ok_or_else(|| TransportError::Configuration("cloud id missing ':' separator".into()))?;

    let decoded = BASE64
        .decode(encoded)
        .map_err(|e| TransportError::Configuration(format!("cloud id is not valid base64: {e}")))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| TransportError::Configuration(format!("cloud id payload is not utf-8: {e}")))?;

    let mut parts = decoded.split('$');
    let host = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TransportError::Configuration("cloud id payload missing host".into()))?;
    let id1 = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TransportError::Configuration("cloud id payload missing id1".into()))?;

    Url::parse(&format!("https://{id1}.{host}"))
        .map_err(|e| TransportError::Configuration(format!("cloud id produced an invalid url: {e}")))
}

/// A pool variant that always holds exactly one connection, resolved from
/// an Elastic Cloud id. Unlike [`crate::StandardPool`], `get_connection`
/// returns the cached connection unconditionally, even when it is marked
/// dead, since there is never another endpoint to fall back to.
pub struct CloudConnectionPool {
    executor_factory: ExecutorFactory,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl CloudConnectionPool {
    /// An empty cloud pool; the connection is created on first `update`.
    pub fn new(executor_factory: ExecutorFactory) -> Self {
        Self {
            executor_factory,
            connection: Mutex::new(None),
        }
    }

    /// Set the cached connection from `cloud_id`, if not already set.
    pub async fn update_from_cloud_id(&self, cloud_id: &str) -> Result<Arc<Connection>, TransportError> {
        let url = parse_cloud_id(cloud_id)?;
        self.update(NodeDescriptor::from_url(url)).await
    }

    /// Set the cached connection from an explicit descriptor, if not
    /// already set; otherwise returns the existing one unchanged.
    pub async fn update(&self, descriptor: NodeDescriptor) -> Result<Arc<Connection>, TransportError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let id = descriptor.id.clone().unwrap_or_else(|| descriptor.url.to_string());
        let roles = descriptor.roles.unwrap_or_default();
        let executor = (self.executor_factory)(&descriptor.url);
        let tls_options = TlsOptions {
            reject_unauthorized: true,
            min_version: Some(TlsVersion::Tls1_2),
        };
        let conn = Arc::new(Connection::new(
            id,
            descriptor.url,
            roles,
            http::HeaderMap::new(),
            Some(tls_options),
            executor,
        ));
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Return the cached connection unconditionally, or `None` before the
    /// first `update`.
    pub async fn get_connection(&self) -> Option<Arc<Connection>> {
        self.connection.lock().await.clone()
    }

    /// Close the cached connection and clear it.
    pub async fn empty(&self) {
        let conn = self.connection.lock().await.take();
        if let Some(conn) = conn {
            conn.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport_connection::mock::MockExecutor;

    fn factory() -> ExecutorFactory {
        Arc::new(|_url: &Url| Arc::new(MockExecutor::new(vec![])) as Arc<dyn transport_connection::HttpExecutor>)
    }

    #[test]
    fn parses_cloud_id() {
        let payload = "example.com$instance-1$instance-2";
        let encoded = BASE64.encode(payload);
        let cloud_id = format!("deployment:{encoded}");
        let url = parse_cloud_id(&cloud_id).unwrap();
        assert_eq!(url.as_str(), "https://instance-1.example.com/");
    }

    #[test]
    fn rejects_malformed_cloud_id() {
        assert!(parse_cloud_id("no-colon-here").is_err());
    }

    #[tokio::test]
    async fn update_requests_tlsv1_2() {
        let pool = CloudConnectionPool::new(factory());
        let conn = pool
            .update(NodeDescriptor::from_url(Url::parse("https://abcd.localhost").unwrap()))
            .await
            .unwrap();
        let tls = conn.tls_options.as_ref().expect("cloud connection has tls options");
        assert_eq!(tls.min_version, Some(transport_connection::TlsVersion::Tls1_2));
    }

    #[tokio::test]
    async fn get_connection_returns_cached_connection_even_when_dead() {
        let pool = CloudConnectionPool::new(factory());
        let conn = pool
            .update(NodeDescriptor::from_url(Url::parse("https://a.example.com").unwrap()))
            .await
            .unwrap();
        conn.mark_dead(std::time::Duration::from_secs(60), 5);
        let fetched = pool.get_connection().await.unwrap();
        assert!(Arc::ptr_eq(&fetched, &conn));
    }

    #[tokio::test]
    async fn update_is_idempotent_after_first_call() {
        let pool = CloudConnectionPool::new(factory());
        let first = pool
            .update(NodeDescriptor::from_url(Url::parse("https://a.example.com").unwrap()))
            .await
            .unwrap();
        let second = pool
            .update(NodeDescriptor::from_url(Url::parse("https://b.example.com").unwrap()))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}

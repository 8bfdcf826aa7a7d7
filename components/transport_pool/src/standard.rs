use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;
use tokio::sync::Mutex;
use tracing::{debug, info};
use transport_connection::{AbortHandle, Connection, RequestParams};
use transport_errors::TransportError;
use transport_types::{ConnectionStatus, NodeDescriptor, RequestId, ResurrectStrategy};

use crate::base::{BaseConnectionPool, ExecutorFactory};
use crate::filter::{DefaultNodeFilter, NodeFilter};
use crate::selector::{RoundRobinSelector, Selector};

/// Health and selection configuration for a [`StandardPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// How dead connections are brought back.
    pub resurrect_strategy: ResurrectStrategy,
    /// Base backoff duration: `base * 2^min(deadCount-1, cutoff)`.
    pub resurrect_timeout_base: Duration,
    /// Exponent cap for the backoff formula.
    pub resurrect_timeout_cutoff: u32,
    /// Timeout for the `ping` resurrection strategy's `HEAD /` probe.
    pub ping_timeout: Duration,
    /// Whether sniffing is enabled; disables the single-endpoint
    /// immortality exception once more than discovery is possible.
    pub sniff_enabled: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            resurrect_strategy: ResurrectStrategy::Ping,
            resurrect_timeout_base: Duration::from_secs(60),
            resurrect_timeout_cutoff: 5,
            ping_timeout: Duration::from_secs(3),
            sniff_enabled: false,
        }
    }
}

/// Context for one `get_connection`/`resurrect` call.
#[derive(Clone)]
pub struct ConnectionContext {
    /// Id of the request this selection is for, for log correlation and the
    /// `resurrect` event.
    pub request_id: RequestId,
    /// Transport name, echoed on the `resurrect` event.
    pub name: Option<String>,
}

/// Emitted after a resurrection attempt runs to completion (not when no
/// action was taken because the strategy is `none`, the dead list is
/// empty, or the backoff has not elapsed).
#[derive(Debug, Clone)]
pub struct ResurrectOutcome {
    /// Strategy that produced this outcome.
    pub strategy: ResurrectStrategy,
    /// Request id that triggered this resurrection attempt.
    pub request_id: RequestId,
    /// Transport name, if configured.
    pub name: Option<String>,
    /// Id of the connection that was probed.
    pub connection_id: String,
    /// Whether the connection is now considered alive.
    pub is_alive: bool,
}

type ResurrectEmitter = Arc<dyn Fn(ResurrectOutcome) + Send + Sync>;

/// The standard pool: health tracking, resurrection, and selection layered
/// on top of [`BaseConnectionPool`].
pub struct StandardPool {
    base: Mutex<BaseConnectionPool>,
    config: PoolConfig,
    filter: Arc<dyn NodeFilter>,
    selector: Arc<dyn Selector>,
    emit: ResurrectEmitter,
}

impl StandardPool {
    /// Construct a pool with the default node filter and round-robin
    /// selector.
    pub fn new(executor_factory: ExecutorFactory, config: PoolConfig) -> Self {
        Self::with_filter_and_selector(
            executor_factory,
            config,
            Arc::new(DefaultNodeFilter),
            Arc::new(RoundRobinSelector::new()),
        )
    }

    /// Construct a pool with custom filter/selector plug-ins.
    pub fn with_filter_and_selector(
        executor_factory: ExecutorFactory,
        config: PoolConfig,
        filter: Arc<dyn NodeFilter>,
        selector: Arc<dyn Selector>,
    ) -> Self {
        Self {
            base: Mutex::new(BaseConnectionPool::new(executor_factory, http::HeaderMap::new())),
            config,
            filter,
            selector,
            emit: Arc::new(|_| {}),
        }
    }

    /// Replace the resurrect-event sink. Defaults to a no-op.
    pub fn set_resurrect_emitter(&mut self, emit: ResurrectEmitter) {
        self.emit = emit;
    }

    /// Number of connections currently held.
    pub async fn size(&self) -> usize {
        self.base.lock().await.size()
    }

    /// All connections, in stable order.
    pub async fn connections(&self) -> Vec<Arc<Connection>> {
        self.base.lock().await.connections().to_vec()
    }

    /// See [`BaseConnectionPool::create_connection`].
    pub async fn create_connection(&self, descriptor: NodeDescriptor) -> Result<Arc<Connection>, TransportError> {
        self.base.lock().await.create_connection(descriptor)
    }

    /// See [`BaseConnectionPool::add_connections`].
    pub async fn add_connections(&self, descriptors: Vec<NodeDescriptor>) -> Result<(), TransportError> {
        self.base.lock().await.add_connections(descriptors).await
    }

    /// See [`BaseConnectionPool::remove_connection`].
    pub async fn remove_connection(&self, id: &str) -> Result<(), TransportError> {
        self.base.lock().await.remove_connection(id).await
    }

    /// See [`BaseConnectionPool::update`].
    pub async fn update(&self, nodes: Vec<NodeDescriptor>) -> Result<(), TransportError> {
        let before: Vec<String> = self.base.lock().await.connections().iter().map(|c| c.id.clone()).collect();
        self.base.lock().await.update(nodes).await?;
        let after: Vec<String> = self.base.lock().await.connections().iter().map(|c| c.id.clone()).collect();
        let added: Vec<&String> = after.iter().filter(|id| !before.contains(id)).collect();
        let removed: Vec<&String> = before.iter().filter(|id| !after.contains(id)).collect();
        if !added.is_empty() || !removed.is_empty() {
            info!(?added, ?removed, "connection pool membership changed");
        }
        Ok(())
    }

    /// Close every connection and clear the set.
    pub async fn empty(&self) {
        self.base.lock().await.empty().await
    }

    fn is_single_endpoint_exempt(size: usize, sniff_enabled: bool) -> bool {
        size == 1 && !sniff_enabled
    }

    /// Mark `conn` alive, honoring the single-endpoint exception.
    pub async fn mark_alive(&self, conn: &Connection) {
        let size = self.base.lock().await.size();
        if Self::is_single_endpoint_exempt(size, self.config.sniff_enabled) {
            return;
        }
        debug!(id = %conn.id, "marking connection alive");
        conn.mark_alive();
    }

    /// Mark `conn` dead, honoring the single-endpoint exception.
    pub async fn mark_dead(&self, conn: &Connection) {
        let size = self.base.lock().await.size();
        if Self::is_single_endpoint_exempt(size, self.config.sniff_enabled) {
            return;
        }
        debug!(id = %conn.id, "marking connection dead");
        conn.mark_dead(self.config.resurrect_timeout_base, self.config.resurrect_timeout_cutoff);
    }

    fn dead_head(connections: &[Arc<Connection>]) -> Option<Arc<Connection>> {
        connections
            .iter()
            .filter(|c| c.status() == ConnectionStatus::Dead)
            .min_by_key(|c| c.resurrect_timeout())
            .cloned()
    }

    /// Attempt to resurrect the longest-waiting dead connection, if its
    /// backoff has elapsed. A no-op when the strategy is `none`, the dead
    /// list is empty, or the head's backoff has not elapsed yet.
    pub async fn resurrect(&self, now: Instant, ctx: ConnectionContext) {
        if matches!(self.config.resurrect_strategy, ResurrectStrategy::None) {
            return;
        }
        let connections = self.connections().await;
        let Some(head) = Self::dead_head(&connections) else {
            return;
        };
        if head.resurrect_timeout() > now {
            return;
        }

        let is_alive = match self.config.resurrect_strategy {
            ResurrectStrategy::None => unreachable!(),
            ResurrectStrategy::Optimistic => {
                self.mark_alive(&head).await;
                true
            }
            ResurrectStrategy::Ping => {
                let params = RequestParams {
                    method: Method::HEAD,
                    path: "/".to_string(),
                    querystring: String::new(),
                    body: transport_connection::RequestPayload::Bytes(bytes::Bytes::new()),
                    headers: http::HeaderMap::new(),
                    timeout: self.config.ping_timeout,
                    as_stream: false,
                };
                let abort = AbortHandle::new();
                match head.request(params, &abort).await {
                    Ok(response) if !matches!(response.status, 502..=504) => {
                        self.mark_alive(&head).await;
                        true
                    }
                    _ => {
                        self.mark_dead(&head).await;
                        false
                    }
                }
            }
        };

        (self.emit)(ResurrectOutcome {
            strategy: self.config.resurrect_strategy,
            request_id: ctx.request_id,
            name: ctx.name,
            connection_id: head.id.clone(),
            is_alive,
        });
    }

    /// Select a connection: fires resurrection without waiting for it, then
    /// returns the first alive, filter-approved connection the selector
    /// picks, or `None` if none qualify.
    pub async fn get_connection(self: &Arc<Self>, ctx: ConnectionContext) -> Option<Arc<Connection>> {
        let pool = Arc::clone(self);
        let spawn_ctx = ctx.clone();
        tokio::spawn(async move {
            pool.resurrect(Instant::now(), spawn_ctx).await;
        });

        let connections = self.connections().await;
        let alive: Vec<Arc<Connection>> = connections
            .into_iter()
            .filter(|c| c.status() == ConnectionStatus::Alive && self.filter.accepts(c))
            .collect();

        if alive.is_empty() {
            return None;
        }
        Some(self.selector.select(&alive).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use transport_connection::mock::MockExecutor;
    use url::Url;

    fn factory() -> ExecutorFactory {
        Arc::new(|_url: &Url| Arc::new(MockExecutor::new(vec![])) as Arc<dyn transport_connection::HttpExecutor>)
    }

    fn descriptor(url: &str) -> NodeDescriptor {
        NodeDescriptor::from_url(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn single_endpoint_is_immortal_without_sniffing() {
        let pool = StandardPool::new(factory(), PoolConfig::default());
        let conn = pool.create_connection(descriptor("http://a:9200")).await.unwrap();
        pool.mark_dead(&conn).await;
        assert_eq!(conn.status(), ConnectionStatus::Alive);
    }

    #[tokio::test]
    async fn multi_endpoint_marks_dead_normally() {
        let pool = StandardPool::new(factory(), PoolConfig::default());
        pool.create_connection(descriptor("http://a:9200")).await.unwrap();
        let b = pool.create_connection(descriptor("http://b:9200")).await.unwrap();
        pool.mark_dead(&b).await;
        assert_eq!(b.status(), ConnectionStatus::Dead);
    }

    #[tokio::test]
    async fn get_connection_returns_none_when_all_dead() {
        let pool = Arc::new(StandardPool::new(factory(), PoolConfig {
            resurrect_strategy: ResurrectStrategy::None,
            ..PoolConfig::default()
        }));
        pool.create_connection(descriptor("http://a:9200")).await.unwrap();
        let b = pool.create_connection(descriptor("http://b:9200")).await.unwrap();
        let a = pool.connections().await.into_iter().find(|c| c.id.contains('a')).unwrap();
        pool.mark_dead(&a).await;
        pool.mark_dead(&b).await;
        let ctx = ConnectionContext { request_id: 1, name: None };
        assert!(pool.get_connection(ctx).await.is_none());
    }

    #[tokio::test]
    async fn round_robin_fairness_over_window() {
        let pool = Arc::new(StandardPool::new(factory(), PoolConfig::default()));
        pool.create_connection(descriptor("http://a:9200")).await.unwrap();
        pool.create_connection(descriptor("http://b:9200")).await.unwrap();
        pool.create_connection(descriptor("http://c:9200")).await.unwrap();

        let mut seen = std::collections::HashSet::new();
        for i in 0..3 {
            let ctx = ConnectionContext { request_id: i, name: None };
            let conn = pool.get_connection(ctx).await.unwrap();
            seen.insert(conn.id.clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn resurrect_emits_outcome_on_optimistic_strategy() {
        let count = Arc::new(AtomicUsize::new(0));
        let emitted = Arc::new(StdMutex::new(Vec::new()));
        let mut pool = StandardPool::new(
            factory(),
            PoolConfig {
                resurrect_strategy: ResurrectStrategy::Optimistic,
                resurrect_timeout_base: Duration::from_millis(0),
                ..PoolConfig::default()
            },
        );
        let emitted_clone = Arc::clone(&emitted);
        pool.set_resurrect_emitter(Arc::new(move |outcome| {
            emitted_clone.lock().unwrap().push(outcome);
        }));
        pool.create_connection(descriptor("http://a:9200")).await.unwrap();
        let b = pool.create_connection(descriptor("http://b:9200")).await.unwrap();
        pool.mark_dead(&b).await;
        count.fetch_add(1, Ordering::SeqCst);

        pool.resurrect(Instant::now(), ConnectionContext { request_id: 7, name: None }).await;
        assert_eq!(b.status(), ConnectionStatus::Alive);
        assert_eq!(emitted.lock().unwrap().len(), 1);
        assert!(emitted.lock().unwrap()[0].is_alive);
    }
}

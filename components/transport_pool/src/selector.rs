use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use transport_connection::Connection;

/// Picks one connection from an alive list already filtered by the pool's
/// node filter.
pub trait Selector: Send + Sync {
    /// Select one of `alive`. Called only with a non-empty slice.
    fn select<'a>(&self, alive: &'a [std::sync::Arc<Connection>]) -> &'a std::sync::Arc<Connection>;
}

/// Round-robin with a cursor recomputed fresh from the current alive-list
/// length on every call, so a shrinking alive set never observes a stale
/// cursor.
#[derive(Default)]
pub struct RoundRobinSelector {
    next: AtomicUsize,
}

impl RoundRobinSelector {
    /// A fresh selector starting at index 0.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobinSelector {
    fn select<'a>(&self, alive: &'a [std::sync::Arc<Connection>]) -> &'a std::sync::Arc<Connection> {
        let index = self.next.fetch_add(1, Ordering::SeqCst) % alive.len();
        &alive[index]
    }
}

/// Picks uniformly at random among the alive connections.
#[derive(Default)]
pub struct RandomSelector;

impl RandomSelector {
    /// A fresh random selector.
    pub fn new() -> Self {
        Self
    }
}

impl Selector for RandomSelector {
    fn select<'a>(&self, alive: &'a [std::sync::Arc<Connection>]) -> &'a std::sync::Arc<Connection> {
        let index = rand::thread_rng().gen_range(0..alive.len());
        &alive[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use std::sync::Arc;
    use transport_connection::mock::MockExecutor;
    use transport_types::RoleSet;
    use url::Url;

    fn conn(host: &str) -> Arc<Connection> {
        Arc::new(Connection::new(
            host.into(),
            Url::parse(&format!("http://{host}")).unwrap(),
            RoleSet::default(),
            HeaderMap::new(),
            None,
            Arc::new(MockExecutor::new(vec![])),
        ))
    }

    #[test]
    fn round_robin_visits_each_connection_once_per_window() {
        let conns = vec![conn("a"), conn("b"), conn("c")];
        let selector = RoundRobinSelector::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            let picked = selector.select(&conns);
            seen.insert(picked.id.clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn round_robin_wraps_with_current_length() {
        let conns = vec![conn("a"), conn("b")];
        let selector = RoundRobinSelector::new();
        let first = selector.select(&conns).id.clone();
        let second = selector.select(&conns).id.clone();
        let third = selector.select(&conns).id.clone();
        assert_eq!(first, "a");
        assert_eq!(second, "b");
        assert_eq!(third, "a");
    }

    #[test]
    fn round_robin_visits_six_connections_in_order_over_seven_calls() {
        let conns: Vec<_> = (0..6).map(|i| conn(&i.to_string())).collect();
        let selector = RoundRobinSelector::new();
        let picked: Vec<usize> = (0..7)
            .map(|_| selector.select(&conns).id.parse().unwrap())
            .collect();
        assert_eq!(picked, vec![0, 1, 2, 3, 4, 5, 0]);
    }
}

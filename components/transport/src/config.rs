//! Transport configuration
//!
//! Aggregates the per-transport options the distilled spec calls out
//! (`maxRetries`, `requestTimeout`, compression, sniffing) plus the pool's
//! own health/resurrection configuration.

use std::time::Duration;

use transport_pool::PoolConfig;
use transport_types::Compression;

/// Configuration for a [`crate::Transport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Attempt cap per request (not counting the first try).
    pub max_retries: u32,
    /// Per-attempt deadline.
    pub request_timeout: Duration,
    /// Advertise `Accept-Encoding: gzip,deflate` on every request.
    pub suggest_compression: bool,
    /// Compress outgoing bodies with this scheme, when set.
    pub compression: Option<Compression>,
    /// Background sniff cadence; `None` disables the interval trigger.
    pub sniff_interval: Option<Duration>,
    /// Probe the cluster once at construction.
    pub sniff_on_start: bool,
    /// Probe the cluster after any transport-level failure.
    pub sniff_on_connection_fault: bool,
    /// Path to `GET` for cluster discovery.
    pub sniff_endpoint: String,
    /// Name used in the `resurrect` event and logs.
    pub name: Option<String>,
    /// Prefix prepended to a caller-supplied `X-Opaque-Id`.
    pub opaque_id_prefix: Option<String>,
    /// Default headers merged onto every request (caller-supplied headers
    /// win on conflict).
    pub headers: http::HeaderMap,
    /// Health/resurrection/selection configuration for the underlying pool.
    pub pool: PoolConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            request_timeout: Duration::from_secs(30),
            suggest_compression: false,
            compression: None,
            sniff_interval: None,
            sniff_on_start: false,
            sniff_on_connection_fault: false,
            sniff_endpoint: "/_nodes/_all/http".to_string(),
            name: None,
            opaque_id_prefix: None,
            headers: http::HeaderMap::new(),
            pool: PoolConfig::default(),
        }
    }
}

/// A duration accepted either as a plain millisecond count or a
/// `humantime`-style string (`"30s"`, `"500ms"`, `"2m"`), normalized at the
/// edge.
///
/// # Errors
/// Returns `TransportError::Configuration` if `raw` is neither.
pub fn parse_duration(raw: &str) -> Result<Duration, transport_errors::TransportError> {
    if let Ok(ms) = raw.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(raw)
        .map_err(|e| transport_errors::TransportError::Configuration(format!("invalid duration {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_milliseconds() {
        assert_eq!(parse_duration("1500").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn parses_second_suffix() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parses_millisecond_suffix() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn parses_minute_suffix() {
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("soon").is_err());
    }
}

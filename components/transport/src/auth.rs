//! `Authorization` header construction
//!
//! Builds the header value for the two credential shapes the wire format
//! supports: HTTP Basic and Elasticsearch-style API keys.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Credentials used to build the `Authorization` header on every request a
/// [`crate::Transport`] sends.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// `Authorization: Basic base64(user:pass)`.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// `Authorization: ApiKey base64(id:api_key)`.
    ApiKey {
        /// API key id.
        id: String,
        /// API key secret.
        api_key: String,
    },
    /// A pre-encoded API key token, sent verbatim as `ApiKey <token>`.
    ApiKeyEncoded(String),
}

impl Credentials {
    /// The full `Authorization` header value for these credentials.
    pub fn authorization_header(&self) -> String {
        match self {
            Credentials::Basic { username, password } => {
                format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
            }
            Credentials::ApiKey { id, api_key } => {
                format!("ApiKey {}", BASE64.encode(format!("{id}:{api_key}")))
            }
            Credentials::ApiKeyEncoded(token) => format!("ApiKey {token}"),
        }
    }
}

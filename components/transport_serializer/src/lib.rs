//! transport_serializer component
//!
//! Pure codecs used by the transport: JSON, newline-delimited JSON for bulk
//! bodies, `application/x-www-form-urlencoded` query strings, and gzip
//! compression of outgoing/incoming bodies. None of these functions touch
//! I/O; they operate on values already in memory.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod gzip;

pub use gzip::{compress, decompress};

use serde::Serialize;
use serde_json::Value;
use transport_errors::TransportError;

/// JSON-encode `value` into bytes.
///
/// # Errors
/// Returns [`TransportError::Serialization`] if `value` cannot be encoded.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(value).map_err(|e| TransportError::Serialization(e.to_string()))
}

/// JSON-decode `bytes` into a [`Value`].
///
/// # Errors
/// Returns [`TransportError::Deserialization`] if `bytes` is not valid JSON.
pub fn deserialize(bytes: &[u8]) -> Result<Value, TransportError> {
    serde_json::from_slice(bytes).map_err(|e| TransportError::Deserialization(e.to_string()))
}

/// Encode `bytes` as a newline-delimited JSON body: each element of `items`
/// is emitted verbatim (if it is already a string) or JSON-encoded,
/// followed by `\n`.
///
/// # Errors
/// Returns [`TransportError::Serialization`] if any non-string element fails
/// to encode.
pub fn ndserialize<T: Serialize>(items: &[NdItem<'_, T>]) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::new();
    for item in items {
        match item {
            NdItem::Raw(s) => out.extend_from_slice(s.as_bytes()),
            NdItem::Value(v) => {
                let encoded =
                    serde_json::to_vec(v).map_err(|e| TransportError::Serialization(e.to_string()))?;
                out.extend_from_slice(&encoded);
            }
        }
        out.push(b'\n');
    }
    Ok(out)
}

/// One element of an ndjson body: either a string to emit verbatim, or a
/// value to JSON-encode first.
pub enum NdItem<'a, T> {
    /// Emitted as-is, with a trailing newline appended.
    Raw(&'a str),
    /// JSON-encoded, with a trailing newline appended.
    Value(&'a T),
}

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

/// Percent-encodes a query key/value the way query-string encoders outside
/// the `application/x-www-form-urlencoded` convention do: space becomes
/// `%20`, not `+`. Unreserved characters are left unescaped.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encode a sequence of `(key, value)` pairs as a querystring. Array-shaped
/// values should be pre-joined with `,` by the caller before being passed in
/// here, matching the wire format produced by `qserialize`.
///
/// Percent-encodes space as `%20` rather than `+`, matching real
/// query-string encoders rather than `application/x-www-form-urlencoded`.
///
/// Returns `""` for an empty mapping.
pub fn qserialize<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        if !out.is_empty() {
            out.push('&');
        }
        out.extend(percent_encoding::utf8_percent_encode(key, QUERY_ENCODE_SET));
        out.push('=');
        out.extend(percent_encoding::utf8_percent_encode(value, QUERY_ENCODE_SET));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialize_then_deserialize_round_trips() {
        let value = json!({"query": {"match_all": {}}});
        let bytes = serialize(&value).unwrap();
        let decoded = deserialize(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn deserialize_rejects_invalid_json() {
        let err = deserialize(b"{not json").unwrap_err();
        assert!(matches!(err, TransportError::Deserialization(_)));
    }

    #[test]
    fn ndserialize_mixes_raw_and_value_items() {
        let raw = "{\"index\":{}}";
        let action = NdItem::<Value>::Raw(raw);
        let doc = json!({"title": "hello"});
        let doc_item = NdItem::Value(&doc);
        let bytes = ndserialize(&[action, doc_item]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), raw);
        assert_eq!(lines.next().unwrap(), doc.to_string());
        assert!(lines.next().is_none());
    }

    #[test]
    fn qserialize_empty_mapping_is_empty_string() {
        assert_eq!(qserialize(std::iter::empty()), "");
    }

    #[test]
    fn qserialize_encodes_space_as_percent_20() {
        let encoded = qserialize([("q", "a b"), ("size", "10")]);
        assert_eq!(encoded, "q=a%20b&size=10");
    }

    #[test]
    fn qserialize_matches_unknown_parameter_scenario() {
        let encoded = qserialize([("q", "foo:bar"), ("winter", "is coming")]);
        assert_eq!(encoded, "q=foo%3Abar&winter=is%20coming");
    }
}

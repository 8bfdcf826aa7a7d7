use std::io::Write;

use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression as GzCompression;

use transport_errors::TransportError;

/// Gzip-compress `data`.
///
/// # Errors
/// Returns [`TransportError::Connection`] if the encoder fails, which only
/// happens on an underlying I/O error (never for in-memory buffers in
/// practice).
pub fn compress(data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut encoder = GzEncoder::new(Vec::new(), GzCompression::default());
    encoder
        .write_all(data)
        .map_err(|e| TransportError::Connection(format!("gzip encode failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| TransportError::Connection(format!("gzip encode failed: {e}")))
}

/// Gzip-decompress `data`.
///
/// # Errors
/// Returns [`TransportError::Connection`] if `data` is not a valid gzip
/// stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut decoder = GzDecoder::new(Vec::new());
    decoder
        .write_all(data)
        .map_err(|e| TransportError::Connection(format!("gzip decode failed: {e}")))?;
    decoder
        .finish()
        .map_err(|e| TransportError::Connection(format!("gzip decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let compressed = compress(data).unwrap();
        assert_ne!(compressed, data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn rejects_non_gzip_input() {
        assert!(decompress(b"not gzip").is_err());
    }
}

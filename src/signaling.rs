//! Textual envelope carrying session descriptions between the browser and
//! the gateway: base64 over the JSON form `{"type": ..., "sdp": ...}`,
//! optionally gzip-compressed.

use crate::error::EnvelopeError;
use base64::{engine::general_purpose, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{Read, Write};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Upper bound for a decompressed envelope (zip-bomb guard).
pub const MAX_DECOMPRESSED_SIZE: u64 = 256 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec {
    compress: bool,
}

impl EnvelopeCodec {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }

    pub fn compresses(&self) -> bool {
        self.compress
    }

    pub fn encode(&self, desc: &RTCSessionDescription) -> Result<String, EnvelopeError> {
        let json = serde_json::to_vec(desc)?;
        let payload = if self.compress {
            let mut gz = GzEncoder::new(Vec::new(), Compression::fast());
            gz.write_all(&json)?;
            gz.finish()?
        } else {
            json
        };
        Ok(general_purpose::STANDARD.encode(payload))
    }

    /// Decodes either form; compression is detected from the payload, not
    /// from this codec's setting.
    pub fn decode(&self, envelope: &str) -> Result<RTCSessionDescription, EnvelopeError> {
        let envelope = envelope.trim();
        if envelope.is_empty() {
            return Err(EnvelopeError::Empty);
        }

        let raw = general_purpose::STANDARD.decode(envelope)?;
        let json = if raw.starts_with(&GZIP_MAGIC) {
            let mut json = Vec::new();
            GzDecoder::new(&raw[..])
                .take(MAX_DECOMPRESSED_SIZE + 1)
                .read_to_end(&mut json)?;
            if json.len() as u64 > MAX_DECOMPRESSED_SIZE {
                return Err(EnvelopeError::TooLarge(MAX_DECOMPRESSED_SIZE));
            }
            json
        } else {
            raw
        };

        let desc: RTCSessionDescription = serde_json::from_slice(&json)?;
        if desc.sdp.trim().is_empty() {
            return Err(EnvelopeError::MissingSdp);
        }
        Ok(desc)
    }
}

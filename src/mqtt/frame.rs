use chrono::NaiveDateTime;
use std::fmt;
use std::io::Read;
use thiserror::Error;

/// Why a compressed frame could not be turned back into raw bytes
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty payload")]
    Empty,

    /// Bad magic number, corrupt block or truncated data
    #[error("{0}")]
    Decompress(#[from] std::io::Error),
}

/// One publish received from the broker, still LZ4-frame compressed.
///
/// Lives for a single handler call: it is decoded, logged and dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundFrame {
    topic: String,
    payload: Vec<u8>,
    received_at: NaiveDateTime,
}

impl fmt::Display for InboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} - {} ({} bytes)",
            self.received_at,
            self.topic,
            self.payload.len()
        )
    }
}

impl InboundFrame {
    pub fn from_topic(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        InboundFrame {
            topic: topic.into(),
            payload: payload.into(),
            received_at: chrono::Local::now().naive_local(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Decodes the payload as a complete LZ4 frame.
    pub fn decompress(&self) -> Result<Vec<u8>, FrameError> {
        decompress(&self.payload)
    }

    /// Decodes the payload and renders the result as lowercase hex.
    pub fn render(&self) -> Result<String, FrameError> {
        self.decompress().map(hex::encode)
    }
}

pub fn decompress(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }

    let mut decoder = lz4_flex::frame::FrameDecoder::new(payload);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

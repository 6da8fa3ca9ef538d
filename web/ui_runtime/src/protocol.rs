use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const INBOUND_FRAME_CAP: usize = 1_048_576;

/// Client to server: one user interaction on a bound element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEvent {
    pub path: String,
    pub id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl OutgoingEvent {
    pub fn new(path: impl Into<String>, id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
            value: value.into(),
            file_size: None,
        }
    }

    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = Some(file_size);
        self
    }
}

/// Server to client: property mutations keyed by element id.
///
/// `elements` is kept as a raw map so a single malformed entry can be skipped
/// without rejecting the rest of the patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingPatch {
    pub path: String,
    pub elements: Map<String, Value>,
}

impl IncomingPatch {
    /// An empty path addresses every view.
    pub fn targets(&self, current_path: &str) -> bool {
        self.path.is_empty() || self.path == current_path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not a valid patch: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },
    #[error("unexpected binary frame of {len} bytes on the patch channel")]
    UnexpectedBinary { len: usize },
}

pub fn encode(event: &OutgoingEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn decode(frame: &InboundFrame, max_payload: usize) -> Result<IncomingPatch, DecodeError> {
    match frame {
        InboundFrame::Text(text) => decode_text(text, max_payload),
        InboundFrame::Binary(bytes) => Err(DecodeError::UnexpectedBinary { len: bytes.len() }),
    }
}

pub fn decode_text(text: &str, max_payload: usize) -> Result<IncomingPatch, DecodeError> {
    if text.len() > max_payload {
        return Err(DecodeError::FrameTooLarge {
            len: text.len(),
            max: max_payload,
        });
    }

    Ok(serde_json::from_str(text)?)
}

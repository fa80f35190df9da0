//! Controller Ethernet-slave wire codec
//!
//! Packets are CRLF-terminated text:
//!
//! ```text
//! $TMSVR,<len>,<id>,<mode>,<payload>,*<cs>\r\n
//! ```
//!
//! - `<len>`: byte length of `<id>,<mode>,<payload>`
//! - `<cs>`: XOR of every byte strictly between `$` and `*`, two uppercase hex digits
//! - data (mode 2) and read (mode 13) payloads are a JSON array of
//!   `{"Item": <name>, "Value": <value>}`

use crate::sample::{JointAngles, JOINT_COUNT};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const FRAME_TAG: &str = "TMSVR";

/// Streamed telemetry
pub const MODE_DATA: u8 = 2;
/// Read request / read response
pub const MODE_READ: u8 = 13;

pub const ITEM_JOINT_ANGLE: &str = "Joint_Angle";
pub const ITEM_ROBOT_MODEL: &str = "Robot_Model";
const DIGITAL_OUTPUT_PREFIX: &str = "Ctrl_DO";

const MODEL_QUERY_ID: &str = "Q1";

/// A partial frame larger than this is discarded
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("checksum mismatch: frame says {declared:02X}, computed {actual:02X}")]
    ChecksumMismatch { declared: u8, actual: u8 },
    #[error("length mismatch: frame says {declared} bytes, found {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("unsupported frame mode {0}")]
    UnsupportedMode(u8),
    #[error("expected {expected} joint angles, got {actual}")]
    JointCount { expected: usize, actual: usize },
    #[error("no frame terminator within {0} bytes, buffer discarded")]
    Oversized(usize),
    #[error("invalid payload JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One packet, checksum and length already verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: String,
    pub mode: u8,
    pub payload: String,
}

/// What a frame told us about the controller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    pub joint_angles: Option<JointAngles>,
    pub digital_outputs: Option<u16>,
    pub robot_model: Option<String>,
}

pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

pub fn encode_frame(id: &str, mode: u8, payload: &str) -> Vec<u8> {
    let content = format!("{},{},{}", id, mode, payload);
    let body = format!("{},{},{},", FRAME_TAG, content.len(), content);
    format!("${}*{:02X}\r\n", body, checksum(body.as_bytes())).into_bytes()
}

/// Read request asking the controller for its model
pub fn encode_model_query() -> Vec<u8> {
    encode_frame(MODEL_QUERY_ID, MODE_READ, ITEM_ROBOT_MODEL)
}

/// Controller-side answer to [`encode_model_query`]
pub fn encode_model_response(model: &str) -> Vec<u8> {
    let payload = json!([{ "Item": ITEM_ROBOT_MODEL, "Value": model }]);
    encode_frame(MODEL_QUERY_ID, MODE_READ, &payload.to_string())
}

/// Controller-side telemetry frame; angles in degrees as the controller reports them
pub fn encode_telemetry(joint_degrees: &[f64; JOINT_COUNT], digital_outputs: Option<u16>) -> Vec<u8> {
    let mut items = vec![json!({ "Item": ITEM_JOINT_ANGLE, "Value": joint_degrees })];
    if let Some(mask) = digital_outputs {
        for bit in 0..16u16 {
            items.push(json!({
                "Item": format!("{}{}", DIGITAL_OUTPUT_PREFIX, bit),
                "Value": (mask >> bit) & 1,
            }));
        }
    }
    encode_frame("T", MODE_DATA, &serde_json::Value::Array(items).to_string())
}

/// Decode one packet without its trailing CRLF
pub fn decode_line(line: &[u8]) -> Result<Frame, DecodeError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| DecodeError::Malformed("frame is not UTF-8".to_string()))?;
    let body_and_checksum = text
        .strip_prefix('$')
        .ok_or_else(|| DecodeError::Malformed("missing '$' start marker".to_string()))?;

    let star = body_and_checksum
        .rfind('*')
        .ok_or_else(|| DecodeError::Malformed("missing checksum marker".to_string()))?;
    let (body, checksum_text) = (&body_and_checksum[..star], &body_and_checksum[star + 1..]);

    let declared = u8::from_str_radix(checksum_text, 16)
        .map_err(|_| DecodeError::Malformed(format!("bad checksum field '{}'", checksum_text)))?;
    let actual = checksum(body.as_bytes());
    if declared != actual {
        return Err(DecodeError::ChecksumMismatch { declared, actual });
    }

    let rest = body
        .strip_prefix(FRAME_TAG)
        .and_then(|r| r.strip_prefix(','))
        .ok_or_else(|| DecodeError::Malformed(format!("unknown packet header in '{}'", body)))?;
    let (length_text, content) = rest
        .split_once(',')
        .ok_or_else(|| DecodeError::Malformed("missing length field".to_string()))?;
    let declared_len: usize = length_text
        .parse()
        .map_err(|_| DecodeError::Malformed(format!("bad length field '{}'", length_text)))?;
    let content = content
        .strip_suffix(',')
        .ok_or_else(|| DecodeError::Malformed("missing field terminator".to_string()))?;
    if content.len() != declared_len {
        return Err(DecodeError::LengthMismatch {
            declared: declared_len,
            actual: content.len(),
        });
    }

    let mut fields = content.splitn(3, ',');
    let id = fields.next().unwrap_or_default().to_string();
    let mode_text = fields
        .next()
        .ok_or_else(|| DecodeError::Malformed("missing mode field".to_string()))?;
    let mode = mode_text
        .parse::<u8>()
        .map_err(|_| DecodeError::Malformed(format!("bad mode field '{}'", mode_text)))?;
    let payload = fields.next().unwrap_or_default().to_string();

    Ok(Frame { id, mode, payload })
}

#[derive(Deserialize)]
struct DataItem {
    #[serde(rename = "Item")]
    item: String,
    #[serde(rename = "Value")]
    value: serde_json::Value,
}

/// Extract joint angles (converted to radians), digital outputs and model
/// from a data or read-response frame. Unknown items are ignored.
pub fn parse_telemetry(frame: &Frame) -> Result<Telemetry, DecodeError> {
    if frame.mode != MODE_DATA && frame.mode != MODE_READ {
        return Err(DecodeError::UnsupportedMode(frame.mode));
    }

    let items: Vec<DataItem> = serde_json::from_str(&frame.payload)?;
    let mut telemetry = Telemetry::default();

    for DataItem { item, value } in items {
        match item.as_str() {
            ITEM_JOINT_ANGLE => telemetry.joint_angles = Some(joint_angles_from_degrees(&value)?),
            ITEM_ROBOT_MODEL => {
                let model = value.as_str().ok_or_else(|| {
                    DecodeError::Malformed("Robot_Model is not a string".to_string())
                })?;
                telemetry.robot_model = Some(model.to_string());
            }
            other => {
                let Some(index) = other
                    .strip_prefix(DIGITAL_OUTPUT_PREFIX)
                    .and_then(|suffix| suffix.parse::<u8>().ok())
                    .filter(|index| *index < 16)
                else {
                    continue;
                };
                let mask = telemetry.digital_outputs.get_or_insert(0);
                if value_as_bit(&value)? {
                    *mask |= 1 << index;
                }
            }
        }
    }

    Ok(telemetry)
}

fn joint_angles_from_degrees(value: &serde_json::Value) -> Result<JointAngles, DecodeError> {
    let values = value
        .as_array()
        .ok_or_else(|| DecodeError::Malformed("Joint_Angle is not an array".to_string()))?;
    if values.len() != JOINT_COUNT {
        return Err(DecodeError::JointCount {
            expected: JOINT_COUNT,
            actual: values.len(),
        });
    }

    let mut joints = [0.0; JOINT_COUNT];
    for (slot, degrees) in joints.iter_mut().zip(values) {
        let degrees = degrees
            .as_f64()
            .ok_or_else(|| DecodeError::Malformed("joint angle is not a number".to_string()))?;
        *slot = degrees.to_radians();
    }
    Ok(joints)
}

fn value_as_bit(value: &serde_json::Value) -> Result<bool, DecodeError> {
    match value {
        serde_json::Value::Bool(on) => Ok(*on),
        serde_json::Value::Number(n) => Ok(n.as_f64().map_or(false, |v| v != 0.0)),
        other => Err(DecodeError::Malformed(format!(
            "digital output value {} is not 0/1",
            other
        ))),
    }
}

/// Reassembles packets from a byte stream.
///
/// Bytes before a `$` are skipped, so a reader that joins mid-stream
/// resynchronises on the next packet.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_bytes,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete packet, `None` when more bytes are needed
    pub fn next_frame(&mut self) -> Option<Result<Frame, DecodeError>> {
        match self.buffer.iter().position(|&b| b == b'$') {
            None => {
                self.buffer.clear();
                return None;
            }
            Some(0) => {}
            Some(start) => {
                self.buffer.drain(..start);
            }
        }

        match self.buffer.windows(2).position(|w| w == b"\r\n") {
            Some(end) => {
                let line: Vec<u8> = self.buffer.drain(..end + 2).collect();
                Some(decode_line(&line[..end]))
            }
            None if self.buffer.len() > self.max_frame_bytes => {
                let discarded = self.buffer.len();
                self.buffer.clear();
                Some(Err(DecodeError::Oversized(discarded)))
            }
            None => None,
        }
    }
}

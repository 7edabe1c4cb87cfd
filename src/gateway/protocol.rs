//! Control-plane frame envelope and connect-first handshake validation.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const FRAME_TYPE_REQ: &str = "req";
pub const FRAME_TYPE_RES: &str = "res";
pub const FRAME_TYPE_EVENT: &str = "event";
pub const FRAME_TYPE_ERROR: &str = "error";

/// Roles a client may claim in `connect`.
pub const CONNECT_ROLES: &[&str] = &["operator", "app", "node"];

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("decode frame: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("missing frame type")]
    MissingType,
    #[error("first frame must be req, got {0:?}")]
    NotRequest(String),
    #[error("first method must be connect, got {0:?}")]
    NotConnect(String),
    #[error("invalid connect params: {0}")]
    InvalidParams(#[source] serde_json::Error),
    #[error("invalid connect params: missing")]
    MissingParams,
    #[error("protocol must be positive")]
    InvalidProtocol,
    #[error("invalid role {0:?}")]
    InvalidRole(String),
    #[error("client.id is required")]
    MissingClientId,
}

/// Envelope for WS-RPC style transport.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Frame {
    #[serde(rename = "type", default)]
    pub frame_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// `None` when absent; an explicit `null` is kept as `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub params: Option<Value>,
}

fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Payload of the mandatory first `connect` request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub protocol: i64,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub client: ClientInfo,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Decode a frame, requiring a non-empty `type`.
pub fn decode_frame(raw: &[u8]) -> Result<Frame, ProtocolError> {
    let frame: Frame = serde_json::from_slice(raw)?;
    if frame.frame_type.is_empty() {
        return Err(ProtocolError::MissingType);
    }
    Ok(frame)
}

/// Enforce that the first frame is a well-formed `connect` request.
pub fn validate_connect_first(frame: &Frame) -> Result<ConnectParams, ProtocolError> {
    if frame.frame_type != FRAME_TYPE_REQ {
        return Err(ProtocolError::NotRequest(frame.frame_type.clone()));
    }
    let method = frame.method.as_deref().unwrap_or_default();
    if method != "connect" {
        return Err(ProtocolError::NotConnect(method.to_string()));
    }

    let params: ConnectParams = match &frame.params {
        // `null` leaves every field at its zero value.
        Some(Value::Null) => ConnectParams::default(),
        Some(raw) => serde_json::from_value(raw.clone()).map_err(ProtocolError::InvalidParams)?,
        None => return Err(ProtocolError::MissingParams),
    };

    if params.protocol <= 0 {
        return Err(ProtocolError::InvalidProtocol);
    }
    if !CONNECT_ROLES.contains(&params.role.trim()) {
        return Err(ProtocolError::InvalidRole(params.role));
    }
    if params.client.id.trim().is_empty() {
        return Err(ProtocolError::MissingClientId);
    }
    Ok(params)
}

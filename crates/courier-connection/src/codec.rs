// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire format of the event channel.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": <payload>}`.
//! A handful of names are reserved for the handshake and keepalive:
//!
//! ```json
//! {"event": "auth", "data": {"userId": "d1", "role": "driver", "token": "..."}}
//! {"event": "auth-ok", "data": {}}
//! {"event": "auth-error", "data": {"reason": "expired token"}}
//! {"event": "ping"} / {"event": "pong"}
//! ```
//!
//! Anything else is an application event handed to the router.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use courier_core::{CourierError, Identity, InboundEvent, Role};

pub mod names {
    pub const AUTH: &str = "auth";
    pub const AUTH_OK: &str = "auth-ok";
    pub const AUTH_ERROR: &str = "auth-error";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthPayload<'a> {
    user_id: &'a str,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

/// What a received frame means to the connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    AuthOk,
    AuthError(String),
    Ping,
    Pong,
    Event(InboundEvent),
}

pub fn encode(event: &str, data: serde_json::Value) -> Result<String, CourierError> {
    Ok(serde_json::to_string(&Frame {
        event: event.to_string(),
        data,
    })?)
}

pub fn encode_auth(identity: &Identity) -> Result<String, CourierError> {
    let payload = AuthPayload {
        user_id: &identity.user_id,
        role: identity.role,
        token: identity.token.as_deref(),
    };
    encode(names::AUTH, serde_json::to_value(payload)?)
}

pub fn encode_pong() -> Result<String, CourierError> {
    encode(names::PONG, serde_json::Value::Null)
}

pub fn decode(text: &str) -> Result<Incoming, CourierError> {
    let frame: Frame = serde_json::from_str(text)
        .map_err(|e| CourierError::Codec(format!("malformed frame: {e}")))?;
    Ok(match frame.event.as_str() {
        names::AUTH_OK => Incoming::AuthOk,
        names::AUTH_ERROR => Incoming::AuthError(
            frame
                .data
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("rejected")
                .to_string(),
        ),
        names::PING => Incoming::Ping,
        names::PONG => Incoming::Pong,
        _ => Incoming::Event(InboundEvent {
            name: frame.event,
            payload: frame.data,
            received_at: Utc::now(),
        }),
    })
}

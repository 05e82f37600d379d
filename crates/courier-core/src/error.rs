// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier synchronization core.
//!
//! Duplicate suppression is deliberately absent: a rejected duplicate is a
//! normal outcome of the dedup filter, not a failure.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Courier crates.
#[derive(Debug, Error)]
pub enum CourierError {
    /// The channel transport is unreachable or failed mid-session.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The authentication handshake was rejected. Terminal; requires re-login.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The backend rejected a user action (send, status change, ...).
    #[error("send failed: {message}")]
    Send {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An attachment upload failed; the associated send was not attempted.
    #[error("attachment upload failed: {message}")]
    AttachmentUpload {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A REST collaborator call failed.
    #[error("backend error: {message}")]
    Backend {
        status: Option<u16>,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local durable storage failed.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// A state machine was asked to take a transition it does not allow.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A frame or payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a backend error with an optional HTTP status.
    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Backend { status, .. } => {
                matches!(status, None | Some(429) | Some(500) | Some(502) | Some(503))
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CourierError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

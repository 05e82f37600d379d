// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier synchronization layer.
//!
//! This crate provides the error taxonomy, the domain model (channel,
//! conversations, messages, notifications), the closed inbound event union,
//! and the traits through which the core reaches its collaborators: the
//! channel transport, the REST backend, durable storage, audio output,
//! geolocation, and the presentation layer.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use events::{ChannelEvent, EventName};
pub use types::{
    Channel, ChannelState, Conversation, ConversationSnapshot, ConversationStatus,
    DeliveryState, EventSource, Identity, InboundEvent, Message, NotificationItem,
    NotificationKind, Priority, Role, SenderRole, SideEffect, SoundClass, TerminalReason,
};

// Re-export all collaborator traits at crate root.
pub use traits::{
    AudioSink, BackendApi, KeyValueStore, LocationProvider, SideEffectSink, Transport,
    TransportLink,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn courier_error_variants_render() {
        let cases: Vec<CourierError> = vec![
            CourierError::transport("refused"),
            CourierError::Auth("bad token".into()),
            CourierError::Send {
                message: "rejected".into(),
                source: None,
            },
            CourierError::AttachmentUpload {
                message: "too large".into(),
                source: None,
            },
            CourierError::backend(Some(500), "boom"),
            CourierError::Storage {
                source: Box::new(std::io::Error::other("disk")),
            },
            CourierError::Config("bad".into()),
            CourierError::Timeout {
                duration: std::time::Duration::from_secs(3),
            },
            CourierError::NotFound {
                kind: "conversation",
                id: "c1".into(),
            },
            CourierError::Internal("x".into()),
        ];
        for err in cases {
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn transient_classification() {
        assert!(CourierError::transport("x").is_transient());
        assert!(CourierError::backend(Some(503), "x").is_transient());
        assert!(!CourierError::backend(Some(400), "x").is_transient());
        assert!(!CourierError::Auth("x".into()).is_transient());
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _transport(_: &dyn Transport) {}
        fn _backend(_: &dyn BackendApi) {}
        fn _kv(_: &dyn KeyValueStore) {}
        fn _audio(_: &dyn AudioSink) {}
        fn _effects(_: &dyn SideEffectSink) {}
        fn _location(_: &dyn LocationProvider) {}
    }
}

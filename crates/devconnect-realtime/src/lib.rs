//! # devconnect-realtime
//!
//! Presence tracking and notification fan-out for live client connections.
//!
//! The [`PresenceRegistry`] owns the process-wide mapping from user id to the
//! user's open connections. Services never talk to it directly: they push
//! events through the [`Notifier`] trait, which the registry implements.

pub mod notifier;
pub mod registry;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use notifier::Notifier;
pub use registry::{ConnectionHandle, PresenceRegistry};

//! # devconnect-shared
//!
//! Vocabulary shared by every DevConnect crate: identifiers, the real-time
//! wire protocol, recommendation scoring and credential hashing.

pub mod constants;
pub mod credential;
pub mod error;
pub mod protocol;
pub mod scoring;
pub mod types;

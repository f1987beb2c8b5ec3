// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for edgebus operations.
//!
//! Every public operation returns [`Result<T>`]. Each [`Error`] variant maps to
//! a stable integer code (see [`Error::code`]) so that callers bridging to other
//! runtimes can keep the historical numbering. Code `0` is success and is only
//! represented by `Ok(_)`.
//!
//! # Example
//!
//! ```rust
//! use edgebus::{validate_topic, Error};
//!
//! assert!(!validate_topic("no-leading-slash"));
//! assert_eq!(Error::InvalidTopic.code(), 6);
//! ```

/// Result code returned by [`Error::code`] for a successful operation.
pub const OK: i32 = 0;

/// Errors surfaced by the context, publishers, subscribers and discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Argument failed validation (bad key length, non-secured topic, ...).
    InvalidParam,
    /// Topic name does not match the allowed topic grammar.
    InvalidTopic,
    /// Topic is already registered.
    DuplicatedTopic,
    /// Message arrived for a topic that has no cached representation.
    UnknownTopic,
    /// Endpoint text could not be parsed.
    InvalidEndpoint,

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Context is already initialized.
    AlreadyInitialized,
    /// Context (or facade) is not initialized.
    NotInitialized,
    /// Object or context was terminated.
    Terminated,
    /// Unexpected internal state, including transport failures.
    UnknownState,
    /// Service is not available.
    ServiceUnavailable,

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// Received payload could not be decoded.
    BrokenPayload,
    /// Schema id is not present in the representation cache.
    UnknownModel,
    /// Schema file could not be loaded.
    InvalidModel,

    // ========================================================================
    // Directory and Resource Errors
    // ========================================================================
    /// HTTP call failed, returned an unexpected status, or a body did not parse.
    RestError,
    /// Dynamic port pool is exhausted.
    MaxPortExceeded,
    /// Released port was never assigned from the dynamic pool.
    ReleaseWrongPort,
    /// Directory query returned no matching topic.
    NoTopicMatched,
    /// Directory-assisted operation requested but no directory is configured.
    DirectoryNotAvailable,
    /// Transport subscription could not be established.
    SessionUnavailable,
}

impl Error {
    /// Stable integer code for this error (`OK` is 0).
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidParam => 1,
            Error::AlreadyInitialized => 2,
            Error::NotInitialized => 3,
            Error::Terminated => 4,
            Error::UnknownState => 5,
            Error::InvalidTopic => 6,
            Error::DuplicatedTopic => 7,
            Error::UnknownTopic => 8,
            Error::InvalidEndpoint => 9,
            Error::BrokenPayload => 10,
            Error::RestError => 11,
            Error::MaxPortExceeded => 12,
            Error::ReleaseWrongPort => 13,
            Error::NoTopicMatched => 14,
            Error::DirectoryNotAvailable => 15,
            Error::UnknownModel => 16,
            Error::InvalidModel => 17,
            Error::ServiceUnavailable => 18,
            Error::SessionUnavailable => 19,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidParam => write!(f, "Invalid parameter"),
            Error::InvalidTopic => write!(f, "Invalid topic name"),
            Error::DuplicatedTopic => write!(f, "Topic already registered"),
            Error::UnknownTopic => write!(f, "Unknown topic"),
            Error::InvalidEndpoint => write!(f, "Invalid endpoint"),
            Error::AlreadyInitialized => write!(f, "Already initialized"),
            Error::NotInitialized => write!(f, "Not initialized"),
            Error::Terminated => write!(f, "Terminated"),
            Error::UnknownState => write!(f, "Unknown state"),
            Error::ServiceUnavailable => write!(f, "Service unavailable"),
            Error::BrokenPayload => write!(f, "Broken payload"),
            Error::UnknownModel => write!(f, "Unknown data model"),
            Error::InvalidModel => write!(f, "Invalid data model"),
            Error::RestError => write!(f, "REST request failed"),
            Error::MaxPortExceeded => write!(f, "Dynamic port pool exhausted"),
            Error::ReleaseWrongPort => write!(f, "Port was not assigned from the dynamic pool"),
            Error::NoTopicMatched => write!(f, "No topic matched"),
            Error::DirectoryNotAvailable => write!(f, "Topic directory not available"),
            Error::SessionUnavailable => write!(f, "Subscription session unavailable"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for edgebus operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique_and_nonzero() {
        let all = [
            Error::InvalidParam,
            Error::AlreadyInitialized,
            Error::NotInitialized,
            Error::Terminated,
            Error::UnknownState,
            Error::InvalidTopic,
            Error::DuplicatedTopic,
            Error::UnknownTopic,
            Error::InvalidEndpoint,
            Error::BrokenPayload,
            Error::RestError,
            Error::MaxPortExceeded,
            Error::ReleaseWrongPort,
            Error::NoTopicMatched,
            Error::DirectoryNotAvailable,
            Error::UnknownModel,
            Error::InvalidModel,
            Error::ServiceUnavailable,
            Error::SessionUnavailable,
        ];
        let mut codes: Vec<i32> = all.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert!(!codes.contains(&OK));
        assert_eq!(codes, (1..=19).collect::<Vec<_>>());
    }

    #[test]
    fn test_display() {
        assert_eq!(Error::MaxPortExceeded.to_string(), "Dynamic port pool exhausted");
        assert_eq!(Error::Terminated.to_string(), "Terminated");
    }
}

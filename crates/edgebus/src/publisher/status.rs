// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher lifecycle state machine.
//!
//! ```text
//! Created ──begin_init──► Initializing ──finish_init──► Initialized
//!    ▲                         │                            │
//!    └──────abort_init─────────┘                      begin_terminate
//!    │                                                      ▼
//!    └──────────finish_terminate─────────────────────── Terminating
//!                                  rollback_terminate ──► Initialized
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PublisherStatus {
    Created = 0,
    Initializing = 1,
    Initialized = 2,
    Terminating = 3,
}

impl PublisherStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Initializing,
            2 => Self::Initialized,
            3 => Self::Terminating,
            _ => Self::Created,
        }
    }
}

/// Atomic cell holding a [`PublisherStatus`]; all changes are compare-and-swap.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(PublisherStatus::Created as u8))
    }

    pub(crate) fn load(&self) -> PublisherStatus {
        PublisherStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    fn transition(&self, from: PublisherStatus, to: PublisherStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn begin_init(&self) -> bool {
        self.transition(PublisherStatus::Created, PublisherStatus::Initializing)
    }

    pub(crate) fn finish_init(&self) -> bool {
        self.transition(PublisherStatus::Initializing, PublisherStatus::Initialized)
    }

    pub(crate) fn abort_init(&self) -> bool {
        self.transition(PublisherStatus::Initializing, PublisherStatus::Created)
    }

    pub(crate) fn begin_terminate(&self) -> bool {
        self.transition(PublisherStatus::Initialized, PublisherStatus::Terminating)
    }

    pub(crate) fn rollback_terminate(&self) -> bool {
        self.transition(PublisherStatus::Terminating, PublisherStatus::Initialized)
    }

    pub(crate) fn finish_terminate(&self) -> bool {
        self.transition(PublisherStatus::Terminating, PublisherStatus::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let status = StatusCell::new();
        assert_eq!(status.load(), PublisherStatus::Created);
        assert!(status.begin_init());
        assert!(!status.begin_init());
        assert!(status.finish_init());
        assert_eq!(status.load(), PublisherStatus::Initialized);
        assert!(status.begin_terminate());
        assert!(!status.begin_terminate());
        assert!(status.finish_terminate());
        assert_eq!(status.load(), PublisherStatus::Created);
    }

    #[test]
    fn test_invalid_transitions() {
        let status = StatusCell::new();
        assert!(!status.begin_terminate());
        assert!(!status.finish_init());
        assert!(status.begin_init());
        assert!(status.abort_init());
        assert_eq!(status.load(), PublisherStatus::Created);

        assert!(status.begin_init() && status.finish_init() && status.begin_terminate());
        assert!(status.rollback_terminate());
        assert_eq!(status.load(), PublisherStatus::Initialized);
    }
}

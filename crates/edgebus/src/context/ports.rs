// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic local port pool.
//!
//! Ports are handed out from `[start, start + count)` with a rotating cursor.
//! `in_use` always equals the number of slots marked used; allocation exits
//! early on `in_use == count` instead of scanning a full pool.

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub(crate) struct DynamicPortPool {
    start: u16,
    used: Vec<bool>,
    cursor: usize,
    in_use: usize,
}

impl DynamicPortPool {
    pub(crate) fn new(start: u16, count: u16) -> Self {
        Self {
            start,
            used: vec![false; usize::from(count)],
            cursor: 0,
            in_use: 0,
        }
    }

    /// Claim the next free port at or after the cursor.
    pub(crate) fn assign(&mut self) -> Result<u16> {
        if self.in_use >= self.used.len() {
            return Err(Error::MaxPortExceeded);
        }
        while self.used[self.cursor] {
            self.cursor = (self.cursor + 1) % self.used.len();
        }
        self.used[self.cursor] = true;
        self.in_use += 1;
        Ok(self.start + self.cursor as u16)
    }

    /// Return a previously assigned port to the pool.
    pub(crate) fn release(&mut self, port: u16) -> Result<()> {
        let slot = self.slot(port).ok_or(Error::ReleaseWrongPort)?;
        if !self.used[slot] {
            return Err(Error::ReleaseWrongPort);
        }
        self.used[slot] = false;
        self.in_use -= 1;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn is_assigned(&self, port: u16) -> bool {
        self.slot(port).is_some_and(|slot| self.used[slot])
    }

    #[cfg(test)]
    pub(crate) fn in_use(&self) -> usize {
        self.in_use
    }

    fn slot(&self, port: u16) -> Option<usize> {
        let offset = usize::from(port.checked_sub(self.start)?);
        (offset < self.used.len()).then_some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_assignment() {
        let mut pool = DynamicPortPool::new(4000, 100);
        assert_eq!(pool.assign(), Ok(4000));
        assert_eq!(pool.assign(), Ok(4001));
        assert_eq!(pool.in_use(), 2);
        assert!(pool.is_assigned(4001));
        assert!(!pool.is_assigned(4002));
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = DynamicPortPool::new(4000, 100);
        for i in 0..100 {
            assert_eq!(pool.assign(), Ok(4000 + i));
        }
        assert_eq!(pool.assign(), Err(Error::MaxPortExceeded));
    }

    #[test]
    fn test_release_and_reuse() {
        let mut pool = DynamicPortPool::new(4000, 3);
        let a = pool.assign().expect("assign");
        let b = pool.assign().expect("assign");
        let c = pool.assign().expect("assign");
        assert_eq!((a, b, c), (4000, 4001, 4002));
        pool.release(b).expect("release");
        assert_eq!(pool.assign(), Ok(4001));
    }

    #[test]
    fn test_release_wrong_port() {
        let mut pool = DynamicPortPool::new(4000, 10);
        assert_eq!(pool.release(4005), Err(Error::ReleaseWrongPort));
        assert_eq!(pool.release(3999), Err(Error::ReleaseWrongPort));
        assert_eq!(pool.release(5000), Err(Error::ReleaseWrongPort));
        let port = pool.assign().expect("assign");
        pool.release(port).expect("release");
        assert_eq!(pool.release(port), Err(Error::ReleaseWrongPort));
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_count_tracks_used_slots() {
        let mut pool = DynamicPortPool::new(4000, 8);
        let mut held = Vec::new();
        for round in 0..50u16 {
            if round % 3 == 2 {
                if let Some(port) = held.pop() {
                    pool.release(port).expect("release");
                }
            } else if let Ok(port) = pool.assign() {
                held.push(port);
            }
            let _ = pool.release(4000 + (round % 8) + 100);
            let marked = (4000..4008).filter(|p| pool.is_assigned(*p)).count();
            assert_eq!(pool.in_use(), marked);
            assert_eq!(pool.in_use(), held.len());
        }
    }
}

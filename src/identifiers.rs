//! Type-safe identifiers for relay entities.
//!
//! Newtype wrappers prevent mixing incompatible ids at compile time.
//!
//! Connection ids are allocated by a [`ConnectionIdAllocator`] owned by the
//! server instance that accepted the connection. There is no process-wide
//! counter: two servers in the same process allocate independently.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifier of a server-side connection.
///
/// Opaque, monotonically increasing, never reused within the lifetime of the
/// allocating server. Client-side connections carry no id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a connection id from a raw value.
    ///
    /// Intended for tests and logging round-trips; production ids come from
    /// [`ConnectionIdAllocator::next`].
    #[inline]
    #[must_use]
    pub const fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ConnectionIdAllocator
// ============================================================================

/// Monotonic id source owned by a server instance.
///
/// Ids start at 0 and only move forward; a removed connection's id is never
/// handed out again by the same allocator.
#[derive(Debug, Default)]
pub struct ConnectionIdAllocator {
    next: AtomicU64,
}

impl ConnectionIdAllocator {
    /// Creates an allocator starting at id 0.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unused id.
    #[inline]
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let ids = ConnectionIdAllocator::new();
        let a = ids.next();
        let b = ids.next();
        let c = ids.next();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_ids_start_at_zero() {
        let ids = ConnectionIdAllocator::new();
        assert_eq!(ids.next().as_u64(), 0);
        assert_eq!(ids.next().as_u64(), 1);
    }

    #[test]
    fn test_allocators_are_independent() {
        let left = ConnectionIdAllocator::new();
        let right = ConnectionIdAllocator::new();
        left.next();
        left.next();
        // A second allocator is unaffected by the first one's history.
        assert_eq!(right.next().as_u64(), 0);
    }

    #[test]
    fn test_display_and_round_trip() {
        let id = ConnectionId::from_u64(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(ConnectionId::from_u64(id.as_u64()), id);
    }
}

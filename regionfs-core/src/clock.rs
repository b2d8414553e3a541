//! Clock provider for inode timestamps.
//!
//! Operations stamp inodes through a [`Clock`], so tests can pin time with a
//! [`MockClock`] while production code uses the system clock.

use crate::types::Timespec;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> Timespec;

    /// Check if this is a mock clock.
    fn is_mock(&self) -> bool {
        false
    }
}

/// Clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timespec {
        Timespec::now()
    }
}

/// Mock clock that only moves when told to.
#[derive(Debug, Default)]
pub struct MockClock {
    current: Mutex<Timespec>,
}

impl MockClock {
    /// Create a mock clock fixed at `time`.
    pub fn fixed(time: Timespec) -> Self {
        Self {
            current: Mutex::new(time),
        }
    }

    /// Create a mock clock starting at the current system time.
    pub fn at_now() -> Self {
        Self::fixed(Timespec::now())
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock();
        *current = current.saturating_add(duration);
    }

    /// Jump to an arbitrary time.
    pub fn set(&self, time: Timespec) {
        *self.current.lock() = time;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timespec {
        *self.current.lock()
    }

    fn is_mock(&self) -> bool {
        true
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Timespec {
        (**self).now()
    }

    fn is_mock(&self) -> bool {
        (**self).is_mock()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Timespec {
        (**self).now()
    }

    fn is_mock(&self) -> bool {
        (**self).is_mock()
    }
}

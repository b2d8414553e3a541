//! Timestamps stored in inode records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Seconds and nanoseconds since the UNIX epoch, as in `struct timespec`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timespec {
    /// Whole seconds; negative before the epoch.
    pub sec: i64,
    /// Nanoseconds within the second, `0..1_000_000_000`.
    pub nsec: i64,
}

impl Timespec {
    /// The epoch.
    pub const ZERO: Self = Self { sec: 0, nsec: 0 };

    /// Create a timestamp from its parts.
    #[must_use]
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Convert a `SystemTime`, including times before the epoch.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, i64::from(d.subsec_nanos())),
            Err(e) => {
                let d = e.duration();
                let (sec, nsec) = (d.as_secs() as i64, i64::from(d.subsec_nanos()));
                if nsec == 0 {
                    Self::new(-sec, 0)
                } else {
                    Self::new(-sec - 1, 1_000_000_000 - nsec)
                }
            }
        }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Return this timestamp moved forward by `duration`, saturating.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let nsec = self.nsec + i64::from(duration.subsec_nanos());
        let sec = self
            .sec
            .saturating_add(duration.as_secs().min(i64::MAX as u64) as i64)
            .saturating_add(nsec / 1_000_000_000);
        Self::new(sec, nsec % 1_000_000_000)
    }
}

impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// Error returned when a timestamp string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid timestamp '{0}', expected SECONDS[.FRACTION]")]
pub struct ParseTimespecError(String);

impl FromStr for Timespec {
    type Err = ParseTimespecError;

    /// Parse `SECONDS[.FRACTION]`, the same form `Display` produces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseTimespecError(s.to_string());
        let (sec, frac) = s.split_once('.').unwrap_or((s, ""));
        let sec = sec.parse::<i64>().map_err(|_| invalid())?;
        if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let nsec = if frac.is_empty() {
            0
        } else {
            format!("{:0<9}", frac).parse::<i64>().map_err(|_| invalid())?
        };
        Ok(Self::new(sec, nsec))
    }
}

impl From<SystemTime> for Timespec {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

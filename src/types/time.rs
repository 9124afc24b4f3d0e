//! Seconds + nanoseconds durations used for every timeout in the crate.
//!
//! Two sentinels are recognised: [`Time::ZERO`] and [`Time::INFINITE`]. An
//! infinite `Time` converts to `None` when a `std::time::Duration` is needed,
//! which callers treat as "wait without a deadline".

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u32 = 1_000_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    pub sec: i32,
    #[serde(default)]
    pub nanosec: u32,
}

impl Time {
    pub const ZERO: Time = Time { sec: 0, nanosec: 0 };

    pub const INFINITE: Time = Time {
        sec: 0x7fff_ffff,
        nanosec: 0x7fff_ffff,
    };

    pub const fn new(sec: i32, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }

    pub const fn from_secs(sec: i32) -> Self {
        Self { sec, nanosec: 0 }
    }

    pub const fn from_millis(millis: u32) -> Self {
        Self {
            sec: (millis / 1000) as i32,
            nanosec: (millis % 1000) * 1_000_000,
        }
    }

    /// Wall-clock time since the UNIX epoch, used to stamp received messages.
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            sec: now.timestamp().clamp(0, i32::MAX as i64 - 1) as i32,
            nanosec: now.timestamp_subsec_nanos().min(NANOS_PER_SEC - 1),
        }
    }

    pub fn is_infinite(&self) -> bool {
        *self == Self::INFINITE
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// `None` for [`Time::INFINITE`]; negative values saturate to zero.
    pub fn to_duration(self) -> Option<Duration> {
        if self.is_infinite() {
            return None;
        }
        if self.sec < 0 {
            return Some(Duration::ZERO);
        }
        Some(Duration::new(self.sec as u64, self.nanosec.min(NANOS_PER_SEC - 1)))
    }

    /// Multiplies a finite time, saturating to [`Time::INFINITE`].
    pub fn saturating_mul(self, factor: u32) -> Self {
        match self.to_duration() {
            None => Self::INFINITE,
            Some(d) => d
                .checked_mul(factor)
                .map(Self::from)
                .unwrap_or(Self::INFINITE),
        }
    }
}

impl From<Duration> for Time {
    fn from(d: Duration) -> Self {
        if d.as_secs() >= Self::INFINITE.sec as u64 {
            return Self::INFINITE;
        }
        Self {
            sec: d.as_secs() as i32,
            nanosec: d.subsec_nanos(),
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "INFINITE")
        } else {
            write!(f, "{}.{:09}s", self.sec, self.nanosec)
        }
    }
}

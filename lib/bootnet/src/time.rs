// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Moments and clocks.
//!
//! The engine measures time in milliseconds from an arbitrary origin
//! chosen by the [`Clock`]. On the board this is the timer tick
//! counter; hosted builds use [`StdClock`].

use core::fmt;
use core::fmt::Display;
use core::ops::Add;
use core::time::Duration;

/// The number of milliseconds in a second.
pub const MILLIS: u64 = 1_000;

/// A moment in time, in milliseconds since the clock's origin.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Moment {
    inner: u64,
}

impl Moment {
    pub const fn from_millis(ms: u64) -> Self {
        Self { inner: ms }
    }

    pub fn as_millis(&self) -> u64 {
        self.inner
    }

    /// Compute the delta between `self - earlier` and return as
    /// milliseconds. A moment earlier than `earlier` yields zero.
    pub fn delta_as_millis(&self, earlier: Moment) -> u64 {
        self.inner.saturating_sub(earlier.inner)
    }

    /// Has this deadline been reached as of `now`?
    pub fn has_passed(&self, now: Moment) -> bool {
        now.inner >= self.inner
    }
}

impl Add<Duration> for Moment {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let ms = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Moment { inner: self.inner.saturating_add(ms) }
    }
}

impl Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}", self.inner / MILLIS, self.inner % MILLIS)
    }
}

/// A source of [`Moment`]s.
pub trait Clock: Send + Sync {
    fn now(&self) -> Moment;
}

cfg_if! {
    if #[cfg(any(feature = "std", test))] {
        use std::time::Instant;

        /// A clock whose origin is the moment it was created.
        #[derive(Clone, Copy, Debug)]
        pub struct StdClock {
            origin: Instant,
        }

        impl StdClock {
            pub fn new() -> Self {
                Self { origin: Instant::now() }
            }
        }

        impl Default for StdClock {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Clock for StdClock {
            fn now(&self) -> Moment {
                let elapsed = self.origin.elapsed();
                let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                Moment::from_millis(ms)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deadline_arithmetic() {
        let start = Moment::from_millis(1_500);
        let deadline = start + Duration::from_millis(250);
        assert_eq!(deadline.as_millis(), 1_750);
        assert!(!deadline.has_passed(Moment::from_millis(1_749)));
        assert!(deadline.has_passed(Moment::from_millis(1_750)));
        assert_eq!(deadline.delta_as_millis(start), 250);
        assert_eq!(start.delta_as_millis(deadline), 0);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Moment::from_millis(12_034)), "12.034");
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Providers let the engine run on the monitor firmware and in hosted
//! tooling alike, by plugging platform services into it. Logging and
//! time are the two services that differ: on the board, messages go
//! to the serial console and time comes from the tick counter; in
//! tests, messages go to stdout and time is advanced by hand. If a
//! service does not have at least two obvious implementations, it
//! probably doesn't need to be a provider.

use crate::time::Clock;
use alloc::boxed::Box;
use core::fmt;
use core::fmt::Display;

/// The set of platform-specific providers required by a registry.
pub struct Providers {
    pub log: Box<dyn LogProvider>,
    pub clock: Box<dyn Clock>,
}

/// A logging provider provides the means to log messages to some
/// destination based on the context in which the engine is running.
///
/// For example, in a unit test this could map to `println!`. On the
/// board it maps to the console UART.
///
/// Logging levels are provided by [`LogLevel`]. These levels will map
/// to the underlying provider with varying degrees of success.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    Debug,
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Debug => "[DEBUG]",
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

#[cfg(any(feature = "std", test))]
#[derive(Clone, Copy, Default)]
pub struct PrintlnLog {
    debug: bool,
}

#[cfg(any(feature = "std", test))]
impl PrintlnLog {
    /// A logger which also prints [`LogLevel::Debug`] messages.
    pub fn verbose() -> Self {
        Self { debug: true }
    }
}

#[cfg(any(feature = "std", test))]
impl LogProvider for PrintlnLog {
    fn log(&self, level: LogLevel, msg: &str) {
        if level == LogLevel::Debug && !self.debug {
            return;
        }

        println!("{level} {msg}");
    }
}

/// A provider which drops every message.
#[derive(Clone, Copy, Default)]
pub struct NullLog;

impl LogProvider for NullLog {
    fn log(&self, _level: LogLevel, _msg: &str) {}
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The operator's console, polled for an abort key while a transfer
//! runs.

/// The keys which abort a transfer in progress.
pub const ABORT_KEYS: [u8; 2] = [b'q', b'Q'];

pub trait Console {
    /// Read a byte if one is waiting, without blocking.
    fn try_read_byte(&mut self) -> Option<u8>;

    /// Has the operator asked to abort? Consumes at most one byte.
    fn cancel_requested(&mut self) -> bool {
        matches!(self.try_read_byte(), Some(b) if ABORT_KEYS.contains(&b))
    }
}

/// A console with nobody at it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoConsole;

impl Console for NoConsole {
    fn try_read_byte(&mut self) -> Option<u8> {
        None
    }
}

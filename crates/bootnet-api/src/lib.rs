// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types shared between the bootnet engine and its consumers.
//!
//! Everything in here is `no_std` so that the monitor firmware and the
//! hosted tooling agree on a single definition of addresses, protocol
//! numbers, and the statistics reported at the end of a transfer.

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

pub mod ip;
pub mod mac;
pub mod stat;

pub use ip::*;
pub use mac::*;
pub use stat::*;

/// Well-known UDP port of a TFTP server. Only the read request is sent
/// here; the rest of the conversation uses the server's ephemeral port.
pub const TFTP_SERVER_PORT: u16 = 69;

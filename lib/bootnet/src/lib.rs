// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The boot monitor's network engine.
//!
//! A polled, single-threaded UDP/IPv4 dispatcher and the TFTP client
//! built on top of it. The engine owns no hardware: frames come from and
//! go to a [`engine::nic::Nic`], files are written through an
//! [`engine::storage::Storage`], and logging and time are plugged in via
//! [`provider::Providers`].

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

#[macro_use]
extern crate cfg_if;

pub use bootnet_api as api;

pub mod engine;
#[cfg(any(feature = "std", test))]
pub mod print;
pub mod provider;
pub mod time;

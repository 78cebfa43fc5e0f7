// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The file system transfers write into.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;
use core::fmt::Display;

/// A storage-specific result code. Its meaning is known only to the
/// [`Storage`] which produced it; use [`Storage::errmsg`] to render it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StorageErr(pub i32);

impl Display for StorageErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "storage error {}", self.0)
    }
}

/// How to open a file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OpenMode {
    pub create: bool,
    pub truncate: bool,
}

impl OpenMode {
    /// Create the file if needed and discard any previous contents.
    pub const CREATE_TRUNCATE: Self = Self { create: true, truncate: true };
}

pub trait Storage {
    fn open(
        &mut self,
        path: &str,
        mode: OpenMode,
    ) -> Result<Box<dyn StorageFile>, StorageErr>;

    /// Translate an error code into human-readable text.
    fn errmsg(&self, err: StorageErr) -> String;
}

pub trait StorageFile {
    /// Append `bytes` to the file.
    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageErr>;

    fn close(self: Box<Self>) -> Result<(), StorageErr>;
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! In-memory file storage with fault injection.

use bootnet::engine::storage::OpenMode;
use bootnet::engine::storage::Storage;
use bootnet::engine::storage::StorageErr;
use bootnet::engine::storage::StorageFile;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

pub const ENOENT: StorageErr = StorageErr(2);
pub const EIO: StorageErr = StorageErr(5);
pub const ENOSPC: StorageErr = StorageErr(28);

type Files = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// Files live in a shared map, so their contents stay visible to the
/// test after the engine has closed them.
#[derive(Clone, Debug, Default)]
pub struct MemStorage {
    files: Files,
    /// Refuse to open anything.
    pub fail_open: Option<StorageErr>,
    /// Fail any write that would grow a file past this many bytes.
    pub fail_write_at: Option<(usize, StorageErr)>,
    pub fail_close: Option<StorageErr>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The contents of `path`, if it exists.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn insert(&self, path: &str, data: &[u8]) {
        self.files.lock().unwrap().insert(path.to_string(), data.to_vec());
    }
}

impl Storage for MemStorage {
    fn open(
        &mut self,
        path: &str,
        mode: OpenMode,
    ) -> Result<Box<dyn StorageFile>, StorageErr> {
        if let Some(e) = self.fail_open {
            return Err(e);
        }

        let mut files = self.files.lock().unwrap();
        match files.get_mut(path) {
            Some(data) if mode.truncate => data.clear(),
            Some(_) => {}
            None if mode.create => {
                files.insert(path.to_string(), Vec::new());
            }
            None => return Err(ENOENT),
        }

        Ok(Box::new(MemFile {
            path: path.to_string(),
            files: self.files.clone(),
            fail_write_at: self.fail_write_at,
            fail_close: self.fail_close,
        }))
    }

    fn errmsg(&self, err: StorageErr) -> String {
        match err {
            ENOENT => "No such file or directory".to_string(),
            EIO => "I/O error".to_string(),
            ENOSPC => "No space left on device".to_string(),
            StorageErr(n) => format!("error {n}"),
        }
    }
}

struct MemFile {
    path: String,
    files: Files,
    fail_write_at: Option<(usize, StorageErr)>,
    fail_close: Option<StorageErr>,
}

impl StorageFile for MemFile {
    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageErr> {
        let mut files = self.files.lock().unwrap();
        let data = files.entry(self.path.clone()).or_default();

        if let Some((limit, e)) = self.fail_write_at {
            if data.len() + bytes.len() > limit {
                return Err(e);
            }
        }

        data.extend_from_slice(bytes);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), StorageErr> {
        match self.fail_close {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

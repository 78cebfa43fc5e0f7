// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Engine collaborators backed by the host: the local file system and
//! the terminal.

use bootnet::engine::console::Console;
use bootnet::engine::storage::OpenMode;
use bootnet::engine::storage::Storage;
use bootnet::engine::storage::StorageErr;
use bootnet::engine::storage::StorageFile;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Write;
use std::sync::mpsc;
use std::thread;

fn storage_err(e: io::Error) -> StorageErr {
    StorageErr(e.raw_os_error().unwrap_or(libc::EIO))
}

/// Files live on the host file system; error codes are `errno` values.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn open(
        &mut self,
        path: &str,
        mode: OpenMode,
    ) -> Result<Box<dyn StorageFile>, StorageErr> {
        let mut opts = OpenOptions::new();
        opts.write(true).create(mode.create);
        if mode.truncate {
            opts.truncate(true);
        } else {
            opts.append(true);
        }

        let file = opts.open(path).map_err(storage_err)?;
        Ok(Box::new(FsFile(file)))
    }

    fn errmsg(&self, err: StorageErr) -> String {
        io::Error::from_raw_os_error(err.0).to_string()
    }
}

struct FsFile(File);

impl StorageFile for FsFile {
    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageErr> {
        self.0.write_all(bytes).map_err(storage_err)
    }

    fn close(self: Box<Self>) -> Result<(), StorageErr> {
        self.0.sync_all().map_err(storage_err)
    }
}

/// A console fed by a background thread reading from some input,
/// normally stdin.
///
/// A terminal delivers input a line at a time, so an abort key only
/// arrives once the operator presses Enter after it.
#[derive(Debug)]
pub struct StdinConsole {
    rx: mpsc::Receiver<u8>,
}

impl StdinConsole {
    pub fn spawn() -> Self {
        Self::from_reader(io::stdin())
    }

    pub fn from_reader<R: Read + Send + 'static>(input: R) -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for byte in input.bytes() {
                let Ok(byte) = byte else {
                    break;
                };
                if tx.send(byte).is_err() {
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl Console for StdinConsole {
    fn try_read_byte(&mut self) -> Option<u8> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn scratch(name: &str) -> String {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("bootadm-{}-{name}", std::process::id()));
        path.display().to_string()
    }

    #[test]
    fn fs_storage() {
        let path = scratch("fs_storage");
        let mut storage = FsStorage;

        let mut file =
            storage.open(&path, OpenMode::CREATE_TRUNCATE).unwrap();
        file.write(b"hello, ").unwrap();
        file.write(b"world").unwrap();
        file.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello, world");

        let append = OpenMode { create: false, truncate: false };
        let mut file = storage.open(&path, append).unwrap();
        file.write(b"!").unwrap();
        file.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello, world!");

        let file = storage.open(&path, OpenMode::CREATE_TRUNCATE).unwrap();
        file.close().unwrap();
        assert!(std::fs::read(&path).unwrap().is_empty());
        std::fs::remove_file(&path).unwrap();

        let err = storage.open(&path, append).err().unwrap();
        assert_eq!(err, StorageErr(libc::ENOENT));
        assert!(storage.errmsg(err).starts_with("No such file or directory"));
    }

    #[test]
    fn console_from_reader() {
        let mut console = StdinConsole::from_reader(Cursor::new(b"xq"));
        let mut aborted = false;

        for _ in 0..1000 {
            if console.cancel_requested() {
                aborted = true;
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        assert!(aborted);
        assert_eq!(console.try_read_byte(), None);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The caller's side of a TFTP download: open the output file, register
//! a transfer sink, pump the registry until the transfer completes or
//! the operator aborts, then report.

use super::TftpConfig;
use super::emit_rrq;
use super::transfer::TftpFailure;
use super::transfer::TftpTransfer;
use crate::engine::console::Console;
use crate::engine::ip4::Ipv4Addr;
use crate::engine::ip4::Protocol;
use crate::engine::nic::Nic;
use crate::engine::predicate::SinkMatch;
use crate::engine::registry::Registry;
use crate::engine::registry::RegistryError;
use crate::engine::sink::Sink;
use crate::engine::sink::SinkId;
use crate::engine::storage::OpenMode;
use crate::engine::storage::Storage;
use crate::provider::LogLevel;
use alloc::string::String;
use bootnet_api::TransferStats;
use core::fmt;
use core::fmt::Display;

/// What to fetch, from where, and into which local file.
#[derive(Clone, Debug)]
pub struct TransferReq {
    pub server: Ipv4Addr,
    /// The local UDP port the transfer is bound to.
    pub local_port: u16,
    pub remote_file: String,
    pub local_file: String,
    pub cfg: TftpConfig,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransferError {
    Open { path: String, msg: String },
    Write { path: String, msg: String },
    Close { path: String, msg: String },
    Register(RegistryError),
    Failed(TftpFailure),
}

impl Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Open { path, msg } => write!(f, "open {path}: {msg}"),
            Self::Write { path, msg } => write!(f, "write {path}: {msg}"),
            Self::Close { path, msg } => write!(f, "close {path}: {msg}"),
            Self::Register(e) => write!(f, "cannot start transfer: {e}"),
            Self::Failed(e) => write!(f, "transfer failed: {e}"),
        }
    }
}

#[cfg(any(feature = "std", test))]
impl std::error::Error for TransferError {}

impl From<RegistryError> for TransferError {
    fn from(e: RegistryError) -> Self {
        Self::Register(e)
    }
}

impl From<TftpFailure> for TransferError {
    fn from(e: TftpFailure) -> Self {
        Self::Failed(e)
    }
}

/// Decides when a progress line is due: each time another `interval`
/// bytes have arrived, and once when the announced size is reached.
#[derive(Clone, Copy, Debug)]
pub struct Progress {
    interval: u64,
    next: u64,
    reported: u64,
}

impl Progress {
    pub fn new(interval: u64) -> Self {
        let interval = interval.max(1);
        Self { interval, next: interval, reported: 0 }
    }

    pub fn update(&mut self, bytes: u64, total: Option<u64>) -> Option<String> {
        let reached_total = total == Some(bytes) && bytes > self.reported;
        if bytes < self.next && !reached_total {
            return None;
        }

        self.reported = bytes;
        self.next = (bytes / self.interval + 1) * self.interval;

        let line = match total {
            Some(total) => {
                format!("tftp: received {}/{} KB", bytes / 1024, total / 1024)
            }
            None => format!("tftp: received {} KB", bytes / 1024),
        };
        Some(line)
    }
}

/// A transfer in flight, registered with a registry.
#[derive(Debug)]
pub struct Transfer {
    id: SinkId,
    local_file: String,
    progress: Progress,
}

impl Transfer {
    /// Open the output file, register the transfer's sink and send the
    /// read request.
    pub fn start<N: Nic>(
        reg: &mut Registry<N>,
        storage: &mut dyn Storage,
        req: TransferReq,
    ) -> Result<Self, TransferError> {
        let TransferReq { server, local_port, remote_file, local_file, cfg } =
            req;

        // Refuse an oversized request before touching the file system.
        emit_rrq(&remote_file, &cfg).map_err(TftpFailure::from)?;

        let file = storage
            .open(&local_file, OpenMode::CREATE_TRUNCATE)
            .map_err(|e| TransferError::Open {
                path: local_file.clone(),
                msg: storage.errmsg(e),
            })?;

        let progress = Progress::new(cfg.progress_interval);
        let xfer = TftpTransfer::new(&remote_file, &local_file, file, cfg)?;
        let smatch = SinkMatch::any()
            .local_ip(reg.local_ip())
            .proto(Protocol::UDP)
            .remote_ip(server)
            .local_port(local_port);

        let id = reg.register(Sink::new(smatch, xfer.into()))?;
        reg.log().log(LogLevel::Note, "Transfer started: Press Q to abort");
        reg.fire(id)?;

        Ok(Self { id, local_file, progress })
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    /// Pump the registry once and report progress. Returns true once
    /// the transfer has completed, successfully or not.
    pub fn poll<N: Nic>(&mut self, reg: &mut Registry<N>) -> bool {
        reg.pump();

        let Some(xfer) = reg.sink(self.id).and_then(|s| s.tftp()) else {
            return true;
        };

        if let Some(line) =
            self.progress.update(xfer.bytes(), xfer.total_size())
        {
            reg.log().log(LogLevel::Note, &line);
        }

        xfer.is_complete()
    }

    /// Unregister the transfer, close its file and report the outcome.
    /// A transfer that has not completed is cancelled.
    pub fn finish<N: Nic>(
        self,
        reg: &mut Registry<N>,
        storage: &mut dyn Storage,
    ) -> Result<TransferStats, TransferError> {
        let id = self.id;
        let mut xfer = reg
            .unregister(id)
            .and_then(|s| s.into_tftp())
            .ok_or(RegistryError::NoSuchSink { id })?;

        let now = reg.now();
        xfer.cancel(now);
        let stats = xfer.stats(now);
        let outcome = xfer
            .outcome()
            .cloned()
            .unwrap_or(Err(TftpFailure::Cancelled));

        let closed = match xfer.take_file() {
            Some(file) => file.close(),
            None => Ok(()),
        };

        let log = reg.log();
        let res = match (outcome, closed) {
            (Ok(()), Ok(())) => Ok(stats),

            (Ok(()), Err(e)) => Err(TransferError::Close {
                path: self.local_file,
                msg: storage.errmsg(e),
            }),

            (Err(TftpFailure::Storage(e)), _) => Err(TransferError::Write {
                path: self.local_file,
                msg: storage.errmsg(e),
            }),

            (Err(e), _) => Err(TransferError::Failed(e)),
        };

        match &res {
            Ok(stats) => {
                log.log(LogLevel::Note, "Transfer success.");
                log.log(LogLevel::Note, &format!("{stats}"));
            }
            Err(TransferError::Failed(TftpFailure::Cancelled)) => {
                log.log(LogLevel::Note, "Aborted.");
            }
            Err(e) => {
                log.log(LogLevel::Error, &format!("{e}"));
                log.log(LogLevel::Note, "Transfer FAILED!");
            }
        }

        res
    }
}

/// Download a file, driving `reg` until the transfer completes or an
/// abort key arrives on `console`.
pub fn receive<N: Nic>(
    reg: &mut Registry<N>,
    storage: &mut dyn Storage,
    console: &mut dyn Console,
    req: TransferReq,
) -> Result<TransferStats, TransferError> {
    let mut xfer = Transfer::start(reg, storage, req)?;

    while !xfer.poll(reg) {
        if console.cancel_requested() {
            break;
        }
    }

    xfer.finish(reg, storage)
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn progress_every_interval() {
        let mut p = Progress::new(256 * 1024);
        assert_eq!(p.update(1024, None), None);
        assert_eq!(
            p.update(256 * 1024, None).as_deref(),
            Some("tftp: received 256 KB")
        );
        assert_eq!(p.update(300 * 1024, None), None);
        assert_eq!(
            p.update(600 * 1024, Some(1024 * 1024)).as_deref(),
            Some("tftp: received 600/1024 KB")
        );
        // The next report is at the next multiple, not 600 + 256.
        assert!(p.update(768 * 1024, Some(1024 * 1024)).is_some());
    }

    #[test]
    fn progress_at_total() {
        let mut p = Progress::new(256 * 1024);
        assert_eq!(
            p.update(10_000, Some(10_000)).as_deref(),
            Some("tftp: received 9/9 KB")
        );
        assert_eq!(p.update(10_000, Some(10_000)), None);
    }

    #[test]
    fn error_display() {
        let e = TransferError::Failed(TftpFailure::Remote {
            code: 1,
            msg: "File not found".into(),
        });
        assert_eq!(
            e.to_string(),
            "transfer failed: server error code 0x1: File not found"
        );
        let e =
            TransferError::Register(RegistryError::MaxCapacity { limit: 1 });
        assert_eq!(
            e.to_string(),
            "cannot start transfer: sink table full (1 sinks)"
        );
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The TFTP read-transfer state machine.
//!
//! A [`TftpTransfer`] lives inside a sink and is driven only by the two
//! sink events. Its life looks like this:
//!
//! ```text
//!   Idle --(first timeout: send RRQ)--> AwaitingOptionsAck
//!   AwaitingOptionsAck --(first reply: lock on to server port)-->
//!       Transferring
//!   Transferring --(short block | failure)--> Completed
//! ```
//!
//! Any state may move to `Completed` on failure. Once completed, the
//! transfer ignores every further event.

use super::ACK_LEN;
use super::DEFAULT_BLOCK_SIZE;
use super::DEFAULT_WINDOW_SIZE;
use super::OP_ACK;
use super::OP_RRQ;
use super::OptionIter;
use super::Request;
use super::TFTP_SERVER_PORT;
use super::TftpConfig;
use super::TftpMsg;
use super::TftpMsgError;
use super::TftpOption;
use super::emit_ack;
use super::emit_rrq;
use super::lossy_str;
use crate::engine::hex_dump;
use crate::engine::parse::InPkt;
use crate::engine::sink::SinkCtx;
use crate::engine::sink::SinkHandler;
use crate::engine::storage::StorageErr;
use crate::engine::storage::StorageFile;
use crate::provider::LogLevel;
use crate::time::Moment;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::string::ToString;
use alloc::vec::Vec;
use bootnet_api::TransferStats;
use core::fmt;
use core::fmt::Display;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferState {
    Idle,
    AwaitingOptionsAck,
    Transferring,
    Completed,
}

impl Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingOptionsAck => "awaiting-oack",
            Self::Transferring => "transferring",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Why a transfer ended without the whole file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TftpFailure {
    /// The retransmit ceiling was reached with no valid reply.
    Timeout { retransmits: u32 },
    /// The server sent an ERROR message.
    Remote { code: u16, msg: String },
    /// The server sent something a reading client never expects. The
    /// offending datagram is kept for inspection.
    Protocol { err: TftpMsgError, datagram: Vec<u8> },
    /// Appending to the local file failed.
    Storage(StorageErr),
    OutOfMemory,
    /// The operator aborted the transfer.
    Cancelled,
    RequestTooLong,
}

impl Display for TftpFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Timeout { retransmits } => {
                write!(f, "timed out after {retransmits} retransmissions")
            }
            Self::Remote { code, msg } => {
                write!(f, "server error code 0x{code:x}: {msg}")
            }
            Self::Protocol { err, .. } => write!(f, "protocol error: {err}"),
            Self::Storage(e) => write!(f, "write failed: {e}"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::RequestTooLong => {
                write!(f, "{}", TftpMsgError::RequestTooLong)
            }
        }
    }
}

impl From<TftpMsgError> for TftpFailure {
    fn from(err: TftpMsgError) -> Self {
        match err {
            TftpMsgError::RequestTooLong => Self::RequestTooLong,
            err => Self::Protocol { err, datagram: Vec::new() },
        }
    }
}

/// The block expected after `last`. On 16-bit wraparound counting
/// resumes at `rollover`.
pub fn next_block(last: u16, rollover: u16) -> u16 {
    last.checked_add(1).unwrap_or(rollover)
}

/// One file being read from a TFTP server.
pub struct TftpTransfer {
    cfg: TftpConfig,
    remote_file: String,
    local_file: String,
    file: Option<Box<dyn StorageFile>>,
    rrq: Request,
    state: TransferState,
    outcome: Option<Result<(), TftpFailure>>,

    // Negotiated parameters.
    block_size: u16,
    window_size: u16,
    rollover: u16,
    total_size: Option<u64>,

    server_port: Option<u16>,
    data_seen: bool,
    last_block: u16,
    last_ack: u16,
    /// Blocks accepted since the last acknowledgement we sent.
    unacked: u16,
    bytes: u64,

    retransmits_this_block: u32,
    retransmits_total: u32,
    started_at: Option<Moment>,
    finished_at: Option<Moment>,
}

impl TftpTransfer {
    /// Prepare to read `remote_file` into `file`. The read request is
    /// built here, so a request that cannot fit is refused up front.
    pub fn new(
        remote_file: &str,
        local_file: &str,
        file: Box<dyn StorageFile>,
        cfg: TftpConfig,
    ) -> Result<Self, TftpFailure> {
        let rrq = emit_rrq(remote_file, &cfg)?;

        Ok(Self {
            cfg,
            remote_file: remote_file.to_string(),
            local_file: local_file.to_string(),
            file: Some(file),
            rrq,
            state: TransferState::Idle,
            outcome: None,
            block_size: DEFAULT_BLOCK_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            rollover: 0,
            total_size: None,
            server_port: None,
            data_seen: false,
            last_block: 0,
            last_ack: 0,
            unacked: 0,
            bytes: 0,
            retransmits_this_block: 0,
            retransmits_total: 0,
            started_at: None,
            finished_at: None,
        })
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == TransferState::Completed
    }

    /// `None` until the transfer completes.
    pub fn outcome(&self) -> Option<&Result<(), TftpFailure>> {
        self.outcome.as_ref()
    }

    pub fn remote_file(&self) -> &str {
        &self.remote_file
    }

    pub fn local_file(&self) -> &str {
        &self.local_file
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// The size announced by the server's `tsize` option.
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    pub fn block_size(&self) -> u16 {
        self.block_size
    }

    pub fn window_size(&self) -> u16 {
        self.window_size
    }

    pub fn rollover(&self) -> u16 {
        self.rollover
    }

    pub fn last_block(&self) -> u16 {
        self.last_block
    }

    pub fn last_ack(&self) -> u16 {
        self.last_ack
    }

    pub fn retransmits(&self) -> u32 {
        self.retransmits_total
    }

    /// The server's transfer port, once locked on.
    pub fn server_port(&self) -> Option<u16> {
        self.server_port
    }

    /// Take the output file so the caller can close it.
    pub fn take_file(&mut self) -> Option<Box<dyn StorageFile>> {
        self.file.take()
    }

    /// Abandon the transfer at the operator's request. Has no effect on
    /// a transfer that already completed.
    pub fn cancel(&mut self, now: Moment) {
        if !self.is_complete() {
            self.state = TransferState::Completed;
            self.outcome = Some(Err(TftpFailure::Cancelled));
            self.finished_at = Some(now);
        }
    }

    /// Statistics so far; elapsed time runs until completion or `now`.
    pub fn stats(&self, now: Moment) -> TransferStats {
        let end = self.finished_at.unwrap_or(now);
        let elapsed_ms =
            self.started_at.map(|s| end.delta_as_millis(s)).unwrap_or(0);

        TransferStats {
            bytes: self.bytes,
            elapsed_ms,
            retransmits: self.retransmits_total,
            size_hint: self.total_size,
        }
    }

    fn finish(&mut self, ctx: &mut SinkCtx, outcome: Result<(), TftpFailure>) {
        ctx.disarm();
        self.state = TransferState::Completed;
        self.finished_at = Some(ctx.now);
        self.outcome = Some(outcome);
    }

    fn send_rrq(&mut self, ctx: &mut SinkCtx) -> Result<(), TftpFailure> {
        let mut dgram = ctx
            .datagram(self.rrq.len())
            .map_err(|_| TftpFailure::OutOfMemory)?;
        dgram.set_dst_port(TFTP_SERVER_PORT);
        dgram.body_mut().copy_from_slice(&self.rrq);
        ctx.transmit(dgram);
        ctx.arm(self.cfg.rrq_timeout());
        Ok(())
    }

    fn send_ack(
        &mut self,
        ctx: &mut SinkCtx,
        block: u16,
    ) -> Result<(), TftpFailure> {
        let mut dgram =
            ctx.datagram(ACK_LEN).map_err(|_| TftpFailure::OutOfMemory)?;
        dgram.body_mut().copy_from_slice(&emit_ack(block));
        ctx.transmit(dgram);
        self.last_ack = block;
        self.unacked = 0;
        Ok(())
    }

    fn retransmit(&mut self, ctx: &mut SinkCtx) -> Result<(), TftpFailure> {
        if self.retransmits_this_block >= self.cfg.max_retransmits {
            return Err(TftpFailure::Timeout {
                retransmits: self.retransmits_total,
            });
        }

        self.retransmits_this_block += 1;
        self.retransmits_total += 1;

        if self.state == TransferState::AwaitingOptionsAck {
            ctx.log.log(
                LogLevel::Debug,
                &format!(
                    "tftp: timeout, resending request (retry {})",
                    self.retransmits_this_block
                ),
            );
            self.send_rrq(ctx)
        } else {
            let block = self.last_block;
            ctx.log.log(
                LogLevel::Debug,
                &format!(
                    "tftp: timeout, resending ack {block} (retry {})",
                    self.retransmits_this_block
                ),
            );
            self.send_ack(ctx, block)?;
            ctx.arm(self.cfg.data_timeout());
            Ok(())
        }
    }

    fn handle_packet(
        &mut self,
        ctx: &mut SinkCtx,
        pkt: &InPkt,
    ) -> Result<(), TftpFailure> {
        // Lock on to whichever port the server answered from.
        if self.server_port.is_none() {
            let port = pkt.udp.src;
            ctx.rebind_remote_port(port);
            ctx.log.log(
                LogLevel::Debug,
                &format!("tftp: server using port {port}"),
            );
            self.server_port = Some(port);
            self.state = TransferState::Transferring;
        }

        let body = pkt.body();
        let msg = TftpMsg::parse(body).map_err(|err| {
            self.protocol_failure(ctx, err, body)
        })?;

        match msg {
            TftpMsg::OptionAck { options } => {
                if !self.data_seen {
                    self.apply_options(ctx, options);
                    self.last_block = 0;
                    self.retransmits_this_block = 0;
                    self.send_ack(ctx, 0)?;
                }
                ctx.arm(self.cfg.data_timeout());
                Ok(())
            }

            TftpMsg::Data { block, data } => self.handle_data(ctx, block, data),

            TftpMsg::Error { code, msg } => {
                let msg = lossy_str(msg);
                ctx.log.log(
                    LogLevel::Error,
                    &format!("tftp: server error code 0x{code:x}: {msg}"),
                );
                Err(TftpFailure::Remote { code, msg })
            }

            TftpMsg::Rrq { .. } => {
                let err = TftpMsgError::UnexpectedOpcode { opcode: OP_RRQ };
                Err(self.protocol_failure(ctx, err, body))
            }

            TftpMsg::Ack { .. } => {
                let err = TftpMsgError::UnexpectedOpcode { opcode: OP_ACK };
                Err(self.protocol_failure(ctx, err, body))
            }
        }
    }

    fn protocol_failure(
        &self,
        ctx: &mut SinkCtx,
        err: TftpMsgError,
        body: &[u8],
    ) -> TftpFailure {
        ctx.log.log(
            LogLevel::Error,
            &format!("tftp: {err}, datagram:\n{}", hex_dump(body)),
        );
        TftpFailure::Protocol { err, datagram: body.to_vec() }
    }

    fn apply_options(&mut self, ctx: &mut SinkCtx, options: OptionIter) {
        for (name, val) in options {
            match TftpOption::from_pair(name, val) {
                Some(opt) => {
                    match opt {
                        TftpOption::BlkSize(v) => self.block_size = v,
                        TftpOption::Rollover(v) => self.rollover = v,
                        TftpOption::TSize(v) => self.total_size = Some(v),
                        TftpOption::WindowSize(v) => self.window_size = v,
                    }
                    ctx.log.log(
                        LogLevel::Debug,
                        &format!("tftp: option {opt}"),
                    );
                }

                None => ctx.log.log(
                    LogLevel::Debug,
                    &format!(
                        "tftp: ignoring option {}={}",
                        lossy_str(name),
                        lossy_str(val)
                    ),
                ),
            }
        }
    }

    fn handle_data(
        &mut self,
        ctx: &mut SinkCtx,
        block: u16,
        data: &[u8],
    ) -> Result<(), TftpFailure> {
        self.data_seen = true;
        let expected = next_block(self.last_block, self.rollover);

        if block == expected {
            self.last_block = block;
            self.retransmits_this_block = 0;

            if !data.is_empty() {
                if let Some(file) = self.file.as_mut() {
                    file.write(data).map_err(|e| {
                        ctx.log.log(
                            LogLevel::Error,
                            &format!(
                                "tftp: write to {} failed: {e}",
                                self.local_file
                            ),
                        );
                        TftpFailure::Storage(e)
                    })?;
                }
            }

            self.bytes += data.len() as u64;
            self.unacked = self.unacked.saturating_add(1);

            if data.len() < usize::from(self.block_size) {
                self.state = TransferState::Completed;
                self.outcome = Some(Ok(()));
                self.finished_at = Some(ctx.now);
            }
        }

        if self.unacked >= self.window_size {
            self.send_ack(ctx, self.last_block)?;
        }

        if self.is_complete() {
            // Let the server finish cleanly too.
            if self.unacked > 0 {
                let block = self.last_block;
                if let Err(e) = self.send_ack(ctx, block) {
                    ctx.log.log(
                        LogLevel::Warn,
                        &format!("tftp: final ack {block} not sent: {e}"),
                    );
                }
            }
            ctx.disarm();
        } else {
            ctx.arm(self.cfg.data_timeout());
        }

        Ok(())
    }
}

impl SinkHandler for TftpTransfer {
    fn on_packet(&mut self, ctx: &mut SinkCtx, pkt: InPkt) {
        if self.is_complete() {
            return;
        }

        if let Err(e) = self.handle_packet(ctx, &pkt) {
            self.finish(ctx, Err(e));
        }
    }

    fn on_timeout(&mut self, ctx: &mut SinkCtx) {
        let res = match self.state {
            TransferState::Completed => return,

            TransferState::Idle => {
                self.started_at = Some(ctx.now);
                self.state = TransferState::AwaitingOptionsAck;
                self.send_rrq(ctx)
            }

            TransferState::AwaitingOptionsAck
            | TransferState::Transferring => self.retransmit(ctx),
        };

        if let Err(e) = res {
            if let TftpFailure::Timeout { retransmits } = e {
                ctx.log.log(
                    LogLevel::Warn,
                    &format!("tftp: giving up after {retransmits} retries"),
                );
            }
            self.finish(ctx, Err(e));
        }
    }

    fn state_desc(&self) -> String {
        format!(
            "{} {} blk={} ack={} bytes={}",
            self.state,
            self.remote_file,
            self.last_block,
            self.last_ack,
            self.bytes
        )
    }
}

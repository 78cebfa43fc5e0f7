// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Counters and summaries reported by the engine.

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// Summary of a finished TFTP transfer.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TransferStats {
    /// Bytes written to the local file.
    pub bytes: u64,
    /// Wall time from the read request to completion, in milliseconds.
    pub elapsed_ms: u64,
    /// Total number of retransmitted requests and acknowledgements.
    pub retransmits: u32,
    /// The transfer size announced by the server, if any.
    pub size_hint: Option<u64>,
}

impl TransferStats {
    /// Elapsed time in tenths of a second, never less than one so the
    /// rate below is always defined.
    pub fn elapsed_tenths(&self) -> u64 {
        (self.elapsed_ms / 100).max(1)
    }

    /// Throughput in tenths of a KiB per second.
    pub fn rate_tenths_kib(&self) -> u64 {
        self.bytes.saturating_mul(100) / self.elapsed_tenths() / 1024
    }
}

impl Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let taken = self.elapsed_tenths();
        let rate = self.rate_tenths_kib();
        write!(
            f,
            "Transferred {} bytes in {}.{}s ({}.{} KB/sec)",
            self.bytes,
            taken / 10,
            taken % 10,
            rate / 10,
            rate % 10
        )
    }
}

/// Dispatcher counters, one per fate a received frame can meet.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RegistryStats {
    pub rx_frames: u64,
    pub rx_delivered: u64,
    pub rx_no_sink: u64,
    pub rx_bad_ether: u64,
    pub rx_not_ipv4: u64,
    pub rx_bad_ipv4: u64,
    pub rx_bad_csum: u64,
    pub rx_not_udp: u64,
    pub rx_bad_udp: u64,
    pub tx_frames: u64,
    pub timers_fired: u64,
}

impl RegistryStats {
    /// Total number of received frames that were discarded.
    pub fn rx_dropped(&self) -> u64 {
        self.rx_no_sink
            + self.rx_bad_ether
            + self.rx_not_ipv4
            + self.rx_bad_ipv4
            + self.rx_bad_csum
            + self.rx_not_udp
            + self.rx_bad_udp
    }
}

/// A human-readable snapshot of one registered sink.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SinkDump {
    pub id: u64,
    pub rule: String,
    pub kind: String,
    pub state: String,
    /// Milliseconds until the sink's timer fires, if armed.
    pub timer_ms: Option<u64>,
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn summary_line() {
        let stats = TransferStats {
            bytes: 10 * 1024,
            elapsed_ms: 1_000,
            retransmits: 0,
            size_hint: None,
        };
        assert_eq!(
            stats.to_string(),
            "Transferred 10240 bytes in 1.0s (10.0 KB/sec)"
        );
    }

    #[test]
    fn instant_transfer_has_a_rate() {
        let stats = TransferStats { bytes: 2048, ..Default::default() };
        assert_eq!(stats.elapsed_tenths(), 1);
        assert_eq!(stats.rate_tenths_kib(), 200);
    }
}

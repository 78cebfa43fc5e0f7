// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Print engine state in a human-friendly manner.
//!
//! This is a place to hang printing routines so that they can be used
//! by both bootadm and integration tests.

use crate::api::RegistryStats;
use crate::api::SinkDump;
use crate::api::TransferStats;
use std::io::Write;
use std::string::ToString;
use tabwriter::TabWriter;

/// Print a registry's sink table.
pub fn print_sinks(sinks: &[SinkDump]) -> std::io::Result<()> {
    print_sinks_into(&mut std::io::stdout(), sinks)
}

/// Print a registry's sink table into a given writer.
pub fn print_sinks_into(
    writer: &mut impl Write,
    sinks: &[SinkDump],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Sinks")?;
    write_hr(&mut t)?;
    writeln!(t, "ID\tKIND\tTIMER\tMATCH\tSTATE")?;
    for s in sinks {
        let timer = match s.timer_ms {
            Some(ms) => format!("{ms}ms"),
            None => "-".to_string(),
        };
        writeln!(
            t,
            "{}\t{}\t{}\t{}\t{}",
            s.id, s.kind, timer, s.rule, s.state
        )?;
    }
    t.flush()
}

/// Print registry counters.
pub fn print_registry_stats(stats: &RegistryStats) -> std::io::Result<()> {
    print_registry_stats_into(&mut std::io::stdout(), stats)
}

/// Print registry counters into a given writer.
pub fn print_registry_stats_into(
    writer: &mut impl Write,
    stats: &RegistryStats,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Registry")?;
    write_hr(&mut t)?;
    let rows = [
        ("rx frames", stats.rx_frames),
        ("rx delivered", stats.rx_delivered),
        ("rx dropped", stats.rx_dropped()),
        ("  no sink", stats.rx_no_sink),
        ("  bad ethernet", stats.rx_bad_ether),
        ("  not ipv4", stats.rx_not_ipv4),
        ("  bad ipv4", stats.rx_bad_ipv4),
        ("  bad checksum", stats.rx_bad_csum),
        ("  not udp", stats.rx_not_udp),
        ("  bad udp", stats.rx_bad_udp),
        ("tx frames", stats.tx_frames),
        ("timers fired", stats.timers_fired),
    ];
    for (name, val) in rows {
        writeln!(t, "{name}\t{val}")?;
    }
    t.flush()
}

/// Print the summary of a finished transfer.
pub fn print_transfer_stats(stats: &TransferStats) -> std::io::Result<()> {
    print_transfer_stats_into(&mut std::io::stdout(), stats)
}

/// Print the summary of a finished transfer into a given writer.
pub fn print_transfer_stats_into(
    writer: &mut impl Write,
    stats: &TransferStats,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "{stats}")?;
    write_hr(&mut t)?;
    writeln!(t, "bytes\t{}", stats.bytes)?;
    match stats.size_hint {
        Some(hint) => writeln!(t, "size hint\t{hint}")?,
        None => writeln!(t, "size hint\t-")?,
    }
    writeln!(t, "elapsed\t{}ms", stats.elapsed_ms)?;
    writeln!(t, "retransmits\t{}", stats.retransmits)?;
    t.flush()
}

/// Write a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}

#[cfg(test)]
mod test {
    use super::*;
    use std::string::String;
    use std::vec::Vec;

    #[test]
    fn sink_table_aligns() {
        let sinks = vec![SinkDump {
            id: 1,
            rule: "ip.dst=10.0.0.2 ip.proto=UDP".into(),
            kind: "tftp".into(),
            state: "transferring".into(),
            timer_ms: Some(250),
        }];
        let mut out = Vec::new();
        print_sinks_into(&mut out, &sinks).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "Sinks");
        assert!(lines[2].starts_with("ID  KIND  TIMER  MATCH"));
        assert!(lines[3].starts_with("1   tftp  250ms  ip.dst=10.0.0.2"));
    }

    #[test]
    fn transfer_summary() {
        let stats = TransferStats {
            bytes: 3072,
            elapsed_ms: 500,
            retransmits: 2,
            size_hint: Some(3072),
        };
        let mut out = Vec::new();
        print_transfer_stats_into(&mut out, &stats).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(
            out.starts_with("Transferred 3072 bytes in 0.5s (6.0 KB/sec)")
        );
        assert!(out.contains("retransmits  2"));
    }
}

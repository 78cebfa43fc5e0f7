// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use std::path::Path;
use std::path::PathBuf;

use clap::Parser;

use bootadm::AdmConfig;
use bootadm::AdmError;
use bootadm::capture::print_capture;
use bootadm::capture::read_capture;
use bootnet::api::Ipv4Addr;
use bootnet::api::MacAddr;

/// Fetch boot images over TFTP and inspect boot network traffic.
#[derive(Debug, Parser)]
#[command(version)]
enum Command {
    /// Download a file from a TFTP server. Type `q` and Enter to abort.
    TftpGet {
        /// The interface to transfer over.
        #[arg(short, long)]
        interface: String,

        /// This host's IPv4 address on that interface.
        #[arg(long)]
        local_ip: Ipv4Addr,

        /// The server's hardware address. Frames to the server are
        /// broadcast when it is not given.
        #[arg(long)]
        server_mac: Option<MacAddr>,

        /// A TOML file overriding the transfer tunables.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also log the engine's debug messages.
        #[arg(short, long)]
        verbose: bool,

        /// Print the registry counters when done.
        #[arg(long)]
        stats: bool,

        server: Ipv4Addr,
        remote_file: String,

        /// Where to write the file. Defaults to the remote file's base
        /// name in the current directory.
        local_file: Option<String>,
    },

    /// Classify each frame of a pcap file the way the engine would.
    DumpPcap { path: PathBuf },
}

fn default_local_file(remote: &str) -> String {
    Path::new(remote)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| remote.to_string())
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        use bootadm::host::FsStorage;
        use bootadm::host::StdinConsole;
        use bootadm::pick_local_port;
        use bootadm::rawnic::RawNic;
        use bootnet::engine::registry::Registry;
        use bootnet::engine::registry::RegistryConfig;
        use bootnet::engine::sink::Neighbour;
        use bootnet::engine::tftp::client::TransferReq;
        use bootnet::engine::tftp::client::receive;
        use bootnet::print::print_registry_stats;
        use bootnet::print::print_transfer_stats;
        use bootnet::provider::LogProvider;
        use bootnet::provider::PrintlnLog;
        use bootnet::provider::Providers;
        use bootnet::time::StdClock;

        #[allow(clippy::too_many_arguments)]
        fn tftp_get(
            interface: &str,
            local_ip: Ipv4Addr,
            server: Ipv4Addr,
            server_mac: Option<MacAddr>,
            cfg: AdmConfig,
            remote_file: String,
            local_file: String,
            verbose: bool,
            stats: bool,
        ) -> anyhow::Result<()> {
            let nic = RawNic::open(interface)?;
            let neighbours = server_mac
                .map(|mac| vec![Neighbour { ip: server, mac }])
                .unwrap_or_default();
            let reg_cfg =
                RegistryConfig { local_ip, neighbours, ..Default::default() };
            let log: Box<dyn LogProvider> = if verbose {
                Box::new(PrintlnLog::verbose())
            } else {
                Box::new(PrintlnLog::default())
            };
            let providers =
                Providers { log, clock: Box::new(StdClock::new()) };
            let mut reg = Registry::new(nic, reg_cfg, providers);

            let req = TransferReq {
                server,
                local_port: pick_local_port(&mut rand::rng()),
                remote_file,
                local_file,
                cfg: cfg.tftp,
            };
            let mut console = StdinConsole::spawn();
            let res = receive(&mut reg, &mut FsStorage, &mut console, req);

            if stats {
                print_registry_stats(&reg.stats())?;
            }
            print_transfer_stats(&res?)?;
            Ok(())
        }
    } else {
        #[allow(clippy::too_many_arguments)]
        fn tftp_get(
            _interface: &str,
            _local_ip: Ipv4Addr,
            _server: Ipv4Addr,
            _server_mac: Option<MacAddr>,
            _cfg: AdmConfig,
            _remote_file: String,
            _local_file: String,
            _verbose: bool,
            _stats: bool,
        ) -> anyhow::Result<()> {
            anyhow::bail!("raw interface access is only supported on Linux")
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    match cmd {
        Command::TftpGet {
            interface,
            local_ip,
            server_mac,
            config,
            verbose,
            stats,
            server,
            remote_file,
            local_file,
        } => {
            let cfg = match config {
                Some(path) => bootadm::load_config(&path)?,
                None => AdmConfig::default(),
            };
            let local_file =
                local_file.unwrap_or_else(|| default_local_file(&remote_file));

            tftp_get(
                &interface,
                local_ip,
                server,
                server_mac,
                cfg,
                remote_file,
                local_file,
                verbose,
                stats,
            )?;
        }

        Command::DumpPcap { path } => {
            let bytes = std::fs::read(&path).map_err(|source| {
                AdmError::Read { path: path.display().to_string(), source }
            })?;
            print_capture(&read_capture(&bytes)?)?;
        }
    }

    Ok(())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Host-side administration of the boot network engine: run transfers
//! from a workstation and inspect captured traffic.

use bootnet::engine::tftp::TftpConfig;
use rand::Rng;
use serde::Deserialize;
use std::io;
use std::path::Path;
use thiserror::Error;

pub mod capture;
pub mod host;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod rawnic;
    }
}

/// The first port handed out to a transfer.
pub const LOCAL_PORT_BASE: u16 = 8192;

#[derive(Debug, Error)]
pub enum AdmError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("invalid config {path}: {source}")]
    Config { path: String, source: toml::de::Error },

    #[error("interface {name}: {source}")]
    Interface { name: String, source: io::Error },

    #[error("interface {name}: bad hardware address {addr:?}: {msg}")]
    BadMac { name: String, addr: String, msg: String },

    #[error("bad capture: {0}")]
    Capture(String),
}

/// The contents of a `--config` file.
///
/// ```toml
/// [tftp]
/// blksize = 1428
/// windowsize = 16
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AdmConfig {
    pub tftp: TftpConfig,
}

pub fn parse_config(text: &str) -> Result<AdmConfig, toml::de::Error> {
    toml::from_str(text)
}

pub fn load_config(path: &Path) -> Result<AdmConfig, AdmError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path)
        .map_err(|source| AdmError::Read { path: display.clone(), source })?;
    parse_config(&text)
        .map_err(|source| AdmError::Config { path: display, source })
}

/// Pick the local port for a transfer, somewhere above
/// [`LOCAL_PORT_BASE`].
pub fn pick_local_port<R: Rng>(rng: &mut R) -> u16 {
    LOCAL_PORT_BASE + (rng.random::<u16>() & 0x7fff)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_overrides() {
        let cfg = parse_config("[tftp]\nblksize = 512\nwindowsize = 4\n")
            .unwrap();
        assert_eq!(cfg.tftp.blksize, 512);
        assert_eq!(cfg.tftp.windowsize, 4);
        assert_eq!(cfg.tftp.rrq_timeout_ms, 1000);
        assert_eq!(cfg.tftp.max_retransmits, 10);

        assert_eq!(parse_config("").unwrap(), AdmConfig::default());
        assert!(parse_config("[dhcp]\n").is_err());
        assert!(parse_config("[tftp]\nblksize = \"big\"\n").is_err());
    }

    #[test]
    fn local_port_range() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let port = pick_local_port(&mut rng);
            assert!((8192..8192 + 0x8000).contains(&u32::from(port)));
        }
    }
}

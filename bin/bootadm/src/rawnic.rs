// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A [`Nic`] over a Linux `AF_PACKET` socket bound to one interface.
//!
//! Opening one needs `CAP_NET_RAW`.

use crate::AdmError;
use bootnet::api::MacAddr;
use bootnet::engine::nic::Nic;
use bootnet::engine::packet::Buffer;
use bootnet::engine::packet::PACKET_MAXLEN;
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::AsRawFd;
use std::os::fd::FromRawFd;
use std::os::fd::OwnedFd;

/// How long `try_receive` waits for a frame before reporting that
/// none is pending.
const POLL_MS: libc::c_int = 1;

#[derive(Debug)]
pub struct RawNic {
    fd: OwnedFd,
    mac: MacAddr,
    buf: Vec<u8>,
    tx_errors: u64,
}

impl RawNic {
    pub fn open(name: &str) -> Result<Self, AdmError> {
        let err = |source| AdmError::Interface {
            name: name.to_string(),
            source,
        };
        let mac = read_mac(name)?;

        let cname = CString::new(name)
            .map_err(|_| err(io::Error::from(io::ErrorKind::InvalidInput)))?;
        // SAFETY: `cname` is a valid NUL-terminated string.
        let ifindex = unsafe { libc::if_nametoindex(cname.as_ptr()) };
        if ifindex == 0 {
            return Err(err(io::Error::last_os_error()));
        }

        let proto = (libc::ETH_P_IP as u16).to_be();
        // SAFETY: plain system call, no pointers involved.
        let raw = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                libc::c_int::from(proto),
            )
        };
        if raw < 0 {
            return Err(err(io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly opened descriptor owned by no one
        // else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: `sockaddr_ll` is plain old data; all zeroes is valid.
        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_protocol = proto;
        addr.sll_ifindex = ifindex as libc::c_int;

        // SAFETY: `addr` outlives the call and the length matches it.
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_ll).cast(),
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(err(io::Error::last_os_error()));
        }

        Ok(Self { fd, mac, buf: vec![0; PACKET_MAXLEN], tx_errors: 0 })
    }

    /// Frames the kernel refused to send.
    pub fn tx_errors(&self) -> u64 {
        self.tx_errors
    }
}

fn read_mac(name: &str) -> Result<MacAddr, AdmError> {
    let path = format!("/sys/class/net/{name}/address");
    let addr = std::fs::read_to_string(&path)
        .map_err(|source| AdmError::Read { path, source })?;
    let addr = addr.trim();

    addr.parse().map_err(|msg| AdmError::BadMac {
        name: name.to_string(),
        addr: addr.to_string(),
        msg,
    })
}

impl Nic for RawNic {
    fn try_receive(&mut self) -> Option<Buffer> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        // Wait briefly so the engine's polling loop does not spin.
        // SAFETY: `pfd` is a single valid pollfd.
        let ready = unsafe { libc::poll(&mut pfd, 1, POLL_MS) };
        if ready <= 0 {
            return None;
        }

        // SAFETY: `buf` is valid for writes of its full length.
        let n = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                self.buf.as_mut_ptr().cast(),
                self.buf.len(),
                0,
            )
        };
        if n <= 0 {
            return None;
        }

        Buffer::from_slice(&self.buf[..n as usize]).ok()
    }

    fn transmit(&mut self, frame: Buffer) {
        let bytes = frame.as_slice();
        // SAFETY: `bytes` is valid for reads of its full length.
        let n = unsafe {
            libc::send(
                self.fd.as_raw_fd(),
                bytes.as_ptr().cast(),
                bytes.len(),
                0,
            )
        };
        if n < 0 {
            self.tx_errors += 1;
        }
    }

    fn mac_address(&self) -> MacAddr {
        self.mac
    }
}

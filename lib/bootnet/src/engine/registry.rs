// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The sink registry: the engine's packet dispatcher.
//!
//! The registry owns the NIC and an ordered table of [`Sink`]s. Each
//! call to [`Registry::pump()`] does two things, in this order:
//!
//! 1. Drain every frame the NIC has pending, classifying each one down
//!    to a UDP datagram and handing it to the first sink, in
//!    registration order, whose [`SinkMatch`] accepts it. Frames that
//!    fail to classify, or that no sink wants, are dropped and counted.
//!
//! 2. Fire the timer of every sink whose deadline has passed.
//!
//! Because all pending frames are delivered before any timer is
//! examined, a datagram that arrived in time always beats the timeout
//! it would have prevented.
//!
//! Nothing here blocks. Forward progress requires the caller to keep
//! pumping.

use super::ip4::DEFAULT_TTL;
use super::ip4::Ipv4Addr;
use super::ip4::Ipv4HdrError;
use super::nic::Nic;
use super::parse::ParseError;
use super::parse::parse_frame;
use super::sink::Datagram;
use super::sink::Egress;
use super::sink::Neighbour;
use super::sink::Sink;
use super::sink::SinkCtx;
use super::sink::SinkId;
use super::sink::SinkKind;
use crate::provider::LogLevel;
use crate::provider::LogProvider;
use crate::provider::Providers;
use crate::time::Clock;
use crate::time::Moment;
use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec::Vec;
use bootnet_api::RegistryStats;
use bootnet_api::SinkDump;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The default number of sinks a registry will hold.
pub const DEFAULT_MAX_SINKS: usize = 16;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// This host's address. Outbound datagrams carry it as their
    /// source.
    pub local_ip: Ipv4Addr,
    pub max_sinks: usize,
    /// Static neighbour table. Destinations not listed are sent to the
    /// Ethernet broadcast address.
    pub neighbours: Vec<Neighbour>,
    pub ttl: u8,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            local_ip: Ipv4Addr::ANY_ADDR,
            max_sinks: DEFAULT_MAX_SINKS,
            neighbours: Vec::new(),
            ttl: DEFAULT_TTL,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegistryError {
    MaxCapacity { limit: usize },
    NoSuchSink { id: SinkId },
    OutOfMemory,
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MaxCapacity { limit } => {
                write!(f, "sink table full ({limit} sinks)")
            }
            Self::NoSuchSink { id } => write!(f, "no such sink: {id}"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

pub struct Registry<N: Nic> {
    nic: N,
    max_sinks: usize,
    next_id: u64,
    sinks: Vec<Sink>,
    egress: Egress,
    stats: RegistryStats,
    log: Box<dyn LogProvider>,
    clock: Box<dyn Clock>,
}

impl<N: Nic> Registry<N> {
    pub fn new(nic: N, cfg: RegistryConfig, providers: Providers) -> Self {
        let mac = nic.mac_address();
        let egress = Egress::new(cfg.local_ip, mac, cfg.ttl, cfg.neighbours);

        Self {
            nic,
            max_sinks: cfg.max_sinks,
            next_id: 1,
            sinks: Vec::new(),
            egress,
            stats: RegistryStats::default(),
            log: providers.log,
            clock: providers.clock,
        }
    }

    pub fn local_ip(&self) -> Ipv4Addr {
        self.egress.local_ip()
    }

    pub fn now(&self) -> Moment {
        self.clock.now()
    }

    pub fn log(&self) -> &dyn LogProvider {
        &*self.log
    }

    pub fn nic(&self) -> &N {
        &self.nic
    }

    pub fn nic_mut(&mut self) -> &mut N {
        &mut self.nic
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn position(&self, id: SinkId) -> Option<usize> {
        self.sinks.iter().position(|s| s.id == id)
    }

    /// Add `sink` to the end of the table and return its new id.
    pub fn register(
        &mut self,
        mut sink: Sink,
    ) -> Result<SinkId, RegistryError> {
        if self.sinks.len() >= self.max_sinks {
            return Err(RegistryError::MaxCapacity { limit: self.max_sinks });
        }

        self.sinks
            .try_reserve(1)
            .map_err(|_| RegistryError::OutOfMemory)?;

        let id = SinkId(self.next_id);
        self.next_id += 1;
        sink.id = id;
        let kind = sink.kind.name();
        let msg = format!("sink {id}: registered {kind} {}", sink.smatch);
        self.log.log(LogLevel::Debug, &msg);
        self.sinks.push(sink);
        Ok(id)
    }

    /// Remove the sink with the given id, handing it back to the
    /// caller.
    pub fn unregister(&mut self, id: SinkId) -> Option<Sink> {
        let idx = self.position(id)?;
        let sink = self.sinks.remove(idx);
        self.log.log(LogLevel::Debug, &format!("sink {id}: unregistered"));
        Some(sink)
    }

    pub fn sink(&self, id: SinkId) -> Option<&Sink> {
        self.sinks.iter().find(|s| s.id == id)
    }

    /// The ids of all registered sinks, in match order.
    pub fn sink_ids(&self) -> Vec<SinkId> {
        self.sinks.iter().map(|s| s.id).collect()
    }

    /// Invoke a sink's timeout handler now, whether or not its timer
    /// is armed. This is how a protocol is kicked off.
    pub fn fire(&mut self, id: SinkId) -> Result<(), RegistryError> {
        let idx = self.position(id).ok_or(RegistryError::NoSuchSink { id })?;
        let now = self.clock.now();
        self.sinks[idx].timer = None;
        self.run_sink(idx, now, |kind, ctx| kind.on_timeout(ctx));
        Ok(())
    }

    /// Send a datagram built outside of any sink callback.
    pub fn transmit(&mut self, dgram: Datagram) {
        self.egress.send(dgram);
        self.flush();
    }

    /// Deliver all pending inbound frames, then fire expired timers.
    /// Returns the number of frames received.
    pub fn pump(&mut self) -> usize {
        let mut received = 0;

        while let Some(frame) = self.nic.try_receive() {
            received += 1;
            self.stats.rx_frames += 1;

            let pkt = match parse_frame(frame) {
                Ok(pkt) => pkt,
                Err(e) => {
                    self.count_drop(&e);
                    continue;
                }
            };

            let hit = self.sinks.iter().position(|s| s.smatch.matches(&pkt));
            let Some(idx) = hit else {
                self.stats.rx_no_sink += 1;
                continue;
            };

            self.stats.rx_delivered += 1;
            let now = self.clock.now();
            self.run_sink(idx, now, |kind, ctx| kind.on_packet(ctx, pkt));
        }

        self.expire_timers();
        received
    }

    /// Fire every expired timer. Callbacks may rebind their sink, which
    /// reorders the table, so walk a snapshot of ids and look each one
    /// up again before firing it.
    fn expire_timers(&mut self) {
        let now = self.clock.now();

        for id in self.sink_ids() {
            let Some(idx) = self.position(id) else {
                continue;
            };

            match self.sinks[idx].timer {
                Some(deadline) if deadline.has_passed(now) => {}
                _ => continue,
            }

            self.sinks[idx].timer = None;
            self.stats.timers_fired += 1;
            self.run_sink(idx, now, |kind, ctx| kind.on_timeout(ctx));
        }
    }

    fn run_sink<F>(&mut self, idx: usize, now: Moment, f: F)
    where
        F: FnOnce(&mut SinkKind, &mut SinkCtx),
    {
        let sink = &mut self.sinks[idx];
        let mut ctx = SinkCtx::new(
            now,
            sink.id,
            sink.smatch,
            &mut sink.timer,
            &mut self.egress,
            &*self.log,
        );
        f(&mut sink.kind, &mut ctx);
        let (rebind, smatch) = (ctx.rebind, ctx.smatch);

        // A sink is never altered in place: take it out and put it
        // back at the end under the new match.
        if rebind {
            let mut sink = self.sinks.remove(idx);
            self.log.log(
                LogLevel::Debug,
                &format!("sink {}: rebound to {smatch}", sink.id),
            );
            sink.smatch = smatch;
            self.sinks.push(sink);
        }

        self.flush();
    }

    fn flush(&mut self) {
        while let Some(frame) = self.egress.pop_frame() {
            self.stats.tx_frames += 1;
            self.nic.transmit(frame);
        }
    }

    fn count_drop(&mut self, e: &ParseError) {
        match e {
            ParseError::Ether(_) => self.stats.rx_bad_ether += 1,
            ParseError::NotIpv4(_) => self.stats.rx_not_ipv4 += 1,
            ParseError::Ipv4(Ipv4HdrError::BadChecksum { .. }) => {
                self.stats.rx_bad_csum += 1
            }
            ParseError::Ipv4(_) => self.stats.rx_bad_ipv4 += 1,
            ParseError::NotUdp(_) => self.stats.rx_not_udp += 1,
            ParseError::Udp(_) => self.stats.rx_bad_udp += 1,
        }
    }

    /// A printable snapshot of the sink table.
    pub fn dump(&self) -> Vec<SinkDump> {
        let now = self.clock.now();

        self.sinks
            .iter()
            .map(|s| SinkDump {
                id: s.id.as_u64(),
                rule: s.smatch.to_string(),
                kind: s.kind.name().to_string(),
                state: s.kind.state_desc(),
                timer_ms: s.timer.map(|t| t.delta_as_millis(now)),
            })
            .collect()
    }
}

// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Build-time modes and process-level settings.
//!
//! Modes are fixed when the service is built and propagated unchanged to every
//! client and server through the configuration fragment. [`ServiceSettings`]
//! is layered from defaults, an optional TOML file pointed to by
//! `PS_CONFIG_PATH`, and `PS_`-prefixed environment variables.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::CoordinationError;

/// ENV pointing at an optional TOML settings file
const CONFIG_PATH_ENV: &str = "PS_CONFIG_PATH";

/// Communication topology: all updates flow through servers, or directly
/// between workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunicationMode {
    #[default]
    Reduce,
    PeerToPeer,
}

impl CommunicationMode {
    /// Parse the wire form, warning and falling back to the default on
    /// unknown input rather than failing a task that is already placed.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            let fallback = Self::default();
            tracing::warn!(value = %s, "unknown communication mode; using default {fallback}");
            fallback
        })
    }
}

impl fmt::Display for CommunicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reduce => write!(f, "Reduce"),
            Self::PeerToPeer => write!(f, "P2P"),
        }
    }
}

impl FromStr for CommunicationMode {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reduce" => Ok(Self::Reduce),
            "P2P" | "PeerToPeer" => Ok(Self::PeerToPeer),
            _ => Err(CoordinationError::invalid_argument(format!(
                "unknown communication mode {s:?}"
            ))),
        }
    }
}

/// Synchronization discipline: updates averaged at barriers, or applied
/// immediately with no ordering guarantees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynchronizationMode {
    #[default]
    Average,
    Async,
}

impl SynchronizationMode {
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            let fallback = Self::default();
            tracing::warn!(value = %s, "unknown synchronization mode; using default {fallback}");
            fallback
        })
    }
}

impl fmt::Display for SynchronizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Average => write!(f, "Average"),
            Self::Async => write!(f, "Async"),
        }
    }
}

impl FromStr for SynchronizationMode {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Average" => Ok(Self::Average),
            "Async" => Ok(Self::Async),
            _ => Err(CoordinationError::invalid_argument(format!(
                "unknown synchronization mode {s:?}"
            ))),
        }
    }
}

/// Element precision of the stored parameters; only affects resource sizing
/// at this layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementWidth {
    /// f32
    #[default]
    Single,
    /// f64
    Double,
}

impl ElementWidth {
    pub fn bytes(&self) -> u64 {
        match self {
            Self::Single => 4,
            Self::Double => 8,
        }
    }
}

/// Concurrent supplier of TCP ports from a contiguous range.
///
/// Clones share the cursor, so a port is handed out at most once per range
/// regardless of which clone reserved it.
#[derive(Debug, Clone)]
pub struct TcpPortRange {
    start: u16,
    count: u16,
    next: Arc<AtomicU32>,
}

impl TcpPortRange {
    pub fn new(start: u16, count: u16) -> Self {
        Self {
            start,
            count,
            next: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    /// Reserve the next unused port in the range. A range reaching past the
    /// end of the port space exhausts at 65535 instead of wrapping.
    pub fn reserve(&self) -> Result<u16, CoordinationError> {
        let offset = self.next.fetch_add(1, Ordering::SeqCst);
        let port = u32::from(self.start) + offset;
        if offset >= u32::from(self.count) || port > u32::from(u16::MAX) {
            return Err(CoordinationError::PortsExhausted {
                start: self.start,
                count: self.count,
            });
        }
        Ok(port as u16)
    }
}

/// Process-level settings for the coordination runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// First port of the TCP range handed to components.
    pub port_range_start: u16,
    /// Number of ports in the range.
    pub port_range_count: u16,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            port_range_start: 8900,
            port_range_count: 1000,
        }
    }
}

impl ServiceSettings {
    /// Layer defaults, the optional TOML file and `PS_`-prefixed environment
    /// variables, later sources winning.
    pub fn from_settings() -> crate::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(path));
        }
        Ok(figment.merge(Env::prefixed("PS_")).extract()?)
    }

    pub fn port_range(&self) -> TcpPortRange {
        TcpPortRange::new(self.port_range_start, self.port_range_count)
    }
}

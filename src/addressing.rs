// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Component identities and the address book exchanged through task
//! configuration.
//!
//! Wire forms are plain strings so they can be embedded in a generic key-value
//! configuration fragment: an [`AddressPort`] renders as `"address|port"` and
//! an [`IdAddressPort`] as `"id|address|port"`.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoordinationError;

const SERVER_ID_PREFIX: &str = "ParameterServer";
const CLIENT_ID_PREFIX: &str = "ParameterClient";

/// Identity of one cohort component. A cohort of size `N` has servers and
/// clients indexed `0..N`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentId {
    Server(u32),
    Client(u32),
}

impl ComponentId {
    pub fn index(&self) -> u32 {
        match self {
            Self::Server(n) | Self::Client(n) => *n,
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    /// Every component id expected for a cohort, servers first then clients.
    pub fn cohort_ids(cohort_size: u32) -> Vec<ComponentId> {
        (0..cohort_size)
            .map(ComponentId::Server)
            .chain((0..cohort_size).map(ComponentId::Client))
            .collect()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(n) => write!(f, "{SERVER_ID_PREFIX}-{n}"),
            Self::Client(n) => write!(f, "{CLIENT_ID_PREFIX}-{n}"),
        }
    }
}

impl FromStr for ComponentId {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, index) = s.rsplit_once('-').ok_or_else(|| {
            CoordinationError::invalid_argument(format!("malformed component id {s:?}"))
        })?;
        let index: u32 = index.parse().map_err(|_| {
            CoordinationError::invalid_argument(format!("malformed component index in {s:?}"))
        })?;
        match prefix {
            SERVER_ID_PREFIX => Ok(Self::Server(index)),
            CLIENT_ID_PREFIX => Ok(Self::Client(index)),
            _ => Err(CoordinationError::invalid_argument(format!(
                "unknown component id prefix in {s:?}"
            ))),
        }
    }
}

/// A resolved network endpoint. Equality is by value; no ordering semantics
/// beyond what the derive provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AddressPort {
    pub address: IpAddr,
    pub port: u16,
}

impl AddressPort {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }
}

impl From<SocketAddr> for AddressPort {
    fn from(endpoint: SocketAddr) -> Self {
        Self::new(endpoint.ip(), endpoint.port())
    }
}

impl fmt::Display for AddressPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.address, self.port)
    }
}

impl FromStr for AddressPort {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, port) = s.split_once('|').ok_or_else(|| {
            CoordinationError::invalid_argument(format!("malformed address-port {s:?}"))
        })?;
        let address: IpAddr = address.parse().map_err(|_| {
            CoordinationError::invalid_argument(format!("malformed address in {s:?}"))
        })?;
        let port: u16 = port
            .parse()
            .map_err(|_| CoordinationError::invalid_argument(format!("malformed port in {s:?}")))?;
        Ok(Self::new(address, port))
    }
}

/// The `(ComponentId, AddressPort)` pair in the form exchanged through
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAddressPort {
    pub id: ComponentId,
    pub addr: AddressPort,
}

impl IdAddressPort {
    pub fn new(id: ComponentId, addr: AddressPort) -> Self {
        Self { id, addr }
    }
}

impl fmt::Display for IdAddressPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.id, self.addr)
    }
}

impl FromStr for IdAddressPort {
    type Err = CoordinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, addr) = s.split_once('|').ok_or_else(|| {
            CoordinationError::invalid_argument(format!("malformed id-address-port {s:?}"))
        })?;
        Ok(Self::new(id.parse()?, addr.parse()?))
    }
}

/// Mapping from component id to resolved endpoint.
///
/// Built exactly once by the resolving step of the coordination service and
/// frozen afterwards; components receive it behind an `Arc` and never observe
/// a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    entries: BTreeMap<ComponentId, AddressPort>,
}

impl AddressBook {
    pub fn from_entries(entries: impl IntoIterator<Item = (ComponentId, AddressPort)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, id: &ComponentId) -> Option<AddressPort> {
        self.entries.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ComponentId, &AddressPort)> {
        self.entries.iter()
    }

    /// The book as seen by one component: everyone except itself.
    pub fn peers(&self, self_id: &ComponentId) -> AddressBook {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(id, _)| *id != self_id)
                .map(|(id, addr)| (id.clone(), *addr))
                .collect(),
        }
    }

    /// Serialize as a sorted set of `"id|address|port"` strings.
    pub fn wire_entries(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(id, addr)| IdAddressPort::new(id.clone(), *addr).to_string())
            .collect()
    }

    /// Rebuild from the wire form. Duplicate ids are rejected.
    pub fn from_wire<'a>(
        entries: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, CoordinationError> {
        let mut book = BTreeMap::new();
        for entry in entries {
            let parsed: IdAddressPort = entry.parse()?;
            if book.insert(parsed.id.clone(), parsed.addr).is_some() {
                return Err(CoordinationError::invalid_argument(format!(
                    "duplicate component id {} in address set",
                    parsed.id
                )));
            }
        }
        Ok(Self { entries: book })
    }
}

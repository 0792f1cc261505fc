// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use super::{PeerBook, Registration};
use crate::addressing::{AddressBook, AddressPort, ComponentId};
use crate::config::TcpPortRange;
use crate::error::CoordinationError;
use crate::naming::NameResolver;
use crate::Result;

/// Server-side facade of one cohort member.
///
/// The coordination layer's job for the server ends at registration and
/// address delivery; serving table values is the store engine's business.
pub struct TableServer {
    registration: Registration,
    peers: PeerBook,
}

impl TableServer {
    /// Bind the server's endpoint and register it. The id must be a
    /// `ParameterServer-<n>` identity.
    pub async fn bind(
        id: ComponentId,
        resolver: Arc<dyn NameResolver>,
        ports: &TcpPortRange,
    ) -> Result<Self> {
        if !id.is_server() {
            return Err(CoordinationError::invalid_argument(format!(
                "{id} is not a server identity"
            ))
            .into());
        }
        let registration = Registration::bind(id, resolver, ports).await?;
        Ok(Self {
            registration,
            peers: PeerBook::default(),
        })
    }

    pub fn id(&self) -> &ComponentId {
        self.registration.id()
    }

    pub fn endpoint(&self) -> AddressPort {
        self.registration.endpoint()
    }

    /// One-shot delivery of the frozen address book (minus self).
    pub fn update_peer_addresses(&self, book: &AddressBook) -> Result<(), CoordinationError> {
        self.peers.deliver(book, self.registration.id())
    }

    pub fn peer_addresses(&self) -> Result<&AddressBook, CoordinationError> {
        self.peers.get(self.registration.id())
    }

    /// Unregister this server. Safe to call more than once.
    pub async fn shutdown(&self) -> crate::Result<()> {
        self.registration.release().await
    }
}

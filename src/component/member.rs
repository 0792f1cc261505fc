// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{TableClient, TableServer};
use crate::addressing::AddressBook;
use crate::config::{CommunicationMode, SynchronizationMode, TcpPortRange};
use crate::naming::NameResolver;
use crate::store::TableStore;
use crate::task_config::{keys, TaskConfig};
use crate::topology::TableTopology;
use crate::{error, CoordinationError, Result};

/// Task-side wiring of one cohort member.
///
/// `bind` runs when the execution context comes up, using the per-context
/// service fragment: it constructs and registers the member's server and
/// client. `activate` runs inside the launched task with the merged launch
/// configuration: it parses the modes and the frozen address book and
/// delivers the book to both components. Only then is the client usable.
pub struct CohortMember {
    server: TableServer,
    client: TableClient,
    modes: OnceCell<(CommunicationMode, SynchronizationMode)>,
}

impl CohortMember {
    /// Construct and register both components from a service fragment
    /// produced by [`crate::CoordinationService::service_configuration`].
    pub async fn bind(
        fragment: &TaskConfig,
        store: Arc<dyn TableStore>,
        resolver: Arc<dyn NameResolver>,
    ) -> Result<Self> {
        let server_id = fragment
            .get(keys::SERVER_ID)
            .ok_or_else(|| error!("service fragment is missing {}", keys::SERVER_ID))?
            .parse()?;
        let client_id = fragment
            .get(keys::CLIENT_ID)
            .ok_or_else(|| error!("service fragment is missing {}", keys::CLIENT_ID))?
            .parse()?;
        let topology: TableTopology = fragment
            .get(keys::TOPOLOGY)
            .ok_or_else(|| error!("service fragment is missing {}", keys::TOPOLOGY))?
            .parse()?;
        let ports = TcpPortRange::new(
            parse_port(fragment, keys::PORT_RANGE_START)?,
            parse_port(fragment, keys::PORT_RANGE_COUNT)?,
        );

        let server = TableServer::bind(server_id, resolver.clone(), &ports).await?;
        let client = TableClient::bind(client_id, topology, store, resolver, &ports).await?;
        Ok(Self {
            server,
            client,
            modes: OnceCell::new(),
        })
    }

    /// Deliver the frozen address book and modes from the merged launch
    /// configuration. One-shot; Get/Add/Barrier are rejected until it runs.
    pub fn activate(&self, launch_config: &TaskConfig) -> Result<()> {
        let addresses = launch_config
            .get_list(keys::COMPONENT_ADDRESSES)
            .ok_or_else(|| error!("launch configuration is missing {}", keys::COMPONENT_ADDRESSES))?;
        let book = AddressBook::from_wire(addresses)?;

        // Unknown mode strings degrade to defaults; the task is already placed.
        let communication =
            CommunicationMode::parse_lenient(launch_config.get(keys::COMMUNICATION).unwrap_or(""));
        let synchronization = SynchronizationMode::parse_lenient(
            launch_config.get(keys::SYNCHRONIZATION).unwrap_or(""),
        );
        self.modes
            .set((communication, synchronization))
            .map_err(|_| CoordinationError::illegal_state("cohort member already activated"))?;

        self.server.update_peer_addresses(&book)?;
        self.client.update_peer_addresses(&book)?;
        tracing::debug!(
            server = %self.server.id(),
            client = %self.client.id(),
            peers = book.len(),
            %communication,
            %synchronization,
            "cohort member activated"
        );
        Ok(())
    }

    pub fn client(&self) -> &TableClient {
        &self.client
    }

    pub fn server(&self) -> &TableServer {
        &self.server
    }

    pub fn communication(&self) -> Option<CommunicationMode> {
        self.modes.get().map(|(c, _)| *c)
    }

    pub fn synchronization(&self) -> Option<SynchronizationMode> {
        self.modes.get().map(|(_, s)| *s)
    }

    /// Release both registrations. Both are attempted even if the first
    /// fails, so one disposal error cannot mask the other.
    pub async fn shutdown(&self) -> Result<()> {
        let server = self.server.shutdown().await;
        let client = self.client.shutdown().await;
        server.and(client)
    }
}

fn parse_port(fragment: &TaskConfig, key: &str) -> Result<u16> {
    fragment
        .get(key)
        .ok_or_else(|| error!("service fragment is missing {key}"))?
        .parse()
        .map_err(|_| error!("malformed port value for {key}"))
}

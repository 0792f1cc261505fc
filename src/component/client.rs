// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use super::{PeerBook, Registration};
use crate::addressing::{AddressBook, AddressPort, ComponentId};
use crate::config::TcpPortRange;
use crate::error::CoordinationError;
use crate::naming::NameResolver;
use crate::store::TableStore;
use crate::topology::TableTopology;
use crate::Result;

/// Client-side facade of one cohort member: the Get/Add/Barrier surface user
/// task code programs against.
///
/// Buffer lengths are validated against the topology before any call reaches
/// the store, and every operation is gated on the one-shot delivery of the
/// frozen address book.
pub struct TableClient {
    registration: Registration,
    topology: TableTopology,
    store: Arc<dyn TableStore>,
    peers: PeerBook,
}

impl TableClient {
    /// Bind the client's endpoint and register it. The id must be a
    /// `ParameterClient-<n>` identity.
    pub async fn bind(
        id: ComponentId,
        topology: TableTopology,
        store: Arc<dyn TableStore>,
        resolver: Arc<dyn NameResolver>,
        ports: &TcpPortRange,
    ) -> Result<Self> {
        if id.is_server() {
            return Err(CoordinationError::invalid_argument(format!(
                "{id} is not a client identity"
            ))
            .into());
        }
        let registration = Registration::bind(id, resolver, ports).await?;
        Ok(Self {
            registration,
            topology,
            store,
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

    fn ensure_ready(&self) -> Result<(), CoordinationError> {
        self.peers.get(self.registration.id()).map(|_| ())
    }

    fn check_table_buffer(&self, table: usize, len: usize) -> Result<(), CoordinationError> {
        let want = self.topology.table_width(table).ok_or_else(|| {
            CoordinationError::invalid_argument(format!("unknown table {table}"))
        })?;
        if len != want {
            return Err(CoordinationError::invalid_argument(format!(
                "buffer length {len} does not match table {table} width {want}"
            )));
        }
        Ok(())
    }

    fn check_row_buffer(&self, table: usize, row: usize, len: usize) -> Result<(), CoordinationError> {
        let want = self.topology.row_width(table, row).ok_or_else(|| {
            CoordinationError::invalid_argument(format!("unknown row {row} of table {table}"))
        })?;
        if len != want {
            return Err(CoordinationError::invalid_argument(format!(
                "buffer length {len} does not match row ({table},{row}) width {want}"
            )));
        }
        Ok(())
    }

    /// Read the whole table into `buffer`, which must be exactly the table
    /// width.
    pub async fn get_table(&self, table: usize, buffer: &mut [f32]) -> Result<()> {
        self.ensure_ready()?;
        self.check_table_buffer(table, buffer.len())?;
        self.store.get(table, None, buffer).await
    }

    /// Read one row into `buffer`, which must be exactly the row width.
    pub async fn get_row(&self, table: usize, row: usize, buffer: &mut [f32]) -> Result<()> {
        self.ensure_ready()?;
        self.check_row_buffer(table, row, buffer.len())?;
        self.store.get(table, Some(row), buffer).await
    }

    /// Apply an additive update to the whole table.
    pub async fn add_table(&self, table: usize, delta: &[f32]) -> Result<()> {
        self.ensure_ready()?;
        self.check_table_buffer(table, delta.len())?;
        self.store.add(table, None, delta).await
    }

    /// Apply an additive update to one row.
    pub async fn add_row(&self, table: usize, row: usize, delta: &[f32]) -> Result<()> {
        self.ensure_ready()?;
        self.check_row_buffer(table, row, delta.len())?;
        self.store.add(table, Some(row), delta).await
    }

    /// Block until every cohort member has also reached the barrier.
    pub async fn barrier(&self) -> Result<()> {
        self.ensure_ready()?;
        self.store.barrier().await
    }

    /// Unregister this client. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        self.registration.release().await
    }
}

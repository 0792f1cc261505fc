// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-cohort-member facades over the [`crate::store::TableStore`] capability.
//!
//! Each member of the cohort runs one [`TableServer`] and one [`TableClient`].
//! Both bind a local endpoint and register it with the name resolver before
//! their constructor returns; that registration is what makes them visible to
//! the coordination service's resolving step. Neither serves any operation
//! until the frozen address book has been delivered once.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::addressing::{AddressBook, AddressPort, ComponentId};
use crate::config::TcpPortRange;
use crate::naming::NameResolver;
use crate::Result;

mod client;
mod member;
mod server;

pub use client::TableClient;
pub use member::CohortMember;
pub use server::TableServer;

/// Endpoint address components bind on. Loopback until the backing store
/// engine exposes its own listener address.
fn local_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// A component's name-service registration, released at most once.
pub(crate) struct Registration {
    id: ComponentId,
    endpoint: AddressPort,
    resolver: Arc<dyn NameResolver>,
    active: AtomicBool,
}

impl Registration {
    /// Reserve a port, then register synchronously: the component does not
    /// exist to the rest of the system until this returns.
    pub(crate) async fn bind(
        id: ComponentId,
        resolver: Arc<dyn NameResolver>,
        ports: &TcpPortRange,
    ) -> Result<Self> {
        let endpoint = AddressPort::new(local_address(), ports.reserve()?);
        resolver.register(id.clone(), endpoint).await?;
        tracing::debug!(component = %id, endpoint = %endpoint, "component registered");
        Ok(Self {
            id,
            endpoint,
            resolver,
            active: AtomicBool::new(true),
        })
    }

    pub(crate) fn id(&self) -> &ComponentId {
        &self.id
    }

    pub(crate) fn endpoint(&self) -> AddressPort {
        self.endpoint
    }

    /// Unregister. Idempotent: the second and later calls are no-ops, so a
    /// release on every exit path never masks the error that triggered it.
    pub(crate) async fn release(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.resolver.unregister(&self.id).await
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.active.load(Ordering::SeqCst) {
            tracing::warn!(
                component = %self.id,
                "component dropped without shutdown; name registration leaked"
            );
        }
    }
}

/// One-shot holder for the frozen peer address book.
#[derive(Default)]
pub(crate) struct PeerBook {
    peers: once_cell::sync::OnceCell<AddressBook>,
}

impl PeerBook {
    /// Deliver the frozen book (minus the component itself). A second
    /// delivery is an illegal re-invocation of a one-shot operation.
    pub(crate) fn deliver(
        &self,
        book: &AddressBook,
        self_id: &ComponentId,
    ) -> std::result::Result<(), crate::error::CoordinationError> {
        self.peers.set(book.peers(self_id)).map_err(|_| {
            crate::error::CoordinationError::illegal_state(format!(
                "peer addresses already delivered to {self_id}"
            ))
        })
    }

    pub(crate) fn get(
        &self,
        self_id: &ComponentId,
    ) -> std::result::Result<&AddressBook, crate::error::CoordinationError> {
        self.peers.get().ok_or_else(|| {
            crate::error::CoordinationError::illegal_state(format!(
                "{self_id} used before peer addresses were delivered"
            ))
        })
    }
}

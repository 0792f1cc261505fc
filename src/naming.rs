// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Name-resolution collaborator: maps component ids to network endpoints.
//!
//! The coordination core only requires that `lookup` reflects every prior
//! `register` call by the time resolution runs; the backing registry (a real
//! name server, etcd, ...) is external. [`StaticNameResolver`] is the
//! in-process implementation used by local runs and the test suite.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::addressing::{AddressPort, ComponentId};
use crate::Result;

#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Bind `id` to `addr`. A component is not considered to exist until its
    /// registration has completed.
    async fn register(&self, id: ComponentId, addr: AddressPort) -> Result<()>;

    /// Remove the binding for `id`. Unknown ids are not an error.
    async fn unregister(&self, id: &ComponentId) -> Result<()>;

    /// Look up each id, returning `None` for ids with no binding yet.
    async fn lookup(&self, ids: &[ComponentId]) -> Result<Vec<(ComponentId, Option<AddressPort>)>>;
}

/// In-process resolver over a shared registry map.
///
/// Clones share the registry, so every participant in a process sees the same
/// bindings. First registration wins: a second `register` under a bound id is
/// ignored with a warning, which keeps a frozen address book stable against
/// late spurious registrations.
#[derive(Clone, Default)]
pub struct StaticNameResolver {
    entries: Arc<DashMap<ComponentId, AddressPort>>,
}

impl StaticNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl NameResolver for StaticNameResolver {
    async fn register(&self, id: ComponentId, addr: AddressPort) -> Result<()> {
        match self.entries.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                tracing::warn!(
                    component = %id,
                    bound = %existing.get(),
                    attempted = %addr,
                    "component id already registered; ignoring re-registration"
                );
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(addr);
                tracing::debug!(component = %id, endpoint = %addr, "registered component");
            }
        }
        Ok(())
    }

    async fn unregister(&self, id: &ComponentId) -> Result<()> {
        self.entries.remove(id);
        tracing::debug!(component = %id, "unregistered component");
        Ok(())
    }

    async fn lookup(&self, ids: &[ComponentId]) -> Result<Vec<(ComponentId, Option<AddressPort>)>> {
        Ok(ids
            .iter()
            .map(|id| (id.clone(), self.entries.get(id).map(|entry| *entry.value())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> AddressPort {
        AddressPort::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[tokio::test]
    async fn lookup_reflects_registrations() {
        let resolver = StaticNameResolver::new();
        resolver
            .register(ComponentId::Server(0), addr(9000))
            .await
            .unwrap();

        let found = resolver
            .lookup(&[ComponentId::Server(0), ComponentId::Client(0)])
            .await
            .unwrap();
        assert_eq!(found[0], (ComponentId::Server(0), Some(addr(9000))));
        assert_eq!(found[1], (ComponentId::Client(0), None));
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let resolver = StaticNameResolver::new();
        resolver
            .register(ComponentId::Server(0), addr(9000))
            .await
            .unwrap();
        resolver
            .register(ComponentId::Server(0), addr(9999))
            .await
            .unwrap();

        let found = resolver.lookup(&[ComponentId::Server(0)]).await.unwrap();
        assert_eq!(found[0].1, Some(addr(9000)));
    }

    #[tokio::test]
    async fn unregister_then_unregister_again_is_fine() {
        let resolver = StaticNameResolver::new();
        resolver
            .register(ComponentId::Client(1), addr(9001))
            .await
            .unwrap();
        resolver.unregister(&ComponentId::Client(1)).await.unwrap();
        resolver.unregister(&ComponentId::Client(1)).await.unwrap();
        assert!(resolver.is_empty());
    }
}

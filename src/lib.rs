// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Paramsvc
//!
//! Coordination layer for a distributed, table-structured parameter store used
//! by data-parallel training tasks. A fixed-size cohort of worker processes
//! ([`component::TableClient`]) exchanges updates with coordinator processes
//! ([`component::TableServer`]) addressed through a name-resolution
//! collaborator, under a pluggable communication topology and synchronization
//! discipline.
//!
//! The control plane ([`CoordinationService`]) gates task launch: it requests
//! execution slots for the cohort, waits until exactly the expected number of
//! tasks have been queued, resolves every component address, and launches all
//! tasks concurrently with a merged configuration carrying the frozen
//! [`AddressBook`].
//!
//! Storage of table values, the reduce/average math and the wire transport of
//! deltas live behind the [`store::TableStore`] capability and are not
//! implemented here.

pub use anyhow::{
    anyhow as error, bail as raise, Context as ErrorContext, Error, Ok as OK, Result,
};

pub mod addressing;
pub mod allocator;
pub mod builder;
pub mod component;
pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod service;
pub mod store;
pub mod task_config;
pub mod topology;

pub use addressing::{AddressBook, AddressPort, ComponentId, IdAddressPort};
pub use builder::{ServiceConfig, ServiceConfigBuilder};
pub use config::{CommunicationMode, ElementWidth, SynchronizationMode, TcpPortRange};
pub use error::CoordinationError;
pub use service::{CoordinationService, ServiceState};
pub use task_config::TaskConfig;
pub use tokio_util::sync::CancellationToken;
pub use topology::TableTopology;

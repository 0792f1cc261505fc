// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The parameter-store capability consumed by clients and servers.
//!
//! The coordination layer never implements table storage, the reduce/average
//! math or the wire transport of parameter values; it supplies topology, mode
//! and peer addresses to an implementation of [`TableStore`] before first use.

use async_trait::async_trait;

use crate::Result;

mod memory;
pub use memory::MemoryTableStore;

/// Opaque backing engine for table values.
///
/// `row = None` addresses the whole table. Buffer sizes are the caller's
/// contract (the client facade validates them against the topology before
/// any call reaches the store).
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Read the table (or one row of it) into `buffer`, blocking until the
    /// read completes.
    async fn get(&self, table: usize, row: Option<usize>, buffer: &mut [f32]) -> Result<()>;

    /// Apply an additive update to the table (or one row of it). Under
    /// averaging synchronization the effect is only guaranteed visible to
    /// other members after the next barrier.
    async fn add(&self, table: usize, row: Option<usize>, delta: &[f32]) -> Result<()>;

    /// Rendezvous: blocks until every cohort member has also called
    /// `barrier()`. Updates issued before a member's barrier call are visible
    /// to reads issued after any member's barrier returns.
    async fn barrier(&self) -> Result<()>;
}

// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! In-process reference store.
//!
//! Single-process stand-in for the real parameter-store engine: additive f32
//! tables behind a mutex and a [`tokio::sync::Barrier`] rendezvous sized to
//! the cohort. Updates are applied immediately (async discipline); the
//! averaging math of the real engine is out of scope here.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Barrier;

use super::TableStore;
use crate::topology::TableTopology;
use crate::{raise, Result};

pub struct MemoryTableStore {
    tables: Vec<Mutex<Vec<f32>>>,
    topology: TableTopology,
    barrier: Barrier,
}

impl MemoryTableStore {
    /// A store sized to `topology`, with a barrier expecting `participants`
    /// cohort members.
    pub fn new(topology: TableTopology, participants: usize) -> Self {
        let tables = (0..topology.table_count())
            .map(|t| {
                let width = topology.table_width(t).unwrap_or(0);
                Mutex::new(vec![0.0; width])
            })
            .collect();
        Self {
            tables,
            topology,
            barrier: Barrier::new(participants),
        }
    }

    /// Element offset and width of `row` within its table, or of the whole table.
    fn span(&self, table: usize, row: Option<usize>) -> Result<(usize, usize)> {
        match row {
            None => {
                let width = self
                    .topology
                    .table_width(table)
                    .ok_or_else(|| crate::error!("unknown table {table}"))?;
                Ok((0, width))
            }
            Some(row) => {
                let width = self
                    .topology
                    .row_width(table, row)
                    .ok_or_else(|| crate::error!("unknown row {row} of table {table}"))?;
                let offset: usize = (0..row)
                    .map(|r| self.topology.row_width(table, r).unwrap_or(0))
                    .sum();
                Ok((offset, width))
            }
        }
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn get(&self, table: usize, row: Option<usize>, buffer: &mut [f32]) -> Result<()> {
        let (offset, width) = self.span(table, row)?;
        if buffer.len() != width {
            raise!("buffer length {} does not match span {width}", buffer.len());
        }
        let values = self.tables[table].lock().unwrap();
        buffer.copy_from_slice(&values[offset..offset + width]);
        Ok(())
    }

    async fn add(&self, table: usize, row: Option<usize>, delta: &[f32]) -> Result<()> {
        let (offset, width) = self.span(table, row)?;
        if delta.len() != width {
            raise!("delta length {} does not match span {width}", delta.len());
        }
        let mut values = self.tables[table].lock().unwrap();
        for (value, delta) in values[offset..offset + width].iter_mut().zip(delta) {
            *value += delta;
        }
        Ok(())
    }

    async fn barrier(&self) -> Result<()> {
        self.barrier.wait().await;
        Ok(())
    }
}

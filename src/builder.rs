// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Service configuration and its fluent builder.
//!
//! The builder accumulates the cohort shape and per-task resource needs, then
//! validates everything at once: `build()` reports every violation found, not
//! just the first. The validated [`ServiceConfig`] derives the total resource
//! request submitted to the allocator.

use derive_builder::Builder;

use crate::allocator::ResourceRequest;
use crate::config::{CommunicationMode, ElementWidth, SynchronizationMode};
use crate::error::CoordinationError;
use crate::topology::TableTopology;

/// Core overhead of the parameter service itself. A heuristic, currently zero.
const SERVICE_CORES: u32 = 0;

/// Default cores reserved for user task code.
const DEFAULT_TASK_CORES: u32 = 2;

/// Validated build-time configuration of one parameter service instance.
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned", build_fn(skip))]
pub struct ServiceConfig {
    pub communication: CommunicationMode,
    pub synchronization: SynchronizationMode,
    pub element_width: ElementWidth,
    /// Cohort size: the number of worker+server pairs launched together.
    pub cohort_size: u32,
    /// Cores requested for user task code, before service overhead.
    pub task_cores: u32,
    /// Memory requested for user task code in MB, before service overhead.
    pub task_memory_mb: u64,
    pub topology: TableTopology,
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Memory the service adds per task: the table state is double-buffered
    /// (client + server side), spread over the cohort, rounded up to a MB.
    pub fn service_memory_overhead_mb(&self) -> u64 {
        let bytes = self.topology.total_parameter_count() * self.element_width.bytes() * 2;
        let per_task_denominator = u64::from(self.cohort_size) * (1 << 20);
        bytes.div_ceil(per_task_denominator)
    }

    pub fn service_core_overhead() -> u32 {
        SERVICE_CORES
    }

    /// The one request submitted to the resource allocator for the cohort.
    pub fn resource_request(&self) -> ResourceRequest {
        ResourceRequest {
            cohort_size: self.cohort_size,
            cores_per_task: self.task_cores + Self::service_core_overhead(),
            memory_mb_per_task: self.task_memory_mb + self.service_memory_overhead_mb(),
        }
    }
}

impl ServiceConfigBuilder {
    /// Validate and produce the configuration, enumerating every violation.
    pub fn build(self) -> Result<ServiceConfig, CoordinationError> {
        let mut violations = Vec::new();

        let cohort_size = self.cohort_size.unwrap_or(0);
        if cohort_size == 0 {
            violations.push("cohort size must be nonzero".to_string());
        }
        let task_memory_mb = self.task_memory_mb.unwrap_or(0);
        if task_memory_mb == 0 {
            violations.push("task memory MB must be nonzero".to_string());
        }
        if self.topology.is_none() {
            violations.push("topology is required".to_string());
        }

        if !violations.is_empty() {
            return Err(CoordinationError::Configuration { violations });
        }

        Ok(ServiceConfig {
            communication: self.communication.unwrap_or_default(),
            synchronization: self.synchronization.unwrap_or_default(),
            element_width: self.element_width.unwrap_or_default(),
            cohort_size,
            task_cores: self.task_cores.unwrap_or(DEFAULT_TASK_CORES),
            task_memory_mb,
            topology: self.topology.expect("validated above"),
        })
    }
}

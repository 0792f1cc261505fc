// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Resource allocation collaborator and execution contexts.
//!
//! The coordination core is request-and-forget towards the allocator: it
//! submits one [`ResourceRequest`] for the whole cohort, and each allocation
//! later calls back into [`crate::CoordinationService::queue_task`] with an
//! [`ExecutionContext`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::task_config::TaskConfig;
use crate::Result;

/// One request covering every execution slot of the cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub cohort_size: u32,
    pub cores_per_task: u32,
    pub memory_mb_per_task: u64,
}

/// Cluster resource acquisition, consumed as an external capability.
#[async_trait]
pub trait ResourceAllocator: Send + Sync {
    async fn submit(&self, request: ResourceRequest) -> Result<()>;
}

/// A placed execution slot that can run exactly one task.
///
/// Ownership of the context transfers to the launched task: `submit_task`
/// consumes the context, which is why cohort slots hold it boxed.
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    fn context_id(&self) -> &str;

    async fn submit_task(self: Box<Self>, config: TaskConfig) -> Result<()>;
}

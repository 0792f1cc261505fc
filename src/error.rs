// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Typed errors for the coordination contract.
//!
//! These are the errors callers are expected to match on; everything else is
//! propagated as [`anyhow::Error`] and can be downcast to [`CoordinationError`]
//! when it originated here.

use thiserror::Error;

use crate::addressing::ComponentId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// Invalid build-time configuration. Carries every violation found, not
    /// just the first.
    #[error("invalid configuration: {}", .violations.join("; "))]
    Configuration { violations: Vec<String> },

    /// A cohort member reached full size before one or more components
    /// registered with the name resolver. Indicates a construction-order bug
    /// in the caller; never retried.
    #[error("components not yet registered with the name resolver: {}", join_ids(.ids))]
    UnresolvedComponents { ids: Vec<ComponentId> },

    /// Per-call argument rejection, surfaced before any collaborator is touched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A one-shot operation was re-invoked.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The TCP port range handed to this process has no ports left.
    #[error("tcp port range exhausted ({count} ports from {start})")]
    PortsExhausted { start: u16, count: u16 },
}

impl CoordinationError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }
}

fn join_ids(ids: &[ComponentId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

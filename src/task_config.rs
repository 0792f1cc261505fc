// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Key-value task configuration fragments.
//!
//! Everything the coordination layer hands to an execution context travels as
//! a flat string map so it can be merged with arbitrary user task
//! configuration. Keys owned by this crate live under the reserved `paramsvc.`
//! prefix, so a merge can never collide with user keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known fragment keys, all under the reserved prefix.
pub mod keys {
    pub const CONTEXT_ID: &str = "paramsvc.context.id";
    pub const SERVER_ID: &str = "paramsvc.server.id";
    pub const CLIENT_ID: &str = "paramsvc.client.id";
    pub const COMMUNICATION: &str = "paramsvc.mode.communication";
    pub const SYNCHRONIZATION: &str = "paramsvc.mode.synchronization";
    pub const TOPOLOGY: &str = "paramsvc.tables";
    pub const COMPONENT_ADDRESSES: &str = "paramsvc.addresses";
    pub const PORT_RANGE_START: &str = "paramsvc.ports.start";
    pub const PORT_RANGE_COUNT: &str = "paramsvc.ports.count";
}

/// Separator for list-valued entries. None of our wire forms contain commas.
const LIST_SEPARATOR: &str = ",";

/// A mergeable key-value configuration fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    entries: BTreeMap<String, String>,
}

impl TaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Builder-style `set` for fragment construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Store a list-valued entry.
    pub fn set_list(
        &mut self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = String>,
    ) -> &mut Self {
        let joined = values.into_iter().collect::<Vec<_>>().join(LIST_SEPARATOR);
        self.set(key, joined)
    }

    pub fn get_list(&self, key: &str) -> Option<Vec<&str>> {
        self.get(key)
            .map(|joined| joined.split(LIST_SEPARATOR).collect())
    }

    /// Merge, with `overlay` winning on key conflicts.
    pub fn merged_with(&self, overlay: &TaskConfig) -> TaskConfig {
        let mut entries = self.entries.clone();
        entries.extend(overlay.entries.clone());
        TaskConfig { entries }
    }

    /// JSON wire form for handing the fragment to an execution context.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

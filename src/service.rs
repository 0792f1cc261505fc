// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The control-plane state machine.
//!
//! A [`CoordinationService`] moves through `AwaitingCohort -> Resolving ->
//! Launched` exactly once. Execution contexts call [`queue_task`] as they
//! become active; the call that makes the queue reach the cohort size performs
//! the resolving transition (address lookup, book freeze, fragment build) and
//! fans out the launches. `Launched` is terminal: the service stays alive to
//! serve the frozen address book, and every one-shot operation rejects
//! re-entry with [`CoordinationError::IllegalState`].
//!
//! [`queue_task`]: CoordinationService::queue_task

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::addressing::{AddressBook, ComponentId};
use crate::allocator::{ExecutionContext, ResourceAllocator, ResourceRequest};
use crate::builder::ServiceConfig;
use crate::config::TcpPortRange;
use crate::error::CoordinationError;
use crate::naming::NameResolver;
use crate::task_config::{keys, TaskConfig};
use crate::Result;

const TASK_CONTEXT_PREFIX: &str = "TaskContext";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    AwaitingCohort,
    Resolving,
    Launched,
}

/// Pending-task record: a queued user fragment plus the context that will run
/// it. Exclusively owned by the service until launch, at which point the
/// context transfers to the launched task.
struct CohortSlot {
    task_config: TaskConfig,
    context: Box<dyn ExecutionContext>,
}

/// Queue and state share one lock so the cohort-complete transition fires
/// exactly once no matter how many contexts arrive simultaneously.
struct Gate {
    state: ServiceState,
    slots: Vec<CohortSlot>,
}

pub struct CoordinationService {
    id: String,
    config: ServiceConfig,
    request: ResourceRequest,
    resolver: Arc<dyn NameResolver>,
    allocator: Arc<dyn ResourceAllocator>,
    port_range: TcpPortRange,
    requested: AtomicBool,
    gate: Mutex<Gate>,
    address_book: OnceCell<Arc<AddressBook>>,
    context_ids: AtomicU32,
    component_ids: AtomicU32,
    cancel: CancellationToken,
}

impl CoordinationService {
    pub fn new(
        config: ServiceConfig,
        resolver: Arc<dyn NameResolver>,
        allocator: Arc<dyn ResourceAllocator>,
        port_range: TcpPortRange,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let request = config.resource_request();
        tracing::info!(
            service = %id,
            cohort_size = config.cohort_size,
            cores_per_task = request.cores_per_task,
            memory_mb_per_task = request.memory_mb_per_task,
            "created coordination service"
        );
        Self {
            id,
            config,
            request,
            resolver,
            allocator,
            port_range,
            requested: AtomicBool::new(false),
            gate: Mutex::new(Gate {
                state: ServiceState::AwaitingCohort,
                slots: Vec::new(),
            }),
            address_book: OnceCell::new(),
            context_ids: AtomicU32::new(0),
            component_ids: AtomicU32::new(0),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ServiceState {
        self.gate.lock().unwrap().state
    }

    pub fn resource_request(&self) -> ResourceRequest {
        self.request
    }

    /// The frozen book, available once the resolving transition has run.
    pub fn frozen_address_book(&self) -> Option<Arc<AddressBook>> {
        self.address_book.get().cloned()
    }

    /// Submit the precomputed resource request to the allocator.
    ///
    /// Idempotent at the service boundary: only the first call submits,
    /// later calls are ignored. De-duplication below this boundary is the
    /// allocator's business.
    pub async fn request_execution_slots(&self) -> Result<()> {
        if self.requested.swap(true, Ordering::SeqCst) {
            tracing::debug!(service = %self.id, "execution slots already requested; ignoring");
            return Ok(());
        }
        self.allocator.submit(self.request).await
    }

    /// A fresh, uniquely named local-execution-context fragment. Independent
    /// of cohort state.
    pub fn local_context_configuration(&self) -> TaskConfig {
        let n = self.context_ids.fetch_add(1, Ordering::SeqCst) + 1;
        TaskConfig::new().with(keys::CONTEXT_ID, format!("{TASK_CONTEXT_PREFIX}-{n}"))
    }

    /// The per-context service fragment: a fresh (server, client) id pair plus
    /// the port-range and topology bindings the components need to come up.
    ///
    /// Must be called once per allocated context, before that context's task
    /// is queued; rejected once the cohort has launched.
    pub fn service_configuration(&self) -> Result<TaskConfig, CoordinationError> {
        if self.gate.lock().unwrap().state == ServiceState::Launched {
            return Err(CoordinationError::illegal_state(
                "service configuration requested after launch",
            ));
        }
        let n = self.component_ids.fetch_add(1, Ordering::SeqCst);
        Ok(TaskConfig::new()
            .with(keys::SERVER_ID, ComponentId::Server(n).to_string())
            .with(keys::CLIENT_ID, ComponentId::Client(n).to_string())
            .with(keys::TOPOLOGY, self.config.topology.to_string())
            .with(keys::PORT_RANGE_START, self.port_range.start().to_string())
            .with(keys::PORT_RANGE_COUNT, self.port_range.count().to_string()))
    }

    /// Queue one pending task for an active execution context.
    ///
    /// Safe under concurrent invocation; returns immediately until the queue
    /// reaches the cohort size. The caller that completes the cohort resolves
    /// every component address, freezes the book and fans out the launches.
    /// Calls after the cohort completed are rejected.
    pub async fn queue_task(
        &self,
        task_config: TaskConfig,
        context: Box<dyn ExecutionContext>,
    ) -> Result<()> {
        let drained = {
            let mut gate = self.gate.lock().unwrap();
            if gate.state != ServiceState::AwaitingCohort {
                return Err(CoordinationError::illegal_state(format!(
                    "queue_task called in state {:?}; the cohort is complete",
                    gate.state
                ))
                .into());
            }
            gate.slots.push(CohortSlot {
                task_config,
                context,
            });
            if gate.slots.len() as u32 == self.config.cohort_size {
                gate.state = ServiceState::Resolving;
                Some(std::mem::take(&mut gate.slots))
            } else {
                None
            }
        };

        let Some(slots) = drained else {
            return Ok(());
        };

        tracing::debug!(
            service = %self.id,
            "expected number of tasks queued; resolving addresses and launching"
        );
        let fragment = self.resolve_client_fragment().await?;
        self.launch(slots, fragment);
        Ok(())
    }

    /// Look up every expected component, freeze the address book and build the
    /// shared client fragment. Unresolved components are fatal: they mean a
    /// context queued its task before its components registered.
    async fn resolve_client_fragment(&self) -> Result<TaskConfig> {
        let ids = ComponentId::cohort_ids(self.config.cohort_size);
        let assignments = self.resolver.lookup(&ids).await?;

        let unresolved: Vec<ComponentId> = assignments
            .iter()
            .filter(|(_, addr)| addr.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        if !unresolved.is_empty() {
            tracing::error!(
                service = %self.id,
                components = %unresolved.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
                "components have not registered; queueing completed before construction"
            );
            return Err(CoordinationError::UnresolvedComponents { ids: unresolved }.into());
        }

        let book = Arc::new(AddressBook::from_entries(
            assignments
                .into_iter()
                .map(|(id, addr)| (id, addr.expect("checked above"))),
        ));
        self.address_book
            .set(book.clone())
            .expect("address book is frozen exactly once");

        let mut fragment = TaskConfig::new()
            .with(keys::COMMUNICATION, self.config.communication.to_string())
            .with(keys::SYNCHRONIZATION, self.config.synchronization.to_string())
            .with(keys::TOPOLOGY, self.config.topology.to_string());
        fragment.set_list(keys::COMPONENT_ADDRESSES, book.wire_entries());
        Ok(fragment)
    }

    /// Best-effort parallel fan-out: each slot merges its user fragment with
    /// the shared one and submits to its own context. One slot failing to
    /// launch is logged and does not affect the others.
    fn launch(&self, slots: Vec<CohortSlot>, fragment: TaskConfig) {
        for slot in slots {
            let merged = slot.task_config.merged_with(&fragment);
            let context_id = slot.context.context_id().to_string();
            let service = self.id.clone();
            let token = self.cancel.child_token();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!(service = %service, context = %context_id, "launch cancelled");
                    }
                    launched = slot.context.submit_task(merged) => {
                        if let Err(err) = launched {
                            tracing::error!(
                                service = %service,
                                context = %context_id,
                                error = %err,
                                "task launch failed; other cohort members are unaffected"
                            );
                        }
                    }
                }
            });
        }
        self.gate.lock().unwrap().state = ServiceState::Launched;
        tracing::info!(service = %self.id, cohort_size = self.config.cohort_size, "cohort launched");
    }

    /// Cancel any in-flight launch fan-out. The frozen address book remains
    /// available.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

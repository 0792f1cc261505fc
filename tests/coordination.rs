// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Control-plane integration tests: cohort gating, resolution, launch fan-out.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use paramsvc::addressing::{AddressPort, ComponentId};
use paramsvc::allocator::{ExecutionContext, ResourceAllocator, ResourceRequest};
use paramsvc::naming::{NameResolver, StaticNameResolver};
use paramsvc::task_config::keys;
use paramsvc::{
    CoordinationError, CoordinationService, Result, ServiceConfig, ServiceState, TableTopology,
    TaskConfig, TcpPortRange,
};

/// Allocator double that records submissions.
#[derive(Default)]
struct RecordingAllocator {
    submits: AtomicUsize,
    last: Mutex<Option<ResourceRequest>>,
}

#[async_trait]
impl ResourceAllocator for RecordingAllocator {
    async fn submit(&self, request: ResourceRequest) -> Result<()> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request);
        Ok(())
    }
}

/// Resolver double that counts lookups on top of the in-process registry.
#[derive(Clone, Default)]
struct CountingResolver {
    inner: StaticNameResolver,
    lookups: Arc<AtomicUsize>,
}

#[async_trait]
impl NameResolver for CountingResolver {
    async fn register(&self, id: ComponentId, addr: AddressPort) -> Result<()> {
        self.inner.register(id, addr).await
    }

    async fn unregister(&self, id: &ComponentId) -> Result<()> {
        self.inner.unregister(id).await
    }

    async fn lookup(&self, ids: &[ComponentId]) -> Result<Vec<(ComponentId, Option<AddressPort>)>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(ids).await
    }
}

/// Execution-context double that records the merged launch configuration.
struct RecordingContext {
    id: String,
    launched: Arc<AtomicUsize>,
    configs: Arc<Mutex<Vec<TaskConfig>>>,
}

#[async_trait]
impl ExecutionContext for RecordingContext {
    fn context_id(&self) -> &str {
        &self.id
    }

    async fn submit_task(self: Box<Self>, config: TaskConfig) -> Result<()> {
        self.configs.lock().unwrap().push(config);
        self.launched.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn config(cohort_size: u32) -> ServiceConfig {
    ServiceConfig::builder()
        .cohort_size(cohort_size)
        .task_memory_mb(128)
        .topology(TableTopology::new(vec![vec![2, 3]]).unwrap())
        .build()
        .unwrap()
}

fn endpoint(port: u16) -> AddressPort {
    AddressPort::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// Register every server and client id the cohort expects.
async fn register_cohort(resolver: &CountingResolver, cohort_size: u32) {
    for (i, id) in ComponentId::cohort_ids(cohort_size).into_iter().enumerate() {
        resolver.register(id, endpoint(9000 + i as u16)).await.unwrap();
    }
}

async fn wait_until(what: &str, predicate: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !predicate() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn exactly_once_launch_under_concurrent_queueing() {
    let cohort_size = 4;
    let resolver = CountingResolver::default();
    register_cohort(&resolver, cohort_size).await;

    let service = Arc::new(CoordinationService::new(
        config(cohort_size),
        Arc::new(resolver.clone()),
        Arc::new(RecordingAllocator::default()),
        TcpPortRange::new(9000, 64),
    ));

    let launched = Arc::new(AtomicUsize::new(0));
    let configs = Arc::new(Mutex::new(Vec::new()));

    let mut queuers = Vec::new();
    for i in 0..cohort_size {
        let service = service.clone();
        let context = Box::new(RecordingContext {
            id: format!("context-{i}"),
            launched: launched.clone(),
            configs: configs.clone(),
        });
        let user_config = TaskConfig::new().with("task.id", format!("Task-{i}"));
        queuers.push(tokio::spawn(async move {
            service.queue_task(user_config, context).await
        }));
    }
    for outcome in futures::future::join_all(queuers).await {
        outcome.unwrap().unwrap();
    }

    // The resolve+launch sequence ran exactly once, every context launched.
    wait_until("all cohort members to launch", || {
        launched.load(Ordering::SeqCst) == cohort_size as usize
    })
    .await;
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 1);
    assert_eq!(service.state(), ServiceState::Launched);

    // Every merged configuration kept its user key and gained the shared fragment.
    let configs = configs.lock().unwrap();
    assert_eq!(configs.len(), cohort_size as usize);
    for launch_config in configs.iter() {
        assert!(launch_config.get("task.id").is_some());
        assert_eq!(launch_config.get(keys::TOPOLOGY), Some("2:3"));
        let addresses = launch_config.get_list(keys::COMPONENT_ADDRESSES).unwrap();
        assert_eq!(addresses.len(), 2 * cohort_size as usize);
    }
}

#[tokio::test]
async fn no_premature_launch_below_cohort_size() {
    let resolver = CountingResolver::default();
    register_cohort(&resolver, 3).await;

    let service = CoordinationService::new(
        config(3),
        Arc::new(resolver.clone()),
        Arc::new(RecordingAllocator::default()),
        TcpPortRange::new(9000, 64),
    );

    let launched = Arc::new(AtomicUsize::new(0));
    let configs = Arc::new(Mutex::new(Vec::new()));
    for i in 0..2 {
        let context = Box::new(RecordingContext {
            id: format!("context-{i}"),
            launched: launched.clone(),
            configs: configs.clone(),
        });
        service.queue_task(TaskConfig::new(), context).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.state(), ServiceState::AwaitingCohort);
    assert_eq!(launched.load(Ordering::SeqCst), 0);
    assert_eq!(resolver.lookups.load(Ordering::SeqCst), 0);
    assert!(service.frozen_address_book().is_none());
}

#[tokio::test]
async fn resolution_failure_names_the_missing_component() {
    let cohort_size = 3;
    let resolver = CountingResolver::default();
    // Register everyone except ParameterServer-1.
    for (i, id) in ComponentId::cohort_ids(cohort_size).into_iter().enumerate() {
        if id == ComponentId::Server(1) {
            continue;
        }
        resolver.register(id, endpoint(9100 + i as u16)).await.unwrap();
    }

    let service = Arc::new(CoordinationService::new(
        config(cohort_size),
        Arc::new(resolver),
        Arc::new(RecordingAllocator::default()),
        TcpPortRange::new(9000, 64),
    ));

    let launched = Arc::new(AtomicUsize::new(0));
    let configs = Arc::new(Mutex::new(Vec::new()));
    let mut last = Ok(());
    for i in 0..cohort_size {
        let context = Box::new(RecordingContext {
            id: format!("context-{i}"),
            launched: launched.clone(),
            configs: configs.clone(),
        });
        last = service.queue_task(TaskConfig::new(), context).await;
    }

    let err = last.unwrap_err();
    let err = err.downcast_ref::<CoordinationError>().unwrap();
    assert_eq!(
        *err,
        CoordinationError::UnresolvedComponents {
            ids: vec![ComponentId::Server(1)]
        }
    );
    assert_eq!(launched.load(Ordering::SeqCst), 0);
    assert!(service.frozen_address_book().is_none());
}

#[tokio::test]
async fn request_execution_slots_submits_once() {
    let allocator = Arc::new(RecordingAllocator::default());
    let service = CoordinationService::new(
        config(5),
        Arc::new(StaticNameResolver::new()),
        allocator.clone(),
        TcpPortRange::new(9000, 64),
    );

    service.request_execution_slots().await.unwrap();
    service.request_execution_slots().await.unwrap();

    assert_eq!(allocator.submits.load(Ordering::SeqCst), 1);
    let request = allocator.last.lock().unwrap().unwrap();
    assert_eq!(request.cohort_size, 5);
    assert_eq!(request, service.resource_request());
}

#[tokio::test]
async fn frozen_book_is_stable_against_late_registration() {
    let cohort_size = 2;
    let resolver = CountingResolver::default();
    register_cohort(&resolver, cohort_size).await;

    let service = Arc::new(CoordinationService::new(
        config(cohort_size),
        Arc::new(resolver.clone()),
        Arc::new(RecordingAllocator::default()),
        TcpPortRange::new(9000, 64),
    ));

    let launched = Arc::new(AtomicUsize::new(0));
    let configs = Arc::new(Mutex::new(Vec::new()));
    for i in 0..cohort_size {
        let context = Box::new(RecordingContext {
            id: format!("context-{i}"),
            launched: launched.clone(),
            configs: configs.clone(),
        });
        service.queue_task(TaskConfig::new(), context).await.unwrap();
    }

    let book = service.frozen_address_book().unwrap();
    let snapshot = (*book).clone();
    let original = book.get(&ComponentId::Server(0)).unwrap();

    // A spurious registration under a used id is ignored by the resolver and
    // invisible to the frozen book.
    resolver
        .register(ComponentId::Server(0), endpoint(65000))
        .await
        .unwrap();

    let after = service.frozen_address_book().unwrap();
    assert_eq!(*after, snapshot);
    assert_eq!(after.get(&ComponentId::Server(0)).unwrap(), original);
    let looked_up = resolver.lookup(&[ComponentId::Server(0)]).await.unwrap();
    assert_eq!(looked_up[0].1, Some(original));
}

#[tokio::test]
async fn one_shot_operations_reject_re_entry_after_launch() {
    let cohort_size = 1;
    let resolver = CountingResolver::default();
    register_cohort(&resolver, cohort_size).await;

    let service = Arc::new(CoordinationService::new(
        config(cohort_size),
        Arc::new(resolver),
        Arc::new(RecordingAllocator::default()),
        TcpPortRange::new(9000, 64),
    ));

    let launched = Arc::new(AtomicUsize::new(0));
    let configs = Arc::new(Mutex::new(Vec::new()));
    let context = Box::new(RecordingContext {
        id: "context-0".to_string(),
        launched: launched.clone(),
        configs: configs.clone(),
    });
    service.queue_task(TaskConfig::new(), context).await.unwrap();
    assert_eq!(service.state(), ServiceState::Launched);

    // Queueing past the completed cohort is a state error.
    let extra = Box::new(RecordingContext {
        id: "context-extra".to_string(),
        launched: launched.clone(),
        configs: configs.clone(),
    });
    let err = service.queue_task(TaskConfig::new(), extra).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CoordinationError>(),
        Some(CoordinationError::IllegalState(_))
    ));

    // So is asking for a fresh component pair.
    let err = service.service_configuration().unwrap_err();
    assert!(matches!(err, CoordinationError::IllegalState(_)));

    // Local context naming stays available; it never interacts with cohort state.
    let local = service.local_context_configuration();
    assert!(local.get(keys::CONTEXT_ID).is_some());
}

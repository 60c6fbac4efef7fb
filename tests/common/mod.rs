//! Shared test utilities for distributor integration tests.
//!
//! Provides builders for registries, queues and a router wired with
//! in-memory stores.

#![allow(dead_code)]

use distributor::api::{create_router, AppState};
use distributor::config::DistributorConfig;
use distributor::registry::{Member, Queue, QueueId, Registry, Strategy};
use std::sync::Arc;

// =============================================================================
// Well-Known Test Constants
// =============================================================================

pub const TENANT: &str = "tenant-a";
pub const OTHER_TENANT: &str = "tenant-b";

// =============================================================================
// Registry Builders
// =============================================================================

/// Registry holding one queue of `strategy` with the given `(agent, penalty)` members.
pub fn registry_with_queue(
    queue_id: u64,
    strategy: Strategy,
    members: &[(&str, i32)],
) -> (Arc<Registry>, Vec<Member>) {
    let registry = Arc::new(Registry::new());
    let members = add_queue(&registry, queue_id, strategy, members);
    (registry, members)
}

/// Add a queue owned by [`TENANT`] and its members to an existing registry.
pub fn add_queue(
    registry: &Registry,
    queue_id: u64,
    strategy: Strategy,
    members: &[(&str, i32)],
) -> Vec<Member> {
    let queue_id = QueueId(queue_id);
    registry
        .add_queue(Queue::new(queue_id, TENANT, format!("queue-{}", queue_id)).with_strategy(strategy))
        .unwrap();

    members
        .iter()
        .map(|(agent, penalty)| registry.add_member(queue_id, (*agent).into(), *penalty).unwrap())
        .collect()
}

// =============================================================================
// App Builders
// =============================================================================

/// Application state over `registry` with default configuration.
pub fn app_state(registry: Arc<Registry>) -> Arc<AppState> {
    Arc::new(AppState::new(Arc::new(DistributorConfig::default()), registry))
}

/// Router plus its state, for tests that also inspect state directly.
pub fn app(registry: Arc<Registry>) -> (axum::Router, Arc<AppState>) {
    let state = app_state(registry);
    (create_router(Arc::clone(&state)), state)
}

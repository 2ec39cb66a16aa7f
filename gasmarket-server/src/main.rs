//! Gasmarket server binary.
//!
//! Wires the in-memory reference stores to the core services, seeds the
//! configured pricing policies, and runs the subscription expiry scheduler
//! for the life of the process. The CRUD/API layer is deployed separately
//! and talks to the same backing store; this host owns the background
//! lifecycle.

mod config;
mod observability;

use std::sync::Arc;

use gasmarket_core::{
    entitlement::{
        InMemoryPolicyStore, InMemoryPrincipalStore, PolicyStore, PrincipalStore, SchedulerConfig,
        SubscriptionExpiryScheduler,
    },
    notify::{LogDispatcher, NotificationDispatcher},
};
use tracing::{error, info};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() {
    observability::init(observability::LogFormat::from_env());

    let config = ServerConfig::load();

    let policy_store = Arc::new(InMemoryPolicyStore::new());
    for policy in config.policies {
        info!(role = %policy.role, is_active = policy.is_active, "seeding pricing policy");
        policy_store.upsert(policy);
    }

    let principals: Arc<dyn PrincipalStore> = Arc::new(InMemoryPrincipalStore::new());
    let policies: Arc<dyn PolicyStore> = policy_store;
    let notifier: Arc<dyn NotificationDispatcher> = Arc::new(LogDispatcher);

    let scheduler = Arc::new(SubscriptionExpiryScheduler::new(
        principals,
        policies,
        notifier,
        SchedulerConfig::default(),
    ));
    let handle = scheduler.start();
    info!("gasmarket server started; expiry scheduler running");

    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
    }
    info!("shutting down");
    handle.stop().await;
}

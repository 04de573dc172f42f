//! Dependency binding: wire a pool instance into the container.

use std::sync::Arc;

use tracing::debug;

use crate::config::record::PoolRecord;
use crate::core::error::OperationError;
use crate::core::factory::NamedThreadFactory;
use crate::core::pool::QueuelessPool;
use crate::runtime::container::{ServiceContainer, ServiceHandle, ThreadFactoryService};

/// Name of the default thread-factory service synthesized for a pool.
///
/// Keyed by the pool's own name, so distinct pools never share a default
/// factory identity.
#[must_use]
pub fn default_factory_name(pool: &str) -> String {
    format!("{pool}.thread-factory")
}

/// Register the pool with its declared dependencies and start it.
///
/// When the record names no thread factory, a default [`NamedThreadFactory`]
/// scoped to the pool's name is registered on demand. Every service this
/// call creates (the pool, and the synthetic factory if any) is appended to
/// `new_services` so the caller can verify and, on failure, roll back.
///
/// # Errors
///
/// Registration conflicts surface as [`OperationError::DuplicateName`];
/// wiring and start failures as [`OperationError::Bind`]. The caller owns
/// rollback of `new_services`.
pub fn bind(
    container: &ServiceContainer,
    pool: Arc<QueuelessPool>,
    record: &PoolRecord,
    new_services: &mut Vec<ServiceHandle>,
) -> Result<ServiceHandle, OperationError> {
    let factory_name = match &record.thread_factory {
        Some(reference) => reference.clone(),
        None => {
            let name = default_factory_name(&record.name);
            if !container.contains(&name) {
                let factory = Arc::new(NamedThreadFactory::new(record.name.clone()));
                let handle = container.register(
                    &name,
                    Arc::new(ThreadFactoryService::new(factory)),
                    Vec::new(),
                )?;
                debug!(pool = %record.name, factory = %name, "registered default thread factory");
                new_services.push(handle);
            }
            name
        }
    };

    let mut dependencies = vec![factory_name];
    if let Some(handoff) = &record.handoff_executor {
        dependencies.push(handoff.clone());
    }

    let handle = container.register(&record.name, pool, dependencies)?;
    new_services.push(handle.clone());
    container.start(&handle)?;
    Ok(handle)
}

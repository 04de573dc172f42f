//! The two-phase provisioning pipeline: raw add request → running,
//! dependency-wired pool service.
//!
//! Phase 1 resolves the request into an immutable record with no runtime
//! effect. Phase 2 instantiates the pool, binds its dependencies, and
//! verifies it reaches `Up` within the container's policy window; any
//! phase-2 failure rolls back every service the operation created.

use std::sync::Arc;

use tracing::{info, warn};

use crate::builders::{binder, resolver};
use crate::config::record::{AddRequest, PoolRecord};
use crate::core::error::OperationError;
use crate::core::pool::QueuelessPool;
use crate::runtime::container::{ServiceContainer, ServiceHandle};

/// Provision a queueless pool from a raw add request.
///
/// `blocking` selects the operating mode explicitly; the two convenience
/// entry points below pin it per mode.
///
/// # Errors
///
/// Phase-1 failures ([`OperationError::Validation`],
/// [`OperationError::DuplicateName`]) abort before any runtime effect.
/// Phase-2 failures ([`OperationError::Bind`],
/// [`OperationError::VerifyTimeout`]) abort after rolling back every
/// service the operation created; nothing stays half-registered.
pub fn add_queueless_pool(
    container: &ServiceContainer,
    request: &AddRequest,
    blocking: bool,
) -> Result<ServiceHandle, OperationError> {
    let record = resolver::resolve(request, blocking)?;
    install(container, &record)
}

/// Provision a blocking-mode pool: saturated submitters suspend until a
/// worker frees up.
///
/// # Errors
///
/// See [`add_queueless_pool`].
pub fn add_blocking_pool(
    container: &ServiceContainer,
    request: &AddRequest,
) -> Result<ServiceHandle, OperationError> {
    add_queueless_pool(container, request, true)
}

/// Provision a non-blocking pool: saturated submissions delegate to the
/// configured hand-off executor, or fail as saturated without one.
///
/// # Errors
///
/// See [`add_queueless_pool`].
pub fn add_nonblocking_pool(
    container: &ServiceContainer,
    request: &AddRequest,
) -> Result<ServiceHandle, OperationError> {
    add_queueless_pool(container, request, false)
}

/// Phase 2: instantiate, bind, verify; all-or-nothing.
fn install(
    container: &ServiceContainer,
    record: &PoolRecord,
) -> Result<ServiceHandle, OperationError> {
    if container.contains(&record.name) {
        return Err(OperationError::DuplicateName(record.name.clone()));
    }

    let pool = Arc::new(QueuelessPool::from_record(record)?);
    let mut new_services = Vec::new();
    match provision(container, pool, record, &mut new_services) {
        Ok(handle) => {
            info!(
                pool = %record.name,
                blocking = record.blocking,
                max_threads = record.max_threads,
                "queueless pool provisioned"
            );
            Ok(handle)
        }
        Err(err) => {
            warn!(pool = %record.name, %err, "provisioning failed, rolling back");
            container.rollback(&new_services);
            Err(err)
        }
    }
}

fn provision(
    container: &ServiceContainer,
    pool: Arc<QueuelessPool>,
    record: &PoolRecord,
    new_services: &mut Vec<ServiceHandle>,
) -> Result<ServiceHandle, OperationError> {
    let handle = binder::bind(container, pool, record, new_services)?;
    container.verify(&handle, ServiceContainer::DEFAULT_VERIFY_WINDOW)?;
    Ok(handle)
}

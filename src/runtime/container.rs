//! Named service container: registration, two-phase dependency injection,
//! verification, and rollback.
//!
//! The container guarantees at most one instance per name. Dependencies are
//! declared at registration and resolved at start: each one is started
//! first, its capability is fetched, and the dependent's injection point is
//! called exactly once per dependency before the service itself starts.
//! A failed operation's services are removed again through [`ServiceContainer::rollback`],
//! leaving nothing half-registered.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::core::error::{BindError, OperationError};
use crate::core::factory::ThreadFactory;
use crate::core::handoff::HandoffExecutor;
use crate::core::pool::QueuelessPool;

/// Lifecycle of a registered service, tracked by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Registered, not started.
    Down,
    /// Dependencies being resolved and injected.
    Starting,
    /// Running; dependents may bind to its capability.
    Up,
    /// Stop in progress.
    Stopping,
}

/// The typed value a named service exposes to its dependents.
#[derive(Clone)]
pub enum Capability {
    /// Produces worker threads for pools.
    ThreadFactory(Arc<dyn ThreadFactory>),
    /// Takes overflow tasks from saturated non-blocking pools.
    HandoffExecutor(Arc<dyn HandoffExecutor>),
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadFactory(_) => f.write_str("Capability::ThreadFactory"),
            Self::HandoffExecutor(_) => f.write_str("Capability::HandoffExecutor"),
        }
    }
}

/// A service the container can own.
///
/// Injection happens between registration and start: the container calls
/// [`Service::inject`] once per declared dependency, then [`Service::start`].
pub trait Service: Send + Sync + 'static {
    /// Receive one resolved dependency. Called at most once per dependency,
    /// always before `start`.
    ///
    /// # Errors
    ///
    /// The default implementation rejects all injection; services with
    /// dependencies override it.
    fn inject(&self, dependency: &str, capability: Capability) -> Result<(), BindError> {
        let _ = (dependency, capability);
        Err(BindError::NoInjectionPoint(String::new()))
    }

    /// Transition the service into its running state.
    ///
    /// # Errors
    ///
    /// Any [`BindError`] aborts the start and is reported to the operation
    /// that requested it.
    fn start(&self) -> Result<(), BindError>;

    /// Stop the service. Must be idempotent.
    fn stop(&self) {}

    /// The capability this service exposes to dependents, if any.
    fn capability(self: Arc<Self>) -> Option<Capability> {
        None
    }

    /// Downcast helper for pool services.
    fn as_pool(self: Arc<Self>) -> Option<Arc<QueuelessPool>> {
        None
    }
}

/// Leaf service wrapping a [`ThreadFactory`] capability.
pub struct ThreadFactoryService {
    factory: Arc<dyn ThreadFactory>,
}

impl ThreadFactoryService {
    /// Wrap a factory for registration.
    pub fn new(factory: Arc<dyn ThreadFactory>) -> Self {
        Self { factory }
    }
}

impl Service for ThreadFactoryService {
    fn start(&self) -> Result<(), BindError> {
        Ok(())
    }

    fn capability(self: Arc<Self>) -> Option<Capability> {
        Some(Capability::ThreadFactory(Arc::clone(&self.factory)))
    }
}

/// Leaf service wrapping a [`HandoffExecutor`] capability.
pub struct HandoffExecutorService {
    executor: Arc<dyn HandoffExecutor>,
}

impl HandoffExecutorService {
    /// Wrap an executor for registration.
    pub fn new(executor: Arc<dyn HandoffExecutor>) -> Self {
        Self { executor }
    }
}

impl Service for HandoffExecutorService {
    fn start(&self) -> Result<(), BindError> {
        Ok(())
    }

    fn capability(self: Arc<Self>) -> Option<Capability> {
        Some(Capability::HandoffExecutor(Arc::clone(&self.executor)))
    }
}

/// Pools are services: they accept factory/hand-off injection, start once a
/// factory is bound, and expose a hand-off capability so pools can chain.
impl Service for QueuelessPool {
    fn inject(&self, dependency: &str, capability: Capability) -> Result<(), BindError> {
        debug!(pool = %self.name(), dependency, kind = ?capability, "injecting dependency");
        match capability {
            Capability::ThreadFactory(factory) => self.bind_thread_factory(factory),
            Capability::HandoffExecutor(executor) => self.bind_handoff_executor(executor),
        }
    }

    fn start(&self) -> Result<(), BindError> {
        Self::start(self)
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn capability(self: Arc<Self>) -> Option<Capability> {
        Some(Capability::HandoffExecutor(self))
    }

    fn as_pool(self: Arc<Self>) -> Option<Arc<Self>> {
        Some(self)
    }
}

/// One registered service with its declared dependencies and tracked state.
struct ServiceEntry {
    name: String,
    instance: Arc<dyn Service>,
    dependencies: Vec<String>,
    state: Mutex<ServiceState>,
    state_cv: Condvar,
}

/// Named service registry with at-most-one-instance-per-name, dependency
/// resolution, verification, and rollback.
#[derive(Default)]
pub struct ServiceContainer {
    services: RwLock<HashMap<String, Arc<ServiceEntry>>>,
}

impl ServiceContainer {
    /// The policy window within which a provisioned service must come up.
    pub const DEFAULT_VERIFY_WINDOW: Duration = Duration::from_secs(5);

    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` under `name` with its declared dependencies.
    ///
    /// Registration is atomic: the name is claimed or the call fails, so
    /// concurrent operations on the same name serialize here.
    ///
    /// # Errors
    ///
    /// [`OperationError::DuplicateName`] when the name is taken.
    pub fn register(
        &self,
        name: &str,
        instance: Arc<dyn Service>,
        dependencies: Vec<String>,
    ) -> Result<ServiceHandle, OperationError> {
        let mut services = self.services.write();
        if services.contains_key(name) {
            return Err(OperationError::DuplicateName(name.to_owned()));
        }
        let entry = Arc::new(ServiceEntry {
            name: name.to_owned(),
            instance,
            dependencies,
            state: Mutex::new(ServiceState::Down),
            state_cv: Condvar::new(),
        });
        services.insert(name.to_owned(), entry);
        debug!(service = name, "service registered");
        Ok(ServiceHandle {
            name: name.to_owned(),
        })
    }

    /// Whether a service with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.services.read().contains_key(name)
    }

    /// The tracked state of a named service, if registered.
    #[must_use]
    pub fn state_of(&self, name: &str) -> Option<ServiceState> {
        self.lookup(name).map(|entry| *entry.state.lock())
    }

    /// Fetch a registered pool by name.
    #[must_use]
    pub fn pool(&self, name: &str) -> Option<Arc<QueuelessPool>> {
        self.lookup(name)
            .and_then(|entry| Arc::clone(&entry.instance).as_pool())
    }

    /// Start a service: resolve and inject its dependencies, then run its
    /// start transition. Starting an `Up` service is a no-op.
    ///
    /// # Errors
    ///
    /// [`OperationError::UnknownService`] for an unregistered handle;
    /// [`OperationError::Bind`] when wiring or the start transition fails
    /// (the service returns to `Down`).
    pub fn start(&self, handle: &ServiceHandle) -> Result<(), OperationError> {
        let entry = self
            .lookup(&handle.name)
            .ok_or_else(|| OperationError::UnknownService(handle.name.clone()))?;
        self.start_entry(&entry)
    }

    /// Wait until the service reaches `Up`, or the deadline passes.
    ///
    /// # Errors
    ///
    /// [`OperationError::VerifyTimeout`] when the deadline elapses first.
    pub fn verify(&self, handle: &ServiceHandle, deadline: Duration) -> Result<(), OperationError> {
        let entry = self
            .lookup(&handle.name)
            .ok_or_else(|| OperationError::UnknownService(handle.name.clone()))?;
        let deadline_at = Instant::now().checked_add(deadline);
        let mut state = entry.state.lock();
        while *state != ServiceState::Up {
            let Some(at) = deadline_at else {
                entry.state_cv.wait(&mut state);
                continue;
            };
            let now = Instant::now();
            if now >= at {
                return Err(OperationError::VerifyTimeout {
                    service: entry.name.clone(),
                    deadline,
                });
            }
            let _ = entry.state_cv.wait_for(&mut state, at - now);
        }
        Ok(())
    }

    /// Stop a service. Stopping a service that is not `Up` is a no-op.
    ///
    /// # Errors
    ///
    /// [`OperationError::UnknownService`] for an unregistered handle.
    pub fn stop(&self, handle: &ServiceHandle) -> Result<(), OperationError> {
        let entry = self
            .lookup(&handle.name)
            .ok_or_else(|| OperationError::UnknownService(handle.name.clone()))?;
        let proceed = {
            let mut state = entry.state.lock();
            if *state == ServiceState::Up {
                *state = ServiceState::Stopping;
                true
            } else {
                false
            }
        };
        if proceed {
            entry.instance.stop();
            let mut state = entry.state.lock();
            *state = ServiceState::Down;
            entry.state_cv.notify_all();
            info!(service = %entry.name, "service stopped");
        }
        Ok(())
    }

    /// Stop and deregister a service.
    ///
    /// # Errors
    ///
    /// [`OperationError::UnknownService`] for an unregistered handle.
    pub fn remove(&self, handle: &ServiceHandle) -> Result<(), OperationError> {
        self.stop(handle)?;
        self.services.write().remove(&handle.name);
        debug!(service = %handle.name, "service removed");
        Ok(())
    }

    /// Remove, in reverse creation order, every service a failed operation
    /// created. Best-effort: a service that already vanished is skipped.
    pub fn rollback(&self, created: &[ServiceHandle]) {
        for handle in created.iter().rev() {
            match self.remove(handle) {
                Ok(()) => debug!(service = %handle.name, "rolled back service"),
                Err(err) => {
                    warn!(service = %handle.name, %err, "rollback could not remove service");
                }
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<Arc<ServiceEntry>> {
        self.services.read().get(name).cloned()
    }

    fn start_entry(&self, entry: &Arc<ServiceEntry>) -> Result<(), OperationError> {
        {
            let mut state = entry.state.lock();
            loop {
                match *state {
                    ServiceState::Up => return Ok(()),
                    ServiceState::Down => {
                        *state = ServiceState::Starting;
                        break;
                    }
                    // another operation is starting it; wait for the outcome
                    ServiceState::Starting => entry.state_cv.wait(&mut state),
                    ServiceState::Stopping => {
                        return Err(OperationError::Bind(BindError::AlreadyStarted(
                            entry.name.clone(),
                        )))
                    }
                }
            }
        }
        let result = self.wire_and_start(entry);
        let mut state = entry.state.lock();
        *state = if result.is_ok() {
            ServiceState::Up
        } else {
            ServiceState::Down
        };
        entry.state_cv.notify_all();
        drop(state);
        match &result {
            Ok(()) => info!(service = %entry.name, "service up"),
            Err(err) => warn!(service = %entry.name, %err, "service failed to start"),
        }
        result
    }

    fn wire_and_start(&self, entry: &Arc<ServiceEntry>) -> Result<(), OperationError> {
        for dependency in &entry.dependencies {
            if dependency == &entry.name {
                return Err(BindError::UnusableDependency {
                    service: entry.name.clone(),
                    dependency: dependency.clone(),
                }
                .into());
            }
            let dep = self.lookup(dependency).ok_or_else(|| {
                OperationError::Bind(BindError::MissingDependency {
                    service: entry.name.clone(),
                    dependency: dependency.clone(),
                })
            })?;
            self.start_entry(&dep).map_err(|_| {
                OperationError::Bind(BindError::DependencyFailed {
                    service: entry.name.clone(),
                    dependency: dependency.clone(),
                })
            })?;
            let capability = Arc::clone(&dep.instance).capability().ok_or_else(|| {
                OperationError::Bind(BindError::UnusableDependency {
                    service: entry.name.clone(),
                    dependency: dependency.clone(),
                })
            })?;
            entry
                .instance
                .inject(dependency, capability)
                .map_err(|err| match err {
                    BindError::NoInjectionPoint(_) => {
                        BindError::NoInjectionPoint(entry.name.clone())
                    }
                    other => other,
                })?;
        }
        entry.instance.start().map_err(OperationError::from)
    }
}

/// Cheap, cloneable reference to a registered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    name: String,
}

impl ServiceHandle {
    /// The registered service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::factory::NamedThreadFactory;

    fn factory_service() -> Arc<dyn Service> {
        Arc::new(ThreadFactoryService::new(Arc::new(NamedThreadFactory::new(
            "t",
        ))))
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let container = ServiceContainer::new();
        container
            .register("tf", factory_service(), Vec::new())
            .unwrap();
        let err = container
            .register("tf", factory_service(), Vec::new())
            .expect_err("second registration must fail");
        assert!(matches!(err, OperationError::DuplicateName(name) if name == "tf"));
    }

    #[test]
    fn leaf_service_starts_and_verifies() {
        let container = ServiceContainer::new();
        let handle = container
            .register("tf", factory_service(), Vec::new())
            .unwrap();
        container.start(&handle).unwrap();
        container
            .verify(&handle, Duration::from_millis(100))
            .unwrap();
        assert_eq!(container.state_of("tf"), Some(ServiceState::Up));
    }

    #[test]
    fn missing_dependency_fails_the_start() {
        let container = ServiceContainer::new();
        let pool = Arc::new(
            QueuelessPool::new(
                "p",
                1,
                Duration::from_millis(10),
                crate::core::pool::AdmissionPolicy::Block,
            )
            .unwrap(),
        );
        let handle = container
            .register("p", pool, vec!["absent".into()])
            .unwrap();
        let err = container.start(&handle).expect_err("dep is missing");
        assert!(matches!(
            err,
            OperationError::Bind(BindError::MissingDependency { .. })
        ));
        assert_eq!(container.state_of("p"), Some(ServiceState::Down));
    }

    #[test]
    fn verify_times_out_on_a_down_service() {
        let container = ServiceContainer::new();
        let handle = container
            .register("tf", factory_service(), Vec::new())
            .unwrap();
        let err = container
            .verify(&handle, Duration::from_millis(50))
            .expect_err("never started");
        assert!(matches!(err, OperationError::VerifyTimeout { .. }));
    }

    #[test]
    fn rollback_removes_in_reverse_order() {
        let container = ServiceContainer::new();
        let a = container
            .register("a", factory_service(), Vec::new())
            .unwrap();
        let b = container
            .register("b", factory_service(), Vec::new())
            .unwrap();
        container.rollback(&[a, b]);
        assert!(!container.contains("a"));
        assert!(!container.contains("b"));
    }
}

//! Runtime service container: named registration, injection, verification.

pub mod container;

pub use container::{
    Capability, Service, ServiceContainer, ServiceHandle, ServiceState,
    HandoffExecutorService, ThreadFactoryService,
};

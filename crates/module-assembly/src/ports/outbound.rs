//! # Driven Ports (SPI - Outbound)
//!
//! Interfaces to the execution environment the assembly pipeline drives:
//! - module deployment and introspection
//! - the composite contract (assemble, cut, list modules)
//! - simulated time
//! - timelocked contracts that record and execute deferred calls

use crate::domain::entities::{CallOutcome, DeployedModule, ModuleCut, ModuleFacet};
use crate::domain::value_objects::{Address, Bytes, FunctionFingerprint};
use crate::errors::{AssemblyError, TimelockError};
use async_trait::async_trait;

// =============================================================================
// MODULE FACTORY
// =============================================================================

/// Deploys implementation modules and reads what they expose.
#[async_trait]
pub trait ModuleFactory: Send + Sync {
    /// Deploy a fresh instance of the named module.
    ///
    /// # Errors
    ///
    /// * `ModuleNotFound` - No module is known under `name`
    async fn deploy(&self, name: &str) -> Result<DeployedModule, AssemblyError>;

    /// Fingerprints the live instance at `address` exposes, in declaration order.
    ///
    /// # Errors
    ///
    /// * `ModuleNotDeployed` - Nothing lives at `address`
    async fn exposed_fingerprints(
        &self,
        address: Address,
    ) -> Result<Vec<FunctionFingerprint>, AssemblyError>;
}

// =============================================================================
// COMPOSITE LEDGER
// =============================================================================

/// The composite contract's batch-update and introspection surface.
#[async_trait]
pub trait CompositeLedger: Send + Sync {
    /// Create a composite owned by `owner`, apply `cuts` atomically and run
    /// the initializer. Returns the composite address.
    ///
    /// # Errors
    ///
    /// * `Cut` - A cut violates the routing rules; nothing is created
    /// * `InitializationRejected` - Initializer/payload pair is inconsistent
    async fn assemble(
        &self,
        owner: Address,
        cuts: &[ModuleCut],
        initializer: Address,
        init_payload: &Bytes,
    ) -> Result<Address, AssemblyError>;

    /// Apply a further batch to an existing composite, gated by its owner.
    ///
    /// # Errors
    ///
    /// * `UnauthorizedAuthority` - `caller` is not the owner
    /// * `CompositeNotFound` - Unknown composite
    /// * `Cut` / `InitializationRejected` - As for [`CompositeLedger::assemble`]
    async fn apply_cuts(
        &self,
        caller: Address,
        composite: Address,
        cuts: &[ModuleCut],
        initializer: Address,
        init_payload: &Bytes,
    ) -> Result<(), AssemblyError>;

    /// Every module with the fingerprints it currently owns.
    async fn modules(&self, composite: Address) -> Result<Vec<ModuleFacet>, AssemblyError>;

    /// Module that owns `fingerprint`, if any.
    async fn module_of(
        &self,
        composite: Address,
        fingerprint: FunctionFingerprint,
    ) -> Result<Option<Address>, AssemblyError>;
}

// =============================================================================
// SIMULATED TIME
// =============================================================================

/// A clock that only moves forward.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current simulated time in seconds.
    async fn now(&self) -> u64;

    /// Move to `timestamp` if it is in the future. Returns the resulting time.
    async fn advance_to(&self, timestamp: u64) -> u64;
}

// =============================================================================
// DEFERRED EXECUTION
// =============================================================================

/// Executes a previously recorded deferred call on its originating contract.
#[async_trait]
pub trait DeferredExecution: Send + Sync {
    /// Re-submit `encoded_call` to `target` as `executor`.
    ///
    /// # Errors
    ///
    /// * `UnknownTarget` - `target` cannot execute deferred calls
    /// * `UnauthorizedExecutor` - `executor` is not the designated identity
    /// * `UnknownDeferredCall` - Never proposed or already executed
    /// * `PrematureExecution` - Time bound not yet passed
    async fn execute_deferred(
        &self,
        executor: Address,
        target: Address,
        encoded_call: &Bytes,
    ) -> Result<Bytes, TimelockError>;
}

/// A central controller that composites get attached to.
#[async_trait]
pub trait CompositeRegistry: Send + Sync {
    /// Propose attaching `composite`; may be deferred by the controller's timelock.
    async fn register_composite(
        &self,
        caller: Address,
        composite: Address,
    ) -> Result<CallOutcome, TimelockError>;
}

//! # Module Assembly - Modular Contract Composition
//!
//! Assembles a composite contract out of independently deployed modules,
//! verifies that the composite implements every function of a set of
//! required capability descriptors, and simulates the timelock that guards
//! privileged governance calls.
//!
//! ## Pipeline
//!
//! | Step | Component | Location |
//! |------|-----------|----------|
//! | Fingerprint required functions | `index_descriptors` | `domain/indexer.rs` |
//! | Deploy modules, compute cuts | `ModuleDeployer` | `assembly/deployer.rs` |
//! | Assemble and wire the composite | `AssemblyBuilder` | `assembly/builder.rs` |
//! | Check coverage | `CoverageVerifier` | `assembly/verifier.rs` |
//! | Complete deferred calls | `TimelockSimulator` | `timelock.rs` |
//!
//! ## Routing Rules
//!
//! | Action | Module address | Fingerprint must be |
//! |--------|----------------|---------------------|
//! | `Add` | non-zero | unowned |
//! | `Replace` | non-zero, not the current owner | owned |
//! | `Remove` | zero | owned |
//!
//! A batch of cuts is applied atomically: either every cut is accepted or the
//! composite is left untouched.
//!
//! ## Timelock
//!
//! A deferred call carries an exclusive bound `T`: execution at `T` fails
//! with `PrematureExecution`, execution at `T + 1` succeeds. Only the
//! designated executor may execute, and each proposal executes once.
//!
//! ## Outbound Ports
//!
//! | Trait | Purpose | In-memory adapter |
//! |-------|---------|-------------------|
//! | `ModuleFactory` | Deploy modules, read exposed fingerprints | `InMemoryModuleRegistry` |
//! | `CompositeLedger` | Assemble, cut, introspect composites | `InMemoryCompositeLedger` |
//! | `Clock` | Monotonic simulated time | `SimulatedClock` |
//! | `DeferredExecution` | Execute deferred calls | `InMemoryController` |
//! | `CompositeRegistry` | Attach composites to a controller | `InMemoryController` |
//!
//! ## Usage Example
//!
//! ```ignore
//! use module_assembly::prelude::*;
//!
//! let builder = AssemblyBuilder::new(registry, ledger);
//! let (assembly, report) = builder.build_and_verify(&descriptors, &plan).await?;
//! println!("{} functions routed by {} modules", report.exposed, report.modules.len());
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod assembly;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod telemetry;
pub mod timelock;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        AbiWord, AssemblyState, CallOutcome, CapabilityDescriptor, CutAction, DeferredCall,
        DeferredCallStatus, DeployedModule, InitCall, ModuleCut, ModuleFacet, ModuleRef,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, Bytes, FunctionFingerprint, Hash, U256};

    // Signatures and indexing
    pub use crate::domain::indexer::{
        index_descriptors, DuplicatePolicy, IndexedFunction, SelectorIndex,
    };
    pub use crate::domain::signature::FunctionSignature;

    // Domain services
    pub use crate::domain::services::{compute_fingerprint, compute_module_address, keccak256};

    // Ports
    pub use crate::ports::outbound::{
        Clock, CompositeLedger, CompositeRegistry, DeferredExecution, ModuleFactory,
    };

    // Errors
    pub use crate::errors::{AssemblyError, CutError, TimelockError};

    // Assembly pipeline
    pub use crate::assembly::{
        Assembly, AssemblyBuilder, AssemblyPlan, CoverageReport, CoverageVerifier, DeployedCut,
        InitializerSpec, ModuleDeployer, ModuleSpec,
    };
    pub use crate::timelock::{Resolution, TimelockSimulator};

    // Adapters
    pub use crate::adapters::{
        ControllerConfig, InMemoryCompositeLedger, InMemoryController, InMemoryModuleRegistry,
        ModuleBlueprint, SimulatedClock,
    };

    // Configuration
    pub use crate::config::{AssemblyConfig, AssemblyManifest, LoggingConfig};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================

//! # Error Types
//!
//! All error types for module assembly, cut application and deferred calls.
//! Nothing in this crate retries on error: every variant describes either a
//! structural misconfiguration or a caller-identity violation.

use crate::domain::value_objects::{Address, FunctionFingerprint};
use thiserror::Error;

// =============================================================================
// ASSEMBLY ERRORS
// =============================================================================

/// Errors raised while indexing, deploying, assembling or verifying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// A module's filtered fingerprint set is empty.
    #[error("module {module} contributes nothing: no exposed fingerprint is required")]
    EmptyContribution {
        /// Name of the offending module.
        module: String,
    },

    /// Required fingerprints are not exposed by the composite.
    #[error("coverage gap: {} required function(s) unimplemented: [{}]", .missing.len(), .missing.join(", "))]
    CoverageGap {
        /// Resolved names of every missing fingerprint.
        missing: Vec<String>,
    },

    /// Gated operation called by someone other than the authority.
    #[error("unauthorized authority: caller {caller:?}, expected {expected:?}")]
    UnauthorizedAuthority {
        /// The rejected caller.
        caller: Address,
        /// The authority of the composite.
        expected: Address,
    },

    /// Signature text could not be parsed.
    #[error("malformed signature {input:?}: {reason}")]
    MalformedSignature {
        /// Raw input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Two distinct signatures hash to the same fingerprint.
    #[error("fingerprint collision on {fingerprint}: {existing} vs {incoming}")]
    FingerprintCollision {
        /// The shared fingerprint.
        fingerprint: FunctionFingerprint,
        /// Signature already indexed.
        existing: String,
        /// Signature that collided with it.
        incoming: String,
    },

    /// The same signature is declared by two descriptors while overlap is rejected.
    #[error("signature {signature} declared by both {first} and {second}")]
    AmbiguousSignature {
        /// The duplicated signature.
        signature: String,
        /// Descriptor that declared it first.
        first: String,
        /// Descriptor that declared it again.
        second: String,
    },

    /// No blueprint registered under this name.
    #[error("module not found: {name}")]
    ModuleNotFound {
        /// Requested module name.
        name: String,
    },

    /// No deployed module lives at this address.
    #[error("no module deployed at {0:?}")]
    ModuleNotDeployed(Address),

    /// No composite lives at this address.
    #[error("no composite at {0:?}")]
    CompositeNotFound(Address),

    /// The initializer module or its call is unusable.
    #[error("invalid initializer {module}: {reason}")]
    InvalidInitializer {
        /// Initializer module name.
        module: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The composite refused the initializer/payload pair.
    #[error("initialization rejected: {0}")]
    InitializationRejected(String),

    /// A cut in a batch was rejected.
    #[error("cut rejected: {0}")]
    Cut(#[from] CutError),

    /// A deferred call could not be carried out.
    #[error("timelock: {0}")]
    Timelock(#[from] TimelockError),
}

// =============================================================================
// CUT ERRORS
// =============================================================================

/// Reasons a single module cut is refused by the composite.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CutError {
    /// A cut must carry at least one fingerprint.
    #[error("no fingerprints in cut for module {0:?}")]
    EmptyCut(Address),

    /// Add and Replace need a real module.
    #[error("module address is zero")]
    ZeroModuleAddress,

    /// Add of a fingerprint some module already owns.
    #[error("cannot add {fingerprint}: already owned by {owner:?}")]
    AlreadyOwned {
        /// The fingerprint.
        fingerprint: FunctionFingerprint,
        /// Its current owner.
        owner: Address,
    },

    /// Replace onto the module that already owns the fingerprint.
    #[error("cannot replace {fingerprint} with the module that already owns it")]
    ReplaceWithSameModule {
        /// The fingerprint.
        fingerprint: FunctionFingerprint,
    },

    /// Replace or Remove of a fingerprint nobody owns.
    #[error("{fingerprint} is not owned by any module")]
    NotOwned {
        /// The fingerprint.
        fingerprint: FunctionFingerprint,
    },

    /// Remove must target the zero address.
    #[error("remove cut must use the zero address, got {0:?}")]
    RemoveWithModuleAddress(Address),
}

// =============================================================================
// TIMELOCK ERRORS
// =============================================================================

/// Errors surfaced by a timelocked contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimelockError {
    /// Execution attempted while `now <= earliest`.
    #[error("premature execution: now {now}, executable after {earliest}")]
    PrematureExecution {
        /// Simulated time of the attempt.
        now: u64,
        /// Recorded time bound.
        earliest: u64,
    },

    /// Deferred call submitted by someone other than the executor.
    #[error("unauthorized executor: caller {caller:?}, expected {expected:?}")]
    UnauthorizedExecutor {
        /// The rejected caller.
        caller: Address,
        /// The designated executor.
        expected: Address,
    },

    /// Privileged call proposed by someone other than the authority.
    #[error("unauthorized authority: caller {caller:?}, expected {expected:?}")]
    UnauthorizedAuthority {
        /// The rejected caller.
        caller: Address,
        /// The controller's authority.
        expected: Address,
    },

    /// The call names a contract that cannot execute it.
    #[error("unknown deferred-call target {0:?}")]
    UnknownTarget(Address),

    /// No pending call matches (never proposed or already executed).
    #[error("no pending deferred call matches the payload")]
    UnknownDeferredCall,

    /// The payload does not decode to a known privileged function.
    #[error("malformed call: {0}")]
    MalformedCall(String),

    /// A time bound does not fit in simulated time.
    #[error("time bound overflows: {base} + {offset}")]
    TimeOverflow {
        /// Time the bound is computed from.
        base: u64,
        /// Seconds added to it.
        offset: u64,
    },
}

// =============================================================================
// TESTS
// =============================================================================

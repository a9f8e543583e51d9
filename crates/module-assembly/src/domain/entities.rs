//! # Core Domain Entities
//!
//! Capability descriptors, module cuts, the live assembly state of a
//! composite, initializer calls and deferred governance calls.

use crate::domain::services::{address_word, encode_call, keccak256, uint_word};
use crate::domain::signature::FunctionSignature;
use crate::domain::value_objects::{Address, Bytes, FunctionFingerprint, Hash, U256};
use crate::errors::{AssemblyError, CutError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// CAPABILITY DESCRIPTOR
// =============================================================================

/// A named interface: an ordered list of function signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Interface name, e.g. `IERC20`.
    pub name: String,
    /// Declared functions in declaration order.
    pub functions: Vec<FunctionSignature>,
}

impl CapabilityDescriptor {
    /// Builds a descriptor from raw signature text, rejecting malformed input eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::MalformedSignature`] for the first bad signature.
    pub fn parse<I, S>(name: impl Into<String>, signatures: I) -> Result<Self, AssemblyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let functions = signatures
            .into_iter()
            .map(|s| FunctionSignature::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.into(),
            functions,
        })
    }
}

// =============================================================================
// MODULE CUT
// =============================================================================

/// What a cut does with its fingerprints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CutAction {
    /// Route new fingerprints to the module.
    Add,
    /// Re-route owned fingerprints to a different module.
    Replace,
    /// Drop fingerprints from the composite.
    Remove,
}

impl CutAction {
    /// Wire code of the action (`Add=0`, `Replace=1`, `Remove=2`).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Add => 0,
            Self::Replace => 1,
            Self::Remove => 2,
        }
    }

    /// Decodes a wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Add),
            1 => Some(Self::Replace),
            2 => Some(Self::Remove),
            _ => None,
        }
    }
}

/// Batch description of the fingerprints one module contributes.
///
/// Immutable once built; the fingerprint list is never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCut {
    module_address: Address,
    action: CutAction,
    fingerprints: Vec<FunctionFingerprint>,
}

impl ModuleCut {
    /// Creates a cut.
    ///
    /// # Errors
    ///
    /// Returns [`CutError::EmptyCut`] when `fingerprints` is empty.
    pub fn new(
        module_address: Address,
        action: CutAction,
        fingerprints: Vec<FunctionFingerprint>,
    ) -> Result<Self, CutError> {
        if fingerprints.is_empty() {
            return Err(CutError::EmptyCut(module_address));
        }
        Ok(Self {
            module_address,
            action,
            fingerprints,
        })
    }

    /// Shorthand for an `Add` cut.
    ///
    /// # Errors
    ///
    /// Same as [`ModuleCut::new`].
    pub fn add(
        module_address: Address,
        fingerprints: Vec<FunctionFingerprint>,
    ) -> Result<Self, CutError> {
        Self::new(module_address, CutAction::Add, fingerprints)
    }

    /// Module the fingerprints are routed to.
    #[must_use]
    pub const fn module_address(&self) -> Address {
        self.module_address
    }

    /// The cut action.
    #[must_use]
    pub const fn action(&self) -> CutAction {
        self.action
    }

    /// Fingerprints in cut order.
    #[must_use]
    pub fn fingerprints(&self) -> &[FunctionFingerprint] {
        &self.fingerprints
    }
}

/// One introspection row: a module and the fingerprints it owns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFacet {
    /// Module address.
    pub module_address: Address,
    /// Owned fingerprints, in the order they were added.
    pub fingerprints: Vec<FunctionFingerprint>,
}

// =============================================================================
// ASSEMBLY STATE
// =============================================================================

/// Live fingerprint routing table of a composite.
///
/// Each fingerprint has at most one owner. Modules keep first-insertion order
/// for introspection; a module left with no fingerprints disappears.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssemblyState {
    owners: HashMap<FunctionFingerprint, Address>,
    facets: Vec<ModuleFacet>,
}

impl AssemblyState {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a batch to a copy and returns it; `self` is untouched on error.
    ///
    /// # Errors
    ///
    /// Returns the first [`CutError`] encountered.
    pub fn with_cuts(&self, cuts: &[ModuleCut]) -> Result<Self, CutError> {
        let mut next = self.clone();
        for cut in cuts {
            next.apply(cut)?;
        }
        Ok(next)
    }

    /// Applies one cut in place.
    ///
    /// # Errors
    ///
    /// Returns a [`CutError`] describing the first rule violated. Fingerprints
    /// preceding the violation in the same cut stay applied, so callers that
    /// need atomicity go through [`AssemblyState::with_cuts`].
    pub fn apply(&mut self, cut: &ModuleCut) -> Result<(), CutError> {
        let module = cut.module_address();
        match cut.action() {
            CutAction::Add => {
                if module.is_zero() {
                    return Err(CutError::ZeroModuleAddress);
                }
                for &fp in cut.fingerprints() {
                    if let Some(&owner) = self.owners.get(&fp) {
                        return Err(CutError::AlreadyOwned {
                            fingerprint: fp,
                            owner,
                        });
                    }
                    self.assign(fp, module);
                }
            }
            CutAction::Replace => {
                if module.is_zero() {
                    return Err(CutError::ZeroModuleAddress);
                }
                for &fp in cut.fingerprints() {
                    let owner = *self
                        .owners
                        .get(&fp)
                        .ok_or(CutError::NotOwned { fingerprint: fp })?;
                    if owner == module {
                        return Err(CutError::ReplaceWithSameModule { fingerprint: fp });
                    }
                    self.unassign(fp, owner);
                    self.assign(fp, module);
                }
            }
            CutAction::Remove => {
                if !module.is_zero() {
                    return Err(CutError::RemoveWithModuleAddress(module));
                }
                for &fp in cut.fingerprints() {
                    let owner = *self
                        .owners
                        .get(&fp)
                        .ok_or(CutError::NotOwned { fingerprint: fp })?;
                    self.unassign(fp, owner);
                }
            }
        }
        Ok(())
    }

    fn assign(&mut self, fp: FunctionFingerprint, module: Address) {
        self.owners.insert(fp, module);
        match self.facets.iter_mut().find(|f| f.module_address == module) {
            Some(facet) => facet.fingerprints.push(fp),
            None => self.facets.push(ModuleFacet {
                module_address: module,
                fingerprints: vec![fp],
            }),
        }
    }

    fn unassign(&mut self, fp: FunctionFingerprint, owner: Address) {
        self.owners.remove(&fp);
        if let Some(facet) = self.facets.iter_mut().find(|f| f.module_address == owner) {
            facet.fingerprints.retain(|&owned| owned != fp);
        }
        self.facets.retain(|f| !f.fingerprints.is_empty());
    }

    /// Owner of a fingerprint, if any.
    #[must_use]
    pub fn module_of(&self, fp: FunctionFingerprint) -> Option<Address> {
        self.owners.get(&fp).copied()
    }

    /// All modules with their fingerprints.
    #[must_use]
    pub fn modules(&self) -> &[ModuleFacet] {
        &self.facets
    }

    /// Number of routed fingerprints.
    #[must_use]
    pub fn fingerprint_count(&self) -> usize {
        self.owners.len()
    }
}

// =============================================================================
// MODULE REFERENCES
// =============================================================================

/// A module instance that lives at an address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedModule {
    /// Module name (blueprint name).
    pub name: String,
    /// Instance address.
    pub address: Address,
}

/// How a plan refers to a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleRef {
    /// Deploy a fresh instance of the named module.
    ByName(String),
    /// Use an already deployed instance.
    ByInstance(DeployedModule),
}

impl ModuleRef {
    /// Human-readable label for logs and errors.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::ByName(name) => name,
            Self::ByInstance(module) => &module.name,
        }
    }
}

// =============================================================================
// INITIALIZER CALLS
// =============================================================================

/// One static argument of an initializer call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbiWord {
    /// Left-padded address.
    Address(Address),
    /// Big-endian unsigned integer.
    Uint(U256),
    /// 0 or 1.
    Bool(bool),
    /// Raw 32-byte word (`bytes32`).
    Word([u8; 32]),
}

impl AbiWord {
    /// 32-byte encoding.
    #[must_use]
    pub fn encode(&self) -> [u8; 32] {
        match self {
            Self::Address(addr) => address_word(*addr),
            Self::Uint(value) => uint_word(*value),
            Self::Bool(flag) => uint_word(U256::from(u8::from(*flag))),
            Self::Word(word) => *word,
        }
    }
}

/// A setup call bound to an initializer module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCall {
    /// Function invoked on the initializer.
    pub signature: FunctionSignature,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<AbiWord>,
}

impl InitCall {
    /// Creates a call.
    #[must_use]
    pub fn new(signature: FunctionSignature, args: Vec<AbiWord>) -> Self {
        Self { signature, args }
    }

    /// Opaque payload handed to the composite.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::InvalidInitializer`] when the argument count
    /// does not match the signature.
    pub fn encode(&self, module: &str) -> Result<Bytes, AssemblyError> {
        let expected = self.signature.params().len();
        if expected != self.args.len() {
            return Err(AssemblyError::InvalidInitializer {
                module: module.to_string(),
                reason: format!(
                    "{} takes {expected} argument(s), {} given",
                    self.signature,
                    self.args.len()
                ),
            });
        }
        let words: Vec<[u8; 32]> = self.args.iter().map(AbiWord::encode).collect();
        Ok(encode_call(self.signature.fingerprint(), &words))
    }
}

// =============================================================================
// DEFERRED CALLS
// =============================================================================

/// A privileged call that must wait for its time bound.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredCall {
    /// Encoded call to resubmit.
    pub encoded_call: Bytes,
    /// Exclusive lower bound: execution needs `now > earliest_execution_time`.
    pub earliest_execution_time: u64,
    /// Contract that recorded the proposal and will execute it.
    pub originating_contract: Address,
}

/// Lifecycle of a deferred call. There is no expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredCallStatus {
    /// Recorded, time bound not yet passed.
    Proposed,
    /// Time bound passed, awaiting the executor.
    Executable,
    /// Consumed.
    Executed,
}

impl DeferredCall {
    /// Stable identifier of the proposal.
    #[must_use]
    pub fn id(&self) -> Hash {
        let mut data = Vec::with_capacity(20 + 8 + self.encoded_call.len());
        data.extend_from_slice(self.originating_contract.as_bytes());
        data.extend_from_slice(&self.earliest_execution_time.to_be_bytes());
        data.extend_from_slice(self.encoded_call.as_slice());
        keccak256(&data)
    }

    /// True once `now` is strictly past the bound.
    #[must_use]
    pub const fn is_executable_at(&self, now: u64) -> bool {
        now > self.earliest_execution_time
    }

    /// Lifecycle state at `now`.
    #[must_use]
    pub const fn status(&self, now: u64, executed: bool) -> DeferredCallStatus {
        if executed {
            DeferredCallStatus::Executed
        } else if self.is_executable_at(now) {
            DeferredCallStatus::Executable
        } else {
            DeferredCallStatus::Proposed
        }
    }
}

/// Result of submitting a privileged call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    /// Executed right away.
    Immediate(Bytes),
    /// Recorded for later execution.
    Deferred(DeferredCall),
}

// =============================================================================
// TESTS
// =============================================================================

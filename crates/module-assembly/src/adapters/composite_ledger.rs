//! # Composite Ledger Adapter
//!
//! In-memory composite contracts. Each composite keeps an [`AssemblyState`],
//! its owner, and a log of initializer calls. Batches are applied to a copy
//! and committed only when every cut and the initializer pair are accepted.

use crate::domain::entities::{AssemblyState, ModuleCut, ModuleFacet};
use crate::domain::services::compute_module_address;
use crate::domain::value_objects::{Address, Bytes, FunctionFingerprint};
use crate::errors::AssemblyError;
use crate::ports::outbound::CompositeLedger;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// An initializer invocation recorded by a composite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitRecord {
    /// Initializer module.
    pub initializer: Address,
    /// Payload it was called with.
    pub payload: Bytes,
}

#[derive(Clone, Debug)]
struct CompositeRecord {
    owner: Address,
    state: AssemblyState,
    init_log: Vec<InitRecord>,
}

/// In-memory [`CompositeLedger`].
#[derive(Debug)]
pub struct InMemoryCompositeLedger {
    deployer: Address,
    nonce: Mutex<u64>,
    composites: RwLock<HashMap<Address, CompositeRecord>>,
}

impl InMemoryCompositeLedger {
    /// Ledger creating composites from `deployer`.
    #[must_use]
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            nonce: Mutex::new(0),
            composites: RwLock::new(HashMap::new()),
        }
    }

    /// Number of composites created.
    #[must_use]
    pub fn composite_count(&self) -> usize {
        self.composites.read().len()
    }

    /// Owner of a composite.
    #[must_use]
    pub fn owner_of(&self, composite: Address) -> Option<Address> {
        self.composites.read().get(&composite).map(|c| c.owner)
    }

    /// Initializer calls a composite has run, oldest first.
    #[must_use]
    pub fn init_log(&self, composite: Address) -> Vec<InitRecord> {
        self.composites
            .read()
            .get(&composite)
            .map(|c| c.init_log.clone())
            .unwrap_or_default()
    }

    fn next_address(&self) -> Address {
        let mut nonce = self.nonce.lock();
        let address = compute_module_address(self.deployer, *nonce);
        *nonce += 1;
        address
    }
}

/// Zero initializer needs an empty payload and vice versa.
fn check_initializer(
    initializer: Address,
    payload: &Bytes,
) -> Result<Option<InitRecord>, AssemblyError> {
    match (initializer.is_zero(), payload.is_empty()) {
        (true, true) => Ok(None),
        (true, false) => Err(AssemblyError::InitializationRejected(
            "initializer is zero but payload is not empty".to_string(),
        )),
        (false, true) => Err(AssemblyError::InitializationRejected(
            "payload is empty but initializer is not zero".to_string(),
        )),
        (false, false) => Ok(Some(InitRecord {
            initializer,
            payload: payload.clone(),
        })),
    }
}

#[async_trait]
impl CompositeLedger for InMemoryCompositeLedger {
    async fn assemble(
        &self,
        owner: Address,
        cuts: &[ModuleCut],
        initializer: Address,
        init_payload: &Bytes,
    ) -> Result<Address, AssemblyError> {
        let state = AssemblyState::new().with_cuts(cuts)?;
        let init = check_initializer(initializer, init_payload)?;

        let address = self.next_address();
        self.composites.write().insert(
            address,
            CompositeRecord {
                owner,
                state,
                init_log: init.into_iter().collect(),
            },
        );

        info!(
            composite = ?address,
            owner = ?owner,
            cuts = cuts.len(),
            "composite assembled"
        );
        Ok(address)
    }

    async fn apply_cuts(
        &self,
        caller: Address,
        composite: Address,
        cuts: &[ModuleCut],
        initializer: Address,
        init_payload: &Bytes,
    ) -> Result<(), AssemblyError> {
        let mut composites = self.composites.write();
        let record = composites
            .get_mut(&composite)
            .ok_or(AssemblyError::CompositeNotFound(composite))?;

        if caller != record.owner {
            warn!(composite = ?composite, caller = ?caller, "cut rejected: caller is not owner");
            return Err(AssemblyError::UnauthorizedAuthority {
                caller,
                expected: record.owner,
            });
        }

        let next = record.state.with_cuts(cuts)?;
        let init = check_initializer(initializer, init_payload)?;

        record.state = next;
        record.init_log.extend(init);
        debug!(composite = ?composite, cuts = cuts.len(), "cuts applied");
        Ok(())
    }

    async fn modules(&self, composite: Address) -> Result<Vec<ModuleFacet>, AssemblyError> {
        self.composites
            .read()
            .get(&composite)
            .map(|c| c.state.modules().to_vec())
            .ok_or(AssemblyError::CompositeNotFound(composite))
    }

    async fn module_of(
        &self,
        composite: Address,
        fingerprint: FunctionFingerprint,
    ) -> Result<Option<Address>, AssemblyError> {
        self.composites
            .read()
            .get(&composite)
            .map(|c| c.state.module_of(fingerprint))
            .ok_or(AssemblyError::CompositeNotFound(composite))
    }
}

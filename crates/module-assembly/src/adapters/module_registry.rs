//! # Module Registry Adapter
//!
//! In-memory module deployment for tests and dry runs.
//! Blueprints are named signature lists; deploying one allocates a
//! deterministic address from the deployer and a running nonce.

use crate::domain::entities::DeployedModule;
use crate::domain::services::compute_module_address;
use crate::domain::signature::FunctionSignature;
use crate::domain::value_objects::{Address, FunctionFingerprint};
use crate::errors::AssemblyError;
use crate::ports::outbound::ModuleFactory;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// What a module implements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleBlueprint {
    /// Module name.
    pub name: String,
    /// Functions the module exposes.
    pub functions: Vec<FunctionSignature>,
}

impl ModuleBlueprint {
    /// Builds a blueprint from raw signature text.
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

#[derive(Clone, Debug)]
struct Instance {
    name: String,
    fingerprints: Vec<FunctionFingerprint>,
}

/// In-memory [`ModuleFactory`].
#[derive(Debug)]
pub struct InMemoryModuleRegistry {
    deployer: Address,
    nonce: Mutex<u64>,
    blueprints: RwLock<HashMap<String, ModuleBlueprint>>,
    instances: RwLock<HashMap<Address, Instance>>,
}

impl InMemoryModuleRegistry {
    /// Registry deploying from `deployer`.
    #[must_use]
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            nonce: Mutex::new(0),
            blueprints: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or overwrite) a blueprint.
    pub fn register(&self, blueprint: ModuleBlueprint) {
        self.blueprints
            .write()
            .insert(blueprint.name.clone(), blueprint);
    }

    /// Builder-style [`InMemoryModuleRegistry::register`].
    #[must_use]
    pub fn with_blueprint(self, blueprint: ModuleBlueprint) -> Self {
        self.register(blueprint);
        self
    }

    /// Number of deployed instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    fn next_address(&self) -> Address {
        let mut nonce = self.nonce.lock();
        let address = compute_module_address(self.deployer, *nonce);
        *nonce += 1;
        address
    }
}

#[async_trait]
impl ModuleFactory for InMemoryModuleRegistry {
    async fn deploy(&self, name: &str) -> Result<DeployedModule, AssemblyError> {
        let blueprint = self
            .blueprints
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AssemblyError::ModuleNotFound {
                name: name.to_string(),
            })?;

        let address = self.next_address();
        let fingerprints = blueprint
            .functions
            .iter()
            .map(FunctionSignature::fingerprint)
            .collect();
        self.instances.write().insert(
            address,
            Instance {
                name: blueprint.name.clone(),
                fingerprints,
            },
        );

        debug!(module = %blueprint.name, address = ?address, "module deployed");
        Ok(DeployedModule {
            name: blueprint.name,
            address,
        })
    }

    async fn exposed_fingerprints(
        &self,
        address: Address,
    ) -> Result<Vec<FunctionFingerprint>, AssemblyError> {
        self.instances
            .read()
            .get(&address)
            .map(|instance| {
                debug!(
                    module = %instance.name,
                    count = instance.fingerprints.len(),
                    "read exposed fingerprints"
                );
                instance.fingerprints.clone()
            })
            .ok_or(AssemblyError::ModuleNotDeployed(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InMemoryModuleRegistry {
        InMemoryModuleRegistry::new(Address::repeat_byte(0xd0)).with_blueprint(
            ModuleBlueprint::parse("TokenModule", ["totalSupply()", "balanceOf(address)"]).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_deploy_allocates_distinct_addresses() {
        let registry = registry();
        let a = registry.deploy("TokenModule").await.unwrap();
        let b = registry.deploy("TokenModule").await.unwrap();
        assert_ne!(a.address, b.address);
        assert_eq!(a.name, "TokenModule");
        assert_eq!(registry.instance_count(), 2);
    }

    #[tokio::test]
    async fn test_deploy_unknown_module() {
        let err = registry().deploy("Nope").await.unwrap_err();
        assert_eq!(err, AssemblyError::ModuleNotFound { name: "Nope".into() });
    }

    #[tokio::test]
    async fn test_exposed_fingerprints_follow_blueprint() {
        let registry = registry();
        let module = registry.deploy("TokenModule").await.unwrap();
        let exposed = registry.exposed_fingerprints(module.address).await.unwrap();
        assert_eq!(
            exposed,
            vec![
                FunctionSignature::parse("totalSupply()").unwrap().fingerprint(),
                FunctionSignature::parse("balanceOf(address)").unwrap().fingerprint(),
            ]
        );
    }

    #[tokio::test]
    async fn test_exposed_fingerprints_unknown_address() {
        let err = registry()
            .exposed_fingerprints(Address::repeat_byte(1))
            .await
            .unwrap_err();
        assert_eq!(err, AssemblyError::ModuleNotDeployed(Address::repeat_byte(1)));
    }

    #[tokio::test]
    async fn test_addresses_are_reproducible() {
        let first = registry().deploy("TokenModule").await.unwrap();
        let second = registry().deploy("TokenModule").await.unwrap();
        assert_eq!(first.address, second.address);
    }
}

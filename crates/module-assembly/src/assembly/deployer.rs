//! # Module Deployer
//!
//! Turns one module reference into a module cut: resolve the instance, read
//! what it exposes, keep only required and non-excluded fingerprints.

use crate::domain::entities::{DeployedModule, ModuleCut, ModuleRef};
use crate::domain::indexer::SelectorIndex;
use crate::domain::value_objects::FunctionFingerprint;
use crate::errors::AssemblyError;
use crate::ports::outbound::ModuleFactory;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// O(1) membership test over fingerprints.
pub trait FingerprintFilter {
    /// True if `fp` is in the set.
    fn contains_fingerprint(&self, fp: &FunctionFingerprint) -> bool;
}

impl FingerprintFilter for HashSet<FunctionFingerprint> {
    fn contains_fingerprint(&self, fp: &FunctionFingerprint) -> bool {
        self.contains(fp)
    }
}

impl FingerprintFilter for SelectorIndex {
    fn contains_fingerprint(&self, fp: &FunctionFingerprint) -> bool {
        self.contains(fp)
    }
}

/// A deployed module together with the cut it contributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployedCut {
    /// The module instance.
    pub module: DeployedModule,
    /// Its `Add` cut.
    pub cut: ModuleCut,
}

/// Deploys modules through a [`ModuleFactory`] and packages their cuts.
pub struct ModuleDeployer<F: ModuleFactory> {
    factory: Arc<F>,
}

impl<F: ModuleFactory> ModuleDeployer<F> {
    /// Deployer backed by `factory`.
    pub fn new(factory: Arc<F>) -> Self {
        Self { factory }
    }

    /// Resolve a reference to a live instance, deploying when given a name.
    ///
    /// # Errors
    ///
    /// Propagates factory errors.
    pub async fn resolve(&self, module: &ModuleRef) -> Result<DeployedModule, AssemblyError> {
        match module {
            ModuleRef::ByName(name) => self.factory.deploy(name).await,
            ModuleRef::ByInstance(instance) => Ok(instance.clone()),
        }
    }

    /// Fingerprints a live instance exposes.
    ///
    /// # Errors
    ///
    /// Propagates factory errors.
    pub async fn exposed(
        &self,
        module: &DeployedModule,
    ) -> Result<Vec<FunctionFingerprint>, AssemblyError> {
        self.factory.exposed_fingerprints(module.address).await
    }

    /// Resolve `module` and build its cut from `exposed ∩ required \ excluded`.
    ///
    /// Order follows the instance's own declaration order; repeats are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::EmptyContribution`] when nothing survives the filter.
    #[instrument(skip_all, fields(module = module.label()))]
    pub async fn deploy<R, X>(
        &self,
        module: &ModuleRef,
        required: &R,
        excluded: Option<&X>,
    ) -> Result<DeployedCut, AssemblyError>
    where
        R: FingerprintFilter + Sync,
        X: FingerprintFilter + Sync,
    {
        let instance = self.resolve(module).await?;
        let exposed = self.exposed(&instance).await?;

        let mut seen = HashSet::new();
        let contributed: Vec<FunctionFingerprint> = exposed
            .into_iter()
            .filter(|fp| required.contains_fingerprint(fp))
            .filter(|fp| !excluded.is_some_and(|x| x.contains_fingerprint(fp)))
            .filter(|fp| seen.insert(*fp))
            .collect();

        if contributed.is_empty() {
            return Err(AssemblyError::EmptyContribution {
                module: instance.name,
            });
        }

        debug!(
            address = ?instance.address,
            fingerprints = contributed.len(),
            "module cut prepared"
        );
        let cut = ModuleCut::add(instance.address, contributed)?;
        Ok(DeployedCut {
            module: instance,
            cut,
        })
    }
}

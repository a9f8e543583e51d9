//! # Coverage Verifier
//!
//! Post-assembly check that every required fingerprint is routed by the live
//! composite.

use crate::domain::entities::ModuleFacet;
use crate::domain::indexer::SelectorIndex;
use crate::domain::invariants::{find_missing, find_shared_ownership};
use crate::domain::value_objects::{Address, FunctionFingerprint};
use crate::errors::AssemblyError;
use crate::ports::outbound::CompositeLedger;
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Successful verification summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    /// Verified composite.
    pub composite: Address,
    /// Module/fingerprint assignments as introspected.
    pub modules: Vec<ModuleFacet>,
    /// Number of required fingerprints.
    pub required: usize,
    /// Number of fingerprints the composite routes.
    pub exposed: usize,
}

impl CoverageReport {
    /// Module routing `fp`, if any.
    #[must_use]
    pub fn module_of(&self, fp: &FunctionFingerprint) -> Option<Address> {
        self.modules
            .iter()
            .find(|facet| facet.fingerprints.contains(fp))
            .map(|facet| facet.module_address)
    }
}

/// Checks composites against a [`SelectorIndex`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CoverageVerifier;

impl CoverageVerifier {
    /// Creates a verifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Verify that `composite` routes every fingerprint in `required`.
    ///
    /// # Errors
    ///
    /// - [`AssemblyError::CoverageGap`] listing unimplemented functions by name
    /// - Ledger errors from introspection
    #[instrument(skip_all, fields(composite = ?composite))]
    pub async fn verify<L: CompositeLedger + ?Sized>(
        &self,
        ledger: &L,
        composite: Address,
        required: &SelectorIndex,
    ) -> Result<CoverageReport, AssemblyError> {
        let modules = ledger.modules(composite).await?;

        let missing = find_missing(required, &modules);
        if !missing.is_empty() {
            let missing: Vec<String> = missing.iter().map(|fp| required.describe(fp)).collect();
            warn!(missing = ?missing, "coverage gap");
            return Err(AssemblyError::CoverageGap { missing });
        }

        // Single ownership is the ledger's job; only report it here.
        for (fp, owners) in find_shared_ownership(&modules) {
            warn!(fingerprint = %fp, owners = ?owners, "fingerprint routed by several modules");
        }

        let exposed: usize = modules.iter().map(|facet| facet.fingerprints.len()).sum();
        info!(
            modules = modules.len(),
            required = required.len(),
            exposed,
            "coverage verified"
        );
        Ok(CoverageReport {
            composite,
            modules,
            required: required.len(),
            exposed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryCompositeLedger;
    use crate::domain::entities::{CapabilityDescriptor, ModuleCut};
    use crate::domain::indexer::{index_descriptors, DuplicatePolicy};
    use crate::domain::value_objects::Bytes;

    const OWNER: Address = Address::repeat_byte(0xaa);

    fn required() -> SelectorIndex {
        index_descriptors(
            &[CapabilityDescriptor::parse("IToken", ["a()", "b(uint256)", "c(address)"]).unwrap()],
            DuplicatePolicy::Tolerate,
        )
        .unwrap()
    }

    async fn composite_with(ledger: &InMemoryCompositeLedger, sigs: &[&str]) -> Address {
        let index = required();
        let fps = sigs
            .iter()
            .map(|s| {
                index
                    .iter()
                    .find(|(_, f)| f.signature.canonical() == *s)
                    .map(|(fp, _)| *fp)
                    .unwrap()
            })
            .collect();
        let cut = ModuleCut::add(Address::repeat_byte(1), fps).unwrap();
        ledger
            .assemble(OWNER, &[cut], Address::ZERO, &Bytes::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_coverage_reports_counts() {
        let ledger = InMemoryCompositeLedger::new(Address::repeat_byte(0xcc));
        let composite = composite_with(&ledger, &["a()", "b(uint256)", "c(address)"]).await;

        let report = CoverageVerifier::new()
            .verify(&ledger, composite, &required())
            .await
            .unwrap();
        assert_eq!(report.composite, composite);
        assert_eq!(report.required, 3);
        assert_eq!(report.exposed, 3);
        assert_eq!(report.modules.len(), 1);
    }

    #[tokio::test]
    async fn test_gap_names_missing_function() {
        let ledger = InMemoryCompositeLedger::new(Address::repeat_byte(0xcc));
        let composite = composite_with(&ledger, &["a()", "c(address)"]).await;

        let err = CoverageVerifier::new()
            .verify(&ledger, composite, &required())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AssemblyError::CoverageGap {
                missing: vec!["IToken.b(uint256)".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_composite_propagates() {
        let ledger = InMemoryCompositeLedger::new(Address::repeat_byte(0xcc));
        let err = CoverageVerifier::new()
            .verify(&ledger, Address::repeat_byte(3), &required())
            .await
            .unwrap_err();
        assert_eq!(err, AssemblyError::CompositeNotFound(Address::repeat_byte(3)));
    }
}

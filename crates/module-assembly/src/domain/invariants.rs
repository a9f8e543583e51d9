//! # Domain Invariants
//!
//! Checks that must hold on a composite before it is considered usable:
//!
//! - every required fingerprint is exposed by some module
//! - no fingerprint is reported by more than one module

use crate::domain::entities::ModuleFacet;
use crate::domain::indexer::SelectorIndex;
use crate::domain::value_objects::{Address, FunctionFingerprint};
use std::collections::{HashMap, HashSet};

/// Required fingerprints absent from `facets`, in index order.
#[must_use]
pub fn find_missing(required: &SelectorIndex, facets: &[ModuleFacet]) -> Vec<FunctionFingerprint> {
    let mut remaining = required.to_set();
    for facet in facets {
        for fp in &facet.fingerprints {
            remaining.remove(fp);
        }
    }
    required
        .fingerprints()
        .filter(|fp| remaining.contains(fp))
        .copied()
        .collect()
}

/// Fingerprints listed under more than one module, with every claimant.
///
/// A consistent composite never produces any; the check guards against
/// introspection data coming from an external ledger.
#[must_use]
pub fn find_shared_ownership(facets: &[ModuleFacet]) -> Vec<(FunctionFingerprint, Vec<Address>)> {
    let mut claims: HashMap<FunctionFingerprint, Vec<Address>> = HashMap::new();
    let mut order = Vec::new();
    for facet in facets {
        let mut seen_in_facet = HashSet::new();
        for &fp in &facet.fingerprints {
            if !seen_in_facet.insert(fp) {
                continue;
            }
            let owners = claims.entry(fp).or_default();
            if owners.is_empty() {
                order.push(fp);
            }
            owners.push(facet.module_address);
        }
    }
    order
        .into_iter()
        .filter_map(|fp| {
            let owners = claims.remove(&fp)?;
            (owners.len() > 1).then_some((fp, owners))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CapabilityDescriptor;
    use crate::domain::indexer::{index_descriptors, DuplicatePolicy};
    use crate::domain::signature::FunctionSignature;

    fn fp(text: &str) -> FunctionFingerprint {
        FunctionSignature::parse(text).unwrap().fingerprint()
    }

    fn required() -> SelectorIndex {
        let d = CapabilityDescriptor::parse("I", ["a()", "b()", "c()"]).unwrap();
        index_descriptors(&[d], DuplicatePolicy::Tolerate).unwrap()
    }

    #[test]
    fn test_nothing_missing() {
        let facets = vec![
            ModuleFacet {
                module_address: Address::repeat_byte(1),
                fingerprints: vec![fp("a()"), fp("b()")],
            },
            ModuleFacet {
                module_address: Address::repeat_byte(2),
                fingerprints: vec![fp("c()"), fp("extra()")],
            },
        ];
        assert!(find_missing(&required(), &facets).is_empty());
    }

    #[test]
    fn test_missing_in_index_order() {
        let facets = vec![ModuleFacet {
            module_address: Address::repeat_byte(1),
            fingerprints: vec![fp("b()")],
        }];
        assert_eq!(find_missing(&required(), &facets), vec![fp("a()"), fp("c()")]);
    }

    #[test]
    fn test_shared_ownership_detected() {
        let facets = vec![
            ModuleFacet {
                module_address: Address::repeat_byte(1),
                fingerprints: vec![fp("a()"), fp("b()")],
            },
            ModuleFacet {
                module_address: Address::repeat_byte(2),
                fingerprints: vec![fp("b()")],
            },
        ];
        let shared = find_shared_ownership(&facets);
        assert_eq!(
            shared,
            vec![(fp("b()"), vec![Address::repeat_byte(1), Address::repeat_byte(2)])]
        );
    }
}

//! # Selector Indexer
//!
//! Builds the authoritative fingerprint → function map for a set of required
//! capability descriptors. The resulting [`SelectorIndex`] is an immutable
//! value threaded through deployment and verification.

use crate::domain::entities::CapabilityDescriptor;
use crate::domain::signature::FunctionSignature;
use crate::domain::value_objects::FunctionFingerprint;
use crate::errors::AssemblyError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How identical signatures declared by several descriptors are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first declaration; later ones are no-ops.
    #[default]
    Tolerate,
    /// Treat the overlap as an ambiguity.
    Reject,
}

/// An indexed function and the descriptor that declared it first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IndexedFunction {
    /// Canonical signature.
    pub signature: FunctionSignature,
    /// Name of the declaring descriptor.
    pub origin: String,
}

impl IndexedFunction {
    /// `Descriptor.signature(...)`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.origin, self.signature)
    }
}

/// Fingerprint → function map with insertion order preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectorIndex {
    entries: HashMap<FunctionFingerprint, IndexedFunction>,
    order: Vec<FunctionFingerprint>,
}

impl SelectorIndex {
    /// True if the fingerprint is required.
    #[must_use]
    pub fn contains(&self, fp: &FunctionFingerprint) -> bool {
        self.entries.contains_key(fp)
    }

    /// Function behind a fingerprint.
    #[must_use]
    pub fn resolve(&self, fp: &FunctionFingerprint) -> Option<&IndexedFunction> {
        self.entries.get(fp)
    }

    /// Human-readable name, falling back to the raw hex.
    #[must_use]
    pub fn describe(&self, fp: &FunctionFingerprint) -> String {
        self.resolve(fp)
            .map_or_else(|| fp.to_hex(), IndexedFunction::qualified_name)
    }

    /// Fingerprints in first-declaration order.
    pub fn fingerprints(&self) -> impl Iterator<Item = &FunctionFingerprint> {
        self.order.iter()
    }

    /// `(fingerprint, function)` pairs in first-declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FunctionFingerprint, &IndexedFunction)> {
        self.order.iter().map(|fp| (fp, &self.entries[fp]))
    }

    /// Required set as an owned hash set.
    #[must_use]
    pub fn to_set(&self) -> HashSet<FunctionFingerprint> {
        self.order.iter().copied().collect()
    }

    /// Number of distinct fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Computes the fingerprint of every function of every descriptor.
///
/// # Errors
///
/// - [`AssemblyError::FingerprintCollision`] when two distinct signatures share
///   a fingerprint.
/// - [`AssemblyError::AmbiguousSignature`] when `policy` is
///   [`DuplicatePolicy::Reject`] and a signature is declared twice across
///   descriptors.
pub fn index_descriptors(
    descriptors: &[CapabilityDescriptor],
    policy: DuplicatePolicy,
) -> Result<SelectorIndex, AssemblyError> {
    let mut index = SelectorIndex::default();

    for descriptor in descriptors {
        for signature in &descriptor.functions {
            let fp = signature.fingerprint();
            match index.entries.get(&fp) {
                Some(existing) if existing.signature != *signature => {
                    return Err(AssemblyError::FingerprintCollision {
                        fingerprint: fp,
                        existing: existing.qualified_name(),
                        incoming: format!("{}.{}", descriptor.name, signature),
                    });
                }
                Some(existing) => {
                    if policy == DuplicatePolicy::Reject && existing.origin != descriptor.name {
                        return Err(AssemblyError::AmbiguousSignature {
                            signature: signature.canonical(),
                            first: existing.origin.clone(),
                            second: descriptor.name.clone(),
                        });
                    }
                }
                None => {
                    index.order.push(fp);
                    index.entries.insert(
                        fp,
                        IndexedFunction {
                            signature: signature.clone(),
                            origin: descriptor.name.clone(),
                        },
                    );
                }
            }
        }
    }

    Ok(index)
}

//! # Domain Layer (Inner Hexagon)
//!
//! Pure assembly logic: signatures, fingerprints, cuts, routing state and
//! deferred-call descriptors. No I/O and no async.

pub mod entities;
pub mod indexer;
pub mod invariants;
pub mod services;
pub mod signature;
pub mod value_objects;

pub use entities::*;
pub use indexer::*;
pub use invariants::*;
pub use services::*;
pub use signature::*;
pub use value_objects::*;

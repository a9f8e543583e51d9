//! # Adapters Layer (Outer Hexagon)
//!
//! In-memory implementations of every port, used by tests and by the
//! `module-assembly` dry-run binary. A production deployment would replace
//! them with adapters that talk to a real chain.

pub mod clock;
pub mod composite_ledger;
pub mod controller;
pub mod module_registry;

pub use clock::*;
pub use composite_ledger::*;
pub use controller::*;
pub use module_registry::*;

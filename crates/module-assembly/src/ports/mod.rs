//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the assembly pipeline and the execution
//! environment. No concrete implementations live here; see `adapters`.

pub mod outbound;

pub use outbound::*;

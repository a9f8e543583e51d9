//! # Assembly Pipeline
//!
//! Deployment, composite assembly and coverage verification over the ports.

pub mod builder;
pub mod deployer;
pub mod verifier;

pub use builder::{Assembly, AssemblyBuilder, AssemblyPlan, InitializerSpec, ModuleSpec};
pub use deployer::{DeployedCut, FingerprintFilter, ModuleDeployer};
pub use verifier::{CoverageReport, CoverageVerifier};

//! # Assembly Builder
//!
//! Orchestrates one assembly run:
//!
//! 1. Index the required descriptors
//! 2. Deploy every module and compute its cut (secondary modules included)
//! 3. Resolve the initializer and encode every init payload
//! 4. Assemble the composite with the primary cuts in one atomic batch
//! 5. Apply each secondary module's cut with its own initializer call
//!
//! Nothing reaches the ledger until steps 1-3 have succeeded for every module.

use crate::assembly::deployer::{DeployedCut, ModuleDeployer};
use crate::assembly::verifier::{CoverageReport, CoverageVerifier};
use crate::domain::entities::{CapabilityDescriptor, DeployedModule, InitCall, ModuleRef};
use crate::domain::indexer::{index_descriptors, DuplicatePolicy, SelectorIndex};
use crate::domain::value_objects::{Address, Bytes, FunctionFingerprint};
use crate::errors::AssemblyError;
use crate::ports::outbound::{
    Clock, CompositeLedger, CompositeRegistry, DeferredExecution, ModuleFactory,
};
use crate::timelock::{Resolution, TimelockSimulator};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// One module of a plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleSpec {
    /// Module to deploy or reuse.
    pub module: ModuleRef,
    /// Fingerprints this module must not route even if it implements them.
    pub excluded: HashSet<FunctionFingerprint>,
    /// When set, the module is secondary: its cut is applied after assembly
    /// together with this call on the module itself.
    pub post_init: Option<InitCall>,
}

impl ModuleSpec {
    /// Deploy a fresh instance of `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            module: ModuleRef::ByName(name.into()),
            excluded: HashSet::new(),
            post_init: None,
        }
    }

    /// Reuse an existing instance.
    #[must_use]
    pub fn instance(module: DeployedModule) -> Self {
        Self {
            module: ModuleRef::ByInstance(module),
            excluded: HashSet::new(),
            post_init: None,
        }
    }

    /// Exclude fingerprints from this module's cut.
    #[must_use]
    pub fn excluding(
        mut self,
        fingerprints: impl IntoIterator<Item = FunctionFingerprint>,
    ) -> Self {
        self.excluded.extend(fingerprints);
        self
    }

    /// Make the module secondary with `call` as its setup.
    #[must_use]
    pub fn with_post_init(mut self, call: InitCall) -> Self {
        self.post_init = Some(call);
        self
    }
}

/// The module that performs one-time setup during assembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitializerSpec {
    /// Initializer module.
    pub module: ModuleRef,
    /// Setup call.
    pub call: InitCall,
}

/// Everything needed to assemble one composite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyPlan {
    /// Modules in deployment order.
    pub modules: Vec<ModuleSpec>,
    /// Setup run during assembly.
    pub initializer: InitializerSpec,
    /// Owner of the composite; the only identity allowed to cut it.
    pub authority: Address,
}

/// A finished assembly run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assembly {
    /// Run identifier, also recorded on the tracing span.
    pub run_id: Uuid,
    /// Composite address.
    pub composite: Address,
    /// Owner of the composite.
    pub authority: Address,
    /// Required fingerprints.
    pub index: SelectorIndex,
    /// Cuts applied in the assembling batch.
    pub cuts: Vec<DeployedCut>,
    /// Cuts applied afterwards, one per secondary module.
    pub secondary: Vec<DeployedCut>,
    /// Initializer instance.
    pub initializer: DeployedModule,
}

impl Assembly {
    /// Every deployed module, primary first.
    pub fn modules(&self) -> impl Iterator<Item = &DeployedModule> {
        self.cuts
            .iter()
            .chain(self.secondary.iter())
            .map(|deployed| &deployed.module)
    }
}

struct PreparedSecondary {
    deployed: DeployedCut,
    payload: Bytes,
}

/// Assembles composites from descriptors and a plan.
pub struct AssemblyBuilder<F: ModuleFactory, L: CompositeLedger> {
    deployer: ModuleDeployer<F>,
    ledger: Arc<L>,
    policy: DuplicatePolicy,
    verifier: CoverageVerifier,
}

impl<F: ModuleFactory, L: CompositeLedger> AssemblyBuilder<F, L> {
    /// Builder deploying through `factory` onto `ledger`.
    pub fn new(factory: Arc<F>, ledger: Arc<L>) -> Self {
        Self {
            deployer: ModuleDeployer::new(factory),
            ledger,
            policy: DuplicatePolicy::default(),
            verifier: CoverageVerifier::new(),
        }
    }

    /// Set how signatures declared by several descriptors are handled.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run steps 1-5. Never returns a partially assembled composite.
    ///
    /// # Errors
    ///
    /// - Indexing errors (`FingerprintCollision`, `AmbiguousSignature`)
    /// - `EmptyContribution` for a module that contributes nothing
    /// - `InvalidInitializer` when a setup call does not match its module
    /// - Ledger errors, including `UnauthorizedAuthority`, unchanged
    pub async fn build(
        &self,
        descriptors: &[CapabilityDescriptor],
        plan: &AssemblyPlan,
    ) -> Result<Assembly, AssemblyError> {
        self.run(Uuid::new_v4(), descriptors, plan).await
    }

    /// [`AssemblyBuilder::build`] followed by coverage verification.
    ///
    /// # Errors
    ///
    /// As for `build`, plus `CoverageGap`.
    pub async fn build_and_verify(
        &self,
        descriptors: &[CapabilityDescriptor],
        plan: &AssemblyPlan,
    ) -> Result<(Assembly, CoverageReport), AssemblyError> {
        let assembly = self.build(descriptors, plan).await?;
        let report = self.verify(&assembly).await?;
        Ok((assembly, report))
    }

    /// Re-check coverage of a finished assembly.
    ///
    /// # Errors
    ///
    /// `CoverageGap` or ledger errors.
    pub async fn verify(&self, assembly: &Assembly) -> Result<CoverageReport, AssemblyError> {
        self.verifier
            .verify(self.ledger.as_ref(), assembly.composite, &assembly.index)
            .await
    }

    /// Attach a finished composite to a central controller, going through
    /// the controller's timelock when it defers the call.
    ///
    /// # Errors
    ///
    /// `Timelock` errors from submission or execution.
    #[instrument(skip_all, fields(run_id = %assembly.run_id, composite = ?assembly.composite))]
    pub async fn attach_to_controller<R, C, E>(
        &self,
        assembly: &Assembly,
        registry: &R,
        timelock: &TimelockSimulator<C, E>,
    ) -> Result<Resolution, AssemblyError>
    where
        R: CompositeRegistry,
        C: Clock,
        E: DeferredExecution,
    {
        let resolution = timelock
            .run(registry.register_composite(assembly.authority, assembly.composite))
            .await?;
        info!(deferred = resolution.was_deferred(), "composite attached to controller");
        Ok(resolution)
    }

    #[instrument(skip_all, fields(run_id = %run_id, modules = plan.modules.len()))]
    async fn run(
        &self,
        run_id: Uuid,
        descriptors: &[CapabilityDescriptor],
        plan: &AssemblyPlan,
    ) -> Result<Assembly, AssemblyError> {
        let index = index_descriptors(descriptors, self.policy)?;
        debug!(required = index.len(), "descriptors indexed");

        let mut cuts = Vec::new();
        let mut secondary = Vec::new();
        for spec in &plan.modules {
            let deployed = self
                .deployer
                .deploy(&spec.module, &index, Some(&spec.excluded))
                .await?;
            match &spec.post_init {
                Some(call) => {
                    let payload = self.encode_setup(&deployed.module, call).await?;
                    secondary.push(PreparedSecondary { deployed, payload });
                }
                None => cuts.push(deployed),
            }
        }

        let initializer = self.deployer.resolve(&plan.initializer.module).await?;
        let init_payload = self.encode_setup(&initializer, &plan.initializer.call).await?;

        let primary: Vec<_> = cuts.iter().map(|deployed| deployed.cut.clone()).collect();
        let composite = self
            .ledger
            .assemble(plan.authority, &primary, initializer.address, &init_payload)
            .await?;
        info!(composite = ?composite, cuts = primary.len(), "composite assembled");

        let mut applied = Vec::with_capacity(secondary.len());
        for PreparedSecondary { deployed, payload } in secondary {
            self.ledger
                .apply_cuts(
                    plan.authority,
                    composite,
                    std::slice::from_ref(&deployed.cut),
                    deployed.module.address,
                    &payload,
                )
                .await?;
            debug!(module = %deployed.module.name, "secondary module wired");
            applied.push(deployed);
        }

        Ok(Assembly {
            run_id,
            composite,
            authority: plan.authority,
            index,
            cuts,
            secondary: applied,
            initializer,
        })
    }

    /// Encode `call` for `module`, checking the module implements it.
    async fn encode_setup(
        &self,
        module: &DeployedModule,
        call: &InitCall,
    ) -> Result<Bytes, AssemblyError> {
        let exposed = self.deployer.exposed(module).await?;
        if !exposed.contains(&call.signature.fingerprint()) {
            return Err(AssemblyError::InvalidInitializer {
                module: module.name.clone(),
                reason: format!("does not implement {}", call.signature),
            });
        }
        call.encode(&module.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        ControllerConfig, InMemoryCompositeLedger, InMemoryController, InMemoryModuleRegistry,
        ModuleBlueprint, SimulatedClock,
    };
    use crate::domain::entities::AbiWord;
    use crate::domain::signature::FunctionSignature;
    use crate::domain::value_objects::U256;

    const AUTHORITY: Address = Address::repeat_byte(0xaa);

    fn fp(text: &str) -> FunctionFingerprint {
        FunctionSignature::parse(text).unwrap().fingerprint()
    }

    fn init_call() -> InitCall {
        InitCall::new(
            FunctionSignature::parse("init(uint256)").unwrap(),
            vec![AbiWord::Uint(U256::from(100))],
        )
    }

    fn descriptors() -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::parse("IToken", ["a()", "b()"]).unwrap(),
            CapabilityDescriptor::parse("IAdmin", ["c()"]).unwrap(),
        ]
    }

    fn builder() -> (
        Arc<InMemoryModuleRegistry>,
        Arc<InMemoryCompositeLedger>,
        AssemblyBuilder<InMemoryModuleRegistry, InMemoryCompositeLedger>,
    ) {
        let registry = Arc::new(
            InMemoryModuleRegistry::new(Address::repeat_byte(0xd0))
                .with_blueprint(ModuleBlueprint::parse("Token", ["a()", "b()"]).unwrap())
                .with_blueprint(
                    ModuleBlueprint::parse("Admin", ["c()", "setup(address)"]).unwrap(),
                )
                .with_blueprint(ModuleBlueprint::parse("Empty", ["z()"]).unwrap())
                .with_blueprint(ModuleBlueprint::parse("Init", ["init(uint256)"]).unwrap()),
        );
        let ledger = Arc::new(InMemoryCompositeLedger::new(Address::repeat_byte(0xcc)));
        let builder = AssemblyBuilder::new(Arc::clone(&registry), Arc::clone(&ledger));
        (registry, ledger, builder)
    }

    fn plan(modules: Vec<ModuleSpec>) -> AssemblyPlan {
        AssemblyPlan {
            modules,
            initializer: InitializerSpec {
                module: ModuleRef::ByName("Init".into()),
                call: init_call(),
            },
            authority: AUTHORITY,
        }
    }

    fn admin_setup() -> InitCall {
        InitCall::new(
            FunctionSignature::parse("setup(address)").unwrap(),
            vec![AbiWord::Address(AUTHORITY)],
        )
    }

    #[tokio::test]
    async fn test_build_and_verify_full_plan() {
        let (_, ledger, builder) = builder();
        let plan = plan(vec![
            ModuleSpec::named("Token"),
            ModuleSpec::named("Admin").with_post_init(admin_setup()),
        ]);

        let (assembly, report) = builder.build_and_verify(&descriptors(), &plan).await.unwrap();

        assert_eq!(assembly.cuts.len(), 1);
        assert_eq!(assembly.secondary.len(), 1);
        let names: Vec<&str> = assembly.modules().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Token", "Admin"]);
        assert_eq!(report.exposed, 3);
        assert_eq!(ledger.owner_of(assembly.composite), Some(AUTHORITY));

        let log = ledger.init_log(assembly.composite);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].initializer, assembly.initializer.address);
        assert_eq!(log[1].initializer, assembly.secondary[0].module.address);
    }

    #[tokio::test]
    async fn test_empty_module_fails_before_any_cut() {
        let (_, ledger, builder) = builder();
        let plan = plan(vec![
            ModuleSpec::named("Token"),
            ModuleSpec::named("Admin"),
            ModuleSpec::named("Empty").with_post_init(admin_setup()),
        ]);

        let err = builder.build(&descriptors(), &plan).await.unwrap_err();
        assert_eq!(
            err,
            AssemblyError::EmptyContribution {
                module: "Empty".into()
            }
        );
        assert_eq!(ledger.composite_count(), 0);
    }

    #[tokio::test]
    async fn test_initializer_must_implement_setup() {
        let (_, ledger, builder) = builder();
        let mut plan = plan(vec![ModuleSpec::named("Token"), ModuleSpec::named("Admin")]);
        plan.initializer.module = ModuleRef::ByName("Token".into());

        let err = builder.build(&descriptors(), &plan).await.unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::InvalidInitializer { ref module, .. } if module == "Token"
        ));
        assert_eq!(ledger.composite_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_instance_is_reused() {
        let (registry, ledger, builder) = builder();
        let token = registry.deploy("Token").await.unwrap();
        let plan = plan(vec![
            ModuleSpec::instance(token.clone()),
            ModuleSpec::named("Admin"),
        ]);

        let (assembly, _) = builder.build_and_verify(&descriptors(), &plan).await.unwrap();
        assert_eq!(assembly.cuts[0].module, token);
        assert_eq!(
            ledger.module_of(assembly.composite, fp("a()")).await.unwrap(),
            Some(token.address)
        );
    }

    #[tokio::test]
    async fn test_exclusion_leaves_gap() {
        let (_, _, builder) = builder();
        let plan = plan(vec![
            ModuleSpec::named("Token").excluding([fp("b()")]),
            ModuleSpec::named("Admin"),
        ]);

        let err = builder
            .build_and_verify(&descriptors(), &plan)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AssemblyError::CoverageGap {
                missing: vec!["IToken.b()".into()]
            }
        );
    }

    #[tokio::test]
    async fn test_reject_policy_surfaces_ambiguity() {
        let (_, _, builder) = builder();
        let builder = builder.with_duplicate_policy(DuplicatePolicy::Reject);
        let mut descriptors = descriptors();
        descriptors.push(CapabilityDescriptor::parse("IOther", ["a()"]).unwrap());

        let err = builder
            .build(&descriptors, &plan(vec![ModuleSpec::named("Token")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::AmbiguousSignature { .. }));
    }

    #[tokio::test]
    async fn test_attach_to_controller_through_timelock() {
        let (_, _, builder) = builder();
        let plan = plan(vec![ModuleSpec::named("Token"), ModuleSpec::named("Admin")]);
        let assembly = builder.build(&descriptors(), &plan).await.unwrap();

        let clock = Arc::new(SimulatedClock::starting_at(5_000));
        let executor = Address::repeat_byte(0xe1);
        let controller = Arc::new(InMemoryController::new(
            ControllerConfig {
                address: Address::repeat_byte(0xc1),
                authority: AUTHORITY,
                executor,
                delay_secs: 600,
            },
            Arc::clone(&clock),
        ));
        let timelock =
            TimelockSimulator::new(Arc::clone(&clock), Arc::clone(&controller), executor);

        let resolution = builder
            .attach_to_controller(&assembly, controller.as_ref(), &timelock)
            .await
            .unwrap();
        assert!(resolution.was_deferred());
        assert!(controller.is_registered(assembly.composite));
        assert_eq!(clock.current(), 5_601);
    }
}

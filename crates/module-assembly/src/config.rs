//! Configuration: logging from the environment, assembly settings and the
//! JSON manifest the CLI runs.

use crate::adapters::{
    ControllerConfig, InMemoryModuleRegistry, ModuleBlueprint, DEFAULT_GENESIS_TIME,
};
use crate::assembly::{AssemblyPlan, InitializerSpec, ModuleSpec};
use crate::domain::entities::{CapabilityDescriptor, InitCall, ModuleRef};
use crate::domain::indexer::DuplicatePolicy;
use crate::domain::signature::FunctionSignature;
use crate::domain::value_objects::Address;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Default deployer of module and composite addresses.
pub const DEFAULT_DEPLOYER: Address = Address::repeat_byte(0xde);

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error or a full `EnvFilter` string)
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl LoggingConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MA_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `MA_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("MA_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("MA_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Settings of an assembly run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Handling of signatures declared by several descriptors.
    pub duplicate_policy: DuplicatePolicy,

    /// Address modules and composites are deployed from.
    pub deployer: Address,

    /// Delay of the central controller's timelock, in seconds.
    pub controller_delay_secs: u64,

    /// Start of simulated time.
    pub genesis_time: u64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Tolerate,
            deployer: DEFAULT_DEPLOYER,
            controller_delay_secs: 0,
            genesis_time: DEFAULT_GENESIS_TIME,
        }
    }
}

/// Errors raised while loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Manifest path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not a valid manifest.
    #[error("invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One module entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestModule {
    /// Blueprint to deploy.
    pub name: String,

    /// Functions this module must not route.
    #[serde(default)]
    pub exclude: Vec<FunctionSignature>,

    /// Setup call that makes the module secondary.
    #[serde(default)]
    pub post_init: Option<InitCall>,
}

/// The initializer entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestInitializer {
    /// Blueprint of the initializer.
    pub module: String,

    /// Setup call.
    pub call: InitCall,
}

/// Central controller a composite is attached to after assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestController {
    /// Controller address.
    pub address: Address,

    /// Designated executor of deferred calls.
    pub executor: Address,
}

/// A complete, self-contained assembly description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyManifest {
    /// Owner of the composite.
    pub authority: Address,

    /// Run settings.
    #[serde(default)]
    pub config: AssemblyConfig,

    /// Required capability descriptors.
    pub descriptors: Vec<CapabilityDescriptor>,

    /// Modules that can be deployed.
    pub blueprints: Vec<ModuleBlueprint>,

    /// Modules to wire in, in order.
    pub modules: Vec<ManifestModule>,

    /// Setup run during assembly.
    pub initializer: ManifestInitializer,

    /// Optional controller to attach the composite to.
    #[serde(default)]
    pub controller: Option<ManifestController>,
}

impl AssemblyManifest {
    /// Load a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse a manifest from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid JSON or malformed signatures.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The plan this manifest describes.
    #[must_use]
    pub fn plan(&self) -> AssemblyPlan {
        let modules = self
            .modules
            .iter()
            .map(|entry| {
                let spec = ModuleSpec::named(entry.name.clone())
                    .excluding(entry.exclude.iter().map(FunctionSignature::fingerprint));
                match &entry.post_init {
                    Some(call) => spec.with_post_init(call.clone()),
                    None => spec,
                }
            })
            .collect();

        AssemblyPlan {
            modules,
            initializer: InitializerSpec {
                module: ModuleRef::ByName(self.initializer.module.clone()),
                call: self.initializer.call.clone(),
            },
            authority: self.authority,
        }
    }

    /// Module registry preloaded with every blueprint.
    #[must_use]
    pub fn registry(&self) -> InMemoryModuleRegistry {
        self.blueprints
            .iter()
            .cloned()
            .fold(InMemoryModuleRegistry::new(self.config.deployer), |registry, blueprint| {
                registry.with_blueprint(blueprint)
            })
    }

    /// Controller settings, if a controller is configured.
    #[must_use]
    pub fn controller_config(&self) -> Option<ControllerConfig> {
        self.controller.as_ref().map(|controller| ControllerConfig {
            address: controller.address,
            authority: self.authority,
            executor: controller.executor,
            delay_secs: self.config.controller_delay_secs,
        })
    }
}

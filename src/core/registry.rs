// src/core/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::core::errors::RunnerError;
use crate::core::modules::{AuthModule, CheckModule, ClientModule, FileModule, PostModule, ReconModule};
use crate::core::probe::ProbeContext;

/// Builds a check module bound to a target.
pub type ModuleFactory = fn(Arc<ProbeContext>) -> Box<dyn CheckModule>;

/// The built-in check modules. The lowercase variant name is the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ModuleKind {
    Recon,
    Auth,
    Client,
    File,
    Post,
}

impl ModuleKind {
    pub fn factory(self) -> ModuleFactory {
        match self {
            ModuleKind::Recon => ReconModule::boxed,
            ModuleKind::Auth => AuthModule::boxed,
            ModuleKind::Client => ClientModule::boxed,
            ModuleKind::File => FileModule::boxed,
            ModuleKind::Post => PostModule::boxed,
        }
    }
}

/// A registry entry.
#[derive(Clone)]
pub struct ModuleSpec {
    pub identifier: String,
    pub factory: ModuleFactory,
}

impl ModuleSpec {
    pub fn new(identifier: impl Into<String>, factory: ModuleFactory) -> Self {
        Self { identifier: identifier.into(), factory }
    }
}

/// Lookup from module identifier to constructor.
///
/// Resolution performs no I/O; every call builds a fresh module instance.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    specs: HashMap<String, ModuleSpec>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every [`ModuleKind`].
    pub fn with_default_modules() -> Self {
        ModuleKind::iter().fold(Self::new(), |registry, kind| {
            registry.register(ModuleSpec::new(kind.as_ref(), kind.factory()))
        })
    }

    /// Adds a module, replacing any entry with the same identifier.
    pub fn register(mut self, spec: ModuleSpec) -> Self {
        self.specs.insert(spec.identifier.clone(), spec);
        self
    }

    pub fn resolve(&self, identifier: &str, ctx: &Arc<ProbeContext>) -> Result<Box<dyn CheckModule>, RunnerError> {
        self.specs
            .get(identifier)
            .map(|spec| (spec.factory)(Arc::clone(ctx)))
            .ok_or_else(|| RunnerError::UnknownModule(identifier.to_string()))
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// The process-wide registry of built-in modules.
pub static DEFAULT_REGISTRY: Lazy<ModuleRegistry> = Lazy::new(ModuleRegistry::with_default_modules);

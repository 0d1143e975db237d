//! Registration modes and registry rows

use crate::{
    contract::Contract,
    instance::Instance,
    key::{RegistryKey, TypeKey},
    mapping::MappingDirective,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Lifetime of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterMode {
    /// New instance on every resolution
    Transient,
    /// One instance per container, promoted into descendants
    ContainerSingleton,
    /// Container singleton that may still be built fresh when forced
    ContainerWeakSingleton,
    /// One instance per container tree; root only
    UniversalSingleton,
}

impl RegisterMode {
    pub fn is_singleton(&self) -> bool {
        !matches!(self, RegisterMode::Transient)
    }

    /// Singleton held per container (promotable)
    pub fn is_container_scoped(&self) -> bool {
        matches!(
            self,
            RegisterMode::ContainerSingleton | RegisterMode::ContainerWeakSingleton
        )
    }
}

impl fmt::Display for RegisterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RegisterMode::Transient => "transient",
            RegisterMode::ContainerSingleton => "container singleton",
            RegisterMode::ContainerWeakSingleton => "container weak singleton",
            RegisterMode::UniversalSingleton => "universal singleton",
        };
        f.write_str(label)
    }
}

/// Modes accepted for pre-built instances and creator functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SingletonMode {
    ContainerSingleton,
    ContainerWeakSingleton,
    UniversalSingleton,
}

impl From<SingletonMode> for RegisterMode {
    fn from(mode: SingletonMode) -> Self {
        match mode {
            SingletonMode::ContainerSingleton => RegisterMode::ContainerSingleton,
            SingletonMode::ContainerWeakSingleton => RegisterMode::ContainerWeakSingleton,
            SingletonMode::UniversalSingleton => RegisterMode::UniversalSingleton,
        }
    }
}

/// Zero-argument factory used for demand creation
pub type Creator = Arc<dyn Fn() -> anyhow::Result<Instance> + Send + Sync>;

/// One row of a container registry.
///
/// The cached instance is filled on first materialization. Two threads racing
/// to materialize the same entry may both build; the last write wins.
pub struct RegistrationEntry {
    pub mode: RegisterMode,
    pub contract: Contract,
    pub concrete: TypeKey,
    pub priority: Option<String>,
    pub creator: Option<Creator>,
    pub lazy: bool,
    pub mapping: Option<MappingDirective>,
    instance: RwLock<Option<Instance>>,
}

impl RegistrationEntry {
    pub fn new(mode: RegisterMode, contract: Contract, concrete: TypeKey) -> Self {
        Self {
            mode,
            contract,
            concrete,
            priority: None,
            creator: None,
            lazy: false,
            mapping: None,
            instance: RwLock::new(None),
        }
    }

    pub fn with_priority(mut self, priority: Option<String>) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_instance(self, instance: Instance) -> Self {
        *self.instance.write() = Some(instance);
        self
    }

    /// Lazy entry materialized through `creator`
    pub fn with_creator(mut self, creator: Creator) -> Self {
        self.creator = Some(creator);
        self.lazy = true;
        self
    }

    pub fn with_mapping(mut self, mapping: Option<MappingDirective>) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn key(&self) -> RegistryKey {
        RegistryKey::new(self.contract.key(), self.priority.clone())
    }

    pub fn instance(&self) -> Option<Instance> {
        self.instance.read().clone()
    }

    pub fn has_instance(&self) -> bool {
        self.instance.read().is_some()
    }

    pub(crate) fn store(&self, instance: Instance) {
        *self.instance.write() = Some(instance);
    }

    /// Copy of this entry holding `instance`, as used by singleton promotion
    pub(crate) fn promoted(&self, instance: Instance) -> Self {
        Self {
            mode: self.mode,
            contract: self.contract,
            concrete: self.concrete,
            priority: self.priority.clone(),
            creator: self.creator.clone(),
            lazy: self.lazy,
            mapping: self.mapping.clone(),
            instance: RwLock::new(Some(instance)),
        }
    }
}

impl fmt::Debug for RegistrationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationEntry")
            .field("mode", &self.mode)
            .field("contract", &self.contract.key())
            .field("concrete", &self.concrete)
            .field("priority", &self.priority)
            .field("lazy", &self.lazy)
            .field("materialized", &self.has_instance())
            .finish()
    }
}

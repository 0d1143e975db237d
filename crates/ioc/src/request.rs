//! Resolution requests

use crate::{
    contract::Contract,
    key::{RegistryKey, TypeKey},
    mapping::MappingLevel,
};
use serde::{Deserialize, Serialize};

/// Strategy for a resolution request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolveMode {
    /// Follow the registration's mode
    AsRegistered,
    /// Build fresh, subject to the cascade level
    Transient,
}

/// How many recursion levels are forced into fresh construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CascadeLevel {
    None,
    Current,
    CurrentWithDependencies,
    CascadeAll,
}

impl CascadeLevel {
    /// Level applied to the dependencies of the object being built
    pub fn for_dependencies(self) -> Self {
        match self {
            CascadeLevel::CurrentWithDependencies => CascadeLevel::Current,
            CascadeLevel::Current => CascadeLevel::None,
            other => other,
        }
    }
}

impl From<MappingLevel> for CascadeLevel {
    fn from(level: MappingLevel) -> Self {
        match level {
            MappingLevel::None => CascadeLevel::None,
            MappingLevel::Current => CascadeLevel::Current,
            MappingLevel::CurrentWithDependencies => CascadeLevel::CurrentWithDependencies,
            MappingLevel::CascadeAll => CascadeLevel::CascadeAll,
        }
    }
}

/// A single resolution step handed to the engine
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub mode: ResolveMode,
    pub priority_key: Option<String>,
    /// Parameter or property name, for diagnostics and mapping providers
    pub contract_name: Option<String>,
    pub contract: Contract,
    /// Type that declared this dependency
    pub parent: Option<TypeKey>,
    /// Concrete type to build instead of the contract
    pub concrete: Option<TypeKey>,
    pub cascade: CascadeLevel,
}

impl ResolveRequest {
    pub fn new(contract: Contract, mode: ResolveMode) -> Self {
        Self {
            mode,
            priority_key: None,
            contract_name: None,
            contract,
            parent: None,
            concrete: None,
            cascade: CascadeLevel::None,
        }
    }

    pub fn keyed(mut self, priority_key: Option<String>) -> Self {
        self.priority_key = priority_key;
        self
    }

    pub fn cascade(mut self, cascade: CascadeLevel) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.contract_name = Some(name.into());
        self
    }

    pub fn contract_key(&self) -> TypeKey {
        self.contract.key()
    }

    pub fn registry_key(&self) -> RegistryKey {
        RegistryKey::new(self.contract.key(), self.priority_key.clone())
    }
}

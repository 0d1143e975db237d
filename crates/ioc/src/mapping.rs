//! External mapping providers consulted before the registry

use crate::{instance::Instance, key::TypeKey};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// Where a resolved value is being injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjectionTarget {
    Constructor,
    Property,
    All,
}

/// How deep a mapping provider stays in effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingLevel {
    None,
    /// Only the requested object
    Current,
    /// The requested object and its direct dependencies
    CurrentWithDependencies,
    /// Every level below
    CascadeAll,
}

impl MappingLevel {
    /// Level handed to the dependencies of the current object
    pub fn degrade(self) -> Self {
        match self {
            MappingLevel::Current => MappingLevel::None,
            MappingLevel::CurrentWithDependencies => MappingLevel::Current,
            other => other,
        }
    }
}

/// Answer of a mapping provider
#[derive(Debug, Clone)]
pub struct Mapped {
    pub instance: Option<Instance>,
    pub target: InjectionTarget,
}

impl Mapped {
    pub fn none() -> Self {
        Self {
            instance: None,
            target: InjectionTarget::All,
        }
    }

    pub fn value(instance: Instance, target: InjectionTarget) -> Self {
        Self {
            instance: Some(instance),
            target,
        }
    }
}

/// Pluggable resolver for values the registry cannot supply, typically
/// configuration strings and numbers keyed by parameter name.
pub trait MappingProvider: Send + Sync {
    fn resolve(
        &self,
        contract: &TypeKey,
        contract_name: Option<&str>,
        parent: Option<&TypeKey>,
    ) -> Mapped;
}

impl<F> MappingProvider for F
where
    F: Fn(&TypeKey, Option<&str>, Option<&TypeKey>) -> Mapped + Send + Sync,
{
    fn resolve(
        &self,
        contract: &TypeKey,
        contract_name: Option<&str>,
        parent: Option<&TypeKey>,
    ) -> Mapped {
        self(contract, contract_name, parent)
    }
}

/// Provider plus its remaining depth and the injection target of the
/// request it accompanies
#[derive(Clone)]
pub struct MappingDirective {
    pub provider: Option<Arc<dyn MappingProvider>>,
    pub level: MappingLevel,
    pub target: InjectionTarget,
}

impl MappingDirective {
    pub fn new(provider: Arc<dyn MappingProvider>, level: MappingLevel) -> Self {
        Self {
            provider: Some(provider),
            level,
            target: InjectionTarget::All,
        }
    }

    pub fn none() -> Self {
        Self {
            provider: None,
            level: MappingLevel::None,
            target: InjectionTarget::All,
        }
    }

    pub fn is_active(&self) -> bool {
        self.provider.is_some() && self.level != MappingLevel::None
    }

    /// Directive for a dependency injected through `target`
    pub fn for_dependency(&self, target: InjectionTarget) -> Self {
        Self {
            provider: self.provider.clone(),
            level: self.level.degrade(),
            target,
        }
    }

    /// Ask the provider; `None` when inactive, empty, or aimed at another target
    pub(crate) fn consult(
        &self,
        contract: &TypeKey,
        contract_name: Option<&str>,
        parent: Option<&TypeKey>,
    ) -> Option<Instance> {
        if !self.is_active() {
            return None;
        }
        let provider = self.provider.as_ref()?;
        let mapped = provider.resolve(contract, contract_name, parent);
        let target_matches = self.target == InjectionTarget::All || mapped.target == self.target;
        if target_matches {
            mapped.instance
        } else {
            None
        }
    }
}

impl Default for MappingDirective {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for MappingDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingDirective")
            .field("provider", &self.provider.is_some())
            .field("level", &self.level)
            .field("target", &self.target)
            .finish()
    }
}

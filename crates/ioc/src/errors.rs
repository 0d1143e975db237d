//! Error types for registration and resolution

use crate::{
    container::ContainerId,
    key::{RegistryKey, TypeKey, TypeShape},
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors surfaced by container operations
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("registration of {key} rejected: {reason}")]
    RegistrationRejected { key: RegistryKey, reason: RejectReason },

    #[error("failed to construct {concrete}: {cause}")]
    ConstructionFailed {
        concrete: TypeKey,
        cause: ConstructionCause,
    },

    #[error("container {container} is disposed")]
    Disposed { container: ContainerId },

    #[error("override callback already installed on container {container}")]
    OverrideAlreadyInstalled { container: ContainerId },

    #[error("resolved instance of {actual} cannot be viewed as {expected}")]
    TypeMismatch { expected: TypeKey, actual: TypeKey },
}

/// Why a registration was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("key already registered")]
    Duplicate,

    #[error("concrete type is {0} and cannot be registered")]
    InvalidConcrete(TypeShape),

    #[error("universal singletons may only be registered in the root container")]
    UniversalOutsideRoot,

    #[error("{concrete} is not assignable to {contract}")]
    NotAssignable { contract: TypeKey, concrete: TypeKey },

    #[error("a pre-built instance requires a singleton mode")]
    InstanceRequiresSingleton,
}

/// Why a construction attempt failed
#[derive(Error, Debug)]
pub enum ConstructionCause {
    #[error("no blueprint described for the concrete type")]
    NoBlueprint,

    #[error("no usable constructor")]
    NoConstructor,

    #[error("type cannot be constructed directly")]
    InvalidConcrete(TypeShape),

    #[error("parameter '{parameter}' of {owner} is a value type and no mapping provider supplied it")]
    ValueDependency { parameter: String, owner: TypeKey },

    #[error("circular dependency: {}", format_chain(.chain))]
    CircularDependency { chain: Vec<TypeKey> },

    #[error("dependency '{parameter}' could not be resolved: {source}")]
    Dependency {
        parameter: String,
        #[source]
        source: Box<ContainerError>,
    },

    #[error("constructor returned an error: {0}")]
    Constructor(String),

    #[error("built instance is not assignable to {contract}")]
    NotAssignable { contract: TypeKey },
}

fn format_chain(chain: &[TypeKey]) -> String {
    chain
        .iter()
        .map(|key| key.short_name())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl ContainerError {
    pub fn rejected(key: RegistryKey, reason: RejectReason) -> Self {
        Self::RegistrationRejected { key, reason }
    }

    pub fn construction(concrete: TypeKey, cause: ConstructionCause) -> Self {
        Self::ConstructionFailed { concrete, cause }
    }

    /// Reject reason if this is a registration error
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::RegistrationRejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Innermost construction cause, following dependency chains
    pub fn root_cause(&self) -> Option<&ConstructionCause> {
        match self {
            Self::ConstructionFailed { cause, .. } => match cause {
                ConstructionCause::Dependency { source, .. } => {
                    source.root_cause().or(Some(cause))
                }
                _ => Some(cause),
            },
            _ => None,
        }
    }

    pub fn is_circular(&self) -> bool {
        matches!(
            self.root_cause(),
            Some(ConstructionCause::CircularDependency { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_error_messages() {
        let err = ContainerError::rejected(RegistryKey::of::<Alpha>(), RejectReason::Duplicate);
        assert!(err.to_string().contains("key already registered"));
        assert_eq!(err.reject_reason(), Some(&RejectReason::Duplicate));

        let err = ContainerError::construction(
            TypeKey::of::<Alpha>(),
            ConstructionCause::CircularDependency {
                chain: vec![TypeKey::of::<Alpha>(), TypeKey::of::<Beta>(), TypeKey::of::<Alpha>()],
            },
        );
        assert!(err.to_string().contains("Alpha -> Beta -> Alpha"));
        assert!(err.is_circular());
    }

    #[test]
    fn test_root_cause_follows_dependencies() {
        let inner = ContainerError::construction(TypeKey::of::<Beta>(), ConstructionCause::NoBlueprint);
        let outer = ContainerError::construction(
            TypeKey::of::<Alpha>(),
            ConstructionCause::Dependency {
                parameter: "beta".into(),
                source: Box::new(inner),
            },
        );
        assert!(matches!(outer.root_cause(), Some(ConstructionCause::NoBlueprint)));
        assert!(!outer.is_circular());
    }
}

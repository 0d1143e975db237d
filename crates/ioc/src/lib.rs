//! Hierarchical dependency-resolution container.
//!
//! Containers form a tree. Each one owns a registry of contract → concrete
//! mappings and resolves requests against its own entries first, then its
//! ancestors. Container-scoped singletons registered in an ancestor are
//! promoted into the requesting container on first use, so every scope gets
//! its own instance; universal singletons live only in the root and are
//! shared by the whole tree.

mod builder;
pub mod catalog;
mod collection;
pub mod config;
pub mod container;
pub mod contract;
mod engine;
pub mod entry;
pub mod errors;
pub mod events;
pub mod instance;
pub mod key;
pub mod mapping;
mod register;
mod registry;
pub mod request;
mod resolve;
mod stats;

// Containers and the tree
pub use container::{Container, ContainerId, ContainerRef, Diagnosis, OverrideCallback};

// Type descriptions
pub use catalog::{Arguments, Blueprint, Catalog, Constructor, Injectable, Parameter};
pub use contract::Contract;

// Registration
pub use entry::{Creator, RegisterMode, RegistrationEntry, SingletonMode};
pub use register::Registration;

// Resolution
pub use mapping::{InjectionTarget, Mapped, MappingDirective, MappingLevel, MappingProvider};
pub use request::{CascadeLevel, ResolveMode, ResolveRequest};
pub use resolve::Resolution;

pub use config::{ConfigLoader, ContainerConfig, ErrorPolicy};
pub use errors::{ConstructionCause, ContainerError, RejectReason, Result};
pub use events::{ContainerEvent, Listener};
pub use instance::Instance;
pub use key::{RegistryKey, TypeKey, TypeShape};
pub use stats::{ContainerStats, SkippedItem};

//! Typed registration surface.
//!
//! Every path ends in [`Container::register_entry`], which validates the entry
//! and applies the container's [`ErrorPolicy`]: under `Raise` a rejected
//! registration is an error, under `Suppress` it is logged and reported as
//! `Ok(false)`.

use crate::{
    catalog::Injectable,
    config::ErrorPolicy,
    container::Container,
    contract::Contract,
    entry::{Creator, RegisterMode, RegistrationEntry, SingletonMode},
    errors::{ContainerError, RejectReason, Result},
    instance::Instance,
    key::{RegistryKey, TypeKey},
    mapping::{MappingDirective, MappingLevel, MappingProvider},
};
use std::{marker::PhantomData, sync::Arc};
use tracing::{debug, warn};

enum Source {
    Build,
    Instance(Instance),
    Creator(Creator),
}

/// Builder for a single registration, see [`Container::bind`]
#[must_use = "a registration does nothing until `register` is called"]
pub struct Registration<'a, C: ?Sized> {
    container: &'a Container,
    contract: Contract,
    concrete: TypeKey,
    priority: Option<String>,
    mode: RegisterMode,
    source: Source,
    mapping: Option<MappingDirective>,
    _contract: PhantomData<fn() -> Arc<C>>,
}

impl<'a, C: ?Sized + Send + Sync + 'static> Registration<'a, C> {
    fn new(container: &'a Container, concrete: TypeKey, mode: RegisterMode, source: Source) -> Self {
        Self {
            container,
            contract: Contract::of::<C>(),
            concrete,
            priority: None,
            mode,
            source,
            mapping: None,
            _contract: PhantomData,
        }
    }

    pub fn keyed(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn mode(mut self, mode: RegisterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Mapping provider used whenever this entry is materialized without one
    pub fn mapped(mut self, provider: Arc<dyn MappingProvider>, level: MappingLevel) -> Self {
        self.mapping = Some(MappingDirective::new(provider, level));
        self
    }

    pub fn register(self) -> Result<bool> {
        let mut entry = RegistrationEntry::new(self.mode, self.contract, self.concrete)
            .with_priority(self.priority)
            .with_mapping(self.mapping);

        match self.source {
            Source::Build => {}
            Source::Creator(creator) => entry = entry.with_creator(creator),
            Source::Instance(value) => {
                let contract = self.contract.key();
                match self.container.catalog().convert(&value, &contract) {
                    Some(instance) => entry = entry.with_instance(instance),
                    None => {
                        let key = entry.key();
                        return self.container.apply_policy(
                            &key,
                            Err(ContainerError::rejected(
                                key.clone(),
                                RejectReason::NotAssignable {
                                    contract,
                                    concrete: value.type_key(),
                                },
                            )),
                        );
                    }
                }
            }
        }

        self.container.register_entry(entry)
    }
}

impl Container {
    /// Register `T` as its own contract
    pub fn register<T: Injectable>(&self, mode: RegisterMode) -> Result<bool> {
        self.bind::<T, T>().mode(mode).register()
    }

    pub fn register_keyed<T: Injectable>(&self, priority: &str, mode: RegisterMode) -> Result<bool> {
        self.bind::<T, T>().keyed(priority).mode(mode).register()
    }

    /// Register `T` under the contract `C`; `T` must declare `C` in its
    /// blueprint or through [`Catalog::implements`](crate::Catalog::implements)
    pub fn register_as<C, T>(&self, mode: RegisterMode) -> Result<bool>
    where
        C: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        self.bind::<C, T>().mode(mode).register()
    }

    /// Register a pre-built value as its own contract
    pub fn register_instance<T>(&self, value: T, mode: SingletonMode) -> Result<bool>
    where
        T: Send + Sync + 'static,
    {
        self.bind_instance::<T, T>(value).mode(mode.into()).register()
    }

    /// Register a pre-built value of an [`Injectable`] type. Its blueprint is
    /// described too, so descendants can promote their own instance.
    pub fn register_injectable_instance<T: Injectable>(
        &self,
        value: T,
        mode: SingletonMode,
    ) -> Result<bool> {
        self.catalog().describe::<T>();
        self.register_instance(value, mode)
    }

    /// Register a lazily created singleton
    pub fn register_creator<T, F>(&self, creator: F, mode: SingletonMode) -> Result<bool>
    where
        T: Send + Sync + 'static,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.bind_creator::<T, T, F>(creator).mode(mode.into()).register()
    }

    /// Start a registration of `T` under `C`, built through its blueprint.
    /// Defaults to [`RegisterMode::ContainerSingleton`].
    pub fn bind<C, T>(&self) -> Registration<'_, C>
    where
        C: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        self.catalog().describe::<T>();
        Registration::new(
            self,
            TypeKey::of::<T>(),
            RegisterMode::ContainerSingleton,
            Source::Build,
        )
    }

    pub fn bind_instance<C, T>(&self, value: T) -> Registration<'_, C>
    where
        C: ?Sized + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        Registration::new(
            self,
            TypeKey::of::<T>(),
            RegisterMode::ContainerSingleton,
            Source::Instance(Instance::from_value(value)),
        )
    }

    pub fn bind_creator<C, T, F>(&self, creator: F) -> Registration<'_, C>
    where
        C: ?Sized + Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let creator: Creator = Arc::new(move || creator().map(Instance::from_value));
        Registration::new(
            self,
            TypeKey::of::<T>(),
            RegisterMode::ContainerSingleton,
            Source::Creator(creator),
        )
    }

    /// Validate and insert a prepared entry
    pub fn register_entry(&self, entry: RegistrationEntry) -> Result<bool> {
        let key = entry.key();
        let outcome = self.insert_validated(key.clone(), entry);
        self.apply_policy(&key, outcome)
    }

    fn apply_policy(&self, key: &RegistryKey, outcome: Result<()>) -> Result<bool> {
        match outcome {
            Ok(()) => Ok(true),
            Err(err) => match self.error_policy() {
                ErrorPolicy::Raise => Err(err),
                ErrorPolicy::Suppress => {
                    warn!("Registration of {} in {} suppressed: {}", key, self.label(), err);
                    Ok(false)
                }
            },
        }
    }

    fn insert_validated(&self, key: RegistryKey, entry: RegistrationEntry) -> Result<()> {
        self.ensure_active()?;
        let reject = |reason| Err(ContainerError::rejected(key.clone(), reason));

        if entry.mode == RegisterMode::UniversalSingleton && !self.is_root() {
            return reject(RejectReason::UniversalOutsideRoot);
        }

        if self.inner.registry.contains(&key) || self.universal_entry(&key).is_some() {
            return reject(RejectReason::Duplicate);
        }

        let shape = entry.concrete.shape();
        if !shape.is_registrable() {
            return reject(RejectReason::InvalidConcrete(shape));
        }

        let contract = entry.contract.key();
        if !self.catalog().is_assignable(&entry.concrete, &contract) {
            return reject(RejectReason::NotAssignable {
                contract,
                concrete: entry.concrete,
            });
        }

        if !entry.mode.is_singleton() && (entry.has_instance() || entry.creator.is_some()) {
            return reject(RejectReason::InstanceRequiresSingleton);
        }

        let entry = Arc::new(entry);
        let eager = self.config().eager_singletons;
        if eager && entry.mode.is_singleton() && !entry.lazy && !entry.has_instance() {
            self.materialize(&entry, None, MappingDirective::none(), &mut Vec::new())?;
        }

        if !self.inner.registry.insert(key.clone(), entry.clone()) {
            return reject(RejectReason::Duplicate);
        }

        debug!(
            "Registered {} -> {} as {} in {}",
            key,
            entry.concrete,
            entry.mode,
            self.label()
        );
        Ok(())
    }
}

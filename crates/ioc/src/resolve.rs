//! Typed resolution surface

use crate::{
    catalog::Injectable,
    container::Container,
    contract::Contract,
    errors::{ContainerError, Result},
    instance::Instance,
    key::TypeKey,
    mapping::{MappingDirective, MappingLevel, MappingProvider},
    request::{CascadeLevel, ResolveMode, ResolveRequest},
};
use std::{marker::PhantomData, sync::Arc};
use tracing::debug;

/// Builder for one resolution, see [`Container::resolution`]
#[must_use = "a resolution does nothing until `resolve` is called"]
pub struct Resolution<'a, T: ?Sized> {
    container: &'a Container,
    contract: Contract,
    priority: Option<String>,
    mode: ResolveMode,
    cascade: Option<CascadeLevel>,
    mapping: Option<(Arc<dyn MappingProvider>, MappingLevel)>,
    current_only_as_transient: bool,
    _contract: PhantomData<fn() -> Arc<T>>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> Resolution<'a, T> {
    fn new(container: &'a Container, contract: Contract) -> Self {
        Self {
            container,
            contract,
            priority: None,
            mode: ResolveMode::AsRegistered,
            cascade: None,
            mapping: None,
            current_only_as_transient: false,
            _contract: PhantomData,
        }
    }

    pub fn keyed(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the cascade level derived from mode and mapping
    pub fn cascade(mut self, cascade: CascadeLevel) -> Self {
        self.cascade = Some(cascade);
        self
    }

    pub fn mapped(mut self, provider: Arc<dyn MappingProvider>, level: MappingLevel) -> Self {
        self.mapping = Some((provider, level));
        self
    }

    /// In `AsRegistered` mode, build the requested object itself fresh and
    /// resolve its dependencies as registered
    pub fn current_only_as_transient(mut self) -> Self {
        self.current_only_as_transient = true;
        self
    }

    fn plan(&self) -> (ResolveRequest, MappingDirective) {
        let (default_cascade, directive) = match &self.mapping {
            None => {
                let cascade = match self.mode {
                    ResolveMode::AsRegistered => CascadeLevel::None,
                    ResolveMode::Transient => CascadeLevel::Current,
                };
                (cascade, MappingDirective::none())
            }
            Some((provider, level)) => {
                let cascade = match self.mode {
                    ResolveMode::AsRegistered => CascadeLevel::Current,
                    ResolveMode::Transient => CascadeLevel::from(*level),
                };
                (cascade, MappingDirective::new(provider.clone(), *level))
            }
        };

        let request = ResolveRequest::new(self.contract, self.mode)
            .keyed(self.priority.clone())
            .cascade(self.cascade.unwrap_or(default_cascade));
        (request, directive)
    }

    /// Resolve without downcasting
    pub fn resolve_instance(self) -> Result<Instance> {
        self.container.ensure_active()?;
        self.container.inner.stats.resolution();

        let (mut request, directive) = self.plan();
        let mut trail = Vec::new();
        if self.current_only_as_transient && self.mode == ResolveMode::AsRegistered {
            request.concrete = Some(request.contract_key());
            return self.container.build(request, directive, &mut trail);
        }
        self.container.dispatch(request, directive, &mut trail)
    }

    pub fn resolve(self) -> Result<Arc<T>> {
        let instance = self.resolve_instance()?;
        instance
            .downcast::<T>()
            .ok_or_else(|| ContainerError::TypeMismatch {
                expected: TypeKey::of::<T>(),
                actual: instance.type_key(),
            })
    }

    /// `None` instead of an error
    pub fn try_resolve(self) -> Option<Arc<T>> {
        let contract = self.contract.key();
        match self.resolve() {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("Could not resolve {}: {}", contract, err);
                None
            }
        }
    }
}

impl Container {
    /// Start a resolution of the contract `T`
    pub fn resolution<T: ?Sized + Send + Sync + 'static>(&self) -> Resolution<'_, T> {
        Resolution::new(self, Contract::of::<T>())
    }

    /// Resolution of `T` that describes it in the catalog on demand
    pub fn resolution_of<T: Injectable>(&self) -> Resolution<'_, T> {
        Resolution::new(self, Contract::injectable::<T>())
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolution::<T>().resolve()
    }

    pub fn resolve_keyed<T: ?Sized + Send + Sync + 'static>(&self, priority: &str) -> Result<Arc<T>> {
        self.resolution::<T>().keyed(priority).resolve()
    }

    /// Force fresh construction down to `level`
    pub fn resolve_transient<T: ?Sized + Send + Sync + 'static>(
        &self,
        level: CascadeLevel,
    ) -> Result<Arc<T>> {
        self.resolution::<T>()
            .mode(ResolveMode::Transient)
            .cascade(level)
            .resolve()
    }

    pub fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolution::<T>().try_resolve()
    }

    /// Every registration of `T` visible from this container, closer
    /// registrations shadowing ancestors with the same key. Fails when
    /// nothing resolves.
    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        let instance = Resolution::<Vec<Arc<T>>>::new(self, Contract::sequence_of::<T>()).resolve()?;
        Ok(instance.as_ref().clone())
    }

    /// Run a prepared request through the engine
    pub fn resolve_request(
        &self,
        request: ResolveRequest,
        directive: MappingDirective,
    ) -> Result<Instance> {
        self.ensure_active()?;
        self.inner.stats.resolution();
        self.dispatch(request, directive, &mut Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{Blueprint, Constructor},
        entry::RegisterMode,
        mapping::{InjectionTarget, Mapped},
    };

    struct Settings {
        retries: u32,
    }

    impl Injectable for Settings {
        fn blueprint() -> Blueprint<Self> {
            Blueprint::new().constructor(
                Constructor::new(|mut args| {
                    Ok(Settings {
                        retries: args.take_value::<u32>()?,
                    })
                })
                .param::<u32>("retries"),
            )
        }
    }

    fn retries_provider(value: u32) -> Arc<dyn MappingProvider> {
        Arc::new(
            move |contract: &TypeKey, name: Option<&str>, _: Option<&TypeKey>| {
                if *contract == TypeKey::of::<u32>() && name == Some("retries") {
                    Mapped::value(Instance::from_value(value), InjectionTarget::Constructor)
                } else {
                    Mapped::none()
                }
            },
        )
    }

    #[test]
    fn test_plan_defaults() {
        let root = Container::new();
        let (request, directive) = root.resolution::<Settings>().plan();
        assert_eq!(request.cascade, CascadeLevel::None);
        assert!(!directive.is_active());

        let (request, _) = root
            .resolution::<Settings>()
            .mode(ResolveMode::Transient)
            .plan();
        assert_eq!(request.cascade, CascadeLevel::Current);

        let (request, directive) = root
            .resolution::<Settings>()
            .mapped(retries_provider(1), MappingLevel::CurrentWithDependencies)
            .plan();
        assert_eq!(request.cascade, CascadeLevel::Current);
        assert_eq!(directive.level, MappingLevel::CurrentWithDependencies);

        let (request, _) = root
            .resolution::<Settings>()
            .mode(ResolveMode::Transient)
            .mapped(retries_provider(1), MappingLevel::CascadeAll)
            .plan();
        assert_eq!(request.cascade, CascadeLevel::CascadeAll);
    }

    #[test]
    fn test_mapped_resolution() -> Result<()> {
        let root = Container::new();
        let settings = root
            .resolution_of::<Settings>()
            .mapped(retries_provider(3), MappingLevel::CurrentWithDependencies)
            .resolve()?;
        assert_eq!(settings.retries, 3);
        Ok(())
    }

    #[test]
    fn test_current_only_as_transient_skips_cache() -> Result<()> {
        let root = Container::new();
        root.bind::<Settings, Settings>()
            .mapped(retries_provider(5), MappingLevel::CascadeAll)
            .mode(RegisterMode::ContainerSingleton)
            .register()?;

        let cached = root.resolve::<Settings>()?;
        let again = root.resolve::<Settings>()?;
        assert!(Arc::ptr_eq(&cached, &again));

        let fresh = root
            .resolution::<Settings>()
            .mapped(retries_provider(7), MappingLevel::CurrentWithDependencies)
            .current_only_as_transient()
            .resolve()?;
        assert!(!Arc::ptr_eq(&cached, &fresh));
        assert_eq!(fresh.retries, 7);
        Ok(())
    }

    #[test]
    fn test_try_resolve_and_disposed() {
        let root = Container::new();
        assert!(root.try_resolve::<Settings>().is_none());
        root.dispose();
        assert!(matches!(
            root.resolve::<Settings>(),
            Err(ContainerError::Disposed { .. })
        ));
    }
}

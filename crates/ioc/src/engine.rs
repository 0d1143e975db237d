//! Resolution engine.
//!
//! Every request passes through the same states: interception by the
//! override callback, the universal-singleton check at the root, then mode
//! dispatch. `AsRegistered` follows the registration found in the chain and
//! promotes inherited container singletons; `Transient` builds fresh while the
//! cascade level allows it and otherwise defers back to `AsRegistered`.
//! Unregistered contracts fall through to transient construction.

use crate::{
    container::Container,
    entry::{RegisterMode, RegistrationEntry},
    errors::{ConstructionCause, ContainerError, Result},
    instance::Instance,
    key::{TypeKey, TypeShape},
    mapping::MappingDirective,
    request::{CascadeLevel, ResolveMode, ResolveRequest},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Concrete types currently under construction, outermost first
pub(crate) type Trail = Vec<TypeKey>;

impl Container {
    pub(crate) fn dispatch(
        &self,
        request: ResolveRequest,
        directive: MappingDirective,
        trail: &mut Trail,
    ) -> Result<Instance> {
        if let Some(instance) = self.intercept(&request) {
            return Ok(instance);
        }

        if let Some((root, entry)) = self.universal_entry(&request.registry_key()) {
            debug!(
                "Resolved {} from universal singleton of root {}",
                request.registry_key(),
                root.label()
            );
            return root.materialize(&entry, Some(&request), directive, trail);
        }

        match request.mode {
            ResolveMode::AsRegistered => self.resolve_as_registered(request, directive, trail),
            ResolveMode::Transient => self.resolve_as_transient(request, directive, trail),
        }
    }

    fn intercept(&self, request: &ResolveRequest) -> Option<Instance> {
        let callback = self.inner.override_callback.get()?;
        let value = callback(request, &self.id())?;
        match self.catalog().convert(&value, &request.contract_key()) {
            Some(converted) => {
                debug!("Override supplied {} in {}", request.contract_key(), self.label());
                Some(converted)
            }
            None => {
                debug!(
                    "Ignoring override value of type {} for contract {}",
                    value.type_key(),
                    request.contract_key()
                );
                None
            }
        }
    }

    fn resolve_as_registered(
        &self,
        mut request: ResolveRequest,
        directive: MappingDirective,
        trail: &mut Trail,
    ) -> Result<Instance> {
        if let Some(collection) = self.resolve_collection(&request, &directive, trail) {
            return Ok(collection);
        }

        if let Some(mapped) = self.consult_mapping(&request, &directive) {
            return Ok(mapped);
        }

        let Some((entry, inherited)) = self.find_entry(&request) else {
            request.mode = ResolveMode::Transient;
            if request.cascade == CascadeLevel::None {
                request.cascade = CascadeLevel::Current;
            }
            debug!(
                "{} is not registered, resolving as transient",
                request.registry_key()
            );
            return self.dispatch(request, directive, trail);
        };

        request.concrete = Some(entry.concrete);

        if inherited && entry.mode.is_container_scoped() && !self.inner.stop_at_boundary {
            return self.promote(&entry, request, directive, trail);
        }

        if entry.mode.is_singleton() {
            self.materialize(&entry, Some(&request), directive, trail)
        } else {
            self.build(request, directive, trail)
        }
    }

    fn resolve_as_transient(
        &self,
        mut request: ResolveRequest,
        directive: MappingDirective,
        trail: &mut Trail,
    ) -> Result<Instance> {
        if let Some(collection) = self.resolve_collection(&request, &directive, trail) {
            return Ok(collection);
        }

        if request.concrete.is_none() {
            request.concrete = Some(request.contract_key());
        }

        if let Some(mapped) = self.consult_mapping(&request, &directive) {
            return Ok(mapped);
        }

        let found = self.find_entry(&request);
        if let Some((entry, _)) = &found {
            request.concrete = Some(entry.concrete);
        }

        let concrete = request.concrete.unwrap_or_else(|| request.contract_key());
        if concrete.shape() == TypeShape::Value {
            return Err(ContainerError::construction(
                concrete,
                ConstructionCause::ValueDependency {
                    parameter: request
                        .contract_name
                        .clone()
                        .unwrap_or_else(|| "<unnamed>".to_string()),
                    owner: request.parent.unwrap_or_else(|| request.contract_key()),
                },
            ));
        }

        if request.cascade == CascadeLevel::None {
            request.mode = ResolveMode::AsRegistered;
            return self.dispatch(request, directive, trail);
        }

        if let Some((entry, inherited)) = found {
            let forced_singleton = entry.mode == RegisterMode::UniversalSingleton
                || (entry.mode == RegisterMode::ContainerSingleton && !inherited);
            if forced_singleton {
                return self.materialize(&entry, Some(&request), directive, trail);
            }
        }

        self.build(request, directive, trail)
    }

    /// Keyed lookup in the chain, falling back to the unkeyed registration
    fn find_entry(&self, request: &ResolveRequest) -> Option<(Arc<RegistrationEntry>, bool)> {
        let key = request.registry_key();
        self.lookup_chain(&key).or_else(|| {
            key.priority
                .as_ref()
                .and_then(|_| self.lookup_chain(&key.unkeyed()))
        })
    }

    /// Value from the directive's provider, viewed as the requested contract
    fn consult_mapping(
        &self,
        request: &ResolveRequest,
        directive: &MappingDirective,
    ) -> Option<Instance> {
        let contract = request.contract_key();
        let value = directive.consult(
            &contract,
            request.contract_name.as_deref(),
            request.parent.as_ref(),
        )?;
        let converted = self.catalog().convert(&value, &contract);
        if converted.is_some() {
            debug!(
                "Mapping provider supplied {} ({:?})",
                contract, request.contract_name
            );
        } else {
            debug!(
                "Mapping provider value of type {} does not satisfy {}",
                value.type_key(),
                contract
            );
        }
        converted
    }

    /// Give this container its own copy of an inherited container singleton.
    ///
    /// The copy is inserted into the local registry; when another thread
    /// promoted the same key first, that winner's instance is returned.
    fn promote(
        &self,
        entry: &Arc<RegistrationEntry>,
        request: ResolveRequest,
        directive: MappingDirective,
        trail: &mut Trail,
    ) -> Result<Instance> {
        let key = entry.key();
        let instance = match self.run_creator(entry) {
            Some(instance) => instance,
            None => self.build(request, entry_directive(entry, directive), trail)?,
        };

        let local = Arc::new(entry.promoted(instance.clone()));
        let winner = self.inner.registry.insert_or_get(key.clone(), local.clone());

        if Arc::ptr_eq(&winner, &local) {
            self.inner.stats.promotion();
            debug!("Promoted {} into {}", key, self.label());
            return Ok(instance);
        }

        debug!("Lost promotion race for {} in {}", key, self.label());
        match winner.instance() {
            Some(existing) => Ok(existing),
            None => Ok(instance),
        }
    }

    /// Cached instance of a singleton entry, created on first use.
    ///
    /// Universal singletons are always materialized through the root so
    /// their dependencies come from the root scope.
    pub(crate) fn materialize(
        &self,
        entry: &Arc<RegistrationEntry>,
        request: Option<&ResolveRequest>,
        directive: MappingDirective,
        trail: &mut Trail,
    ) -> Result<Instance> {
        if let Some(instance) = entry.instance() {
            self.inner.stats.cache_hit();
            debug!("Cache hit for {} in {}", entry.key(), self.label());
            return Ok(instance);
        }

        if entry.mode == RegisterMode::UniversalSingleton && !self.is_root() {
            return self.root().materialize(entry, request, directive, trail);
        }

        if let Some(instance) = self.run_creator(entry) {
            entry.store(instance.clone());
            return Ok(instance);
        }

        let mut build_request = match request {
            Some(request) => request.clone(),
            None => ResolveRequest::new(entry.contract, ResolveMode::AsRegistered)
                .keyed(entry.priority.clone()),
        };
        build_request.concrete = Some(entry.concrete);

        let instance = self.build(build_request, entry_directive(entry, directive), trail)?;
        // Last write wins when two threads materialize concurrently.
        entry.store(instance.clone());
        debug!("Materialized {} in {}", entry.key(), self.label());
        Ok(instance)
    }

    /// Instance from the entry's creator, viewed as its contract.
    ///
    /// Creator failures are logged and reported as `None` so the caller can
    /// fall back to the builder.
    fn run_creator(&self, entry: &RegistrationEntry) -> Option<Instance> {
        let creator = entry.creator.as_ref()?;
        let contract = entry.contract.key();
        match creator() {
            Ok(value) => match self.catalog().convert(&value, &contract) {
                Some(instance) => Some(instance),
                None => {
                    warn!(
                        "Creator for {} returned {}, which does not satisfy the contract",
                        entry.key(),
                        value.type_key()
                    );
                    None
                }
            },
            Err(err) => {
                warn!("Creator for {} failed: {:#}", entry.key(), err);
                None
            }
        }
    }
}

/// The caller's directive, or the entry's own when the caller brought no provider
fn entry_directive(entry: &RegistrationEntry, directive: MappingDirective) -> MappingDirective {
    match (&directive.provider, &entry.mapping) {
        (None, Some(mapping)) => mapping.clone(),
        _ => directive,
    }
}

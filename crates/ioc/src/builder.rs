//! Instance builder: constructor selection, dependency recursion and property
//! injection.

use crate::{
    catalog::{Arguments, ConcreteDescriptor},
    container::Container,
    contract::Contract,
    engine::Trail,
    errors::{ConstructionCause, ContainerError, Result},
    instance::Instance,
    key::{TypeKey, TypeShape},
    mapping::{InjectionTarget, MappingDirective},
    request::{CascadeLevel, ResolveRequest},
};
use std::{any::Any, sync::Arc};
use tracing::{debug, warn};

impl Container {
    /// Build a fresh instance of the request's concrete type (the contract
    /// itself when no concrete type is set) and view it as the contract.
    pub(crate) fn build(
        &self,
        request: ResolveRequest,
        directive: MappingDirective,
        trail: &mut Trail,
    ) -> Result<Instance> {
        let concrete = request.concrete.unwrap_or_else(|| request.contract_key());

        let shape = concrete.shape();
        if matches!(
            shape,
            TypeShape::Abstract | TypeShape::Array | TypeShape::Collection
        ) {
            return Err(ContainerError::construction(
                concrete,
                ConstructionCause::InvalidConcrete(shape),
            ));
        }

        if let Some((root, entry)) = self.universal_entry(&request.registry_key()) {
            return root.materialize(&entry, Some(&request), directive, trail);
        }

        let descriptor = self.descriptor_for(&request, &concrete)?;

        if trail.contains(&concrete) {
            let mut chain = trail.clone();
            chain.push(concrete);
            return Err(ContainerError::construction(
                concrete,
                ConstructionCause::CircularDependency { chain },
            ));
        }

        trail.push(concrete);
        let built = self.construct(&descriptor, &request, &directive, trail);
        trail.pop();
        let value = built?;

        let instance = descriptor.finalize(value).ok_or_else(|| {
            ContainerError::construction(
                concrete,
                ConstructionCause::Constructor("constructor produced a foreign type".to_string()),
            )
        })?;

        let contract = request.contract_key();
        let instance = self.catalog().convert(&instance, &contract).ok_or_else(|| {
            ContainerError::construction(concrete, ConstructionCause::NotAssignable { contract })
        })?;

        self.inner.stats.build();
        debug!("Built {} as {} in {}", concrete, contract, self.label());
        Ok(instance)
    }

    fn descriptor_for(
        &self,
        request: &ResolveRequest,
        concrete: &TypeKey,
    ) -> Result<Arc<ConcreteDescriptor>> {
        let catalog = self.catalog();
        if let Some(descriptor) = catalog.descriptor(concrete) {
            return Ok(descriptor);
        }
        if request.contract_key() == *concrete && request.contract.describe_in(catalog) {
            if let Some(descriptor) = catalog.descriptor(concrete) {
                return Ok(descriptor);
            }
        }
        Err(ContainerError::construction(
            *concrete,
            ConstructionCause::NoBlueprint,
        ))
    }

    fn construct(
        &self,
        descriptor: &ConcreteDescriptor,
        request: &ResolveRequest,
        directive: &MappingDirective,
        trail: &mut Trail,
    ) -> Result<Box<dyn Any + Send + Sync>> {
        let concrete = descriptor.concrete;
        let constructor = descriptor.select_constructor().ok_or_else(|| {
            ContainerError::construction(concrete, ConstructionCause::NoConstructor)
        })?;

        // Only the first recursion layers stay forced-fresh.
        let cascade = request.cascade.for_dependencies();

        let params_directive = directive.for_dependency(InjectionTarget::Constructor);
        let mut arguments = Vec::with_capacity(constructor.params.len());
        for param in &constructor.params {
            let child = dependency_request(request, concrete, &param.name, param.contract, cascade);
            let value = self
                .dispatch(child, params_directive.clone(), trail)
                .map_err(|source| {
                    ContainerError::construction(
                        concrete,
                        ConstructionCause::Dependency {
                            parameter: param.name.clone(),
                            source: Box::new(source),
                        },
                    )
                })?;
            arguments.push((param.name.clone(), value));
        }

        let mut value = constructor
            .invoke(Arguments::new(concrete, arguments))
            .map_err(|err| {
                ContainerError::construction(concrete, ConstructionCause::Constructor(format!("{err:#}")))
            })?;

        let property_directive = directive.for_dependency(InjectionTarget::Property);
        for property in &descriptor.properties {
            let child = dependency_request(
                request,
                concrete,
                &property.name,
                property.contract,
                cascade,
            );
            let outcome = self
                .dispatch(child, property_directive.clone(), trail)
                .and_then(|resolved| {
                    property.assign(value.as_mut(), &resolved).map_err(|err| {
                        ContainerError::construction(
                            concrete,
                            ConstructionCause::Constructor(format!("{err:#}")),
                        )
                    })
                });
            if let Err(err) = outcome {
                warn!(
                    "Skipped property '{}' of {}: {}",
                    property.name, concrete, err
                );
                self.record_skip(concrete, property.name.clone(), err.to_string());
            }
        }

        Ok(value)
    }
}

/// Request for a dependency of `owner`; keeps the parent's mode and priority key
fn dependency_request(
    parent_request: &ResolveRequest,
    owner: TypeKey,
    name: &str,
    contract: Contract,
    cascade: CascadeLevel,
) -> ResolveRequest {
    ResolveRequest {
        mode: parent_request.mode,
        priority_key: parent_request.priority_key.clone(),
        contract_name: Some(name.to_string()),
        contract,
        parent: Some(owner),
        concrete: None,
        cascade,
    }
}

//! Capability table describing how concrete types are built.
//!
//! Rust has no runtime reflection, so every type the container constructs
//! publishes a [`Blueprint`] instead: its constructors with their ordered
//! parameters, its injectable properties, and the contracts it can be viewed
//! as. The [`Catalog`] stores these in type-erased form, keyed by `TypeId`, and
//! is shared by every container of one tree.

use crate::{contract::Contract, instance::Instance, key::TypeKey};
use anyhow::{anyhow, Result};
use dashmap::DashMap;
use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

/// A type the container knows how to build
pub trait Injectable: Send + Sync + Sized + 'static {
    fn blueprint() -> Blueprint<Self>;
}

type ErasedValue = Box<dyn Any + Send + Sync>;
type Invoke = Arc<dyn Fn(Arguments) -> Result<ErasedValue> + Send + Sync>;
type Assign = Arc<dyn Fn(&mut (dyn Any + Send + Sync), &Instance) -> Result<()> + Send + Sync>;
type Upcast = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// Named dependency of a constructor or property
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub contract: Contract,
}

/// Constructor of `T` with its ordered parameters
pub struct Constructor<T> {
    params: Vec<Parameter>,
    preferred: bool,
    skip: bool,
    invoke: Arc<dyn Fn(Arguments) -> Result<T> + Send + Sync>,
}

impl<T: Send + Sync + 'static> Constructor<T> {
    /// `invoke` receives resolved arguments in declaration order
    pub fn new<F>(invoke: F) -> Self
    where
        F: Fn(Arguments) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            preferred: false,
            skip: false,
            invoke: Arc::new(invoke),
        }
    }

    pub fn param<P: ?Sized + Send + Sync + 'static>(self, name: &str) -> Self {
        self.with(name, Contract::of::<P>())
    }

    /// Parameter whose type is described in the catalog on demand
    pub fn inject<P: Injectable>(self, name: &str) -> Self {
        self.with(name, Contract::injectable::<P>())
    }

    /// Parameter receiving every registration of `P` as `Vec<Arc<P>>`
    pub fn many<P: ?Sized + Send + Sync + 'static>(self, name: &str) -> Self {
        self.with(name, Contract::sequence_of::<P>())
    }

    pub fn with(mut self, name: &str, contract: Contract) -> Self {
        self.params.push(Parameter {
            name: name.to_string(),
            contract,
        });
        self
    }

    /// Chosen over every other constructor
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    /// Never chosen
    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }
}

struct Property<T> {
    name: String,
    contract: Contract,
    assign: Arc<dyn Fn(&mut T, &Instance) -> Result<()> + Send + Sync>,
}

/// Build description of `T`
pub struct Blueprint<T> {
    constructors: Vec<Constructor<T>>,
    properties: Vec<Property<T>>,
    upcasts: Vec<(TypeKey, Upcast)>,
}

impl<T: Send + Sync + 'static> Default for Blueprint<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Blueprint<T> {
    pub fn new() -> Self {
        Self {
            constructors: Vec::new(),
            properties: Vec::new(),
            upcasts: Vec::new(),
        }
    }

    pub fn constructor(mut self, constructor: Constructor<T>) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Injectable property; `set` runs after construction when the
    /// dependency resolves.
    pub fn property<P, F>(self, name: &str, set: F) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<P>) + Send + Sync + 'static,
    {
        self.property_with(name, Contract::of::<P>(), set)
    }

    pub fn inject_property<P, F>(self, name: &str, set: F) -> Self
    where
        P: Injectable,
        F: Fn(&mut T, Arc<P>) + Send + Sync + 'static,
    {
        self.property_with(name, Contract::injectable::<P>(), set)
    }

    fn property_with<P, F>(mut self, name: &str, contract: Contract, set: F) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, Arc<P>) + Send + Sync + 'static,
    {
        let label = name.to_string();
        self.properties.push(Property {
            name: name.to_string(),
            contract,
            assign: Arc::new(move |target: &mut T, value: &Instance| {
                let value = value.downcast::<P>().ok_or_else(|| {
                    anyhow!(
                        "property '{}' expected {}, got {}",
                        label,
                        std::any::type_name::<P>(),
                        value.type_key()
                    )
                })?;
                set(target, value);
                Ok(())
            }),
        });
        self
    }

    /// Declare that `T` may be viewed as the contract `C`
    pub fn implements<C, F>(mut self, cast: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    {
        self.upcasts.push((TypeKey::of::<C>(), erase_upcast(cast)));
        self
    }
}

impl<T: Default + Send + Sync + 'static> Blueprint<T> {
    /// Blueprint with a single zero-argument constructor
    pub fn with_default() -> Self {
        Self::new().constructor(Constructor::new(|_| Ok(T::default())))
    }
}

/// Resolved constructor arguments, handed out in declaration order
pub struct Arguments {
    owner: TypeKey,
    items: std::vec::IntoIter<(String, Instance)>,
}

impl Arguments {
    pub(crate) fn new(owner: TypeKey, items: Vec<(String, Instance)>) -> Self {
        Self {
            owner,
            items: items.into_iter(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    pub fn take<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        let (name, instance) = self.items.next().ok_or_else(|| {
            anyhow!(
                "constructor of {} requested more arguments than declared",
                self.owner
            )
        })?;
        instance.downcast::<T>().ok_or_else(|| {
            anyhow!(
                "argument '{}' of {} is {}, not {}",
                name,
                self.owner,
                instance.type_key(),
                std::any::type_name::<T>()
            )
        })
    }

    /// Owned copy of a value argument such as a `String` or a number
    pub fn take_value<T: Clone + Send + Sync + 'static>(&mut self) -> Result<T> {
        self.take::<T>().map(|value| T::clone(&value))
    }

    /// Argument declared with [`Constructor::many`]
    pub fn take_all<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Vec<Arc<T>>> {
        self.take::<Vec<Arc<T>>>().map(|values| values.as_ref().clone())
    }
}

pub(crate) struct ConstructorDescriptor {
    pub params: Vec<Parameter>,
    pub preferred: bool,
    pub skip: bool,
    invoke: Invoke,
}

impl ConstructorDescriptor {
    pub fn invoke(&self, args: Arguments) -> Result<ErasedValue> {
        (self.invoke)(args)
    }
}

pub(crate) struct PropertyDescriptor {
    pub name: String,
    pub contract: Contract,
    assign: Assign,
}

impl PropertyDescriptor {
    pub fn assign(&self, target: &mut (dyn Any + Send + Sync), value: &Instance) -> Result<()> {
        (self.assign)(target, value)
    }
}

/// Type-erased [`Blueprint`]
pub(crate) struct ConcreteDescriptor {
    pub concrete: TypeKey,
    pub constructors: Vec<ConstructorDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
    finalize: fn(ErasedValue) -> Option<Instance>,
}

impl ConcreteDescriptor {
    fn from_blueprint<T: Send + Sync + 'static>(blueprint: Blueprint<T>) -> Self {
        let constructors = blueprint
            .constructors
            .into_iter()
            .map(|ctor| {
                let invoke = ctor.invoke;
                ConstructorDescriptor {
                    params: ctor.params,
                    preferred: ctor.preferred,
                    skip: ctor.skip,
                    invoke: Arc::new(move |args: Arguments| {
                        invoke(args).map(|value| Box::new(value) as ErasedValue)
                    }),
                }
            })
            .collect();

        let properties = blueprint
            .properties
            .into_iter()
            .map(|prop| {
                let assign = prop.assign;
                let name = prop.name.clone();
                PropertyDescriptor {
                    name: prop.name,
                    contract: prop.contract,
                    assign: Arc::new(move |target: &mut (dyn Any + Send + Sync), value: &Instance| {
                        let target = target.downcast_mut::<T>().ok_or_else(|| {
                            anyhow!("property '{}' assigned on a foreign object", name)
                        })?;
                        assign(target, value)
                    }),
                }
            })
            .collect();

        Self {
            concrete: TypeKey::of::<T>(),
            constructors,
            properties,
            finalize: finalize::<T>,
        }
    }

    /// Preferred constructor, else the first one not marked skip
    pub fn select_constructor(&self) -> Option<&ConstructorDescriptor> {
        self.constructors
            .iter()
            .find(|c| c.preferred)
            .or_else(|| self.constructors.iter().find(|c| !c.skip))
    }

    pub fn finalize(&self, value: ErasedValue) -> Option<Instance> {
        (self.finalize)(value)
    }
}

fn finalize<T: Send + Sync + 'static>(value: ErasedValue) -> Option<Instance> {
    value
        .downcast::<T>()
        .ok()
        .map(|boxed| Instance::new(Arc::<T>::from(boxed)))
}

fn erase_upcast<T, C, F>(cast: F) -> Upcast
where
    T: Send + Sync + 'static,
    C: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance| instance.downcast::<T>().map(|value| Instance::new(cast(value))))
}

/// Blueprints and contract upcasts of one container tree
#[derive(Default)]
pub struct Catalog {
    descriptors: DashMap<TypeId, Arc<ConcreteDescriptor>>,
    upcasts: DashMap<(TypeId, TypeId), Upcast>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe `T` from its own blueprint unless already described
    pub fn describe<T: Injectable>(&self) {
        if !self.contains(&TypeKey::of::<T>()) {
            self.insert(T::blueprint());
        }
    }

    /// Install a blueprint, replacing any earlier description of `T`
    pub fn insert<T: Send + Sync + 'static>(&self, blueprint: Blueprint<T>) {
        let from = TypeId::of::<T>();
        for (contract, upcast) in &blueprint.upcasts {
            self.upcasts.insert((from, contract.id()), upcast.clone());
        }
        let descriptor = ConcreteDescriptor::from_blueprint(blueprint);
        self.descriptors.insert(from, Arc::new(descriptor));
    }

    /// Register a view of `T` as the contract `C`
    pub fn implements<C, T, F>(&self, cast: F)
    where
        C: ?Sized + Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<C> + Send + Sync + 'static,
    {
        self.upcasts
            .insert((TypeId::of::<T>(), TypeId::of::<C>()), erase_upcast(cast));
    }

    pub fn contains(&self, concrete: &TypeKey) -> bool {
        self.descriptors.contains_key(&concrete.id())
    }

    pub(crate) fn descriptor(&self, concrete: &TypeKey) -> Option<Arc<ConcreteDescriptor>> {
        self.descriptors
            .get(&concrete.id())
            .map(|entry| entry.value().clone())
    }

    /// Whether instances of `concrete` satisfy `contract`
    pub fn is_assignable(&self, concrete: &TypeKey, contract: &TypeKey) -> bool {
        concrete == contract || self.upcasts.contains_key(&(concrete.id(), contract.id()))
    }

    /// View `instance` as `contract`, if assignable
    pub fn convert(&self, instance: &Instance, contract: &TypeKey) -> Option<Instance> {
        if instance.type_key() == *contract {
            return Some(instance.clone());
        }
        let upcast = self
            .upcasts
            .get(&(instance.type_key().id(), contract.id()))
            .map(|entry| entry.value().clone())?;
        upcast(instance)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("descriptors", &self.descriptors.len())
            .field("upcasts", &self.upcasts.len())
            .finish()
    }
}

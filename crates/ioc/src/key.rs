//! Type identities and registry keys

use once_cell::sync::Lazy;
use std::{
    any::TypeId,
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
};

/// Runtime identity of a contract or concrete type.
///
/// Equality and hashing use only the [`TypeId`]; the name is kept for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, generics included.
    pub fn short_name(&self) -> &'static str {
        let head = self.name.split('<').next().unwrap_or(self.name);
        match head.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }

    /// Classify the type for registration and construction checks.
    ///
    /// Classification of trait objects, slices and std collections relies on
    /// `type_name`, which is best-effort but stable within one compiler build.
    pub fn shape(&self) -> TypeShape {
        if VALUE_TYPES.contains(&self.id) {
            return TypeShape::Value;
        }
        let name = self.name;
        if name.starts_with("dyn ") {
            TypeShape::Abstract
        } else if name.starts_with('[') || name.starts_with("&[") {
            TypeShape::Array
        } else if COLLECTION_PREFIXES.iter().any(|p| name.starts_with(p)) {
            TypeShape::Collection
        } else {
            TypeShape::Concrete
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Structural category of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    /// Plain struct or enum that can be built from a blueprint
    Concrete,
    /// Trait object; only usable as a contract
    Abstract,
    /// Primitive or string; only injectable through a mapping provider
    Value,
    /// Slice or array
    Array,
    /// Std sequence, map or set
    Collection,
}

impl TypeShape {
    /// Whether a type of this shape may back a registration
    pub fn is_registrable(&self) -> bool {
        matches!(self, TypeShape::Concrete | TypeShape::Value)
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TypeShape::Concrete => "concrete",
            TypeShape::Abstract => "abstract",
            TypeShape::Value => "value",
            TypeShape::Array => "array",
            TypeShape::Collection => "collection",
        };
        f.write_str(label)
    }
}

const COLLECTION_PREFIXES: &[&str] = &[
    "alloc::vec::Vec<",
    "alloc::collections::",
    "std::collections::",
    "alloc::boxed::Box<[",
];

static VALUE_TYPES: Lazy<HashSet<TypeId>> = Lazy::new(|| {
    [
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
        TypeId::of::<String>(),
        TypeId::of::<str>(),
        TypeId::of::<&'static str>(),
    ]
    .into_iter()
    .collect()
});

/// Identity of a registration: contract type plus optional priority key.
///
/// `priority: None` is distinct from every string, including the empty one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    pub contract: TypeKey,
    pub priority: Option<String>,
}

impl RegistryKey {
    pub fn new(contract: TypeKey, priority: Option<String>) -> Self {
        Self { contract, priority }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<T>(), None)
    }

    pub fn keyed<T: ?Sized + 'static>(priority: impl Into<String>) -> Self {
        Self::new(TypeKey::of::<T>(), Some(priority.into()))
    }

    /// Same contract without the priority key
    pub fn unkeyed(&self) -> Self {
        Self::new(self.contract, None)
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.priority {
            Some(priority) => write!(f, "{}[{}]", self.contract, priority),
            None => write!(f, "{}", self.contract),
        }
    }
}

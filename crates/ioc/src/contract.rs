//! Contract identities handed to the resolution engine

use crate::{
    catalog::{Catalog, Injectable},
    instance::Instance,
    key::TypeKey,
};
use std::{fmt, sync::Arc};

/// What a caller asks the container for.
///
/// Besides the type identity a contract may carry two capabilities that the
/// engine cannot derive from a `TypeId` alone: how to assemble a homogeneous
/// sequence from resolved elements, and how to describe the type in the
/// catalog on first use.
#[derive(Clone, Copy)]
pub struct Contract {
    key: TypeKey,
    sequence: Option<Sequence>,
    describe: Option<fn(&Catalog)>,
}

/// Element type and assembler of a sequence contract
#[derive(Clone, Copy)]
pub struct Sequence {
    pub element: TypeKey,
    assemble: fn(Vec<Instance>) -> Instance,
}

impl Sequence {
    pub fn assemble(&self, items: Vec<Instance>) -> Instance {
        (self.assemble)(items)
    }
}

impl Contract {
    pub fn of<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            sequence: None,
            describe: None,
        }
    }

    /// Contract whose concrete blueprint is added to the catalog when missing
    pub fn injectable<T: Injectable>() -> Self {
        Self {
            describe: Some(describe_type::<T>),
            ..Self::of::<T>()
        }
    }

    /// `Vec<Arc<T>>`, resolved from every registration of `T` in the chain
    pub fn sequence_of<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            key: TypeKey::of::<Vec<Arc<T>>>(),
            sequence: Some(Sequence {
                element: TypeKey::of::<T>(),
                assemble: assemble_vec::<T>,
            }),
            describe: None,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        self.sequence.as_ref()
    }

    /// Describe the contract type in the catalog; false if it cannot
    pub(crate) fn describe_in(&self, catalog: &Catalog) -> bool {
        match self.describe {
            Some(describe) => {
                describe(catalog);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("key", &self.key)
            .field("element", &self.sequence.map(|s| s.element))
            .finish()
    }
}

fn describe_type<T: Injectable>(catalog: &Catalog) {
    catalog.describe::<T>();
}

fn assemble_vec<T: ?Sized + Send + Sync + 'static>(items: Vec<Instance>) -> Instance {
    let values: Vec<Arc<T>> = items.iter().filter_map(|item| item.downcast::<T>()).collect();
    Instance::from_value(values)
}

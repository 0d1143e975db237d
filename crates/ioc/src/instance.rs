//! Type-erased resolved objects

use crate::key::TypeKey;
use std::{any::Any, fmt, sync::Arc};

/// A resolved object with its runtime type.
///
/// The payload is always an `Arc<T>` boxed as `Any`, so `T` may be unsized
/// (a trait object) and cloning an `Instance` never clones the object.
#[derive(Clone)]
pub struct Instance {
    type_key: TypeKey,
    value: Arc<dyn Any + Send + Sync>,
    address: usize,
}

impl Instance {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        let address = Arc::as_ptr(&value) as *const () as usize;
        Self {
            type_key: TypeKey::of::<T>(),
            value: Arc::new(value),
            address,
        }
    }

    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_key == TypeKey::of::<T>()
    }

    /// Shared handle to the object if it was stored as `T`
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Reference equality on the underlying object.
    ///
    /// Two instances produced by upcasting the same object compare equal.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.address == other.address
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_key.name())
            .field("address", &format_args!("{:#x}", self.address))
            .finish()
    }
}

//! Container tree: registry ownership, child management, disposal and
//! diagnostics.
//!
//! A container owns its registry and its children. Parent and root are held
//! as weak back-references, so dropping the root handle tears down the whole
//! tree and a child never keeps its ancestors alive.

use crate::{
    catalog::{Catalog, Injectable},
    config::{ContainerConfig, ErrorPolicy},
    contract::Contract,
    entry::{RegisterMode, RegistrationEntry},
    errors::{ContainerError, Result},
    events::{ContainerEvent, EventHub},
    instance::Instance,
    key::{RegistryKey, TypeKey},
    registry::Registry,
    request::ResolveRequest,
    stats::{ContainerStats, SkippedItem, StatsRecorder},
};
use dashmap::{mapref::entry::Entry, DashMap};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};
use tracing::{debug, info};
use uuid::Uuid;

/// Process-unique container identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(Uuid);

impl ContainerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ContainerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Set-once interception hook consulted before any other resolution step
pub type OverrideCallback =
    Arc<dyn Fn(&ResolveRequest, &ContainerId) -> Option<Instance> + Send + Sync>;

pub(crate) struct ContainerInner {
    pub(crate) id: ContainerId,
    pub(crate) name: Option<String>,
    pub(crate) registry: Registry,
    parent: Option<Weak<ContainerInner>>,
    /// `None` when this container is the root
    root: Option<Weak<ContainerInner>>,
    children: DashMap<ContainerId, Container>,
    pub(crate) stop_at_boundary: bool,
    pub(crate) catalog: Arc<Catalog>,
    config: RwLock<ContainerConfig>,
    pub(crate) override_callback: OnceCell<OverrideCallback>,
    disposed: AtomicBool,
    events: EventHub,
    pub(crate) stats: StatsRecorder,
}

/// Handle to a node of the container tree. Cloning is cheap and yields
/// another handle to the same container.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

/// Non-owning handle a container registers for itself
#[derive(Clone)]
pub struct ContainerRef {
    id: ContainerId,
    inner: Weak<ContainerInner>,
}

impl ContainerRef {
    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRef").field("id", &self.id).finish()
    }
}

/// Result of [`Container::diagnose`]
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub registered: bool,
    pub message: String,
    pub entry: Option<Arc<RegistrationEntry>>,
    /// Entry belongs to another container of the tree
    pub inherited: bool,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// New root container with default configuration
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(ContainerConfig::named(name))
    }

    /// New root container
    pub fn with_config(config: ContainerConfig) -> Self {
        let container = Self::assemble(
            ContainerId::new(),
            config.name.clone(),
            None,
            false,
            Arc::new(Catalog::new()),
            config,
        );
        debug!("Created root container {}", container.label());
        container
    }

    fn assemble(
        id: ContainerId,
        name: Option<String>,
        parent: Option<&Container>,
        stop_at_boundary: bool,
        catalog: Arc<Catalog>,
        config: ContainerConfig,
    ) -> Self {
        let root = parent.map(|p| Arc::downgrade(&p.root().inner));
        let inner = Arc::new(ContainerInner {
            id,
            name,
            registry: Registry::new(),
            parent: parent.map(|p| Arc::downgrade(&p.inner)),
            root,
            children: DashMap::new(),
            stop_at_boundary,
            catalog,
            stats: StatsRecorder::new(config.skip_log_capacity),
            config: RwLock::new(config),
            override_callback: OnceCell::new(),
            disposed: AtomicBool::new(false),
            events: EventHub::default(),
        });
        let container = Container { inner };
        container.register_self();
        container
    }

    fn register_self(&self) {
        let handle = ContainerRef {
            id: self.id(),
            inner: Arc::downgrade(&self.inner),
        };
        let entry = RegistrationEntry::new(
            RegisterMode::ContainerSingleton,
            Contract::of::<ContainerRef>(),
            TypeKey::of::<ContainerRef>(),
        )
        .with_instance(Instance::from_value(handle));
        self.inner
            .registry
            .insert(RegistryKey::of::<ContainerRef>(), Arc::new(entry));
    }

    pub fn id(&self) -> ContainerId {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub(crate) fn label(&self) -> String {
        match &self.inner.name {
            Some(name) => format!("'{}' ({})", name, self.inner.id),
            None => self.inner.id.to_string(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.inner.root.is_none()
    }

    pub fn stop_at_boundary(&self) -> bool {
        self.inner.stop_at_boundary
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ContainerError::Disposed {
                container: self.id(),
            });
        }
        Ok(())
    }

    /// Capability table shared by the whole tree
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    /// Add `T`'s blueprint to the catalog unless already described
    pub fn describe<T: Injectable>(&self) -> &Self {
        self.inner.catalog.describe::<T>();
        self
    }

    pub fn config(&self) -> ContainerConfig {
        self.inner.config.read().clone()
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.inner.config.read().error_policy
    }

    pub fn set_error_policy(&self, policy: ErrorPolicy) {
        self.inner.config.write().error_policy = policy;
    }

    /// Resize the skipped-item ledger, dropping the oldest entries
    pub fn set_skip_log_capacity(&self, capacity: usize) {
        self.inner.config.write().skip_log_capacity = capacity;
        self.inner.stats.set_capacity(capacity);
    }

    pub fn parent(&self) -> Option<Container> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Container { inner })
    }

    /// Top-most ancestor, or this container when it is the root
    pub fn root(&self) -> Container {
        self.inner
            .root
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Container { inner })
            .unwrap_or_else(|| self.clone())
    }

    pub fn same_as(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---- children ----

    /// Create a child container; `None` when this container is disposed
    pub fn create_child(&self, name: Option<&str>, stop_at_boundary: bool) -> Option<Container> {
        self.create_child_with_id(ContainerId::new(), name, stop_at_boundary)
    }

    /// Create a child under a caller-chosen id; `None` if the id is taken
    pub fn create_child_with_id(
        &self,
        id: ContainerId,
        name: Option<&str>,
        stop_at_boundary: bool,
    ) -> Option<Container> {
        if self.is_disposed() {
            debug!("Refusing to create a child of disposed container {}", self.label());
            return None;
        }

        let config = ContainerConfig {
            name: name.map(str::to_string),
            ..self.config()
        };
        let child = match self.inner.children.entry(id) {
            Entry::Occupied(_) => {
                debug!("Child id {} already exists under {}", id, self.label());
                return None;
            }
            Entry::Vacant(slot) => {
                let child = Self::assemble(
                    id,
                    name.map(str::to_string),
                    Some(self),
                    stop_at_boundary,
                    self.inner.catalog.clone(),
                    config,
                );
                slot.insert(child.clone());
                child
            }
        };

        info!(
            "Created child container {} under {} (stop_at_boundary={})",
            child.label(),
            self.label(),
            stop_at_boundary
        );
        self.inner.events.publish(&ContainerEvent::ChildCreated {
            parent: self.id(),
            child: id,
        });
        Some(child)
    }

    /// Direct child by id
    pub fn child(&self, id: &ContainerId) -> Option<Container> {
        self.inner.children.get(id).map(|c| c.value().clone())
    }

    /// Child by id, optionally searching every descendant depth-first
    pub fn find_child(&self, id: &ContainerId, search_all: bool) -> Option<Container> {
        if let Some(found) = self.child(id) {
            return Some(found);
        }
        if !search_all {
            return None;
        }
        self.children()
            .into_iter()
            .find_map(|child| child.find_child(id, true))
    }

    pub fn children(&self) -> Vec<Container> {
        self.inner
            .children
            .iter()
            .map(|c| c.value().clone())
            .collect()
    }

    /// Dispose children depth-first, clear the registry and detach from the
    /// parent. Idempotent; the `Disposed` event fires exactly once.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        for child in self.children() {
            child.dispose();
        }
        self.inner.children.clear();
        self.inner.registry.clear();

        if let Some(parent) = self.parent() {
            parent.inner.children.remove(&self.id());
        }

        info!("Disposed container {}", self.label());
        self.inner.events.publish(&ContainerEvent::Disposed {
            container: self.id(),
        });
        self.inner.events.clear();
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&ContainerEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(Arc::new(listener));
    }

    /// Install the override callback. A container accepts only one.
    pub fn set_override<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&ResolveRequest, &ContainerId) -> Option<Instance> + Send + Sync + 'static,
    {
        self.inner
            .override_callback
            .set(Arc::new(callback))
            .map_err(|_| ContainerError::OverrideAlreadyInstalled {
                container: self.id(),
            })?;
        debug!("Installed override callback on {}", self.label());
        Ok(())
    }

    // ---- registry queries ----

    /// Entry registered in this container only
    pub fn lookup(&self, key: &RegistryKey) -> Option<Arc<RegistrationEntry>> {
        self.inner.registry.get(key)
    }

    /// Entry from this container or the nearest ancestor that has one, with a
    /// flag telling whether it came from an ancestor. Each container stops
    /// the walk if it is marked `stop_at_boundary`.
    pub fn lookup_chain(&self, key: &RegistryKey) -> Option<(Arc<RegistrationEntry>, bool)> {
        let mut current = self.clone();
        let mut inherited = false;
        loop {
            if let Some(entry) = current.inner.registry.get(key) {
                return Some((entry, inherited));
            }
            if current.inner.stop_at_boundary {
                return None;
            }
            current = current.parent()?;
            inherited = true;
        }
    }

    /// Registrations of `contract` across the whole chain up to the root,
    /// closest first; an ancestor entry is dropped when a closer container
    /// has the same key. Boundaries do not stop the walk.
    pub fn enumerate_by_contract(
        &self,
        contract: &TypeKey,
    ) -> Vec<(RegistryKey, Arc<RegistrationEntry>)> {
        let mut found: Vec<(RegistryKey, Arc<RegistrationEntry>)> = Vec::new();
        let mut current = Some(self.clone());
        while let Some(container) = current {
            for (key, entry) in container.inner.registry.by_contract(contract) {
                if !found.iter().any(|(seen, _)| *seen == key) {
                    found.push((key, entry));
                }
            }
            current = container.parent();
        }
        found
    }

    /// Root entry for `key` if it is a universal singleton
    pub(crate) fn universal_entry(
        &self,
        key: &RegistryKey,
    ) -> Option<(Container, Arc<RegistrationEntry>)> {
        if self.is_root() {
            return None;
        }
        let root = self.root();
        let entry = root.inner.registry.get(key)?;
        (entry.mode == RegisterMode::UniversalSingleton).then_some((root, entry))
    }

    /// Remove a registration from this container
    pub fn unregister(&self, key: &RegistryKey) -> bool {
        let removed = self.inner.registry.remove(key).is_some();
        if removed {
            debug!("Removed {} from {}", key, self.label());
        }
        removed
    }

    /// Where `key` is registered: root universal singletons first, then this
    /// container, then (optionally) ancestors.
    pub fn diagnose(&self, key: &RegistryKey, check_parents: bool) -> Diagnosis {
        if let Some((root, entry)) = self.universal_entry(key) {
            return Diagnosis {
                registered: true,
                message: format!(
                    "{} is registered against {} in root container {} as a universal singleton",
                    key,
                    entry.concrete,
                    root.label()
                ),
                entry: Some(entry),
                inherited: true,
            };
        }

        if let Some(entry) = self.lookup(key) {
            return Diagnosis {
                registered: true,
                message: format!(
                    "{} is registered against {} in container {}",
                    key,
                    entry.concrete,
                    self.label()
                ),
                entry: Some(entry),
                inherited: false,
            };
        }

        if check_parents {
            if let Some(parent) = self.parent() {
                let mut found = parent.diagnose(key, true);
                found.inherited |= found.registered;
                return found;
            }
        }

        Diagnosis {
            registered: false,
            message: format!("{} is not registered", key),
            entry: None,
            inherited: false,
        }
    }

    /// Whether `T` is registered without a priority key, here or above
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.diagnose(&RegistryKey::of::<T>(), true).registered
    }

    pub fn stats(&self) -> ContainerStats {
        self.inner.stats.snapshot(self.inner.registry.len())
    }

    pub(crate) fn record_skip(&self, owner: TypeKey, item: String, reason: String) {
        self.inner.stats.skipped(SkippedItem {
            owner,
            item,
            reason,
        });
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("root", &self.is_root())
            .field("stop_at_boundary", &self.inner.stop_at_boundary)
            .field("registrations", &self.inner.registry.len())
            .field("children", &self.inner.children.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

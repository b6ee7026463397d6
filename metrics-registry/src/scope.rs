//! Scoped registries.
use std::{borrow::Cow, collections::BTreeMap, fmt, sync::Arc};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    registry::MetricRegistry,
    storage::{AtomicStorage, Storage},
};

static GLOBAL: Lazy<Arc<Registries>> = Lazy::new(|| Arc::new(Registries::new()));

/// Names a partition of metrics.
///
/// Scopes are not part of a metric's identity: the same [`MetricId`](crate::MetricId) may exist
/// independently in several scopes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope(Cow<'static, str>);

impl Scope {
    /// Metrics every runtime provides.
    pub const BASE: Scope = Scope(Cow::Borrowed("base"));

    /// Metrics specific to a particular runtime vendor.
    pub const VENDOR: Scope = Scope(Cow::Borrowed("vendor"));

    /// Metrics registered by the application itself.
    pub const APPLICATION: Scope = Scope(Cow::Borrowed("application"));

    /// Creates a custom scope.
    pub fn new<S>(name: S) -> Self
    where
        S: Into<Cow<'static, str>>,
    {
        Scope(name.into())
    }

    /// Gets the name of this scope.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Scope {
    fn from(name: &'static str) -> Self {
        Scope::new(name)
    }
}

impl From<String> for Scope {
    fn from(name: String) -> Self {
        Scope::new(name)
    }
}

/// A set of registries, one per [`Scope`].
///
/// A process-wide instance is available via [`Registries::global`].  Scopes are created on demand
/// by [`init`](Registries::init) and live until dropped.
pub struct Registries {
    scopes: RwLock<BTreeMap<Scope, Arc<MetricRegistry>>>,
    storage: Arc<dyn Storage>,
}

impl Registries {
    /// Creates an empty set of registries using atomic storage.
    pub fn new() -> Self {
        Self::with_storage(Arc::new(AtomicStorage::new()))
    }

    /// Creates an empty set of registries whose registries all use `storage`.
    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        Registries { scopes: RwLock::new(BTreeMap::new()), storage }
    }

    /// Gets the process-wide set of registries.
    pub fn global() -> Arc<Registries> {
        GLOBAL.clone()
    }

    /// Gets the registry for `scope`, creating it if it does not yet exist.
    pub fn init(&self, scope: &Scope) -> Arc<MetricRegistry> {
        if let Some(registry) = self.get(scope) {
            return registry;
        }

        let mut scopes = self.scopes.write();
        scopes
            .entry(scope.clone())
            .or_insert_with(|| {
                debug!(%scope, "created registry for scope");
                Arc::new(MetricRegistry::with_storage(self.storage.clone()))
            })
            .clone()
    }

    /// Gets the registry for `scope`, if it exists.
    pub fn get(&self, scope: &Scope) -> Option<Arc<MetricRegistry>> {
        self.scopes.read().get(scope).cloned()
    }

    /// Drops the registry for `scope`, along with everything registered in it.
    ///
    /// Returns `true` if the scope existed.  Handles already given out keep working, but are no
    /// longer exported.
    pub fn drop_scope(&self, scope: &Scope) -> bool {
        let removed = self.scopes.write().remove(scope);
        if let Some(registry) = &removed {
            registry.clear();
            debug!(%scope, "dropped registry for scope");
        }
        removed.is_some()
    }

    /// Drops every registry.
    pub fn drop_all(&self) {
        let dropped = std::mem::take(&mut *self.scopes.write());
        for (scope, registry) in dropped {
            registry.clear();
            debug!(%scope, "dropped registry for scope");
        }
    }

    /// Gets every scope that currently has a registry, in sorted order.
    pub fn scopes(&self) -> Vec<Scope> {
        self.scopes.read().keys().cloned().collect()
    }

    /// Gets every scope and its registry, in sorted scope order.
    pub fn iter(&self) -> Vec<(Scope, Arc<MetricRegistry>)> {
        self.scopes
            .read()
            .iter()
            .map(|(scope, registry)| (scope.clone(), registry.clone()))
            .collect()
    }
}

impl Default for Registries {
    fn default() -> Self {
        Registries::new()
    }
}

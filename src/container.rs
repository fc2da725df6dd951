//! Component registry and instance resolver
//!
//! The `Container` owns one [`ComponentDescriptor`] per registered type, one
//! singleton slot per singleton-scoped type, and a memoized answer to "does
//! this type directly depend on a prototype?".

use crate::component::{Component, Dependencies, Dependency, FieldDependency, Injectable, Scope};
use crate::{ConfigError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Type-erased instance as stored by the container
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor: resolves dependencies, builds, injects fields
type ConstructFn = Arc<dyn Fn(&Container) -> Result<AnyInstance> + Send + Sync>;

/// Singleton slot; `OnceCell` serializes first construction per type
type SingletonSlot = Arc<OnceCell<AnyInstance>>;

/// Registration record for one component type. Immutable once registered.
pub struct ComponentDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    scope: Scope,
    constructor_dependencies: Vec<Dependency>,
    field_dependencies: Vec<FieldDependency>,
    construct: ConstructFn,
}

impl ComponentDescriptor {
    /// Describe a [`Component`]
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            scope: T::SCOPE,
            constructor_dependencies: T::Dependencies::describe(),
            field_dependencies: T::field_dependencies(),
            construct: Arc::new(construct_component::<T>),
        }
    }

    /// Describe a pre-built singleton instance
    fn instance<T: Injectable>(instance: Arc<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            scope: Scope::Singleton,
            constructor_dependencies: Vec::new(),
            field_dependencies: Vec::new(),
            construct: Arc::new(move |_: &Container| -> Result<AnyInstance> {
                Ok(Arc::clone(&instance) as AnyInstance)
            }),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[inline]
    pub fn constructor_dependencies(&self) -> &[Dependency] {
        &self.constructor_dependencies
    }

    #[inline]
    pub fn field_dependencies(&self) -> &[FieldDependency] {
        &self.field_dependencies
    }
}

impl std::fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("type_name", &self.type_name)
            .field("scope", &self.scope)
            .field("constructor_dependencies", &self.constructor_dependencies.len())
            .field("field_dependencies", &self.field_dependencies.len())
            .finish()
    }
}

fn construct_component<T: Component>(container: &Container) -> Result<AnyInstance> {
    let deps = T::Dependencies::resolve(container)?;
    let instance = T::create(deps);
    instance.inject_fields(container)?;
    Ok(Arc::new(instance) as AnyInstance)
}

// =============================================================================
// Cycle detection
// =============================================================================

// Cycles are caught only within one thread's resolution. Two threads that
// each start a different singleton of the same cycle on first access block
// on each other's `OnceCell` instead of failing. Eager scanning builds every
// singleton on one thread, so the split can only happen with lazy config.
thread_local! {
    /// Types currently under construction on this thread, outermost first
    static RESOLVING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Marks a type as under construction until dropped
struct ResolutionGuard {
    type_id: TypeId,
}

impl ResolutionGuard {
    fn enter(descriptor: &ComponentDescriptor) -> Result<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&descriptor.type_id) {
                return Err(ConfigError::circular(descriptor.type_name));
            }
            stack.push(descriptor.type_id);
            Ok(Self {
                type_id: descriptor.type_id,
            })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|id| *id == self.type_id) {
                stack.remove(pos);
            }
        });
    }
}

// =============================================================================
// Container
// =============================================================================

struct Registry {
    descriptors: DashMap<TypeId, Arc<ComponentDescriptor>, RandomState>,
    singletons: DashMap<TypeId, SingletonSlot, RandomState>,
    prototype_dependency_cache: DashMap<TypeId, bool, RandomState>,
    locked: AtomicBool,
}

/// Component registry and resolver.
///
/// Cloning is cheap and every clone shares the same registry.
///
/// # Examples
///
/// ```rust
/// use component_dispatcher::{Component, Container};
/// use std::sync::Arc;
///
/// struct Database { url: String }
///
/// impl Component for Database {
///     type Dependencies = ();
///     fn create(_: ()) -> Self { Database { url: "postgres://localhost".into() } }
/// }
///
/// let container = Container::new();
/// container.register::<Database>();
///
/// let a = container.resolve::<Database>().unwrap();
/// let b = container.resolve::<Database>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<Registry>,
}

impl Container {
    /// Create an empty container.
    pub fn new() -> Self {
        #[cfg(feature = "logging")]
        debug!(target: crate::logging::TARGET, "Creating new component container");

        Self {
            inner: Arc::new(Registry {
                descriptors: DashMap::with_hasher(RandomState::new()),
                singletons: DashMap::with_hasher(RandomState::new()),
                prototype_dependency_cache: DashMap::with_hasher(RandomState::new()),
                locked: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // Registration Methods
    // =========================================================================

    /// Register a component type. Re-registering a type replaces its descriptor.
    pub fn register<T: Component>(&self) {
        self.insert(ComponentDescriptor::of::<T>());
    }

    /// Register a ready-made singleton instance.
    pub fn register_instance<T: Injectable>(&self, instance: T) {
        let instance = Arc::new(instance);
        let descriptor = ComponentDescriptor::instance(Arc::clone(&instance));
        let type_id = descriptor.type_id;
        self.insert(descriptor);

        let slot = OnceCell::new();
        let _ = slot.set(instance as AnyInstance);
        self.inner.singletons.insert(type_id, Arc::new(slot));
    }

    fn insert(&self, descriptor: ComponentDescriptor) {
        self.check_not_locked();

        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            component = descriptor.type_name,
            scope = ?descriptor.scope,
            constructor_dependencies = descriptor.constructor_dependencies.len(),
            field_dependencies = descriptor.field_dependencies.len(),
            "Registering component"
        );

        let type_id = descriptor.type_id;
        if descriptor.scope == Scope::Singleton {
            self.inner.singletons.insert(type_id, Arc::new(OnceCell::new()));
        } else {
            self.inner.singletons.remove(&type_id);
        }
        self.inner.descriptors.insert(type_id, Arc::new(descriptor));
    }

    // =========================================================================
    // Resolution Methods
    // =========================================================================

    /// Resolve `T`, honoring its scope.
    #[inline]
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        let instance = self.resolve_dependency(Dependency::of::<T>(), false)?;
        downcast::<T>(instance)
    }

    /// Build a fresh `T` even if it is singleton-scoped. The result is not cached.
    #[inline]
    pub fn resolve_new<T: Injectable>(&self) -> Result<Arc<T>> {
        let instance = self.resolve_dependency(Dependency::of::<T>(), true)?;
        downcast::<T>(instance)
    }

    /// Resolve by type identity.
    ///
    /// Prototype-scoped types and `force_new` always construct; singletons
    /// are built at most once and then shared.
    pub fn resolve_dependency(&self, dependency: Dependency, force_new: bool) -> Result<AnyInstance> {
        let descriptor =
            self.descriptor(dependency.type_id)
                .ok_or(ConfigError::NotRegistered {
                    type_name: dependency.type_name,
                    type_id: dependency.type_id,
                })?;

        if descriptor.scope == Scope::Prototype || force_new {
            #[cfg(feature = "logging")]
            trace!(
                target: crate::logging::TARGET,
                component = descriptor.type_name,
                force_new = force_new,
                "Constructing new instance"
            );

            let _guard = ResolutionGuard::enter(&descriptor)?;
            return (descriptor.construct)(self);
        }

        let slot = self.slot(descriptor.type_id);
        if let Some(instance) = slot.get() {
            return Ok(Arc::clone(instance));
        }

        let _guard = ResolutionGuard::enter(&descriptor)?;
        let instance = slot.get_or_try_init(|| {
            #[cfg(feature = "logging")]
            debug!(
                target: crate::logging::TARGET,
                component = descriptor.type_name,
                "Singleton initializing on first access"
            );

            (descriptor.construct)(self)
        })?;
        Ok(Arc::clone(instance))
    }

    fn slot(&self, type_id: TypeId) -> SingletonSlot {
        Arc::clone(self.inner.singletons.entry(type_id).or_default().value())
    }

    /// The singleton instance of `T` if it has already been created.
    pub fn singleton<T: Injectable>(&self) -> Option<Arc<T>> {
        let instance = self
            .inner
            .singletons
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.get().cloned())?;
        instance.downcast::<T>().ok()
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Descriptor registered for a type
    #[inline]
    pub fn descriptor(&self, type_id: TypeId) -> Option<Arc<ComponentDescriptor>> {
        self.inner
            .descriptors
            .get(&type_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    #[inline]
    pub fn contains<T: 'static>(&self) -> bool {
        self.inner.descriptors.contains_key(&TypeId::of::<T>())
    }

    /// True if the type is registered with prototype scope
    #[inline]
    pub fn is_prototype(&self, type_id: TypeId) -> bool {
        self.inner
            .descriptors
            .get(&type_id)
            .is_some_and(|d| d.scope == Scope::Prototype)
    }

    /// True if a direct constructor or field dependency of the type is
    /// prototype-scoped. Computed once per type and cached.
    ///
    /// Only direct dependencies count: a type two hops away from a
    /// prototype is not reported.
    pub fn has_prototype_dependency(&self, type_id: TypeId) -> bool {
        if let Some(cached) = self.inner.prototype_dependency_cache.get(&type_id) {
            return *cached;
        }

        let computed = self.descriptor(type_id).is_some_and(|descriptor| {
            descriptor
                .constructor_dependencies
                .iter()
                .chain(descriptor.field_dependencies.iter().map(|f| &f.dependency))
                .any(|dep| self.is_prototype(dep.type_id))
        });

        #[cfg(feature = "logging")]
        trace!(
            target: crate::logging::TARGET,
            type_id = ?type_id,
            has_prototype_dependency = computed,
            "Computed prototype dependency"
        );

        *self
            .inner
            .prototype_dependency_cache
            .entry(type_id)
            .or_insert(computed)
    }

    /// Number of registered component types.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.descriptors.is_empty()
    }

    /// Number of singletons created so far.
    pub fn singleton_count(&self) -> usize {
        self.inner
            .singletons
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    /// Number of prototype-scoped types.
    pub fn prototype_count(&self) -> usize {
        self.inner
            .descriptors
            .iter()
            .filter(|d| d.value().scope == Scope::Prototype)
            .count()
    }

    /// Get all registered TypeIds.
    pub fn registered_types(&self) -> Vec<TypeId> {
        self.inner.descriptors.iter().map(|r| *r.key()).collect()
    }

    // =========================================================================
    // Lifecycle Methods
    // =========================================================================

    /// Lock the container to prevent further registrations.
    #[inline]
    pub fn lock(&self) {
        self.inner.locked.store(true, Ordering::Release);

        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            component_count = self.len(),
            "Container locked - no further registrations allowed"
        );
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    /// Panic if locked (internal helper).
    #[inline]
    fn check_not_locked(&self) {
        if self.inner.locked.load(Ordering::Relaxed) {
            panic!("Cannot register components: container is locked");
        }
    }
}

fn downcast<T: Injectable>(instance: AnyInstance) -> Result<Arc<T>> {
    instance.downcast::<T>().map_err(|_| ConfigError::Downcast {
        type_name: std::any::type_name::<T>(),
    })
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("component_count", &self.len())
            .field("singleton_count", &self.singleton_count())
            .field("locked", &self.is_locked())
            .finish()
    }
}

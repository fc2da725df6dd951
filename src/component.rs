//! Component traits
//!
//! These traits describe what the container can build: the scope of a type,
//! the dependencies its constructor takes and the fields it wants injected
//! after construction.

use crate::{ConfigError, Container, Result};
use once_cell::sync::OnceCell;
use std::any::TypeId;
use std::sync::Arc;

/// Marker trait for types that can live in the container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// Component lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance for the lifetime of the container
    #[default]
    Singleton,

    /// New instance on every resolution, never cached
    Prototype,
}

impl Scope {
    /// Parse the textual scope used by `#[component(scope = "...")]`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "singleton" => Some(Scope::Singleton),
            "prototype" => Some(Scope::Prototype),
            _ => None,
        }
    }
}

/// Identity of a dependency type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl Dependency {
    #[inline]
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// An injectable field: its name and the type it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDependency {
    pub name: &'static str,
    pub dependency: Dependency,
}

impl FieldDependency {
    #[inline]
    pub fn of<T: 'static>(name: &'static str) -> Self {
        Self {
            name,
            dependency: Dependency::of::<T>(),
        }
    }
}

/// A component managed by the container.
///
/// `create` is the component's one constructor. Its argument lists the
/// constructor dependencies, each of which the container resolves with the
/// same lifecycle rules before calling it. After construction the container
/// calls `inject_fields`, which fills every [`Inject`] field.
///
/// # Example
///
/// ```rust
/// use component_dispatcher::{Component, Scope, Scanner};
/// use std::sync::Arc;
///
/// struct MessageService;
///
/// impl Component for MessageService {
///     type Dependencies = ();
///     fn create(_: ()) -> Self { MessageService }
/// }
///
/// struct RequestTimer(u64);
///
/// impl Component for RequestTimer {
///     const SCOPE: Scope = Scope::Prototype;
///     type Dependencies = ();
///     fn create(_: ()) -> Self { RequestTimer(7) }
/// }
///
/// struct Greeter {
///     messages: Arc<MessageService>,
///     timer: Arc<RequestTimer>,
/// }
///
/// impl Component for Greeter {
///     type Dependencies = (Arc<MessageService>, Arc<RequestTimer>);
///     fn create((messages, timer): Self::Dependencies) -> Self {
///         Greeter { messages, timer }
///     }
/// }
///
/// let dispatcher = Scanner::new()
///     .component::<MessageService>()
///     .component::<RequestTimer>()
///     .component::<Greeter>()
///     .scan()
///     .unwrap();
///
/// let greeter = dispatcher.container().resolve::<Greeter>().unwrap();
/// assert_eq!(greeter.timer.0, 7);
/// ```
pub trait Component: Injectable + Sized {
    /// Lifecycle of this component
    const SCOPE: Scope = Scope::Singleton;

    /// Constructor dependencies: `()`, `Arc<T>`, `Option<Arc<T>>` or a tuple of those.
    type Dependencies: Dependencies;

    /// Build the instance from its resolved constructor dependencies.
    fn create(deps: Self::Dependencies) -> Self;

    /// Fields filled after construction.
    fn field_dependencies() -> Vec<FieldDependency> {
        Vec::new()
    }

    /// Resolve and assign every injectable field.
    fn inject_fields(&self, _container: &Container) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Dependencies - constructor argument lists
// =============================================================================

/// Constructor argument lists the container knows how to resolve.
pub trait Dependencies: Sized {
    /// Resolve every dependency from the container.
    fn resolve(container: &Container) -> Result<Self>;

    /// The dependency types, in declaration order.
    fn describe() -> Vec<Dependency>;
}

// No dependencies
impl Dependencies for () {
    #[inline]
    fn resolve(_container: &Container) -> Result<Self> {
        Ok(())
    }

    fn describe() -> Vec<Dependency> {
        Vec::new()
    }
}

// Single dependency
impl<T: Injectable> Dependencies for Arc<T> {
    #[inline]
    fn resolve(container: &Container) -> Result<Self> {
        container.resolve::<T>()
    }

    fn describe() -> Vec<Dependency> {
        vec![Dependency::of::<T>()]
    }
}

// Optional dependency - only T itself being unregistered maps to None;
// a registered T that fails to build is still an error
impl<T: Injectable> Dependencies for Option<Arc<T>> {
    #[inline]
    fn resolve(container: &Container) -> Result<Self> {
        match container.resolve::<T>() {
            Ok(instance) => Ok(Some(instance)),
            Err(ConfigError::NotRegistered { type_id, .. }) if type_id == TypeId::of::<T>() => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn describe() -> Vec<Dependency> {
        vec![Dependency::of::<T>()]
    }
}

// Tuple implementations (2-8 elements), any mix of the forms above
macro_rules! impl_dependencies_tuple {
    ($($T:ident),+) => {
        impl<$($T: Dependencies),+> Dependencies for ($($T,)+) {
            #[inline]
            fn resolve(container: &Container) -> Result<Self> {
                Ok(($($T::resolve(container)?,)+))
            }

            fn describe() -> Vec<Dependency> {
                let mut deps = Vec::new();
                $(deps.extend($T::describe());)+
                deps
            }
        }
    };
}

impl_dependencies_tuple!(A, B);
impl_dependencies_tuple!(A, B, C);
impl_dependencies_tuple!(A, B, C, D);
impl_dependencies_tuple!(A, B, C, D, E);
impl_dependencies_tuple!(A, B, C, D, E, F);
impl_dependencies_tuple!(A, B, C, D, E, F, G);
impl_dependencies_tuple!(A, B, C, D, E, F, G, H);

// =============================================================================
// Inject - field injection slot
// =============================================================================

/// A field filled by the container right after construction.
///
/// Dereferencing before injection panics; inside a component built by the
/// container that cannot happen.
pub struct Inject<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T: Injectable> Inject<T> {
    #[inline]
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// The injected instance, if injection already ran
    #[inline]
    pub fn get(&self) -> Option<&Arc<T>> {
        self.cell.get()
    }

    /// Resolve `T` and store it. A second call keeps the first instance.
    pub fn inject(
        &self,
        container: &Container,
        owner: &'static str,
        field: &'static str,
    ) -> Result<()> {
        let instance = container
            .resolve::<T>()
            .map_err(|err| ConfigError::injection_failed(owner, field, err))?;
        let _ = self.cell.set(instance);
        Ok(())
    }
}

impl<T: Injectable> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Injectable> std::ops::Deref for Inject<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.cell
            .get()
            .expect("Inject field dereferenced before the container injected it")
    }
}

impl<T> std::fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inject")
            .field("type", &std::any::type_name::<T>())
            .field("injected", &self.cell.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Config;

    #[test]
    fn test_describe_tuple() {
        struct Cache;
        let deps = <(Arc<Config>, Arc<Cache>) as Dependencies>::describe();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0], Dependency::of::<Config>());
        assert_eq!(deps[1].type_id, TypeId::of::<Cache>());
    }

    #[test]
    fn test_mixed_tuple_resolves_missing_optional() {
        struct Cache;
        let container = Container::new();
        container.register_instance(Config);

        let (config, cache) =
            <(Arc<Config>, Option<Arc<Cache>>) as Dependencies>::resolve(&container).unwrap();
        assert!(Arc::strong_count(&config) >= 1);
        assert!(cache.is_none());
        assert_eq!(
            <(Arc<Config>, Option<Arc<Cache>>) as Dependencies>::describe().len(),
            2
        );
    }

    #[test]
    fn test_describe_unit() {
        assert!(<() as Dependencies>::describe().is_empty());
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("prototype"), Some(Scope::Prototype));
        assert_eq!(Scope::parse("singleton"), Some(Scope::Singleton));
        assert_eq!(Scope::parse("request"), None);
        assert_eq!(Scope::default(), Scope::Singleton);
    }

    #[test]
    fn test_inject_starts_empty() {
        let field: Inject<Config> = Inject::default();
        assert!(field.get().is_none());
    }
}

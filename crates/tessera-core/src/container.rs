//! Dependency container.
//!
//! The container is an explicit registry: every resolvable type identifier
//! maps to a factory function written by the application. Factories receive
//! the container so they can pull their own dependencies, which keeps the
//! dependency graph in ordinary, compiler-checked function signatures.
//!
//! Two kinds of entries live side by side:
//!
//! - **named bindings** (`bind` / `make`) used for controllers, middleware
//!   and anything else looked up by a string identifier. Trait objects are
//!   supported, so a binding can produce an `Arc<dyn Middleware>`.
//! - **typed services** (`register` / `resolve`) keyed by their Rust type.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera_core::Container;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! let mut container = Container::new();
//! container.bind::<dyn Greeter, _>("greeter", |_| Ok(Arc::new(English)));
//!
//! let greeter = container.make::<dyn Greeter>("greeter", false).unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Error when a dependency cannot be resolved.
#[derive(Debug, Clone, Error)]
#[error("failed to resolve {name}: {reason}")]
pub struct InjectionError {
    /// The identifier or type name that could not be resolved.
    pub name: String,
    /// The reason for the failure.
    pub reason: String,
}

impl InjectionError {
    /// Creates an error for an identifier with no binding.
    pub fn not_registered(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: "not registered".to_string(),
        }
    }

    /// Creates an error for a binding of a different type.
    pub fn type_mismatch<T: ?Sized>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: format!("binding does not produce {}", std::any::type_name::<T>()),
        }
    }

    /// Creates an error with a custom reason.
    pub fn custom(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

type Factory<T> = Arc<dyn Fn(&Container) -> Result<Arc<T>, InjectionError> + Send + Sync>;

struct Binding {
    produces: TypeId,
    // Holds a `Factory<T>`; `T` is recorded in `produces`.
    factory: Box<dyn Any + Send + Sync>,
}

/// A dependency container.
///
/// Shared instances produced by [`make`](Self::make) are cached, so the
/// container is usually wrapped in an `Arc` once the application is built.
#[derive(Default)]
pub struct Container {
    bindings: HashMap<String, Binding>,
    // Each value holds an `Arc<T>` for the binding's `T`.
    shared: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an identifier to a factory producing `Arc<T>`.
    ///
    /// Rebinding an identifier replaces the factory and drops any cached
    /// shared instance.
    pub fn bind<T, F>(&mut self, name: impl Into<String>, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Self) -> Result<Arc<T>, InjectionError> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: Factory<T> = Arc::new(factory);
        self.shared.get_mut().remove(&name);
        self.bindings.insert(
            name,
            Binding {
                produces: TypeId::of::<Arc<T>>(),
                factory: Box::new(factory),
            },
        );
    }

    /// Binds an identifier to an existing shared instance.
    pub fn instance<T>(&mut self, name: impl Into<String>, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let name = name.into();
        let cached = Arc::clone(&value);
        self.bind::<T, _>(name.clone(), move |_| Ok(Arc::clone(&value)));
        self.shared.get_mut().insert(name, Box::new(cached));
    }

    /// Returns `true` if the identifier has a binding.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Returns `true` if the identifier is bound to a factory of `T`.
    #[must_use]
    pub fn has_binding_for<T: ?Sized + 'static>(&self, name: &str) -> bool {
        self.bindings
            .get(name)
            .is_some_and(|b| b.produces == TypeId::of::<Arc<T>>())
    }

    /// Resolves an identifier.
    ///
    /// With `new_instance` set the factory always runs and the result is not
    /// cached; otherwise the first instance is cached and shared.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] if the identifier is unbound, bound to a
    /// different type, or its factory fails.
    pub fn make<T>(&self, name: &str, new_instance: bool) -> Result<Arc<T>, InjectionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if !new_instance {
            if let Some(cached) = self.shared.read().get(name) {
                return cached
                    .downcast_ref::<Arc<T>>()
                    .cloned()
                    .ok_or_else(|| InjectionError::type_mismatch::<T>(name));
            }
        }

        let binding = self
            .bindings
            .get(name)
            .ok_or_else(|| InjectionError::not_registered(name))?;
        let factory = binding
            .factory
            .downcast_ref::<Factory<T>>()
            .ok_or_else(|| InjectionError::type_mismatch::<T>(name))?;
        let value = factory(self)?;

        if !new_instance {
            let mut shared = self.shared.write();
            let entry = shared
                .entry(name.to_string())
                .or_insert_with(|| Box::new(Arc::clone(&value)));
            if let Some(existing) = entry.downcast_ref::<Arc<T>>() {
                return Ok(Arc::clone(existing));
            }
        }
        Ok(value)
    }

    /// Registers a typed service.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Resolves a typed service.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|s| Arc::clone(s).downcast::<T>().ok())
    }

    /// Resolves a typed service or returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] if the service is not registered.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectionError> {
        self.resolve()
            .ok_or_else(|| InjectionError::not_registered(std::any::type_name::<T>()))
    }

    /// Checks if a typed service is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("service_count", &self.services.len())
            .finish()
    }
}

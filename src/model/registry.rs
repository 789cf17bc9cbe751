//! Remote class name registry
//!
//! Maps remote (Java) class names to local Rust types so that decoded
//! objects and typed maps can come back as concrete structs, and so that the
//! encoder can name a local type on the wire. A process-wide registry is
//! available through [`TypeRegistry::global`]; encoders and decoders can also
//! be pointed at a private one.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use super::value::{Shared, Value};
use crate::protocol::error::{EncodeError, Result};

/// Upcast helper implemented for every `'static` type
pub trait AsAny {
    /// View as [`Any`] for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Mutable view as [`Any`]
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Rust type name, for diagnostics
    fn rust_type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn rust_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A local structured type that can cross the wire as an object or typed map
///
/// # Example
///
/// ```
/// use hessian2::{Pojo, Result, Value};
///
/// #[derive(Debug, Default, Clone)]
/// struct Car {
///     color: String,
/// }
///
/// impl Pojo for Car {
///     fn java_class_name(&self) -> Option<&str> {
///         Some("example.Car")
///     }
///
///     fn fields(&self) -> Vec<(String, Value)> {
///         vec![("color".into(), self.color.clone().into())]
///     }
///
///     fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
///         if name == "color" {
///             self.color = hessian2::FromValue::from_value(value)?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Pojo: AsAny + fmt::Debug + 'static {
    /// Remote class name the type reports for itself
    fn java_class_name(&self) -> Option<&str> {
        None
    }

    /// Field names and values in declaration order
    fn fields(&self) -> Vec<(String, Value)>;

    /// Assign a decoded field; unknown names should be ignored
    fn set_field(&mut self, name: &str, value: Value) -> Result<()>;

    /// Whether the type travels as a typed map instead of an object
    fn is_map(&self) -> bool {
        false
    }
}

/// Everything the codec needs to know about a registered type
pub struct TypeDescriptor {
    /// Remote class name
    pub class_name: String,
    /// Local type identity
    pub type_id: TypeId,
    /// Local type name
    pub rust_type: &'static str,
    /// Fields declared by the default instance
    pub field_names: Vec<String>,
    /// Travels as a typed map
    pub map_like: bool,
    constructor: fn() -> Shared<dyn Pojo>,
}

impl TypeDescriptor {
    /// Describe `T` under `class_name`
    pub fn of<T: Pojo + Default>(class_name: impl Into<String>) -> Self {
        let sample = T::default();
        Self {
            class_name: class_name.into(),
            type_id: TypeId::of::<T>(),
            rust_type: std::any::type_name::<T>(),
            field_names: sample.fields().into_iter().map(|(name, _)| name).collect(),
            map_like: sample.is_map(),
            constructor: || Shared::from_pojo(T::default()),
        }
    }

    /// Fresh default instance
    #[must_use]
    pub fn instantiate(&self) -> Shared<dyn Pojo> {
        (self.constructor)()
    }

    /// Whether a decoded field should be handed to `set_field`
    #[must_use]
    pub fn accepts(&self, field: &str) -> bool {
        self.map_like || self.field_names.iter().any(|name| name == field)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("class_name", &self.class_name)
            .field("rust_type", &self.rust_type)
            .field("field_names", &self.field_names)
            .field("map_like", &self.map_like)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RegistryInner {
    by_name: HashMap<String, Arc<TypeDescriptor>>,
    by_type: HashMap<TypeId, Arc<TypeDescriptor>>,
}

/// Thread-safe mapping between remote class names and local types
#[derive(Default)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

static GLOBAL_REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

impl TypeRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`crate::encode`] and [`crate::decode`]
    pub fn global() -> &'static Self {
        GLOBAL_REGISTRY.get_or_init(Self::new)
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a descriptor; a later registration of the same name wins
    pub fn register(&self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let descriptor = Arc::new(descriptor);
        let mut inner = self.write();

        if let Some(previous) = inner
            .by_name
            .insert(descriptor.class_name.clone(), Arc::clone(&descriptor))
        {
            warn!(
                class_name = %descriptor.class_name,
                previous = previous.rust_type,
                replacement = descriptor.rust_type,
                "remote class re-registered"
            );
            if inner
                .by_type
                .get(&previous.type_id)
                .is_some_and(|current| Arc::ptr_eq(current, &previous))
            {
                inner.by_type.remove(&previous.type_id);
            }
        }
        inner
            .by_type
            .insert(descriptor.type_id, Arc::clone(&descriptor));

        debug!(
            class_name = %descriptor.class_name,
            rust_type = descriptor.rust_type,
            "registered remote class"
        );
        descriptor
    }

    /// Register `T` under the class name it reports for itself
    pub fn register_pojo<T: Pojo + Default>(&self) -> Result<String> {
        let sample = T::default();
        let name = sample
            .java_class_name()
            .map(str::to_owned)
            .ok_or(EncodeError::UnresolvedClassName {
                rust_type: std::any::type_name::<T>(),
            })?;
        self.register(TypeDescriptor::of::<T>(name.clone()));
        Ok(name)
    }

    /// Register `T` under an explicit class name
    pub fn register_pojo_mapping<T: Pojo + Default>(&self, class_name: impl Into<String>) {
        self.register(TypeDescriptor::of::<T>(class_name));
    }

    /// Descriptor registered for a remote class name
    #[must_use]
    pub fn lookup(&self, class_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.read().by_name.get(class_name).cloned()
    }

    /// Descriptor registered for a local type
    #[must_use]
    pub fn lookup_type(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.read().by_type.get(&type_id).cloned()
    }

    /// Remove a registration, returning it
    pub fn unregister(&self, class_name: &str) -> Option<Arc<TypeDescriptor>> {
        let mut inner = self.write();
        let removed = inner.by_name.remove(class_name)?;
        if inner
            .by_type
            .get(&removed.type_id)
            .is_some_and(|current| Arc::ptr_eq(current, &removed))
        {
            inner.by_type.remove(&removed.type_id);
        }
        Some(removed)
    }

    /// Check if a class name is registered
    #[must_use]
    pub fn contains(&self, class_name: &str) -> bool {
        self.read().by_name.contains_key(class_name)
    }

    /// Number of registered class names
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_name.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().by_name.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        let mut names: Vec<&str> = inner.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry").field("classes", &names).finish()
    }
}

/// Register `T` in the global registry under its self-reported class name
pub fn register_pojo<T: Pojo + Default>() -> Result<String> {
    TypeRegistry::global().register_pojo::<T>()
}

/// Register `T` in the global registry under an explicit class name
pub fn register_pojo_mapping<T: Pojo + Default>(class_name: impl Into<String>) {
    TypeRegistry::global().register_pojo_mapping::<T>(class_name);
}

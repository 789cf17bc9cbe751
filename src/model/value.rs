//! Hessian2 value model
//!
//! Composite values (lists, maps, objects and registered structured types)
//! are held through [`Shared`] handles. Cloning a [`Value`] clones the handle,
//! so two positions in a graph can point at the same composite and a
//! composite can contain itself. This is what lets the encoder detect
//! aliasing and the decoder splice back-references without copying.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;

use super::registry::Pojo;

/// Reference-counted, interior-mutable handle to a composite value
pub struct Shared<T: ?Sized>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    /// Wrap a composite in a new handle
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }
}

impl Shared<dyn Pojo> {
    /// Wrap a structured value in a new type-erased handle
    pub fn from_pojo<T: Pojo>(pojo: T) -> Self {
        Self(Rc::new(RefCell::new(pojo)))
    }
}

impl<T: ?Sized> Shared<T> {
    /// Immutably borrow the composite
    ///
    /// # Panics
    ///
    /// Panics if the composite is currently mutably borrowed.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutably borrow the composite
    ///
    /// # Panics
    ///
    /// Panics if the composite is currently borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Immutably borrow the composite, or `None` while it is mutably borrowed
    #[must_use]
    pub fn try_borrow(&self) -> Option<Ref<'_, T>> {
        self.0.try_borrow().ok()
    }

    /// Check whether two handles point at the same composite
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the composite, stable for the handle's lifetime
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

thread_local! {
    static DEBUG_PATH: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self.addr();
        let cyclic = DEBUG_PATH.with(|path| {
            let mut path = path.borrow_mut();
            if path.contains(&addr) {
                true
            } else {
                path.push(addr);
                false
            }
        });
        if cyclic {
            return write!(f, "<cycle {addr:#x}>");
        }

        let result = match self.0.try_borrow() {
            Ok(inner) => inner.fmt(f),
            Err(_) => f.write_str("<borrowed>"),
        };
        DEBUG_PATH.with(|path| {
            path.borrow_mut().pop();
        });
        result
    }
}

/// Kind of a [`Value`], ignoring payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Null
    Null,
    /// Boolean
    Bool,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// Double-precision float
    Double,
    /// UTF-8 string
    String,
    /// Binary blob
    Binary,
    /// Epoch milliseconds
    Date,
    /// List
    List,
    /// Map
    Map,
    /// Class-described object, generic or registered
    Object,
    /// Explicit back-reference
    Ref,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Date => "date",
            Self::List => "list",
            Self::Map => "map",
            Self::Object => "object",
            Self::Ref => "ref",
        };
        write!(f, "{name}")
    }
}

/// A Hessian2 value
#[derive(Debug, Clone)]
pub enum Value {
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Double-precision float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Binary blob
    Binary(Bytes),
    /// Milliseconds since the Unix epoch
    Date(i64),
    /// Ordered sequence, optionally typed
    List(Shared<List>),
    /// Ordered key/value pairs, optionally typed
    Map(Shared<Map>),
    /// Object of a class with no local registration
    Object(Shared<Object>),
    /// Instance of a registered local structured type
    Pojo(Shared<dyn Pojo>),
    /// Back-reference to the composite assigned this id in the same session
    Ref(u32),
}

impl Value {
    /// Untyped list
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Shared::new(List::new(items)))
    }

    /// List declaring its element type
    pub fn typed_list(type_name: impl Into<String>, items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Shared::new(List::typed(type_name, items)))
    }

    /// Wrap a map
    pub fn map(map: Map) -> Self {
        Self::Map(Shared::new(map))
    }

    /// Wrap a generic object
    pub fn object(object: Object) -> Self {
        Self::Object(Shared::new(object))
    }

    /// Wrap a structured value
    pub fn pojo<T: Pojo>(pojo: T) -> Self {
        Self::Pojo(Shared::from_pojo(pojo))
    }

    /// Kind of this value
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
            Self::Binary(_) => ValueKind::Binary,
            Self::Date(_) => ValueKind::Date,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
            Self::Object(_) | Self::Pojo(_) => ValueKind::Object,
            Self::Ref(_) => ValueKind::Ref,
        }
    }

    /// Check if null
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value takes a reference slot
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::List(_) | Self::Map(_) | Self::Object(_) | Self::Pojo(_)
        )
    }

    /// Boolean payload
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Int payload
    #[must_use]
    pub const fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Int or long payload, widened
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Double payload
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Binary payload
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    /// List handle
    #[must_use]
    pub const fn as_list(&self) -> Option<&Shared<List>> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Map handle
    #[must_use]
    pub const fn as_map(&self) -> Option<&Shared<Map>> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Generic object handle
    #[must_use]
    pub const fn as_object(&self) -> Option<&Shared<Object>> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Structured value handle
    #[must_use]
    pub const fn as_pojo(&self) -> Option<&Shared<dyn Pojo>> {
        match self {
            Self::Pojo(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the structured value as `T` if it is one
    #[must_use]
    pub fn downcast_pojo<T: Pojo>(&self) -> Option<Ref<'_, T>> {
        let pojo = self.as_pojo()?.try_borrow()?;
        Ref::filter_map(pojo, |p| p.as_any().downcast_ref::<T>()).ok()
    }

    /// Address of the composite behind this value
    pub(crate) fn composite_addr(&self) -> Option<usize> {
        match self {
            Self::List(v) => Some(v.addr()),
            Self::Map(v) => Some(v.addr()),
            Self::Object(v) => Some(v.addr()),
            Self::Pojo(v) => Some(v.addr()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        graph_eq(self, other, &mut Vec::new())
    }
}

/// Structural equality that assumes pairs already under comparison are equal
fn graph_eq(a: &Value, b: &Value, path: &mut Vec<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Long(x), Value::Long(y)) | (Value::Date(x), Value::Date(y)) => x == y,
        (Value::Double(x), Value::Double(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Binary(x), Value::Binary(y)) => x == y,
        (Value::Ref(x), Value::Ref(y)) => x == y,
        (Value::List(x), Value::List(y)) => shared_eq(x, y, path, |x, y, path| {
            x.type_name == y.type_name
                && x.items.len() == y.items.len()
                && x.items.iter().zip(&y.items).all(|(a, b)| graph_eq(a, b, path))
        }),
        (Value::Map(x), Value::Map(y)) => shared_eq(x, y, path, |x, y, path| {
            x.type_name == y.type_name
                && x.entries.len() == y.entries.len()
                && x.entries.iter().all(|(key, value)| {
                    y.entries
                        .iter()
                        .find(|(other, _)| graph_eq(key, other, path))
                        .is_some_and(|(_, other)| graph_eq(value, other, path))
                })
        }),
        (Value::Object(x), Value::Object(y)) => shared_eq(x, y, path, |x, y, path| {
            x.class_name == y.class_name && fields_eq(&x.fields, &y.fields, path)
        }),
        (Value::Pojo(x), Value::Pojo(y)) => shared_eq(x, y, path, |x, y, path| {
            x.rust_type_name() == y.rust_type_name() && fields_eq(&x.fields(), &y.fields(), path)
        }),
        _ => false,
    }
}

fn fields_eq(x: &[(String, Value)], y: &[(String, Value)], path: &mut Vec<(usize, usize)>) -> bool {
    x.len() == y.len()
        && x
            .iter()
            .zip(y)
            .all(|((xn, xv), (yn, yv))| xn == yn && graph_eq(xv, yv, path))
}

fn shared_eq<T: ?Sized>(
    x: &Shared<T>,
    y: &Shared<T>,
    path: &mut Vec<(usize, usize)>,
    body: impl FnOnce(&T, &T, &mut Vec<(usize, usize)>) -> bool,
) -> bool {
    if x.ptr_eq(y) {
        return true;
    }
    let pair = (x.addr(), y.addr());
    if path.contains(&pair) {
        return true;
    }
    let (Some(xb), Some(yb)) = (x.try_borrow(), y.try_borrow()) else {
        return false;
    };
    path.push(pair);
    let equal = body(&xb, &yb, path);
    path.pop();
    equal
}

/// Ordered sequence of values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct List {
    /// Declared element type, e.g. `[int` or `java.util.ArrayList`
    pub type_name: Option<String>,
    /// Elements in order
    pub items: Vec<Value>,
}

impl List {
    /// Untyped list
    pub fn new(items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            type_name: None,
            items: items.into_iter().collect(),
        }
    }

    /// List declaring its element type
    pub fn typed(type_name: impl Into<String>, items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            items: items.into_iter().collect(),
        }
    }

    /// Append an element
    pub fn push(&mut self, item: impl Into<Value>) {
        self.items.push(item.into());
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check whether every non-null element has the same kind
    #[must_use]
    pub fn is_homogeneous(&self) -> bool {
        all_same_kind(self.items.iter().filter(|v| !v.is_null()))
    }
}

/// Ordered key/value pairs
///
/// Keys may be of any kind, including composites. Lookup is linear and uses
/// structural equality.
#[derive(Debug, Clone, Default)]
pub struct Map {
    /// Wire type name; only honoured when keys and values are homogeneous
    pub type_name: Option<String>,
    /// Entries in insertion order
    pub entries: Vec<(Value, Value)>,
}

impl Map {
    /// Untyped, empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty map carrying a wire type name
    pub fn typed(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            entries: Vec::new(),
        }
    }

    /// Insert or replace an entry, returning the previous value
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Value stored under `key`
    pub fn get(&self, key: impl Into<Value>) -> Option<&Value> {
        let key = key.into();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Remove an entry, returning its value
    pub fn remove(&mut self, key: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let index = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Drop every entry, breaking any cycles through this map
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in order
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Kind shared by every key, if any
    #[must_use]
    pub fn key_kind(&self) -> Option<ValueKind> {
        single_kind(self.entries.iter().map(|(k, _)| k))
    }

    /// Kind shared by every non-null value, if any
    #[must_use]
    pub fn value_kind(&self) -> Option<ValueKind> {
        single_kind(self.entries.iter().map(|(_, v)| v).filter(|v| !v.is_null()))
    }

    /// Check whether keys and non-null values each have a single kind
    ///
    /// Empty maps and maps whose values are all null are homogeneous.
    #[must_use]
    pub fn is_homogeneous(&self) -> bool {
        let keys = self.entries.iter().map(|(k, _)| k);
        let values = self.entries.iter().map(|(_, v)| v).filter(|v| !v.is_null());
        all_same_kind(keys) && all_same_kind(values)
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        Value::map(self.clone()) == Value::map(other.clone())
    }
}

fn all_same_kind<'a>(mut values: impl Iterator<Item = &'a Value>) -> bool {
    match values.next() {
        Some(first) => {
            let kind = first.kind();
            values.all(|v| v.kind() == kind)
        }
        None => true,
    }
}

fn single_kind<'a>(mut values: impl Iterator<Item = &'a Value>) -> Option<ValueKind> {
    let kind = values.next()?.kind();
    values.all(|v| v.kind() == kind).then_some(kind)
}

/// Object of a remote class without a local registration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    /// Remote class name
    pub class_name: String,
    /// Field names and values in declaration order
    pub fields: Vec<(String, Value)>,
}

impl Object {
    /// Object with no fields
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Value of a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Set a field, appending it if absent
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::Int(i32::from(v))
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int(i32::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Double(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Binary(v)
    }
}

impl From<List> for Value {
    fn from(v: List) -> Self {
        Self::List(Shared::new(v))
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Self::Map(Shared::new(v))
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Self::Object(Shared::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

//! Conversions between Rust types and [`Value`]

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use super::registry::Pojo;
use super::value::{List, Map, Value, ValueKind};
use crate::protocol::error::{DecodeError, Result};

/// Wire type name written for Rust hash maps
pub const HASH_MAP_TYPE: &str = "java.util.HashMap";

/// Wire type name written for Rust ordered maps
pub const TREE_MAP_TYPE: &str = "java.util.TreeMap";

/// Build a [`Value`] from a Rust value
pub trait ToValue {
    /// Convert into the value model
    fn to_value(&self) -> Value;
}

/// Build a Rust value from a decoded [`Value`]
///
/// Null converts to `None` for `Option<T>` and to an empty value for
/// strings, binaries, vectors and maps. Numbers, booleans and dates reject
/// null with `TypeMismatch`; declare such fields as `Option<T>` when the
/// peer may leave them unset.
pub trait FromValue: Sized {
    /// Convert from the value model
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(value: &Value, target: &'static str) -> DecodeError {
    DecodeError::TypeMismatch {
        found: value.kind(),
        target,
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| mismatch(&value, "bool").into())
    }
}

macro_rules! narrow_int {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::from(*self)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    let wide = value
                        .as_i64()
                        .ok_or_else(|| mismatch(&value, stringify!($ty)))?;
                    <$ty>::try_from(wide).map_err(|_| {
                        DecodeError::OutOfRange {
                            value: wide,
                            target: stringify!($ty),
                        }
                        .into()
                    })
                }
            }
        )*
    };
}

narrow_int!(i8, i16, i32, i64);

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Double(f64::from(*self))
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl FromValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Double(v) => Ok(v),
            Value::Int(v) => Ok(f64::from(v)),
            Value::Long(v) => Ok(v as f64),
            other => Err(mismatch(&other, "f64").into()),
        }
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(self.to_owned())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(v) => Ok(v),
            Value::Null => Ok(Self::new()),
            other => Err(mismatch(&other, "String").into()),
        }
    }
}

impl ToValue for Bytes {
    fn to_value(&self) -> Value {
        Value::Binary(self.clone())
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Binary(v) => Ok(v),
            Value::Null => Ok(Self::new()),
            other => Err(mismatch(&other, "Bytes").into()),
        }
    }
}

impl ToValue for SystemTime {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn to_value(&self) -> Value {
        let millis = match self.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_millis() as i64,
            Err(before) => -(before.duration().as_millis() as i64),
        };
        Value::Date(millis)
    }
}

impl FromValue for SystemTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(millis) => {
                let offset = Duration::from_millis(millis.unsigned_abs());
                let time = if millis >= 0 {
                    UNIX_EPOCH.checked_add(offset)
                } else {
                    UNIX_EPOCH.checked_sub(offset)
                };
                time.ok_or_else(|| {
                    DecodeError::OutOfRange {
                        value: millis,
                        target: "SystemTime",
                    }
                    .into()
                })
            }
            other => Err(mismatch(&other, "SystemTime").into()),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::list(self.iter().map(ToValue::to_value))
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        let list = match &value {
            Value::List(list) => list,
            Value::Null => return Ok(Self::new()),
            other => return Err(mismatch(other, "Vec").into()),
        };
        let items = list.try_borrow().ok_or(DecodeError::Borrowed)?.items.clone();
        items.into_iter().map(T::from_value).collect()
    }
}

fn map_entries(value: &Value, target: &'static str) -> Result<Vec<(Value, Value)>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Map(map) => Ok(map
            .try_borrow()
            .ok_or(DecodeError::Borrowed)?
            .entries
            .clone()),
        Value::Pojo(pojo) => {
            let pojo = pojo.try_borrow().ok_or(DecodeError::Borrowed)?;
            if pojo.is_map() {
                Ok(pojo
                    .fields()
                    .into_iter()
                    .map(|(name, value)| (Value::String(name), value))
                    .collect())
            } else {
                Err(mismatch(value, target).into())
            }
        }
        other => Err(mismatch(other, target).into()),
    }
}

impl<K: ToValue, V: ToValue, S> ToValue for HashMap<K, V, S> {
    fn to_value(&self) -> Value {
        let mut map = Map::typed(HASH_MAP_TYPE);
        map.entries = self
            .iter()
            .map(|(k, v)| (k.to_value(), v.to_value()))
            .collect();
        Value::map(map)
    }
}

impl<K, V, S> FromValue for HashMap<K, V, S>
where
    K: FromValue + Eq + Hash,
    V: FromValue,
    S: BuildHasher + Default,
{
    fn from_value(value: Value) -> Result<Self> {
        map_entries(&value, "HashMap")?
            .into_iter()
            .map(|(k, v)| -> Result<(K, V)> { Ok((K::from_value(k)?, V::from_value(v)?)) })
            .collect()
    }
}

impl<K: ToValue, V: ToValue> ToValue for BTreeMap<K, V> {
    fn to_value(&self) -> Value {
        let mut map = Map::typed(TREE_MAP_TYPE);
        map.entries = self
            .iter()
            .map(|(k, v)| (k.to_value(), v.to_value()))
            .collect();
        Value::map(map)
    }
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    fn from_value(value: Value) -> Result<Self> {
        map_entries(&value, "BTreeMap")?
            .into_iter()
            .map(|(k, v)| -> Result<(K, V)> { Ok((K::from_value(k)?, V::from_value(v)?)) })
            .collect()
    }
}

impl ToValue for List {
    fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl ToValue for Map {
    fn to_value(&self) -> Value {
        Value::map(self.clone())
    }
}

fn source_fields(value: &Value, target: &'static str) -> Result<(String, Vec<(String, Value)>)> {
    match value {
        Value::Object(object) => {
            let object = object.try_borrow().ok_or(DecodeError::Borrowed)?;
            Ok((object.class_name.clone(), object.fields.clone()))
        }
        Value::Map(map) => {
            let map = map.try_borrow().ok_or(DecodeError::Borrowed)?;
            let fields = map
                .entries
                .iter()
                .map(|(k, v)| match k {
                    Value::String(name) => Ok((name.clone(), v.clone())),
                    other => Err(DecodeError::NonStringField {
                        class_name: map.type_name.clone().unwrap_or_default(),
                        found: other.kind(),
                    }),
                })
                .collect::<std::result::Result<_, _>>()?;
            Ok((map.type_name.clone().unwrap_or_default(), fields))
        }
        Value::Pojo(pojo) => {
            let pojo = pojo.try_borrow().ok_or(DecodeError::Borrowed)?;
            let class_name = pojo.java_class_name().unwrap_or_default().to_owned();
            Ok((class_name, pojo.fields()))
        }
        other => Err(mismatch(other, target).into()),
    }
}

/// Convert a decoded value into a concrete structured type
///
/// A registered instance of `T` is cloned out directly. Generic objects, maps
/// and other structured values are copied field by field onto `T::default()`;
/// fields `T` does not declare are dropped and missing ones keep their
/// defaults.
pub fn pojo_from_value<T: Pojo + Default + Clone>(value: Value) -> Result<T> {
    if let Some(pojo) = value.downcast_pojo::<T>() {
        return Ok(pojo.clone());
    }
    let (_, fields) = source_fields(&value, std::any::type_name::<T>())?;
    let mut target = T::default();
    let declared: Vec<String> = target.fields().into_iter().map(|(name, _)| name).collect();
    let map_like = target.is_map();
    for (name, field) in fields {
        if map_like || declared.contains(&name) {
            target.set_field(&name, field)?;
        }
    }
    Ok(target)
}

/// Like [`pojo_from_value`] but rejects values whose field set differs from `T`
pub fn pojo_from_value_strict<T: Pojo + Default + Clone>(value: Value) -> Result<T> {
    if let Some(pojo) = value.downcast_pojo::<T>() {
        return Ok(pojo.clone());
    }
    let (class_name, fields) = source_fields(&value, std::any::type_name::<T>())?;
    let mut target = T::default();
    let mut declared: Vec<String> = target.fields().into_iter().map(|(name, _)| name).collect();
    let mut found: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
    declared.sort_unstable();
    found.sort_unstable();
    if !target.is_map() && declared != found {
        return Err(DecodeError::FieldMismatch {
            class_name,
            expected: declared.len(),
            found: found.len(),
        }
        .into());
    }
    for (name, field) in fields {
        target.set_field(&name, field)?;
    }
    Ok(target)
}

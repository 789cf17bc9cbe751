//! Hessian2 encoder
//!
//! Writes values in their most compact grammar form. An [`Encoder`] is one
//! output stream: class definitions and type names written earlier are
//! referenced by index in later values, while the reference table is reset
//! for every top-level [`Encoder::encode`] call.

use std::collections::HashMap;
use std::time::Instant;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, instrument, trace};

use super::error::{EncodeError, Result};
use super::metrics::Metrics;
use super::refs::ReferenceTable;
use super::tags;
use crate::model::{List, Map, Object, Pojo, Shared, ToValue, TypeRegistry, Value};

/// Encoder tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Largest string (UTF-16 units) or binary (bytes) written as one chunk
    ///
    /// Clamped to `2..=0x8000`.
    pub chunk_size: usize,
    /// Write whole-minute dates in the 4-byte minute form
    pub compact_dates: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            chunk_size: tags::CHUNK_SIZE,
            compact_dates: true,
        }
    }
}

/// Serializes value graphs into a Hessian2 byte stream
pub struct Encoder<'r> {
    output: BytesMut,
    refs: ReferenceTable,
    classes: HashMap<(String, Vec<String>), usize>,
    types: HashMap<String, usize>,
    registry: &'r TypeRegistry,
    config: EncoderConfig,
}

impl Encoder<'static> {
    /// Encoder backed by the global registry
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::global())
    }

    /// Encoder with custom settings, backed by the global registry
    #[must_use]
    pub fn with_config(config: EncoderConfig) -> Self {
        Self::new().config(config)
    }
}

impl Default for Encoder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Encoder<'r> {
    /// Encoder that resolves class names against `registry`
    #[must_use]
    pub fn with_registry(registry: &'r TypeRegistry) -> Self {
        Self {
            output: BytesMut::with_capacity(256),
            refs: ReferenceTable::new(),
            classes: HashMap::new(),
            types: HashMap::new(),
            registry,
            config: EncoderConfig::default(),
        }
    }

    /// Replace the settings
    #[must_use]
    pub fn config(mut self, config: EncoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Append one top-level value
    ///
    /// On failure nothing is appended and the stream state is unchanged.
    #[instrument(level = "trace", skip_all)]
    pub fn encode(&mut self, value: &Value) -> Result<()> {
        let start = Instant::now();
        let offset = self.output.len();
        let classes = self.classes.len();
        let types = self.types.len();
        self.refs.clear();

        let result = self.write_value(value);
        self.refs.clear();

        match &result {
            Ok(()) => Metrics::record_encode(self.output.len() - offset, start.elapsed()),
            Err(err) => {
                debug!(error = %err, "encode failed");
                self.output.truncate(offset);
                self.classes.retain(|_, index| *index < classes);
                self.types.retain(|_, index| *index < types);
                Metrics::record_encode_error();
            }
        }
        result
    }

    /// Convert a Rust value and append it
    pub fn encode_as<T: ToValue + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.encode(&value.to_value())
    }

    /// Bytes written so far
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.output
    }

    /// Finish the stream
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.output.freeze()
    }

    /// Number of bytes written
    #[must_use]
    pub fn len(&self) -> usize {
        self.output.len()
    }

    /// Check if nothing has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Start a fresh stream, forgetting class definitions and type names
    pub fn clear(&mut self) {
        self.output.clear();
        self.refs.clear();
        self.classes.clear();
        self.types.clear();
    }

    fn chunk_size(&self) -> usize {
        self.config.chunk_size.clamp(2, tags::CHUNK_SIZE)
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.output.put_u8(tags::NULL),
            Value::Bool(true) => self.output.put_u8(tags::TRUE),
            Value::Bool(false) => self.output.put_u8(tags::FALSE),
            Value::Int(v) => self.write_int(*v),
            Value::Long(v) => self.write_long(*v),
            Value::Double(v) => self.write_double(*v),
            Value::String(v) => self.write_string(v),
            Value::Binary(v) => self.write_binary(v),
            Value::Date(v) => self.write_date(*v),
            Value::Ref(id) => self.write_explicit_ref(*id)?,
            Value::List(_) | Value::Map(_) | Value::Object(_) | Value::Pojo(_) => {
                self.write_composite(value)?;
            }
        }
        Ok(())
    }

    fn write_composite(&mut self, value: &Value) -> Result<()> {
        if let Some(id) = self.refs.lookup(value) {
            return self.write_ref(id);
        }
        let len = self.refs.len();
        self.refs
            .insert(value.clone())
            .ok_or(EncodeError::TooLarge { len })?;

        match value {
            Value::List(list) => self.write_list(list),
            Value::Map(map) => self.write_map(map),
            Value::Object(object) => self.write_object(object),
            Value::Pojo(pojo) => self.write_pojo(pojo),
            _ => Ok(()),
        }
    }

    fn write_explicit_ref(&mut self, id: u32) -> Result<()> {
        if usize::try_from(id).is_ok_and(|slot| slot < self.refs.len()) {
            return self.write_ref(id);
        }
        Err(EncodeError::DanglingReference {
            id,
            next: u32::try_from(self.refs.len()).unwrap_or(u32::MAX),
        }
        .into())
    }

    fn write_ref(&mut self, id: u32) -> Result<()> {
        let id = i32::try_from(id).map_err(|_| EncodeError::TooLarge { len: id as usize })?;
        self.output.put_u8(tags::REF);
        self.write_int(id);
        Metrics::record_back_reference();
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_int(&mut self, v: i32) {
        if (tags::INT_DIRECT_MIN..=tags::INT_DIRECT_MAX).contains(&v) {
            self.output.put_u8((v + i32::from(tags::INT_ZERO)) as u8);
        } else if (tags::INT_BYTE_MIN..=tags::INT_BYTE_MAX).contains(&v) {
            self.output
                .put_u8((i32::from(tags::INT_BYTE_ZERO) + (v >> 8)) as u8);
            self.output.put_u8(v as u8);
        } else if (tags::INT_SHORT_MIN..=tags::INT_SHORT_MAX).contains(&v) {
            self.output
                .put_u8((i32::from(tags::INT_SHORT_ZERO) + (v >> 16)) as u8);
            self.output.put_u16(v as u16);
        } else {
            self.output.put_u8(tags::INT);
            self.output.put_i32(v);
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_long(&mut self, v: i64) {
        if (tags::LONG_DIRECT_MIN..=tags::LONG_DIRECT_MAX).contains(&v) {
            self.output.put_u8((v + i64::from(tags::LONG_ZERO)) as u8);
        } else if (i64::from(tags::INT_BYTE_MIN)..=i64::from(tags::INT_BYTE_MAX)).contains(&v) {
            self.output
                .put_u8((i64::from(tags::LONG_BYTE_ZERO) + (v >> 8)) as u8);
            self.output.put_u8(v as u8);
        } else if (i64::from(tags::INT_SHORT_MIN)..=i64::from(tags::INT_SHORT_MAX)).contains(&v)
        {
            self.output
                .put_u8((i64::from(tags::LONG_SHORT_ZERO) + (v >> 16)) as u8);
            self.output.put_u16(v as u16);
        } else if let Ok(v) = i32::try_from(v) {
            self.output.put_u8(tags::LONG_INT);
            self.output.put_i32(v);
        } else {
            self.output.put_u8(tags::LONG);
            self.output.put_i64(v);
        }
    }

    #[allow(
        clippy::float_cmp,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn write_double(&mut self, v: f64) {
        // -0.0 compares equal to 0 and would lose its sign in any compact form
        if v == 0.0 && v.is_sign_negative() {
            self.output.put_u8(tags::DOUBLE);
            self.output.put_f64(v);
            return;
        }

        let whole = v as i32;
        if f64::from(whole) == v {
            match whole {
                0 => return self.output.put_u8(tags::DOUBLE_ZERO),
                1 => return self.output.put_u8(tags::DOUBLE_ONE),
                -0x80..=0x7f => {
                    self.output.put_u8(tags::DOUBLE_BYTE);
                    self.output.put_i8(whole as i8);
                    return;
                }
                -0x8000..=0x7fff => {
                    self.output.put_u8(tags::DOUBLE_SHORT);
                    self.output.put_i16(whole as i16);
                    return;
                }
                _ => {}
            }
        }

        let mills = (v * 1000.0) as i32;
        if 0.001 * f64::from(mills) == v {
            self.output.put_u8(tags::DOUBLE_MILL);
            self.output.put_i32(mills);
            return;
        }

        self.output.put_u8(tags::DOUBLE);
        self.output.put_f64(v);
    }

    fn write_date(&mut self, millis: i64) {
        if self.config.compact_dates && millis % 60_000 == 0 {
            if let Ok(minutes) = i32::try_from(millis / 60_000) {
                self.output.put_u8(tags::DATE_MINUTE);
                self.output.put_i32(minutes);
                return;
            }
        }
        self.output.put_u8(tags::DATE);
        self.output.put_i64(millis);
    }

    fn write_string(&mut self, s: &str) {
        let chunk = self.chunk_size();
        if s.is_ascii() && s.len() <= chunk {
            self.write_string_header(s.len());
            self.output.put_slice(s.as_bytes());
            return;
        }

        let units: Vec<u16> = s.encode_utf16().collect();
        let mut rest = units.as_slice();
        while rest.len() > chunk {
            let mut len = chunk;
            if is_high_surrogate(rest[len - 1]) {
                len -= 1;
            }
            let (head, tail) = rest.split_at(len);
            self.output.put_u8(tags::STRING_CHUNK);
            self.output.put_u16(chunk_len(len));
            self.put_units(head);
            rest = tail;
        }
        self.write_string_header(rest.len());
        self.put_units(rest);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_string_header(&mut self, units: usize) {
        if units <= tags::STRING_DIRECT_MAX {
            self.output.put_u8(units as u8);
        } else if units <= tags::STRING_SHORT_MAX {
            self.output.put_u8(tags::STRING_SHORT + (units >> 8) as u8);
            self.output.put_u8(units as u8);
        } else {
            self.output.put_u8(tags::STRING);
            self.output.put_u16(chunk_len(units));
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn put_units(&mut self, units: &[u16]) {
        for &unit in units {
            if unit < 0x80 {
                self.output.put_u8(unit as u8);
            } else if unit < 0x800 {
                self.output.put_u8(0xc0 | (unit >> 6) as u8);
                self.output.put_u8(0x80 | (unit & 0x3f) as u8);
            } else {
                self.output.put_u8(0xe0 | (unit >> 12) as u8);
                self.output.put_u8(0x80 | ((unit >> 6) & 0x3f) as u8);
                self.output.put_u8(0x80 | (unit & 0x3f) as u8);
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_binary(&mut self, data: &[u8]) {
        let chunk = self.chunk_size();
        let mut rest = data;
        while rest.len() > chunk {
            let (head, tail) = rest.split_at(chunk);
            self.output.put_u8(tags::BINARY_CHUNK);
            self.output.put_u16(chunk_len(chunk));
            self.output.put_slice(head);
            rest = tail;
        }

        let len = rest.len();
        if len <= tags::BINARY_DIRECT_MAX {
            self.output.put_u8(tags::BINARY_DIRECT + len as u8);
        } else if len <= tags::BINARY_SHORT_MAX {
            self.output.put_u8(tags::BINARY_SHORT + (len >> 8) as u8);
            self.output.put_u8(len as u8);
        } else {
            self.output.put_u8(tags::BINARY);
            self.output.put_u16(chunk_len(len));
        }
        self.output.put_slice(rest);
    }

    fn write_type(&mut self, name: &str) -> Result<()> {
        if let Some(&index) = self.types.get(name) {
            self.write_int(wire_len(index)?);
            return Ok(());
        }
        self.types.insert(name.to_owned(), self.types.len());
        self.write_string(name);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_list(&mut self, list: &Shared<List>) -> Result<()> {
        let list = list.try_borrow().ok_or(EncodeError::Borrowed)?;
        let len = list.items.len();

        let type_name = match list.type_name.as_deref() {
            Some(type_name) if !list.is_homogeneous() => {
                trace!(type_name, "mixed list elements, writing untyped");
                None
            }
            type_name => type_name,
        };

        match type_name {
            Some(type_name) if len <= tags::LIST_DIRECT_MAX => {
                self.output.put_u8(tags::LIST_DIRECT + len as u8);
                self.write_type(type_name)?;
            }
            Some(type_name) => {
                self.output.put_u8(tags::LIST_FIXED);
                self.write_type(type_name)?;
                self.write_int(wire_len(len)?);
            }
            None if len <= tags::LIST_DIRECT_MAX => {
                self.output.put_u8(tags::LIST_DIRECT_UNTYPED + len as u8);
            }
            None => {
                self.output.put_u8(tags::LIST_FIXED_UNTYPED);
                self.write_int(wire_len(len)?);
            }
        }

        for item in &list.items {
            self.write_value(item)?;
        }
        Ok(())
    }

    fn write_map(&mut self, map: &Shared<Map>) -> Result<()> {
        let map = map.try_borrow().ok_or(EncodeError::Borrowed)?;

        match map.type_name.as_deref() {
            Some(type_name) if map.is_homogeneous() => {
                self.output.put_u8(tags::MAP);
                self.write_type(type_name)?;
            }
            Some(type_name) => {
                trace!(type_name, "mixed map entries, writing untyped");
                self.output.put_u8(tags::MAP_UNTYPED);
            }
            None => self.output.put_u8(tags::MAP_UNTYPED),
        }

        for (key, value) in &map.entries {
            self.write_value(key)?;
            self.write_value(value)?;
        }
        self.output.put_u8(tags::END);
        Ok(())
    }

    fn write_object(&mut self, object: &Shared<Object>) -> Result<()> {
        let object = object.try_borrow().ok_or(EncodeError::Borrowed)?;
        let names = object.fields.iter().map(|(name, _)| name.clone()).collect();
        self.write_class_ref(&object.class_name, names)?;
        for (_, value) in &object.fields {
            self.write_value(value)?;
        }
        Ok(())
    }

    fn write_pojo(&mut self, pojo: &Shared<dyn Pojo>) -> Result<()> {
        let pojo = pojo.try_borrow().ok_or(EncodeError::Borrowed)?;
        let class_name = self.resolve_class_name(&*pojo)?;
        let fields = pojo.fields();

        if pojo.is_map() {
            self.output.put_u8(tags::MAP);
            self.write_type(&class_name)?;
            for (name, value) in &fields {
                self.write_string(name);
                self.write_value(value)?;
            }
            self.output.put_u8(tags::END);
            return Ok(());
        }

        let names = fields.iter().map(|(name, _)| name.clone()).collect();
        self.write_class_ref(&class_name, names)?;
        for (_, value) in &fields {
            self.write_value(value)?;
        }
        Ok(())
    }

    fn resolve_class_name(&self, pojo: &dyn Pojo) -> Result<String> {
        let type_id = pojo.as_any().type_id();
        if let Some(descriptor) = self.registry.lookup_type(type_id) {
            return Ok(descriptor.class_name.clone());
        }
        pojo.java_class_name().map(str::to_owned).ok_or_else(|| {
            EncodeError::UnresolvedClassName {
                rust_type: pojo.rust_type_name(),
            }
            .into()
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_class_ref(&mut self, class_name: &str, fields: Vec<String>) -> Result<()> {
        let key = (class_name.to_owned(), fields);
        let index = if let Some(&index) = self.classes.get(&key) {
            index
        } else {
            let index = self.classes.len();
            self.output.put_u8(tags::CLASS_DEF);
            self.write_string(class_name);
            self.write_int(wire_len(key.1.len())?);
            for field in &key.1 {
                self.write_string(field);
            }
            debug!(class_name, index, fields = key.1.len(), "class definition written");
            self.classes.insert(key, index);
            index
        };

        if index <= tags::OBJECT_DIRECT_MAX {
            self.output.put_u8(tags::OBJECT_DIRECT + index as u8);
        } else {
            self.output.put_u8(tags::OBJECT);
            self.write_int(wire_len(index)?);
        }
        Ok(())
    }
}

const fn is_high_surrogate(unit: u16) -> bool {
    matches!(unit, 0xd800..=0xdbff)
}

#[allow(clippy::cast_possible_truncation)]
const fn chunk_len(len: usize) -> u16 {
    len as u16
}

fn wire_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| EncodeError::TooLarge { len }.into())
}

//! Hessian2 decoder
//!
//! Accepts every form of the grammar, not only the compact ones the encoder
//! writes. A [`Decoder`] reads one stream: class definitions and type names
//! stay valid across [`Decoder::decode`] calls, back-references do not.

use std::io::Cursor;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, instrument, trace};

use super::error::{DecodeError, Result};
use super::metrics::Metrics;
use super::refs::ReferenceTable;
use super::tags;
use super::types::TagClass;
use crate::model::{
    FromValue, List, Map, Object, Pojo, Shared, TypeDescriptor, TypeRegistry, Value,
};

/// Decoder limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Deepest nesting of lists, maps and objects accepted
    pub max_depth: usize,
    /// Upper bound on capacity reserved from a length prefix
    pub max_prealloc: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_prealloc: 4096,
        }
    }
}

struct ClassDef {
    class_name: String,
    fields: Vec<String>,
    descriptor: Option<Arc<TypeDescriptor>>,
}

/// Reads value graphs from a Hessian2 byte stream
pub struct Decoder<'a, 'r> {
    input: Cursor<&'a [u8]>,
    refs: ReferenceTable,
    classes: Vec<Rc<ClassDef>>,
    types: Vec<String>,
    registry: &'r TypeRegistry,
    config: DecoderConfig,
    depth: usize,
}

impl<'a> Decoder<'a, 'static> {
    /// Decoder backed by the global registry
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_registry(data, TypeRegistry::global())
    }

    /// Decoder with custom limits, backed by the global registry
    #[must_use]
    pub fn with_config(data: &'a [u8], config: DecoderConfig) -> Self {
        Self::new(data).config(config)
    }
}

impl<'a, 'r> Decoder<'a, 'r> {
    /// Decoder that materializes registered classes from `registry`
    #[must_use]
    pub fn with_registry(data: &'a [u8], registry: &'r TypeRegistry) -> Self {
        Self {
            input: Cursor::new(data),
            refs: ReferenceTable::new(),
            classes: Vec::new(),
            types: Vec::new(),
            registry,
            config: DecoderConfig::default(),
            depth: 0,
        }
    }

    /// Replace the limits
    #[must_use]
    pub fn config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Read the next top-level value
    #[instrument(level = "trace", skip_all)]
    pub fn decode(&mut self) -> Result<Value> {
        let start = Instant::now();
        let offset = self.offset();
        self.refs.clear();
        self.depth = 0;

        let result = self.read_value();
        self.refs.clear();

        match &result {
            Ok(_) => Metrics::record_decode(self.offset() - offset, start.elapsed()),
            Err(err) => {
                debug!(error = %err, offset, "decode failed");
                Metrics::record_decode_error();
            }
        }
        result
    }

    /// Read the next top-level value and convert it
    pub fn decode_as<T: FromValue>(&mut self) -> Result<T> {
        T::from_value(self.decode()?)
    }

    /// Bytes consumed so far
    #[must_use]
    pub fn offset(&self) -> usize {
        usize::try_from(self.input.position()).unwrap_or(usize::MAX)
    }

    /// Bytes left to read
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.input.remaining()
    }

    /// Check if the input is exhausted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.input.has_remaining()
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        let remaining = self.input.remaining();
        if remaining < n {
            return Err(DecodeError::UnexpectedEof {
                offset: self.offset(),
                needed: n - remaining,
            }
            .into());
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.input.get_u8())
    }

    fn peek_u8(&self) -> Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.input.chunk()[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.ensure_remaining(2)?;
        Ok(self.input.get_u16())
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(self.input.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.ensure_remaining(8)?;
        Ok(self.input.get_i64())
    }

    fn nested<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.config.max_depth {
            return Err(DecodeError::DepthExceeded {
                max: self.config.max_depth,
            }
            .into());
        }
        self.depth += 1;
        let result = read(self);
        self.depth -= 1;
        result
    }

    fn read_value(&mut self) -> Result<Value> {
        let mut offset = self.offset();
        let mut tag = self.read_u8()?;
        while tag == tags::CLASS_DEF {
            self.read_class_def()?;
            offset = self.offset();
            tag = self.read_u8()?;
        }

        let class = TagClass::from_u8(tag).ok_or(DecodeError::UnknownTag { tag, offset })?;
        if class.is_composite() {
            return self.nested(|d| d.read_composite(class, tag));
        }
        match class {
            TagClass::Null => Ok(Value::Null),
            TagClass::Bool => Ok(Value::Bool(tag == tags::TRUE)),
            TagClass::Int => self.read_int_body(tag).map(Value::Int),
            TagClass::Long => self.read_long_body(tag).map(Value::Long),
            TagClass::Double => self.read_double_body(tag).map(Value::Double),
            TagClass::Date => self.read_date_body(tag).map(Value::Date),
            TagClass::String => self.read_string_body(tag, offset).map(Value::String),
            TagClass::Binary => self.read_binary_body(tag, offset).map(Value::Binary),
            TagClass::Ref => self.read_ref(),
            _ => Err(DecodeError::UnexpectedTag {
                tag,
                offset,
                expected: "value",
            }
            .into()),
        }
    }

    fn read_composite(&mut self, class: TagClass, tag: u8) -> Result<Value> {
        match class {
            TagClass::List => self.read_list(tag),
            TagClass::Map => self.read_map(tag),
            _ => self.read_object(tag),
        }
    }

    fn read_int_body(&mut self, tag: u8) -> Result<i32> {
        let tag_value = i32::from(tag);
        Ok(match tag {
            0x80..=0xbf => tag_value - i32::from(tags::INT_ZERO),
            0xc0..=0xcf => {
                let b0 = i32::from(self.read_u8()?);
                ((tag_value - i32::from(tags::INT_BYTE_ZERO)) << 8) + b0
            }
            0xd0..=0xd7 => {
                let low = i32::from(self.read_u16()?);
                ((tag_value - i32::from(tags::INT_SHORT_ZERO)) << 16) + low
            }
            _ => self.read_i32()?,
        })
    }

    fn read_long_body(&mut self, tag: u8) -> Result<i64> {
        let tag_value = i64::from(tag);
        Ok(match tag {
            0xd8..=0xef => tag_value - i64::from(tags::LONG_ZERO),
            0xf0..=0xff => {
                let b0 = i64::from(self.read_u8()?);
                ((tag_value - i64::from(tags::LONG_BYTE_ZERO)) << 8) + b0
            }
            0x38..=0x3f => {
                let low = i64::from(self.read_u16()?);
                ((tag_value - i64::from(tags::LONG_SHORT_ZERO)) << 16) + low
            }
            tags::LONG_INT => i64::from(self.read_i32()?),
            _ => self.read_i64()?,
        })
    }

    fn read_double_body(&mut self, tag: u8) -> Result<f64> {
        Ok(match tag {
            tags::DOUBLE_ZERO => 0.0,
            tags::DOUBLE_ONE => 1.0,
            tags::DOUBLE_BYTE => {
                self.ensure_remaining(1)?;
                f64::from(self.input.get_i8())
            }
            tags::DOUBLE_SHORT => {
                self.ensure_remaining(2)?;
                f64::from(self.input.get_i16())
            }
            tags::DOUBLE_MILL => 0.001 * f64::from(self.read_i32()?),
            _ => {
                self.ensure_remaining(8)?;
                self.input.get_f64()
            }
        })
    }

    fn read_date_body(&mut self, tag: u8) -> Result<i64> {
        if tag == tags::DATE_MINUTE {
            Ok(i64::from(self.read_i32()?) * 60_000)
        } else {
            self.read_i64()
        }
    }

    /// Read an int or long in a length or index position
    fn read_integer(&mut self, expected: &'static str) -> Result<i64> {
        let offset = self.offset();
        let tag = self.read_u8()?;
        match TagClass::from_u8(tag) {
            Some(TagClass::Int) => self.read_int_body(tag).map(i64::from),
            Some(TagClass::Long) => self.read_long_body(tag),
            _ => Err(DecodeError::UnexpectedTag {
                tag,
                offset,
                expected,
            }
            .into()),
        }
    }

    fn read_length(&mut self) -> Result<usize> {
        let len = self.read_integer("length")?;
        usize::try_from(len).map_err(|_| {
            DecodeError::InvalidLength {
                len,
                offset: self.offset(),
            }
            .into()
        })
    }

    fn capacity(&self, len: usize) -> usize {
        len.min(self.config.max_prealloc)
    }

    fn read_string(&mut self) -> Result<String> {
        let offset = self.offset();
        let tag = self.read_u8()?;
        if TagClass::from_u8(tag) != Some(TagClass::String) {
            return Err(DecodeError::UnexpectedTag {
                tag,
                offset,
                expected: "string",
            }
            .into());
        }
        self.read_string_body(tag, offset)
    }

    fn read_string_body(&mut self, mut tag: u8, mut offset: usize) -> Result<String> {
        let mut out = String::new();
        let mut pending_high = None;
        loop {
            let (units, last) = match tag {
                0x00..=0x1f => (usize::from(tag), true),
                0x30..=0x33 => {
                    let low = usize::from(self.read_u8()?);
                    ((usize::from(tag - tags::STRING_SHORT) << 8) | low, true)
                }
                tags::STRING => (usize::from(self.read_u16()?), true),
                tags::STRING_CHUNK => (usize::from(self.read_u16()?), false),
                _ => {
                    return Err(DecodeError::UnexpectedTag {
                        tag,
                        offset,
                        expected: "string chunk",
                    }
                    .into());
                }
            };
            out.reserve(self.capacity(units));
            self.read_units(units, &mut out, &mut pending_high)?;
            if last {
                break;
            }
            offset = self.offset();
            tag = self.read_u8()?;
        }

        if pending_high.is_some() {
            return Err(DecodeError::InvalidUtf8 {
                offset: self.offset(),
            }
            .into());
        }
        Ok(out)
    }

    /// Read `units` UTF-16 units encoded as 1-3 byte sequences
    ///
    /// Surrogates may arrive as separate 3-byte sequences, possibly split
    /// across chunks, or as a single 4-byte sequence counting as two units.
    fn read_units(
        &mut self,
        mut units: usize,
        out: &mut String,
        pending_high: &mut Option<u32>,
    ) -> Result<()> {
        while units > 0 {
            let offset = self.offset();
            let invalid = || DecodeError::InvalidUtf8 { offset };
            let lead = u32::from(self.read_u8()?);

            let unit = match lead {
                0x00..=0x7f => lead,
                0xc0..=0xdf => ((lead & 0x1f) << 6) | self.read_continuation(offset)?,
                0xe0..=0xef => {
                    let high = self.read_continuation(offset)?;
                    ((lead & 0x0f) << 12) | (high << 6) | self.read_continuation(offset)?
                }
                0xf0..=0xf7 => {
                    if units < 2 || pending_high.is_some() {
                        return Err(invalid().into());
                    }
                    let b1 = self.read_continuation(offset)?;
                    let b2 = self.read_continuation(offset)?;
                    let b3 = self.read_continuation(offset)?;
                    let code = ((lead & 0x07) << 18) | (b1 << 12) | (b2 << 6) | b3;
                    out.push(char::from_u32(code).ok_or_else(invalid)?);
                    units -= 2;
                    continue;
                }
                _ => return Err(invalid().into()),
            };
            units -= 1;

            match (unit, pending_high.take()) {
                (0xd800..=0xdbff, None) => *pending_high = Some(unit),
                (0xdc00..=0xdfff, Some(high)) => {
                    let code = 0x10000 + ((high - 0xd800) << 10) + (unit - 0xdc00);
                    out.push(char::from_u32(code).ok_or_else(invalid)?);
                }
                (_, Some(_)) | (0xdc00..=0xdfff, None) => return Err(invalid().into()),
                (_, None) => out.push(char::from_u32(unit).ok_or_else(invalid)?),
            }
        }
        Ok(())
    }

    fn read_continuation(&mut self, offset: usize) -> Result<u32> {
        let byte = self.read_u8()?;
        if byte & 0xc0 != 0x80 {
            return Err(DecodeError::InvalidUtf8 { offset }.into());
        }
        Ok(u32::from(byte & 0x3f))
    }

    fn read_binary_body(&mut self, mut tag: u8, mut offset: usize) -> Result<Bytes> {
        let mut out = BytesMut::new();
        loop {
            let (len, last) = match tag {
                0x20..=0x2f => (usize::from(tag - tags::BINARY_DIRECT), true),
                0x34..=0x37 => {
                    let low = usize::from(self.read_u8()?);
                    ((usize::from(tag - tags::BINARY_SHORT) << 8) | low, true)
                }
                tags::BINARY => (usize::from(self.read_u16()?), true),
                tags::BINARY_CHUNK => (usize::from(self.read_u16()?), false),
                _ => {
                    return Err(DecodeError::UnexpectedTag {
                        tag,
                        offset,
                        expected: "binary chunk",
                    }
                    .into());
                }
            };
            self.ensure_remaining(len)?;
            out.extend_from_slice(&self.input.chunk()[..len]);
            self.input.advance(len);
            if last {
                break;
            }
            offset = self.offset();
            tag = self.read_u8()?;
        }
        Ok(out.freeze())
    }

    fn read_type(&mut self) -> Result<String> {
        let offset = self.offset();
        let tag = self.peek_u8()?;
        match TagClass::from_u8(tag) {
            Some(TagClass::String) => {
                let name = self.read_string()?;
                self.types.push(name.clone());
                Ok(name)
            }
            Some(TagClass::Int | TagClass::Long) => {
                let index = self.read_integer("type reference")?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| self.types.get(i))
                    .cloned()
                    .ok_or_else(|| {
                        DecodeError::UnknownTypeRef {
                            index,
                            defined: self.types.len(),
                        }
                        .into()
                    })
            }
            _ => Err(DecodeError::UnexpectedTag {
                tag,
                offset,
                expected: "type",
            }
            .into()),
        }
    }

    fn read_list(&mut self, tag: u8) -> Result<Value> {
        let (type_name, len) = match tag {
            tags::LIST_VARIABLE => (Some(self.read_type()?), None),
            tags::LIST_FIXED => (Some(self.read_type()?), Some(self.read_length()?)),
            tags::LIST_VARIABLE_UNTYPED => (None, None),
            tags::LIST_FIXED_UNTYPED => (None, Some(self.read_length()?)),
            0x70..=0x77 => (
                Some(self.read_type()?),
                Some(usize::from(tag - tags::LIST_DIRECT)),
            ),
            _ => (None, Some(usize::from(tag - tags::LIST_DIRECT_UNTYPED))),
        };

        let list = Shared::new(List {
            type_name,
            items: Vec::with_capacity(len.map_or(0, |len| self.capacity(len))),
        });
        let value = Value::List(list.clone());
        self.assign_slot(value.clone())?;

        match len {
            Some(len) => {
                for _ in 0..len {
                    let item = self.read_value()?;
                    list.borrow_mut().items.push(item);
                }
            }
            None => {
                while self.peek_u8()? != tags::END {
                    let item = self.read_value()?;
                    list.borrow_mut().items.push(item);
                }
                self.input.advance(1);
            }
        }
        Ok(value)
    }

    fn read_map(&mut self, tag: u8) -> Result<Value> {
        let type_name = if tag == tags::MAP {
            Some(self.read_type()?)
        } else {
            None
        };

        if let Some(descriptor) = type_name.as_deref().and_then(|t| self.registry.lookup(t)) {
            return self.read_map_as_pojo(&descriptor);
        }

        let map = Shared::new(Map {
            type_name,
            entries: Vec::new(),
        });
        let value = Value::Map(map.clone());
        self.assign_slot(value.clone())?;

        while self.peek_u8()? != tags::END {
            let key = self.read_value()?;
            let entry = self.read_value()?;
            // repeated keys keep the last value
            map.borrow_mut().insert(key, entry);
        }
        self.input.advance(1);
        Ok(value)
    }

    fn read_map_as_pojo(&mut self, descriptor: &TypeDescriptor) -> Result<Value> {
        let instance = descriptor.instantiate();
        let value = Value::Pojo(instance.clone());
        self.assign_slot(value.clone())?;

        while self.peek_u8()? != tags::END {
            let key = self.read_value()?;
            let entry = self.read_value()?;
            let Value::String(name) = key else {
                return Err(DecodeError::NonStringField {
                    class_name: descriptor.class_name.clone(),
                    found: key.kind(),
                }
                .into());
            };
            self.assign_field(&instance, descriptor, &name, entry)?;
        }
        self.input.advance(1);
        Ok(value)
    }

    fn read_class_def(&mut self) -> Result<()> {
        let class_name = self.read_string()?;
        let count = self.read_length()?;
        let mut fields = Vec::with_capacity(self.capacity(count));
        for _ in 0..count {
            fields.push(self.read_string()?);
        }

        let descriptor = self.registry.lookup(&class_name);
        if descriptor.is_none() {
            debug!(class_name = %class_name, "unregistered remote class, decoding generically");
            Metrics::record_unknown_class();
        } else {
            debug!(class_name = %class_name, fields = fields.len(), "class definition read");
        }

        self.classes.push(Rc::new(ClassDef {
            class_name,
            fields,
            descriptor,
        }));
        Ok(())
    }

    fn read_object(&mut self, tag: u8) -> Result<Value> {
        let index = if tag == tags::OBJECT {
            self.read_integer("class index")?
        } else {
            i64::from(tag - tags::OBJECT_DIRECT)
        };
        let def = usize::try_from(index)
            .ok()
            .and_then(|i| self.classes.get(i))
            .cloned()
            .ok_or(DecodeError::UnknownClassDef {
                index,
                defined: self.classes.len(),
            })?;

        if let Some(descriptor) = &def.descriptor {
            let instance = descriptor.instantiate();
            let value = Value::Pojo(instance.clone());
            self.assign_slot(value.clone())?;
            for field in &def.fields {
                let entry = self.read_value()?;
                self.assign_field(&instance, descriptor, field, entry)?;
            }
            return Ok(value);
        }

        let object = Shared::new(Object {
            class_name: def.class_name.clone(),
            fields: Vec::with_capacity(def.fields.len()),
        });
        let value = Value::Object(object.clone());
        self.assign_slot(value.clone())?;
        for field in &def.fields {
            let entry = self.read_value()?;
            object.borrow_mut().set(field.as_str(), entry);
        }
        Ok(value)
    }

    fn assign_field(
        &self,
        instance: &Shared<dyn Pojo>,
        descriptor: &TypeDescriptor,
        name: &str,
        value: Value,
    ) -> Result<()> {
        if descriptor.accepts(name) {
            instance.borrow_mut().set_field(name, value)
        } else {
            trace!(class_name = %descriptor.class_name, field = name, "field not declared locally, ignored");
            Ok(())
        }
    }

    fn assign_slot(&mut self, value: Value) -> Result<()> {
        let assigned = self.refs.len();
        self.refs.insert(value).map(|_| ()).ok_or_else(|| {
            DecodeError::InvalidLength {
                len: i64::try_from(assigned).unwrap_or(i64::MAX),
                offset: self.offset(),
            }
            .into()
        })
    }

    fn read_ref(&mut self) -> Result<Value> {
        let id = self.read_integer("reference id")?;
        let value = u32::try_from(id)
            .ok()
            .and_then(|slot| self.refs.resolve(slot))
            .cloned()
            .ok_or(DecodeError::DanglingReference {
                id,
                assigned: self.refs.len(),
            })?;
        Metrics::record_back_reference();
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToValue;
    use crate::protocol::error::Error;

    fn decoded(bytes: &[u8]) -> Value {
        let registry = TypeRegistry::new();
        let mut decoder = Decoder::with_registry(bytes, &registry);
        let value = decoder.decode().unwrap();
        assert!(decoder.is_empty(), "trailing bytes after {value:?}");
        value
    }

    fn decode_err(bytes: &[u8]) -> DecodeError {
        let registry = TypeRegistry::new();
        match Decoder::with_registry(bytes, &registry).decode() {
            Err(Error::Decode(err)) => err,
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    fn string_bytes(s: &str) -> Vec<u8> {
        let mut out = vec![u8::try_from(s.len()).unwrap()];
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn test_ints() {
        let cases: &[(&[u8], i32)] = &[
            (&[0x90], 0),
            (&[0x80], -16),
            (&[0xbf], 47),
            (&[0xc8, 0x30], 48),
            (&[0xc0, 0x00], -2048),
            (&[0xcf, 0xff], 2047),
            (&[0xd4, 0x08, 0x00], 2048),
            (&[0xd0, 0x00, 0x00], -262_144),
            (&[0xd7, 0xff, 0xff], 262_143),
            (&[b'I', 0x00, 0x04, 0x00, 0x00], 262_144),
            (&[b'I', 0x00, 0x00, 0x00, 0x01], 1),
        ];
        for (bytes, value) in cases {
            assert_eq!(decoded(bytes), Value::Int(*value), "{bytes:02x?}");
        }
    }

    #[test]
    fn test_longs() {
        let cases: &[(&[u8], i64)] = &[
            (&[0xe0], 0),
            (&[0xd8], -8),
            (&[0xef], 15),
            (&[0xf8, 0x10], 16),
            (&[0xf0, 0x00], -2048),
            (&[0x3c, 0x08, 0x00], 2048),
            (&[0x38, 0x00, 0x00], -262_144),
            (&[0x59, 0x80, 0x00, 0x00, 0x00], i64::from(i32::MIN)),
            (&[b'L', 0, 0, 0, 0, 0x80, 0, 0, 0], 0x8000_0000),
        ];
        for (bytes, value) in cases {
            assert_eq!(decoded(bytes), Value::Long(*value), "{bytes:02x?}");
        }
    }

    #[test]
    fn test_doubles() {
        assert_eq!(decoded(&[0x5b]), Value::Double(0.0));
        assert_eq!(decoded(&[0x5c]), Value::Double(1.0));
        assert_eq!(decoded(&[0x5d, 0x80]), Value::Double(-128.0));
        assert_eq!(decoded(&[0x5e, 0x80, 0x00]), Value::Double(-32768.0));
        assert_eq!(decoded(&[0x5f, 0x00, 0x00, 0x2f, 0xda]), Value::Double(12.25));

        let mut bytes = vec![b'D'];
        bytes.extend_from_slice(&2.5e300f64.to_be_bytes());
        assert_eq!(decoded(&bytes), Value::Double(2.5e300));
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            decoded(&[0x4a, 0x00, 0x00, 0x00, 0xd0, 0x4b, 0x92, 0x84, 0xb8]),
            Value::Date(894_621_091_000)
        );
        assert_eq!(
            decoded(&[0x4b, 0x00, 0xe3, 0x83, 0x8f]),
            Value::Date(894_621_060_000)
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(decoded(&[0x00]), Value::from(""));
        assert_eq!(decoded(&string_bytes("hello")), Value::from("hello"));
        assert_eq!(decoded(&[0x01, 0xc3, 0xa9]), Value::from("\u{e9}"));

        let mut short = vec![0x30, 0x20];
        short.extend(std::iter::repeat_n(b'x', 32));
        assert_eq!(decoded(&short), Value::from("x".repeat(32)));
    }

    #[test]
    fn test_string_chunks() {
        let mut bytes = vec![b'R', 0x00, 0x03];
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&[b'S', 0x00, 0x02]);
        bytes.extend_from_slice(b"de");
        assert_eq!(decoded(&bytes), Value::from("abcde"));
    }

    #[test]
    fn test_supplementary_characters() {
        let surrogates = [0x02, 0xed, 0xa0, 0xbd, 0xed, 0xb8, 0x80];
        assert_eq!(decoded(&surrogates), Value::from("\u{1f600}"));

        let four_byte = [0x02, 0xf0, 0x9f, 0x98, 0x80];
        assert_eq!(decoded(&four_byte), Value::from("\u{1f600}"));

        // pair split across chunks
        let split = [b'R', 0x00, 0x01, 0xed, 0xa0, 0xbd, 0x01, 0xed, 0xb8, 0x80];
        assert_eq!(decoded(&split), Value::from("\u{1f600}"));
    }

    #[test]
    fn test_invalid_strings() {
        assert!(matches!(
            decode_err(&[0x01, 0xed, 0xa0, 0xbd]),
            DecodeError::InvalidUtf8 { .. }
        ));
        assert!(matches!(
            decode_err(&[0x01, 0xc3, 0x28]),
            DecodeError::InvalidUtf8 { offset: 1 }
        ));
        assert!(matches!(
            decode_err(&[0x01, 0xff]),
            DecodeError::InvalidUtf8 { .. }
        ));
    }

    #[test]
    fn test_binary() {
        assert_eq!(decoded(&[0x20]), Value::Binary(Bytes::new()));
        assert_eq!(
            decoded(&[0x23, 1, 2, 3]),
            Value::Binary(Bytes::from_static(&[1, 2, 3]))
        );
        assert_eq!(
            decoded(&[b'A', 0x00, 0x02, 1, 2, b'B', 0x00, 0x01, 3]),
            Value::Binary(Bytes::from_static(&[1, 2, 3]))
        );

        let mut short = vec![0x34, 0x10];
        short.extend([9u8; 16]);
        assert_eq!(decoded(&short), Value::Binary(Bytes::from(vec![9u8; 16])));
    }

    #[test]
    fn test_variable_lists() {
        let mut bytes = vec![0x55, 0x04];
        bytes.extend_from_slice(b"[int");
        bytes.extend_from_slice(&[0x90, 0x91, b'Z']);
        assert_eq!(
            decoded(&bytes),
            Value::typed_list("[int", [Value::Int(0), Value::Int(1)])
        );

        assert_eq!(
            decoded(&[0x57, 0x90, 0x91, b'Z']),
            Value::list([Value::Int(0), Value::Int(1)])
        );
    }

    #[test]
    fn test_fixed_lists() {
        let mut bytes = vec![b'V', 0x04];
        bytes.extend_from_slice(b"[int");
        bytes.extend_from_slice(&[0x92, 0x90, 0x91]);
        assert_eq!(
            decoded(&bytes),
            Value::typed_list("[int", [Value::Int(0), Value::Int(1)])
        );
        assert_eq!(decoded(&[0x58, 0x91, 0x90]), Value::list([Value::Int(0)]));
        assert_eq!(decoded(&[0x78]), Value::list([]));
    }

    #[test]
    fn test_type_reference() {
        let mut bytes = vec![0x7a, 0x71, 0x04];
        bytes.extend_from_slice(b"[int");
        bytes.extend_from_slice(&[0x90, 0x71, 0x90, 0x91]);

        let value = decoded(&bytes);
        let list = value.as_list().unwrap().borrow();
        let second = list.items[1].as_list().unwrap().borrow();
        assert_eq!(second.type_name.as_deref(), Some("[int"));
        assert_eq!(second.items, vec![Value::Int(1)]);
    }

    #[test]
    fn test_untyped_map() {
        let mut bytes = vec![b'H', 0x91];
        bytes.extend(string_bytes("fee"));
        bytes.push(0xa0);
        bytes.extend(string_bytes("fie"));
        bytes.extend([0xc9, 0x00]);
        bytes.extend(string_bytes("foe"));
        bytes.push(b'Z');

        let value = decoded(&bytes);
        let map = value.as_map().unwrap().borrow();
        assert_eq!(map.type_name, None);
        assert_eq!(map.get(1), Some(&Value::from("fee")));
        assert_eq!(map.get(16), Some(&Value::from("fie")));
        assert_eq!(map.get(256), Some(&Value::from("foe")));
    }

    #[test]
    fn test_repeated_map_key_keeps_last_value() {
        let mut bytes = vec![b'H'];
        bytes.extend(string_bytes("a"));
        bytes.push(0x91);
        bytes.extend(string_bytes("b"));
        bytes.push(0x93);
        bytes.extend(string_bytes("a"));
        bytes.push(0x92);
        bytes.push(b'Z');

        let value = decoded(&bytes);
        {
            let map = value.as_map().unwrap().borrow();
            assert_eq!(map.len(), 2);
            assert_eq!(map.get("a"), Some(&Value::Int(2)));
            assert_eq!(map.entries[0].0, Value::from("a"));
        }

        let typed: std::collections::HashMap<String, i32> =
            crate::model::FromValue::from_value(value.clone()).unwrap();
        assert_eq!(typed.get("a"), Some(&2));

        let mut expected = Map::new();
        expected.insert("a", 2);
        expected.insert("b", 3);
        assert_eq!(value, Value::map(expected));
    }

    #[test]
    fn test_generic_objects() {
        let mut bytes = vec![0x7a, b'C'];
        bytes.extend(string_bytes("example.Car"));
        bytes.push(0x92);
        bytes.extend(string_bytes("color"));
        bytes.extend(string_bytes("model"));
        bytes.extend([b'O', 0x90]);
        bytes.extend(string_bytes("red"));
        bytes.extend(string_bytes("corvette"));
        bytes.push(0x60);
        bytes.extend(string_bytes("green"));
        bytes.extend(string_bytes("civic"));

        let value = decoded(&bytes);
        let list = value.as_list().unwrap().borrow();
        let red = list.items[0].as_object().unwrap().borrow();
        assert_eq!(red.class_name, "example.Car");
        assert_eq!(red.get("model"), Some(&Value::from("corvette")));
        let green = list.items[1].as_object().unwrap().borrow();
        assert_eq!(green.get("color"), Some(&Value::from("green")));
    }

    #[test]
    fn test_circular_object() {
        let mut bytes = vec![b'C'];
        bytes.extend(string_bytes("LinkedList"));
        bytes.push(0x92);
        bytes.extend(string_bytes("head"));
        bytes.extend(string_bytes("tail"));
        bytes.extend([0x60, 0x91, 0x51, 0x90]);

        let value = decoded(&bytes);
        let node = value.as_object().unwrap();
        let tail = node.borrow().get("tail").cloned().unwrap();
        assert!(node.ptr_eq(tail.as_object().unwrap()));
        assert_eq!(node.borrow().get("head"), Some(&Value::Int(1)));

        node.borrow_mut().fields.clear();
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Car {
        color: String,
        mileage: i32,
    }

    impl Pojo for Car {
        fn java_class_name(&self) -> Option<&str> {
            Some("example.Car")
        }

        fn fields(&self) -> Vec<(String, Value)> {
            vec![
                ("color".into(), self.color.to_value()),
                ("mileage".into(), self.mileage.to_value()),
            ]
        }

        fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
            match name {
                "color" => self.color = String::from_value(value)?,
                "mileage" => self.mileage = i32::from_value(value)?,
                _ => {}
            }
            Ok(())
        }
    }

    #[test]
    fn test_registered_object_ignores_unknown_fields() {
        let registry = TypeRegistry::new();
        registry.register_pojo::<Car>().unwrap();

        let mut bytes = vec![b'C'];
        bytes.extend(string_bytes("example.Car"));
        bytes.push(0x92);
        bytes.extend(string_bytes("color"));
        bytes.extend(string_bytes("model"));
        bytes.push(0x60);
        bytes.extend(string_bytes("red"));
        bytes.extend(string_bytes("corvette"));

        let value = Decoder::with_registry(&bytes, &registry).decode().unwrap();
        let car = value.downcast_pojo::<Car>().unwrap();
        assert_eq!(
            *car,
            Car {
                color: "red".into(),
                mileage: 0,
            }
        );
    }

    #[test]
    fn test_registered_typed_map_needs_string_keys() {
        let registry = TypeRegistry::new();
        registry.register_pojo::<Car>().unwrap();

        let mut bytes = vec![b'M'];
        bytes.extend(string_bytes("example.Car"));
        bytes.extend([0x91, 0x92, b'Z']);

        let err = Decoder::with_registry(&bytes, &registry)
            .decode()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::NonStringField { .. })
        ));
    }

    #[test]
    fn test_class_definitions_span_calls() {
        let mut bytes = vec![b'C'];
        bytes.extend(string_bytes("p"));
        bytes.extend([0x91]);
        bytes.extend(string_bytes("x"));
        bytes.extend([0x60, 0x91, 0x60, 0x92]);

        let registry = TypeRegistry::new();
        let mut decoder = Decoder::with_registry(&bytes, &registry);
        let first = decoder.decode().unwrap();
        let second = decoder.decode().unwrap();
        assert_eq!(first.as_object().unwrap().borrow().get("x"), Some(&Value::Int(1)));
        assert_eq!(second.as_object().unwrap().borrow().get("x"), Some(&Value::Int(2)));
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_refs_reset_per_value() {
        let bytes = [0x78, 0x51, 0x90];
        let registry = TypeRegistry::new();
        let mut decoder = Decoder::with_registry(&bytes, &registry);
        decoder.decode().unwrap();
        let err = decoder.decode().unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::DanglingReference { id: 0, assigned: 0 })
        ));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            decode_err(&[0x40]),
            DecodeError::UnknownTag { tag: 0x40, offset: 0 }
        ));
        assert!(matches!(
            decode_err(&[b'Z']),
            DecodeError::UnexpectedTag { tag: b'Z', .. }
        ));
        assert!(matches!(
            decode_err(&[0x79, 0x51, 0x91]),
            DecodeError::DanglingReference { id: 1, assigned: 1 }
        ));
        assert!(matches!(
            decode_err(&[0x61]),
            DecodeError::UnknownClassDef { index: 1, defined: 0 }
        ));
        assert!(matches!(
            decode_err(&[0x71, 0x92, 0x90]),
            DecodeError::UnknownTypeRef { index: 2, defined: 0 }
        ));
        assert!(matches!(
            decode_err(&[0x58, 0x8f]),
            DecodeError::InvalidLength { len: -1, .. }
        ));
        assert!(matches!(
            decode_err(&[b'I', 0x00]),
            DecodeError::UnexpectedEof { offset: 1, needed: 3 }
        ));
        assert!(matches!(
            decode_err(&[b'H', 0x90]),
            DecodeError::UnexpectedEof { .. }
        ));
    }

    #[test]
    fn test_depth_limit() {
        let nested = vec![0x79; 300];
        assert!(matches!(
            decode_err(&nested),
            DecodeError::DepthExceeded { max: 256 }
        ));

        let registry = TypeRegistry::new();
        let config = DecoderConfig {
            max_depth: 2,
            ..DecoderConfig::default()
        };
        let ok = [0x79, 0x78];
        assert!(Decoder::with_registry(&ok, &registry).config(config).decode().is_ok());
        let deep = [0x79, 0x79, 0x78];
        assert!(Decoder::with_registry(&deep, &registry).config(config).decode().is_err());
    }

    #[test]
    fn test_huge_length_prefix_does_not_preallocate() {
        // fixed untyped list claiming i32::MAX items, followed by nothing
        let bytes = [0x58, b'I', 0x7f, 0xff, 0xff, 0xff];
        assert!(matches!(decode_err(&bytes), DecodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_decode_as() {
        let registry = TypeRegistry::new();
        let mut decoder = Decoder::with_registry(&[0x5d, 0x80], &registry);
        assert_eq!(decoder.decode_as::<f64>().unwrap(), -128.0);

        let mut decoder = Decoder::with_registry(&[0xc9, 0x00], &registry);
        let err = decoder.decode_as::<i8>().unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::OutOfRange { value: 256, .. })));
    }
}

//! Classification of Hessian2 leading tag bytes

use std::fmt;

/// Grammar production selected by a leading tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagClass {
    /// `N`
    Null,
    /// `T` / `F`
    Bool,
    /// Any of the four int encodings
    Int,
    /// Any of the five long encodings
    Long,
    /// Any of the six double encodings
    Double,
    /// Millisecond or minute date
    Date,
    /// Direct, short, final or chunked string
    String,
    /// Direct, short, final or chunked binary
    Binary,
    /// Typed or untyped, fixed or variable list
    List,
    /// Typed or untyped map
    Map,
    /// `C` class definition
    ClassDef,
    /// Object instance
    Object,
    /// Back-reference
    Ref,
    /// `Z` terminator
    End,
}

impl TagClass {
    /// Classify a tag byte; `None` for bytes the grammar leaves unassigned
    #[must_use]
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            b'N' => Some(Self::Null),
            b'T' | b'F' => Some(Self::Bool),
            0x80..=0xd7 | b'I' => Some(Self::Int),
            0xd8..=0xff | 0x38..=0x3f | 0x59 | b'L' => Some(Self::Long),
            0x5b..=0x5f | b'D' => Some(Self::Double),
            0x4a | 0x4b => Some(Self::Date),
            0x00..=0x1f | 0x30..=0x33 | b'S' | b'R' => Some(Self::String),
            0x20..=0x2f | 0x34..=0x37 | b'B' | b'A' => Some(Self::Binary),
            0x55..=0x58 | 0x70..=0x7f => Some(Self::List),
            b'M' | b'H' => Some(Self::Map),
            b'C' => Some(Self::ClassDef),
            b'O' | 0x60..=0x6f => Some(Self::Object),
            0x51 => Some(Self::Ref),
            b'Z' => Some(Self::End),
            _ => None,
        }
    }

    /// Check if values introduced by this tag take a reference slot
    #[must_use]
    pub const fn is_composite(self) -> bool {
        matches!(self, Self::List | Self::Map | Self::Object)
    }
}

impl fmt::Display for TagClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::Date => "date",
            Self::String => "string",
            Self::Binary => "binary",
            Self::List => "list",
            Self::Map => "map",
            Self::ClassDef => "class definition",
            Self::Object => "object",
            Self::Ref => "ref",
            Self::End => "end",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tags;

    #[test]
    fn test_named_tags_classify() {
        let cases = [
            (tags::NULL, TagClass::Null),
            (tags::TRUE, TagClass::Bool),
            (tags::FALSE, TagClass::Bool),
            (tags::INT, TagClass::Int),
            (tags::INT_ZERO, TagClass::Int),
            (tags::LONG, TagClass::Long),
            (tags::LONG_INT, TagClass::Long),
            (tags::LONG_ZERO, TagClass::Long),
            (tags::DOUBLE_MILL, TagClass::Double),
            (tags::DATE_MINUTE, TagClass::Date),
            (tags::STRING_CHUNK, TagClass::String),
            (tags::BINARY_CHUNK, TagClass::Binary),
            (tags::LIST_FIXED, TagClass::List),
            (tags::LIST_DIRECT_UNTYPED, TagClass::List),
            (tags::MAP_UNTYPED, TagClass::Map),
            (tags::CLASS_DEF, TagClass::ClassDef),
            (tags::OBJECT_DIRECT, TagClass::Object),
            (tags::REF, TagClass::Ref),
            (tags::END, TagClass::End),
        ];

        for (tag, class) in cases {
            assert_eq!(TagClass::from_u8(tag), Some(class), "tag {tag:#04x}");
        }
    }

    #[test]
    fn test_unassigned_tags() {
        for tag in [0x40, b'E', b'G', b'P'] {
            assert_eq!(TagClass::from_u8(tag), None, "tag {tag:#04x}");
        }
    }

    #[test]
    fn test_compact_range_edges() {
        assert_eq!(TagClass::from_u8(0x1f), Some(TagClass::String));
        assert_eq!(TagClass::from_u8(0x20), Some(TagClass::Binary));
        assert_eq!(TagClass::from_u8(0x37), Some(TagClass::Binary));
        assert_eq!(TagClass::from_u8(0x38), Some(TagClass::Long));
        assert_eq!(TagClass::from_u8(0xd7), Some(TagClass::Int));
        assert_eq!(TagClass::from_u8(0xd8), Some(TagClass::Long));
        assert_eq!(TagClass::from_u8(0x6f), Some(TagClass::Object));
        assert_eq!(TagClass::from_u8(0x70), Some(TagClass::List));
    }

    #[test]
    fn test_composites() {
        assert!(TagClass::Map.is_composite());
        assert!(TagClass::Object.is_composite());
        assert!(!TagClass::Ref.is_composite());
        assert!(!TagClass::String.is_composite());
    }
}

//! Hessian2 tag bytes and compact-range boundaries
//!
//! Names follow the grammar productions they introduce. Ranges that cover a
//! run of tag bytes are expressed as the base byte plus the largest value the
//! compact form can carry.

/// `null`
pub const NULL: u8 = b'N';
/// `true`
pub const TRUE: u8 = b'T';
/// `false`
pub const FALSE: u8 = b'F';

/// 32-bit int, four payload bytes
pub const INT: u8 = b'I';
/// Single-byte int base (`0x80..=0xbf`, value = tag - 0x90)
pub const INT_ZERO: u8 = 0x90;
/// Two-byte int base (`0xc0..=0xcf`)
pub const INT_BYTE_ZERO: u8 = 0xc8;
/// Three-byte int base (`0xd0..=0xd7`)
pub const INT_SHORT_ZERO: u8 = 0xd4;
/// Smallest int written in a single byte
pub const INT_DIRECT_MIN: i32 = -0x10;
/// Largest int written in a single byte
pub const INT_DIRECT_MAX: i32 = 0x2f;
/// Smallest int written in two bytes
pub const INT_BYTE_MIN: i32 = -0x800;
/// Largest int written in two bytes
pub const INT_BYTE_MAX: i32 = 0x7ff;
/// Smallest int written in three bytes
pub const INT_SHORT_MIN: i32 = -0x40000;
/// Largest int written in three bytes
pub const INT_SHORT_MAX: i32 = 0x3ffff;

/// 64-bit long, eight payload bytes
pub const LONG: u8 = b'L';
/// Long carried as a 32-bit int
pub const LONG_INT: u8 = 0x59;
/// Single-byte long base (`0xd8..=0xef`, value = tag - 0xe0)
pub const LONG_ZERO: u8 = 0xe0;
/// Two-byte long base (`0xf0..=0xff`)
pub const LONG_BYTE_ZERO: u8 = 0xf8;
/// Three-byte long base (`0x38..=0x3f`)
pub const LONG_SHORT_ZERO: u8 = 0x3c;
/// Smallest long written in a single byte
pub const LONG_DIRECT_MIN: i64 = -0x08;
/// Largest long written in a single byte
pub const LONG_DIRECT_MAX: i64 = 0x0f;

/// IEEE-754 double, eight payload bytes
pub const DOUBLE: u8 = b'D';
/// `0.0`
pub const DOUBLE_ZERO: u8 = 0x5b;
/// `1.0`
pub const DOUBLE_ONE: u8 = 0x5c;
/// Whole double in `i8` range
pub const DOUBLE_BYTE: u8 = 0x5d;
/// Whole double in `i16` range
pub const DOUBLE_SHORT: u8 = 0x5e;
/// Double expressible as `0.001 * i32`
pub const DOUBLE_MILL: u8 = 0x5f;

/// Date as 64-bit epoch milliseconds
pub const DATE: u8 = 0x4a;
/// Date as 32-bit epoch minutes
pub const DATE_MINUTE: u8 = 0x4b;

/// Final string chunk with a 16-bit length
pub const STRING: u8 = b'S';
/// Non-final string chunk with a 16-bit length
pub const STRING_CHUNK: u8 = b'R';
/// Longest string whose length fits in the tag byte
pub const STRING_DIRECT_MAX: usize = 0x1f;
/// Two-byte length string base (`0x30..=0x33`)
pub const STRING_SHORT: u8 = 0x30;
/// Longest string using the two-byte length form
pub const STRING_SHORT_MAX: usize = 0x3ff;

/// Final binary chunk with a 16-bit length
pub const BINARY: u8 = b'B';
/// Non-final binary chunk with a 16-bit length
pub const BINARY_CHUNK: u8 = b'A';
/// Single-byte length binary base (`0x20..=0x2f`)
pub const BINARY_DIRECT: u8 = 0x20;
/// Longest binary whose length fits in the tag byte
pub const BINARY_DIRECT_MAX: usize = 0x0f;
/// Two-byte length binary base (`0x34..=0x37`)
pub const BINARY_SHORT: u8 = 0x34;
/// Longest binary using the two-byte length form
pub const BINARY_SHORT_MAX: usize = 0x3ff;

/// Variable-length typed list, terminated by [`END`]
pub const LIST_VARIABLE: u8 = 0x55;
/// Fixed-length typed list
pub const LIST_FIXED: u8 = b'V';
/// Variable-length untyped list, terminated by [`END`]
pub const LIST_VARIABLE_UNTYPED: u8 = 0x57;
/// Fixed-length untyped list
pub const LIST_FIXED_UNTYPED: u8 = 0x58;
/// Short typed list base (`0x70..=0x77`)
pub const LIST_DIRECT: u8 = 0x70;
/// Short untyped list base (`0x78..=0x7f`)
pub const LIST_DIRECT_UNTYPED: u8 = 0x78;
/// Longest list whose length fits in the tag byte
pub const LIST_DIRECT_MAX: usize = 0x07;

/// Typed map
pub const MAP: u8 = b'M';
/// Untyped map
pub const MAP_UNTYPED: u8 = b'H';
/// End of a map or variable-length list
pub const END: u8 = b'Z';

/// Class definition
pub const CLASS_DEF: u8 = b'C';
/// Object instance with an int definition index
pub const OBJECT: u8 = b'O';
/// Object instance base (`0x60..=0x6f`)
pub const OBJECT_DIRECT: u8 = 0x60;
/// Largest definition index that fits in the tag byte
pub const OBJECT_DIRECT_MAX: usize = 0x0f;

/// Back-reference to a previously seen composite
pub const REF: u8 = 0x51;

/// Default chunk size for strings (UTF-16 units) and binaries (bytes)
pub const CHUNK_SIZE: usize = 0x8000;

//! In-memory value graph, local type registry and Rust conversions

mod convert;
mod registry;
mod value;

pub use convert::{
    FromValue, HASH_MAP_TYPE, TREE_MAP_TYPE, ToValue, pojo_from_value, pojo_from_value_strict,
};
pub use registry::{
    AsAny, Pojo, TypeDescriptor, TypeRegistry, register_pojo, register_pojo_mapping,
};
pub use value::{List, Map, Object, Shared, Value, ValueKind};

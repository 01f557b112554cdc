//! Type registry: runtime values, type descriptors, per-class property tables.
//!
//! - [`Value`]: typed runtime values.
//! - [`TypeDescriptor`]: the legal value domain of a property.
//! - [`registry`]: class declarations, merged and memoized property tables,
//!   named types, dotted type-path resolution.
//! - [`cast()`]: destination-guided validation and conversion.

pub mod builtins;
pub mod cast;
pub mod descriptor;
pub mod registry;
pub mod value;

pub use cast::{cast, coerce_font};
pub use descriptor::{CompositeType, EnumType, ObjectKind, TypeDescriptor};
pub use registry::{
    register_class, register_type, type_named, types_for, ClassBuilder, ClassTypes, PropertyTable,
};
pub use value::{Color, EnumValue, Font, ObjectValue, StructValue, Value};

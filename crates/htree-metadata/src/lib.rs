//! Schema/class metadata, the primitive-value formatter and the logger
//! category constants consumed by the hierarchy engine (§6 "Capabilities
//! consumed").

pub mod format;
pub mod inspector;
pub mod log;

pub use format::{DefaultPrimitiveValueFormatter, PrimitiveValueFormatter, TypedPrimitiveValue};
pub use inspector::{Class, MetadataError, MetadataInspector, Property, PropertyType, Schema};

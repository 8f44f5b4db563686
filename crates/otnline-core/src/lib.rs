//! otnline core - attribute object model and telemetry statistics for optical
//! line systems
//!
//! This crate provides:
//! - A schema registry with per-type attribute and counter descriptors
//! - A vendor extension window handled by the custom range allocator
//! - An in-memory object store with relational reference tracking
//! - The CRUD dispatcher that validates and applies every operation
//! - A statistics engine aggregating externally supplied telemetry
//! - The built-in catalog of device, channel monitor, supervisory channel
//!   and wavelength-selective switch object types

pub mod attr;
pub mod catalog;
pub mod custom;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod schema;
pub mod stats;
pub mod store;
pub mod switch;

pub use attr::{AttrMap, AttrType, AttrValue, Attribute, AttributeDescriptor, EnumDef, Mutability};
pub use custom::{CustomAttribute, CustomRangeAllocator, CustomRangeError};
pub use dispatcher::{AttrRead, Dispatcher, StatClear};
pub use error::{ElementResult, OtnError, Status, Violation, ViolationKind};
pub use ids::{
    AttrId, CounterId, ObjectId, ObjectType, QuantityId, SwitchId, CUSTOM_RANGE_END,
    CUSTOM_RANGE_START,
};
pub use schema::{ObjectResolver, SchemaError, SchemaRegistry, TypeSchema};
pub use stats::{
    Clock, ManualClock, StatCounterDescriptor, StatFacet, StatRead, StatValue, StatsMode,
    SystemClock, TelemetrySample,
};
pub use store::StoreLimits;
pub use switch::{StaticSwitches, SwitchDirectory};

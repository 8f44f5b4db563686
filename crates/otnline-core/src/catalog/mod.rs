//! Built-in object types of the optical line system
//!
//! Each submodule holds the attribute ids, descriptors and statistics
//! counters of one functional block. [`standard_registry`] registers all of
//! them.

pub mod device;
pub mod ocm;
pub mod osc;
pub mod wss;

use crate::ids::ObjectType;
use crate::schema::{SchemaError, SchemaRegistry};

/// A registry holding every built-in object type
pub fn standard_registry() -> Result<SchemaRegistry, SchemaError> {
    let mut registry = SchemaRegistry::new();
    registry.register_type(ObjectType::Device, device::attributes())?;
    registry.register_type(ObjectType::ChannelMonitor, ocm::monitor::attributes())?;
    registry.register_type(ObjectType::ChannelMonitorChannel, ocm::channel::attributes())?;
    registry.register_counters(ObjectType::ChannelMonitorChannel, ocm::channel::counters())?;
    registry.register_type(ObjectType::SupervisoryChannel, osc::attributes())?;
    registry.register_counters(ObjectType::SupervisoryChannel, osc::counters())?;
    registry.register_type(ObjectType::SwitchMediaChannel, wss::media_channel::attributes())?;
    registry.register_type(ObjectType::SwitchSpectrumPowerSlot, wss::power_slot::attributes())?;
    registry.register_counters(ObjectType::SwitchSpectrumPowerSlot, wss::power_slot::counters())?;
    Ok(registry)
}

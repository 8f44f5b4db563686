//! Optical channel monitor and its monitored channels

use crate::attr::{AttrType, AttributeDescriptor, Mutability};
use crate::ids::{AttrId, QuantityId};
use crate::stats::{quantity_counters, StatCounterDescriptor};

pub mod monitor {
    use super::*;

    pub const NAME: AttrId = 0;
    pub const MONITOR_PORT: AttrId = 1;

    pub fn attributes() -> Vec<AttributeDescriptor> {
        vec![
            AttributeDescriptor::new(NAME, "name", AttrType::NAME, Mutability::MandatoryOnCreate),
            AttributeDescriptor::new(
                MONITOR_PORT,
                "monitor_port",
                AttrType::NAME,
                Mutability::MandatoryOnCreate,
            ),
        ]
    }
}

pub mod channel {
    use super::*;

    pub const NAME: AttrId = 0;
    pub const LOWER_FREQUENCY: AttrId = 1;
    pub const UPPER_FREQUENCY: AttrId = 2;
    /// Measured power, mirrors the instant of [`POWER_QUANTITY`]
    pub const POWER: AttrId = 3;
    pub const TARGET_POWER: AttrId = 4;

    pub const POWER_QUANTITY: QuantityId = 0;

    pub fn attributes() -> Vec<AttributeDescriptor> {
        vec![
            AttributeDescriptor::new(NAME, "name", AttrType::NAME, Mutability::MandatoryOnCreate),
            AttributeDescriptor::new(
                LOWER_FREQUENCY,
                "lower_frequency",
                AttrType::U64,
                Mutability::MandatoryOnCreate,
            )
            .with_unit("MHz"),
            AttributeDescriptor::new(
                UPPER_FREQUENCY,
                "upper_frequency",
                AttrType::U64,
                Mutability::MandatoryOnCreate,
            )
            .with_unit("MHz"),
            AttributeDescriptor::new(POWER, "power", AttrType::I32, Mutability::ReadOnly)
                .with_precision(2, "dBm")
                .live(POWER_QUANTITY),
            AttributeDescriptor::new(
                TARGET_POWER,
                "target_power",
                AttrType::I32,
                Mutability::ReadOnly,
            )
            .with_precision(2, "dBm"),
        ]
    }

    pub fn counters() -> Vec<StatCounterDescriptor> {
        quantity_counters(POWER_QUANTITY, "power", 2, "dBm")
    }
}

//! Optical supervisory channel

use crate::attr::{AttrType, AttributeDescriptor, Mutability};
use crate::ids::{AttrId, QuantityId};
use crate::stats::{quantity_counters, StatCounterDescriptor};

pub const NAME: AttrId = 0;
pub const INPUT_POWER: AttrId = 1;
pub const OUTPUT_POWER: AttrId = 2;
pub const LASER_BIAS_CURRENT: AttrId = 3;
pub const OUTPUT_FREQUENCY: AttrId = 4;

pub const INPUT_POWER_QUANTITY: QuantityId = 0;
pub const OUTPUT_POWER_QUANTITY: QuantityId = 1;
pub const LASER_BIAS_CURRENT_QUANTITY: QuantityId = 2;

pub fn attributes() -> Vec<AttributeDescriptor> {
    vec![
        AttributeDescriptor::new(NAME, "name", AttrType::NAME, Mutability::MandatoryOnCreate),
        AttributeDescriptor::new(INPUT_POWER, "input_power", AttrType::I32, Mutability::ReadOnly)
            .with_precision(2, "dBm")
            .live(INPUT_POWER_QUANTITY),
        AttributeDescriptor::new(OUTPUT_POWER, "output_power", AttrType::I32, Mutability::ReadOnly)
            .with_precision(2, "dBm")
            .live(OUTPUT_POWER_QUANTITY),
        AttributeDescriptor::new(
            LASER_BIAS_CURRENT,
            "laser_bias_current",
            AttrType::I32,
            Mutability::ReadOnly,
        )
        .with_precision(1, "mA")
        .live(LASER_BIAS_CURRENT_QUANTITY),
        AttributeDescriptor::new(
            OUTPUT_FREQUENCY,
            "output_frequency",
            AttrType::U64,
            Mutability::ReadOnly,
        )
        .with_unit("MHz"),
    ]
}

pub fn counters() -> Vec<StatCounterDescriptor> {
    let mut out = quantity_counters(INPUT_POWER_QUANTITY, "input_power", 2, "dBm");
    out.extend(quantity_counters(OUTPUT_POWER_QUANTITY, "output_power", 2, "dBm"));
    out.extend(quantity_counters(
        LASER_BIAS_CURRENT_QUANTITY,
        "laser_bias_current",
        1,
        "mA",
    ));
    out
}

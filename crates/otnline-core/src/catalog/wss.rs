//! Wavelength-selective switch: media channels and their spectrum power slots

use crate::attr::{AttrMap, AttrType, AttrValue, AttributeDescriptor, EnumDef, Mutability};
use crate::ids::{AttrId, ObjectType, QuantityId};
use crate::stats::{quantity_counters, StatCounterDescriptor};

pub static ADMIN_STATE: EnumDef = EnumDef {
    name: "admin_state",
    variants: &[("enabled", 0), ("disabled", 1), ("maint", 2)],
};

pub static OPER_STATUS: EnumDef = EnumDef {
    name: "oper_status",
    variants: &[("up", 0), ("down", 1)],
};

pub static ASE_STATUS: EnumDef = EnumDef {
    name: "ase_status",
    variants: &[("present", 0), ("not_present", 1)],
};

pub static ASE_CONTROL_MODE: EnumDef = EnumDef {
    name: "ase_control_mode",
    variants: &[
        ("enabled", 0),
        ("disabled", 1),
        ("auto_ase_on_failure", 2),
        ("auto_ase_failure_and_restore", 3),
    ],
};

pub static ASE_INJECTION_MODE: EnumDef = EnumDef {
    name: "ase_injection_mode",
    variants: &[("threshold", 0), ("delta", 1)],
};

pub static ATTENUATION_CONTROL_MODE: EnumDef = EnumDef {
    name: "attenuation_control_mode",
    variants: &[
        ("fixed_loss", 0),
        ("dynamic_loss", 1),
        ("dynamic_loss_damped", 2),
        ("set_attenuation", 3),
    ],
};

pub static ATTENUATION_CONTROL_RANGE: EnumDef = EnumDef {
    name: "attenuation_control_range",
    variants: &[("full", 0), ("limited", 1)],
};

pub const ASE_INJECTION_MODE_THRESHOLD: i32 = 0;
pub const ASE_INJECTION_MODE_DELTA: i32 = 1;

pub mod media_channel {
    use super::*;

    pub const INDEX: AttrId = 0;
    pub const LOWER_FREQUENCY: AttrId = 1;
    pub const UPPER_FREQUENCY: AttrId = 2;
    pub const ADMIN_STATE: AttrId = 3;
    pub const SUPER_CHANNEL: AttrId = 4;
    pub const SUPER_CHANNEL_PARENT: AttrId = 5;
    pub const ASE_CONTROL_MODE: AttrId = 6;
    /// Selects which of the two triggers below is in effect
    pub const ASE_INJECTION_MODE: AttrId = 7;
    pub const ASE_INJECTION_THRESHOLD: AttrId = 8;
    pub const ASE_INJECTION_DELTA: AttrId = 9;
    pub const MEDIA_CHANNEL_INJECTION_OFFSET: AttrId = 10;
    pub const ATTENUATION_CONTROL_MODE: AttrId = 11;
    pub const ATTENUATION_CONTROL_RANGE: AttrId = 12;
    pub const MAX_UNDERSHOOT_COMPENSATION: AttrId = 13;
    pub const MAX_OVERSHOOT_COMPENSATION: AttrId = 14;
    pub const SOURCE_PORT_NAME: AttrId = 15;
    pub const DEST_PORT_NAME: AttrId = 16;
    pub const OPER_STATUS: AttrId = 17;
    pub const ASE_STATUS: AttrId = 18;

    fn db(id: AttrId, name: &'static str) -> AttributeDescriptor {
        AttributeDescriptor::new(id, name, AttrType::I32, Mutability::CreateAndSet)
            .with_default(AttrValue::Int(0))
            .with_precision(2, "dB")
    }

    fn choice(id: AttrId, def: &'static EnumDef, default: i32) -> AttributeDescriptor {
        AttributeDescriptor::new(id, def.name, AttrType::Enum(def), Mutability::CreateAndSet)
            .with_default(AttrValue::Enum(default))
    }

    pub fn attributes() -> Vec<AttributeDescriptor> {
        vec![
            AttributeDescriptor::new(INDEX, "index", AttrType::U32, Mutability::MandatoryOnCreate),
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
            choice(ADMIN_STATE, &super::ADMIN_STATE, 0),
            AttributeDescriptor::new(
                SUPER_CHANNEL,
                "super_channel",
                AttrType::Bool,
                Mutability::CreateAndSet,
            )
            .with_default(AttrValue::Bool(false)),
            AttributeDescriptor::new(
                SUPER_CHANNEL_PARENT,
                "super_channel_parent",
                AttrType::U32,
                Mutability::CreateAndSet,
            )
            .with_default(AttrValue::Uint(0)),
            choice(ASE_CONTROL_MODE, &super::ASE_CONTROL_MODE, 3),
            choice(ASE_INJECTION_MODE, &super::ASE_INJECTION_MODE, ASE_INJECTION_MODE_THRESHOLD),
            db(ASE_INJECTION_THRESHOLD, "ase_injection_threshold"),
            db(ASE_INJECTION_DELTA, "ase_injection_delta"),
            db(MEDIA_CHANNEL_INJECTION_OFFSET, "media_channel_injection_offset"),
            choice(ATTENUATION_CONTROL_MODE, &super::ATTENUATION_CONTROL_MODE, 3),
            choice(ATTENUATION_CONTROL_RANGE, &super::ATTENUATION_CONTROL_RANGE, 0),
            db(MAX_UNDERSHOOT_COMPENSATION, "max_undershoot_compensation"),
            db(MAX_OVERSHOOT_COMPENSATION, "max_overshoot_compensation"),
            AttributeDescriptor::new(
                SOURCE_PORT_NAME,
                "source_port_name",
                AttrType::NAME,
                Mutability::CreateAndSet,
            )
            .with_default(AttrValue::Text(String::new())),
            AttributeDescriptor::new(
                DEST_PORT_NAME,
                "dest_port_name",
                AttrType::NAME,
                Mutability::CreateAndSet,
            )
            .with_default(AttrValue::Text(String::new())),
            AttributeDescriptor::new(
                OPER_STATUS,
                "oper_status",
                AttrType::Enum(&super::OPER_STATUS),
                Mutability::ReadOnly,
            ),
            AttributeDescriptor::new(
                ASE_STATUS,
                "ase_status",
                AttrType::Enum(&super::ASE_STATUS),
                Mutability::ReadOnly,
            ),
        ]
    }
}

pub mod power_slot {
    use super::*;

    /// Owning media channel
    pub const MEDIA_CHANNEL: AttrId = 0;
    pub const LOWER_FREQUENCY: AttrId = 1;
    pub const UPPER_FREQUENCY: AttrId = 2;
    pub const TARGET_POWER: AttrId = 3;
    pub const ATTENUATION: AttrId = 4;
    pub const ACTUAL_ATTENUATION: AttrId = 5;

    pub const ACTUAL_ATTENUATION_QUANTITY: QuantityId = 0;

    pub fn attributes() -> Vec<AttributeDescriptor> {
        vec![
            AttributeDescriptor::new(
                MEDIA_CHANNEL,
                "switch_media_channel",
                AttrType::ObjectRef(&[ObjectType::SwitchMediaChannel]),
                Mutability::MandatoryOnCreate,
            ),
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
            AttributeDescriptor::new(
                TARGET_POWER,
                "target_power",
                AttrType::I32,
                Mutability::CreateAndSet,
            )
            .with_default(AttrValue::Int(0))
            .with_precision(2, "dBm"),
            AttributeDescriptor::new(
                ATTENUATION,
                "attenuation",
                AttrType::I32,
                Mutability::CreateAndSet,
            )
            .with_default(AttrValue::Int(0))
            .with_precision(2, "dB"),
            AttributeDescriptor::new(
                ACTUAL_ATTENUATION,
                "actual_attenuation",
                AttrType::I32,
                Mutability::ReadOnly,
            )
            .with_precision(2, "dB")
            .live(ACTUAL_ATTENUATION_QUANTITY),
        ]
    }

    pub fn counters() -> Vec<StatCounterDescriptor> {
        quantity_counters(ACTUAL_ATTENUATION_QUANTITY, "actual_attenuation", 2, "dB")
    }
}

/// Noise-injection trigger in effect for a media channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AseTrigger {
    /// Inject when channel power drops below this level (0.01 dB)
    Threshold(i64),
    /// Inject when channel power drops by this much (0.01 dB)
    Delta(i64),
}

/// Resolve the trigger from a media channel's attributes.
///
/// `ase_injection_mode` decides which value applies; the other one is kept
/// but has no effect.
pub fn active_ase_trigger(attrs: &AttrMap) -> Option<AseTrigger> {
    let value = |id| attrs.get(&id).and_then(AttrValue::as_i64).unwrap_or(0);
    match attrs.get(&media_channel::ASE_INJECTION_MODE)?.as_enum()? {
        ASE_INJECTION_MODE_THRESHOLD => Some(AseTrigger::Threshold(value(
            media_channel::ASE_INJECTION_THRESHOLD,
        ))),
        ASE_INJECTION_MODE_DELTA => Some(AseTrigger::Delta(value(
            media_channel::ASE_INJECTION_DELTA,
        ))),
        _ => None,
    }
}

//! Line-system device

use crate::attr::{AttrType, AttrValue, AttributeDescriptor, Mutability};
use crate::ids::AttrId;

pub const ADMIN_STATE: AttrId = 0;
/// Hold-off before an alarm is raised
pub const ALARM_ACT_TIME: AttrId = 1;
/// Hold-off before a raised alarm is cleared
pub const ALARM_DEACT_TIME: AttrId = 2;

pub fn attributes() -> Vec<AttributeDescriptor> {
    vec![
        AttributeDescriptor::new(
            ADMIN_STATE,
            "admin_state",
            AttrType::Bool,
            Mutability::CreateAndSet,
        )
        .with_default(AttrValue::Bool(true)),
        AttributeDescriptor::new(
            ALARM_ACT_TIME,
            "alarm_act_time",
            AttrType::U32,
            Mutability::CreateAndSet,
        )
        .with_default(AttrValue::Uint(2500))
        .with_unit("ms"),
        AttributeDescriptor::new(
            ALARM_DEACT_TIME,
            "alarm_deact_time",
            AttrType::U32,
            Mutability::CreateAndSet,
        )
        .with_default(AttrValue::Uint(10_000))
        .with_unit("ms"),
    ]
}

//! Identifiers for objects, attributes, counters and switches
//!
//! Every identifier enumeration in the system follows the same numbering:
//! standard ids form a contiguous block starting at 0, and the window
//! `[CUSTOM_RANGE_START, CUSTOM_RANGE_END)` is reserved for vendor ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Attribute identifier within one object type
pub type AttrId = u32;

/// Statistics counter identifier within one object type
pub type CounterId = u32;

/// Physical quantity identifier within one object type
pub type QuantityId = u32;

/// First id of the vendor extension window
pub const CUSTOM_RANGE_START: u32 = 0x1000_0000;

/// One past the last id of the vendor extension window
pub const CUSTOM_RANGE_END: u32 = 0x2000_0000;

/// Where an id falls relative to the standard block and the custom window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRange {
    Standard,
    Custom,
    /// Between the standard block and the custom window, or past the window
    Outside,
}

impl IdRange {
    /// Classify an id. `standard_end` is the type's end sentinel.
    pub fn classify(id: u32, standard_end: u32) -> Self {
        if id < standard_end {
            Self::Standard
        } else if is_custom(id) {
            Self::Custom
        } else {
            Self::Outside
        }
    }
}

/// True when `id` lies inside the vendor extension window
pub fn is_custom(id: u32) -> bool {
    (CUSTOM_RANGE_START..CUSTOM_RANGE_END).contains(&id)
}

/// The kinds of objects the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Supervisory line amplifier/monitor device
    Device,
    /// Optical channel monitor
    ChannelMonitor,
    /// One monitored wavelength of a channel monitor
    ChannelMonitorChannel,
    /// Supervisory channel interface
    SupervisoryChannel,
    /// Wavelength-selective switch media channel
    SwitchMediaChannel,
    /// Per-slot power target of a media channel
    SwitchSpectrumPowerSlot,
}

impl ObjectType {
    pub const ALL: [ObjectType; 6] = [
        ObjectType::Device,
        ObjectType::ChannelMonitor,
        ObjectType::ChannelMonitorChannel,
        ObjectType::SupervisoryChannel,
        ObjectType::SwitchMediaChannel,
        ObjectType::SwitchSpectrumPowerSlot,
    ];

    /// Tag stored in the top byte of every [`ObjectId`] of this type
    pub fn tag(self) -> u8 {
        match self {
            ObjectType::Device => 1,
            ObjectType::ChannelMonitor => 2,
            ObjectType::ChannelMonitorChannel => 3,
            ObjectType::SupervisoryChannel => 4,
            ObjectType::SwitchMediaChannel => 5,
            ObjectType::SwitchSpectrumPowerSlot => 6,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Device => "device",
            ObjectType::ChannelMonitor => "channel_monitor",
            ObjectType::ChannelMonitorChannel => "channel_monitor_channel",
            ObjectType::SupervisoryChannel => "supervisory_channel",
            ObjectType::SwitchMediaChannel => "switch_media_channel",
            ObjectType::SwitchSpectrumPowerSlot => "switch_spectrum_power_slot",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown object type: {0}")]
pub struct ParseObjectTypeError(pub String);

impl FromStr for ObjectType {
    type Err = ParseObjectTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseObjectTypeError(s.to_string()))
    }
}

/// Opaque object identifier, unique among all objects ever created by one store
///
/// The top byte carries the object type tag, the low 56 bits a serial number
/// that is never handed out twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Largest serial that fits below the type tag
    pub const MAX_SERIAL: u64 = (1 << 56) - 1;

    pub fn new(object_type: ObjectType, serial: u64) -> Option<Self> {
        if serial == 0 || serial > Self::MAX_SERIAL {
            return None;
        }
        Some(Self((u64::from(object_type.tag()) << 56) | serial))
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn serial(self) -> u64 {
        self.0 & Self::MAX_SERIAL
    }

    /// Type encoded in the id, if the tag is a known one
    pub fn object_type(self) -> Option<ObjectType> {
        ObjectType::from_tag((self.0 >> 56) as u8)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oid:0x{:016x}", self.0)
    }
}

/// Foreign key into the surrounding system's switch namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(pub u64);

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "switch:0x{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_layout() {
        let id = ObjectId::new(ObjectType::SwitchMediaChannel, 42).unwrap();
        assert_eq!(id.serial(), 42);
        assert_eq!(id.raw(), (u64::from(ObjectType::SwitchMediaChannel.tag()) << 56) | 42);
        assert_eq!(id.object_type(), Some(ObjectType::SwitchMediaChannel));
        assert!(ObjectId::new(ObjectType::Device, 0).is_none());
        assert!(ObjectId::new(ObjectType::Device, ObjectId::MAX_SERIAL + 1).is_none());
    }

    #[test]
    fn test_id_range_classification() {
        assert_eq!(IdRange::classify(2, 3), IdRange::Standard);
        assert_eq!(IdRange::classify(3, 3), IdRange::Outside);
        assert_eq!(IdRange::classify(0x1000_0005, 3), IdRange::Custom);
        assert_eq!(IdRange::classify(CUSTOM_RANGE_END, 3), IdRange::Outside);
    }

    #[test]
    fn test_object_type_names() {
        for ty in ObjectType::ALL {
            assert_eq!(ty.as_str().parse::<ObjectType>().unwrap(), ty);
            assert_eq!(ObjectType::from_tag(ty.tag()), Some(ty));
        }
        assert!("amplifier".parse::<ObjectType>().is_err());
    }
}

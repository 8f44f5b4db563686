//! Attribute descriptors, types and values

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ViolationKind;
use crate::ids::{AttrId, ObjectId, ObjectType, QuantityId};

/// When an attribute may be supplied or changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    /// Must be supplied on create; fixed afterwards
    MandatoryOnCreate,
    /// May be supplied on create; fixed afterwards
    CreateOnly,
    /// May be supplied on create and changed later
    CreateAndSet,
    /// Owned by the backend
    ReadOnly,
}

impl Mutability {
    pub fn required_on_create(self) -> bool {
        match self {
            Mutability::MandatoryOnCreate => true,
            Mutability::CreateOnly | Mutability::CreateAndSet | Mutability::ReadOnly => false,
        }
    }

    pub fn accepted_on_create(self) -> bool {
        match self {
            Mutability::MandatoryOnCreate | Mutability::CreateOnly | Mutability::CreateAndSet => {
                true
            }
            Mutability::ReadOnly => false,
        }
    }

    pub fn settable(self) -> bool {
        match self {
            Mutability::CreateAndSet => true,
            Mutability::MandatoryOnCreate | Mutability::CreateOnly | Mutability::ReadOnly => false,
        }
    }
}

/// A closed enumeration an attribute value must belong to
#[derive(Debug, Serialize)]
pub struct EnumDef {
    pub name: &'static str,
    pub variants: &'static [(&'static str, i32)],
}

impl EnumDef {
    pub fn contains(&self, value: i32) -> bool {
        self.variants.iter().any(|(_, v)| *v == value)
    }

    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.variants
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i32) -> Option<&'static str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| *n)
    }
}

/// Semantic type of an attribute
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    Bool,
    Uint { bits: u8 },
    Int { bits: u8 },
    Enum(&'static EnumDef),
    Text { max_len: usize },
    /// Reference to an object of one of the listed types
    ObjectRef(&'static [ObjectType]),
    /// Vendor data, accepted without inspection
    Opaque,
}

impl AttrType {
    pub const U32: AttrType = AttrType::Uint { bits: 32 };
    pub const U64: AttrType = AttrType::Uint { bits: 64 };
    pub const I32: AttrType = AttrType::Int { bits: 32 };
    /// Fixed-size name buffer used for port and interface names
    pub const NAME: AttrType = AttrType::Text { max_len: 32 };

    /// Shape check of `value` against this type. Object references are only
    /// checked for shape here; existence is the registry's job.
    pub fn check(&self, value: &AttrValue) -> Result<(), ViolationKind> {
        match (self, value) {
            (AttrType::Opaque, _) => Ok(()),
            (AttrType::Bool, AttrValue::Bool(_)) => Ok(()),
            (AttrType::Uint { bits }, AttrValue::Uint(v)) => {
                if *bits >= 64 || *v < (1u64 << bits) {
                    Ok(())
                } else {
                    Err(ViolationKind::OutOfRange)
                }
            }
            (AttrType::Int { bits }, AttrValue::Int(v)) => {
                if *bits >= 64 {
                    return Ok(());
                }
                let max = (1i64 << (bits - 1)) - 1;
                let min = -(1i64 << (bits - 1));
                if (min..=max).contains(v) {
                    Ok(())
                } else {
                    Err(ViolationKind::OutOfRange)
                }
            }
            (AttrType::Enum(def), AttrValue::Enum(v)) => {
                if def.contains(*v) {
                    Ok(())
                } else {
                    Err(ViolationKind::NotInEnum)
                }
            }
            (AttrType::Text { max_len }, AttrValue::Text(s)) => {
                if s.len() <= *max_len {
                    Ok(())
                } else {
                    Err(ViolationKind::TooLong)
                }
            }
            (AttrType::ObjectRef(_), AttrValue::ObjectRef(_)) => Ok(()),
            _ => Err(ViolationKind::TypeMismatch),
        }
    }
}

/// A value tagged with its semantic type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Bool(bool),
    Uint(u64),
    Int(i64),
    Enum(i32),
    Text(String),
    ObjectRef(ObjectId),
    Opaque(Vec<u8>),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttrValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        match self {
            AttrValue::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object_ref(&self) -> Option<ObjectId> {
        match self {
            AttrValue::ObjectRef(id) => Some(*id),
            _ => None,
        }
    }
}

/// An attribute id paired with a value, as passed to create and set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub id: AttrId,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(id: AttrId, value: AttrValue) -> Self {
        Self { id, value }
    }
}

/// Resolved attribute values of one object, ordered by id
pub type AttrMap = BTreeMap<AttrId, AttrValue>;

/// Schema entry for one attribute of an object type
#[derive(Debug, Clone, Serialize)]
pub struct AttributeDescriptor {
    pub id: AttrId,
    pub name: &'static str,
    pub ty: AttrType,
    pub mutability: Mutability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<AttrValue>,
    /// Decimal scale of fixed-point physical values (2 means units of 0.01)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    /// Physical quantity whose instant value this read-only attribute mirrors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live: Option<QuantityId>,
}

impl AttributeDescriptor {
    pub fn new(id: AttrId, name: &'static str, ty: AttrType, mutability: Mutability) -> Self {
        Self {
            id,
            name,
            ty,
            mutability,
            default: None,
            precision: None,
            unit: None,
            live: None,
        }
    }

    pub fn with_default(mut self, value: AttrValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_precision(mut self, precision: u8, unit: &'static str) -> Self {
        self.precision = Some(precision);
        self.unit = Some(unit);
        self
    }

    pub fn live(mut self, quantity: QuantityId) -> Self {
        self.live = Some(quantity);
        self
    }

    /// Object types this attribute may point at; empty for non-relational attributes
    pub fn references(&self) -> &'static [ObjectType] {
        match self.ty {
            AttrType::ObjectRef(types) => types,
            _ => &[],
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(self.ty, AttrType::ObjectRef(_))
    }
}

/// Convert a fixed-point raw value to its physical value
pub fn fixed_to_f64(raw: i64, precision: u8) -> f64 {
    raw as f64 / 10f64.powi(i32::from(precision))
}

/// Convert a physical value to fixed-point, rounding to the nearest unit
pub fn f64_to_fixed(value: f64, precision: u8) -> i64 {
    (value * 10f64.powi(i32::from(precision))).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    static COLOR: EnumDef = EnumDef {
        name: "color",
        variants: &[("red", 0), ("green", 1)],
    };

    #[test]
    fn test_mutability_classes() {
        assert!(Mutability::MandatoryOnCreate.required_on_create());
        assert!(!Mutability::CreateOnly.required_on_create());
        assert!(!Mutability::ReadOnly.accepted_on_create());
        assert!(Mutability::CreateAndSet.settable());
        assert!(!Mutability::CreateOnly.settable());
        assert!(!Mutability::MandatoryOnCreate.settable());
    }

    #[test]
    fn test_integer_width_checks() {
        assert!(AttrType::U32.check(&AttrValue::Uint(u64::from(u32::MAX))).is_ok());
        assert_eq!(
            AttrType::U32.check(&AttrValue::Uint(1 << 32)),
            Err(ViolationKind::OutOfRange)
        );
        assert!(AttrType::I32.check(&AttrValue::Int(i64::from(i32::MIN))).is_ok());
        assert_eq!(
            AttrType::I32.check(&AttrValue::Int(i64::from(i32::MAX) + 1)),
            Err(ViolationKind::OutOfRange)
        );
        assert_eq!(
            AttrType::I32.check(&AttrValue::Uint(1)),
            Err(ViolationKind::TypeMismatch)
        );
    }

    #[test]
    fn test_enum_and_text_checks() {
        let ty = AttrType::Enum(&COLOR);
        assert!(ty.check(&AttrValue::Enum(1)).is_ok());
        assert_eq!(ty.check(&AttrValue::Enum(5)), Err(ViolationKind::NotInEnum));
        assert_eq!(COLOR.value_of("GREEN"), Some(1));
        assert_eq!(COLOR.name_of(0), Some("red"));

        let long = "x".repeat(33);
        assert_eq!(
            AttrType::NAME.check(&AttrValue::Text(long)),
            Err(ViolationKind::TooLong)
        );
        assert!(AttrType::Opaque.check(&AttrValue::Bool(true)).is_ok());
    }

    #[test]
    fn test_fixed_point_conversion() {
        assert_eq!(f64_to_fixed(-5.0, 2), -500);
        assert!((fixed_to_f64(-300, 2) + 3.0).abs() < f64::EPSILON);
        assert_eq!(f64_to_fixed(12.34, 1), 123);
    }
}

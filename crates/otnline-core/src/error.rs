//! Status codes and validation errors

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::ids::{AttrId, ObjectId, ObjectType, SwitchId};

/// Why a single attribute was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Standard-range id absent from the type's schema, or id outside every range
    Unknown,
    /// Same id supplied twice in one call
    Duplicate,
    /// Value variant does not match the descriptor's type
    TypeMismatch,
    /// Integer does not fit the declared width
    OutOfRange,
    /// Enum value is not a member of the enumeration
    NotInEnum,
    /// Text longer than the declared maximum
    TooLong,
    /// Referenced object does not exist
    DanglingReference,
    /// Referenced object exists but has the wrong type
    WrongReferenceType,
    MissingMandatory,
    NotSettable,
    /// Custom-range id that no backend declared
    Unsupported,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::Unknown => "unknown attribute",
            ViolationKind::Duplicate => "duplicate attribute",
            ViolationKind::TypeMismatch => "type mismatch",
            ViolationKind::OutOfRange => "value out of range",
            ViolationKind::NotInEnum => "value not in enumeration",
            ViolationKind::TooLong => "text too long",
            ViolationKind::DanglingReference => "referenced object does not exist",
            ViolationKind::WrongReferenceType => "referenced object has the wrong type",
            ViolationKind::MissingMandatory => "mandatory attribute missing",
            ViolationKind::NotSettable => "attribute not settable",
            ViolationKind::Unsupported => "attribute not supported",
        };
        f.write_str(s)
    }
}

/// First offending attribute of a validation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attribute {id:#x}: {kind}")]
pub struct Violation {
    pub id: AttrId,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(id: AttrId, kind: ViolationKind) -> Self {
        Self { id, kind }
    }
}

/// Errors returned by every engine operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtnError {
    #[error("invalid attribute {id:#x}: {kind}")]
    InvalidAttribute { id: AttrId, kind: ViolationKind },
    #[error("mandatory attribute {0:#x} missing")]
    MissingMandatoryAttribute(AttrId),
    #[error("attribute {0:#x} is not settable")]
    AttributeNotSettable(AttrId),
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),
    #[error("unknown switch {0}")]
    InvalidSwitch(SwitchId),
    #[error("object {id} is referenced by {referrers} object(s)")]
    ObjectInUse { id: ObjectId, referrers: usize },
    #[error("no capacity left for {0} objects")]
    ResourceExhausted(ObjectType),
    #[error("id {0:#x} is not supported by this object type")]
    Unsupported(u32),
    #[error("no value available for id {0:#x}")]
    NotFound(u32),
}

impl OtnError {
    pub fn status(&self) -> Status {
        match self {
            OtnError::InvalidAttribute { .. } => Status::InvalidAttribute,
            OtnError::MissingMandatoryAttribute(_) => Status::MissingMandatoryAttribute,
            OtnError::AttributeNotSettable(_) => Status::AttributeNotSettable,
            OtnError::ObjectNotFound(_) => Status::ObjectNotFound,
            OtnError::InvalidSwitch(_) => Status::InvalidSwitch,
            OtnError::ObjectInUse { .. } => Status::ObjectInUse,
            OtnError::ResourceExhausted(_) => Status::ResourceExhausted,
            OtnError::Unsupported(_) => Status::Unsupported,
            OtnError::NotFound(_) => Status::NotFound,
        }
    }
}

impl From<Violation> for OtnError {
    fn from(v: Violation) -> Self {
        match v.kind {
            ViolationKind::MissingMandatory => OtnError::MissingMandatoryAttribute(v.id),
            ViolationKind::NotSettable => OtnError::AttributeNotSettable(v.id),
            ViolationKind::Unsupported => OtnError::Unsupported(v.id),
            kind => OtnError::InvalidAttribute { id: v.id, kind },
        }
    }
}

/// Discriminated outcome of an operation, as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    InvalidAttribute,
    MissingMandatoryAttribute,
    AttributeNotSettable,
    ObjectNotFound,
    InvalidSwitch,
    ObjectInUse,
    ResourceExhausted,
    Unsupported,
    NotFound,
}

impl Status {
    pub fn of<T>(result: &Result<T, OtnError>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

/// Outcome for one id of a batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementResult<T> {
    pub id: u32,
    pub result: Result<T, OtnError>,
}

impl<T> ElementResult<T> {
    pub fn status(&self) -> Status {
        Status::of(&self.result)
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }
}

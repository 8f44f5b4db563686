//! Vendor extension ids
//!
//! Ids inside the custom window bypass the standard schema. A backend
//! declares the specific custom attributes and counters it implements; the
//! engine stores their values opaquely and only enforces the read/write flag
//! supplied at declaration time.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;

use crate::attr::{AttrType, AttributeDescriptor, Mutability};
use crate::ids::{is_custom, AttrId, CounterId, ObjectType, QuantityId};
use crate::stats::{StatCounterDescriptor, StatFacet};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustomRangeError {
    #[error("id {0:#x} is outside the custom range")]
    NotCustom(u32),
    #[error("custom id {id:#x} already declared for {object_type}")]
    AlreadyDeclared { object_type: ObjectType, id: u32 },
}

/// A backend-declared custom attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomAttribute {
    pub object_type: ObjectType,
    pub id: AttrId,
    pub name: String,
    pub writable: bool,
}

/// Registry of backend-declared ids inside the custom window
#[derive(Debug, Default)]
pub struct CustomRangeAllocator {
    attrs: RwLock<HashMap<(ObjectType, AttrId), CustomAttribute>>,
    counters: RwLock<HashMap<(ObjectType, CounterId), StatCounterDescriptor>>,
}

impl CustomRangeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a custom attribute for one object type
    pub fn declare_attribute(
        &self,
        object_type: ObjectType,
        id: AttrId,
        name: impl Into<String>,
        writable: bool,
    ) -> Result<(), CustomRangeError> {
        if !is_custom(id) {
            return Err(CustomRangeError::NotCustom(id));
        }
        let mut attrs = self.attrs.write().unwrap_or_else(PoisonError::into_inner);
        if attrs.contains_key(&(object_type, id)) {
            return Err(CustomRangeError::AlreadyDeclared { object_type, id });
        }
        let name = name.into();
        debug!(object_type = %object_type, id, name = %name, writable, "Declared custom attribute");
        attrs.insert(
            (object_type, id),
            CustomAttribute {
                object_type,
                id,
                name,
                writable,
            },
        );
        Ok(())
    }

    pub fn attribute(&self, object_type: ObjectType, id: AttrId) -> Option<CustomAttribute> {
        self.attrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(object_type, id))
            .cloned()
    }

    pub fn attribute_by_name(
        &self,
        object_type: ObjectType,
        name: &str,
    ) -> Option<CustomAttribute> {
        self.attrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|a| a.object_type == object_type && a.name == name)
            .cloned()
    }

    /// All custom attributes declared for a type, ordered by id
    pub fn attributes(&self, object_type: ObjectType) -> Vec<CustomAttribute> {
        let mut out: Vec<_> = self
            .attrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|a| a.object_type == object_type)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.id);
        out
    }

    /// Descriptor used for a custom id in place of a schema entry.
    ///
    /// Declared writable ids are create-and-set, declared read-only ids are
    /// read-only, and undeclared ids may be supplied on create only.
    pub fn synthetic_descriptor(&self, object_type: ObjectType, id: AttrId) -> AttributeDescriptor {
        let mutability = match self.attribute(object_type, id) {
            Some(a) if a.writable => Mutability::CreateAndSet,
            Some(_) => Mutability::ReadOnly,
            None => Mutability::CreateOnly,
        };
        AttributeDescriptor::new(id, "custom", AttrType::Opaque, mutability)
    }

    /// Declare a custom counter; it then behaves like a standard one
    pub fn declare_counter(
        &self,
        object_type: ObjectType,
        id: CounterId,
        quantity: QuantityId,
        facet: StatFacet,
        precision: u8,
    ) -> Result<(), CustomRangeError> {
        if !is_custom(id) {
            return Err(CustomRangeError::NotCustom(id));
        }
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        if counters.contains_key(&(object_type, id)) {
            return Err(CustomRangeError::AlreadyDeclared { object_type, id });
        }
        counters.insert(
            (object_type, id),
            StatCounterDescriptor {
                id,
                name: "custom",
                quantity,
                facet,
                precision,
                unit: "",
            },
        );
        Ok(())
    }

    pub fn counter(&self, object_type: ObjectType, id: CounterId) -> Option<StatCounterDescriptor> {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(object_type, id))
            .copied()
    }

    /// True when some custom counter of the type reports this quantity
    pub fn measures(&self, object_type: ObjectType, quantity: QuantityId) -> bool {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|((t, _), c)| *t == object_type && c.quantity == quantity)
    }
}

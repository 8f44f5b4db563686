//! Schema registry: per-type attribute and counter descriptors
//!
//! Lookups are two-tier. Standard ids resolve against the static table
//! registered for the type; ids in the custom window fall back to the
//! [`CustomRangeAllocator`]. Validation returns the first offending id.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::attr::{AttrMap, AttrType, AttrValue, Attribute, AttributeDescriptor, Mutability};
use crate::custom::CustomRangeAllocator;
use crate::error::{OtnError, Violation, ViolationKind};
use crate::ids::{is_custom, AttrId, CounterId, IdRange, ObjectId, ObjectType, QuantityId};
use crate::stats::StatCounterDescriptor;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{0} is already registered")]
    AlreadyRegistered(ObjectType),
    #[error("{0} has no registered attributes")]
    UnknownType(ObjectType),
    #[error("{object_type}: attribute id {id:#x} declared twice")]
    DuplicateAttribute { object_type: ObjectType, id: AttrId },
    #[error("{object_type}: attribute {id:#x} is mandatory on create and carries a default")]
    MandatoryWithDefault { object_type: ObjectType, id: AttrId },
    #[error("{object_type}: standard id {id:#x} collides with the custom range")]
    CustomRangeCollision { object_type: ObjectType, id: u32 },
    #[error("{object_type}: default of attribute {id:#x} is invalid: {kind}")]
    InvalidDefault {
        object_type: ObjectType,
        id: AttrId,
        kind: ViolationKind,
    },
    #[error("{object_type}: counter id {id:#x} declared twice")]
    DuplicateCounter { object_type: ObjectType, id: CounterId },
}

/// Answers "does this object exist, and what type is it" during validation
pub trait ObjectResolver {
    fn object_type_of(&self, id: ObjectId) -> Option<ObjectType>;
}

/// Resolver for contexts where no object may be referenced
pub struct NoObjects;

impl ObjectResolver for NoObjects {
    fn object_type_of(&self, _id: ObjectId) -> Option<ObjectType> {
        None
    }
}

/// Registered schema of one object type
#[derive(Debug, Clone, Serialize)]
pub struct TypeSchema {
    pub object_type: ObjectType,
    attrs: Vec<AttributeDescriptor>,
    counters: Vec<StatCounterDescriptor>,
    #[serde(skip)]
    attr_index: HashMap<AttrId, usize>,
    #[serde(skip)]
    counter_index: HashMap<CounterId, usize>,
}

impl TypeSchema {
    /// Attribute descriptors in declaration order
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attrs
    }

    pub fn attribute(&self, id: AttrId) -> Option<&AttributeDescriptor> {
        self.attr_index.get(&id).map(|i| &self.attrs[*i])
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// End sentinel of the standard attribute block
    pub fn attr_end(&self) -> AttrId {
        self.attrs.iter().map(|a| a.id + 1).max().unwrap_or(0)
    }

    pub fn counters(&self) -> &[StatCounterDescriptor] {
        &self.counters
    }

    pub fn counter(&self, id: CounterId) -> Option<&StatCounterDescriptor> {
        self.counter_index.get(&id).map(|i| &self.counters[*i])
    }

    pub fn measures(&self, quantity: QuantityId) -> bool {
        self.counters.iter().any(|c| c.quantity == quantity)
    }

    /// Distinct quantities with standard counters, ascending
    pub fn quantities(&self) -> Vec<QuantityId> {
        let mut out: Vec<_> = self.counters.iter().map(|c| c.quantity).collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Holds the schema of every object type plus the custom id window
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: HashMap<ObjectType, TypeSchema>,
    custom: CustomRangeAllocator,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the attribute descriptors of a type
    pub fn register_type(
        &mut self,
        object_type: ObjectType,
        descriptors: Vec<AttributeDescriptor>,
    ) -> Result<(), SchemaError> {
        if self.types.contains_key(&object_type) {
            return Err(SchemaError::AlreadyRegistered(object_type));
        }
        let mut attr_index = HashMap::with_capacity(descriptors.len());
        for (i, desc) in descriptors.iter().enumerate() {
            if desc.id >= crate::ids::CUSTOM_RANGE_START {
                return Err(SchemaError::CustomRangeCollision {
                    object_type,
                    id: desc.id,
                });
            }
            if attr_index.insert(desc.id, i).is_some() {
                return Err(SchemaError::DuplicateAttribute {
                    object_type,
                    id: desc.id,
                });
            }
            if let Some(default) = &desc.default {
                if desc.mutability.required_on_create() {
                    return Err(SchemaError::MandatoryWithDefault {
                        object_type,
                        id: desc.id,
                    });
                }
                let check = if desc.is_relational() {
                    Err(ViolationKind::DanglingReference)
                } else {
                    desc.ty.check(default)
                };
                if let Err(kind) = check {
                    return Err(SchemaError::InvalidDefault {
                        object_type,
                        id: desc.id,
                        kind,
                    });
                }
            }
        }
        self.types.insert(
            object_type,
            TypeSchema {
                object_type,
                attrs: descriptors,
                counters: Vec::new(),
                attr_index,
                counter_index: HashMap::new(),
            },
        );
        Ok(())
    }

    /// Register the statistics counters of an already registered type
    pub fn register_counters(
        &mut self,
        object_type: ObjectType,
        counters: Vec<StatCounterDescriptor>,
    ) -> Result<(), SchemaError> {
        let schema = self
            .types
            .get_mut(&object_type)
            .ok_or(SchemaError::UnknownType(object_type))?;
        let mut index = schema.counter_index.clone();
        let offset = schema.counters.len();
        for (i, counter) in counters.iter().enumerate() {
            if counter.id >= crate::ids::CUSTOM_RANGE_START {
                return Err(SchemaError::CustomRangeCollision {
                    object_type,
                    id: counter.id,
                });
            }
            if index.insert(counter.id, offset + i).is_some() {
                return Err(SchemaError::DuplicateCounter {
                    object_type,
                    id: counter.id,
                });
            }
        }
        schema.counters.extend(counters);
        schema.counter_index = index;
        Ok(())
    }

    pub fn schema(&self, object_type: ObjectType) -> Option<&TypeSchema> {
        self.types.get(&object_type)
    }

    /// Registered schemas ordered by object type
    pub fn schemas(&self) -> Vec<&TypeSchema> {
        let mut out: Vec<_> = self.types.values().collect();
        out.sort_by_key(|s| s.object_type);
        out
    }

    pub fn custom(&self) -> &CustomRangeAllocator {
        &self.custom
    }

    fn type_schema(&self, object_type: ObjectType, id: u32) -> Result<&TypeSchema, OtnError> {
        self.types.get(&object_type).ok_or(OtnError::Unsupported(id))
    }

    /// Resolve an attribute id. Custom-range ids always resolve, to a
    /// synthetic opaque descriptor.
    pub fn lookup(
        &self,
        object_type: ObjectType,
        id: AttrId,
    ) -> Result<Cow<'_, AttributeDescriptor>, OtnError> {
        let schema = self.type_schema(object_type, id)?;
        match IdRange::classify(id, schema.attr_end()) {
            IdRange::Custom => Ok(Cow::Owned(self.custom.synthetic_descriptor(object_type, id))),
            IdRange::Standard | IdRange::Outside => schema
                .attribute(id)
                .map(Cow::Borrowed)
                .ok_or(OtnError::InvalidAttribute {
                    id,
                    kind: ViolationKind::Unknown,
                }),
        }
    }

    /// Resolve a counter id. Unknown ids, standard or custom, are `Unsupported`.
    pub fn lookup_counter(
        &self,
        object_type: ObjectType,
        id: CounterId,
    ) -> Result<StatCounterDescriptor, OtnError> {
        let schema = self.type_schema(object_type, id)?;
        let found = if is_custom(id) {
            self.custom.counter(object_type, id)
        } else {
            schema.counter(id).copied()
        };
        found.ok_or(OtnError::Unsupported(id))
    }

    /// True when telemetry for `quantity` can be accepted by `object_type`
    pub fn measures(&self, object_type: ObjectType, quantity: QuantityId) -> bool {
        self.types
            .get(&object_type)
            .is_some_and(|s| s.measures(quantity))
            || self.custom.measures(object_type, quantity)
    }

    /// Validate a create request and resolve the full attribute map.
    ///
    /// Every mandatory attribute must be present; omitted attributes with a
    /// default get that default. Custom-range ids are stored opaquely.
    pub fn validate_create_list(
        &self,
        object_type: ObjectType,
        attrs: &[Attribute],
        objects: &dyn ObjectResolver,
    ) -> Result<AttrMap, Violation> {
        let schema = self
            .types
            .get(&object_type)
            .ok_or(Violation::new(0, ViolationKind::Unsupported))?;
        let mut seen = HashSet::with_capacity(attrs.len());
        let mut resolved = AttrMap::new();

        for attr in attrs {
            if !seen.insert(attr.id) {
                return Err(Violation::new(attr.id, ViolationKind::Duplicate));
            }
            let desc = match IdRange::classify(attr.id, schema.attr_end()) {
                IdRange::Custom => {
                    Cow::Owned(self.custom.synthetic_descriptor(object_type, attr.id))
                }
                IdRange::Standard | IdRange::Outside => schema
                    .attribute(attr.id)
                    .map(Cow::Borrowed)
                    .ok_or(Violation::new(attr.id, ViolationKind::Unknown))?,
            };
            if !desc.mutability.accepted_on_create() {
                return Err(Violation::new(attr.id, ViolationKind::NotSettable));
            }
            check_value(&desc, &attr.value, objects).map_err(|kind| Violation::new(attr.id, kind))?;
            resolved.insert(attr.id, attr.value.clone());
        }

        for desc in schema.attributes() {
            if resolved.contains_key(&desc.id) {
                continue;
            }
            match (desc.mutability, &desc.default) {
                (Mutability::MandatoryOnCreate, _) => {
                    return Err(Violation::new(desc.id, ViolationKind::MissingMandatory));
                }
                (_, Some(default)) => {
                    resolved.insert(desc.id, default.clone());
                }
                (
                    Mutability::CreateOnly | Mutability::CreateAndSet | Mutability::ReadOnly,
                    None,
                ) => {}
            }
        }
        Ok(resolved)
    }

    /// Validate a post-create write and return the descriptor it targets
    pub fn validate_set(
        &self,
        object_type: ObjectType,
        attr: &Attribute,
        objects: &dyn ObjectResolver,
    ) -> Result<Cow<'_, AttributeDescriptor>, Violation> {
        let desc = self.resolve_declared(object_type, attr.id)?;
        match desc.mutability {
            Mutability::CreateAndSet => {}
            Mutability::MandatoryOnCreate | Mutability::CreateOnly | Mutability::ReadOnly => {
                return Err(Violation::new(attr.id, ViolationKind::NotSettable));
            }
        }
        check_value(&desc, &attr.value, objects).map_err(|kind| Violation::new(attr.id, kind))?;
        Ok(desc)
    }

    /// Validate a backend update of a read-only attribute
    pub fn validate_publish(
        &self,
        object_type: ObjectType,
        attr: &Attribute,
        objects: &dyn ObjectResolver,
    ) -> Result<Cow<'_, AttributeDescriptor>, Violation> {
        let desc = self.resolve_declared(object_type, attr.id)?;
        match desc.mutability {
            Mutability::ReadOnly => {}
            Mutability::MandatoryOnCreate | Mutability::CreateOnly | Mutability::CreateAndSet => {
                return Err(Violation::new(attr.id, ViolationKind::NotSettable));
            }
        }
        check_value(&desc, &attr.value, objects).map_err(|kind| Violation::new(attr.id, kind))?;
        Ok(desc)
    }

    /// Like [`lookup`](Self::lookup), but undeclared custom ids are `Unsupported`
    fn resolve_declared(
        &self,
        object_type: ObjectType,
        id: AttrId,
    ) -> Result<Cow<'_, AttributeDescriptor>, Violation> {
        if is_custom(id) && self.custom.attribute(object_type, id).is_none() {
            return Err(Violation::new(id, ViolationKind::Unsupported));
        }
        self.lookup(object_type, id).map_err(|e| match e {
            OtnError::InvalidAttribute { kind, .. } => Violation::new(id, kind),
            _ => Violation::new(id, ViolationKind::Unsupported),
        })
    }

    /// Ids of the objects an attribute map points at through relational attributes
    pub fn references_in(&self, object_type: ObjectType, attrs: &AttrMap) -> Vec<ObjectId> {
        let Some(schema) = self.types.get(&object_type) else {
            return Vec::new();
        };
        attrs
            .iter()
            .filter(|(id, _)| schema.attribute(**id).is_some_and(|d| d.is_relational()))
            .filter_map(|(_, v)| v.as_object_ref())
            .collect()
    }
}

/// Full value check, including existence and type of referenced objects
fn check_value(
    desc: &AttributeDescriptor,
    value: &AttrValue,
    objects: &dyn ObjectResolver,
) -> Result<(), ViolationKind> {
    desc.ty.check(value)?;
    if let (AttrType::ObjectRef(allowed), AttrValue::ObjectRef(target)) = (desc.ty, value) {
        match objects.object_type_of(*target) {
            None => return Err(ViolationKind::DanglingReference),
            Some(t) if !allowed.contains(&t) => return Err(ViolationKind::WrongReferenceType),
            Some(_) => {}
        }
    }
    Ok(())
}

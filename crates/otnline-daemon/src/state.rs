//! Application state management

use anyhow::{Context, Result};
use otnline_core::attr::f64_to_fixed;
use otnline_core::{
    catalog, AttrType, AttrValue, Attribute, AttributeDescriptor, Clock, Dispatcher, ObjectId,
    ObjectType, StatFacet, StatValue, StaticSwitches, SwitchId, SystemClock,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use toml::Value;
use tracing::{debug, info};

use crate::config::{Config, ObjectConfig, SwitchConfig};

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("object key {0} used twice")]
    DuplicateKey(String),
    #[error("{object_type} has no attribute named {name}")]
    UnknownAttribute { object_type: ObjectType, name: String },
    #[error("attribute {name}: expected {expected}, found {found}")]
    WrongValue {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("attribute {name}: {value} is not one of {enumeration}")]
    NotInEnum {
        name: String,
        value: String,
        enumeration: &'static str,
    },
    #[error("attribute {name}: no object with key {key}")]
    UnknownKey { name: String, key: String },
}

/// Shared application state
pub struct AppState {
    /// Engine holding every provisioned object
    pub dispatcher: Dispatcher,
    /// Configuration
    pub config: Config,
    /// Object ids by configuration key
    keys: BTreeMap<String, ObjectId>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config) -> Result<Arc<Self>> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build the engine and create every configured object, in order
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Arc<Self>> {
        let registry = catalog::standard_registry().context("building schema registry")?;
        let switches = StaticSwitches::new(config.switches.iter().map(SwitchConfig::switch_id));
        let dispatcher = Dispatcher::new(
            registry,
            config.engine.to_limits()?,
            Arc::new(switches),
            clock,
        );

        for custom in &config.custom_attributes {
            dispatcher
                .declare_custom_attribute(
                    custom.object_type,
                    custom.id,
                    custom.name.clone(),
                    custom.writable,
                )
                .with_context(|| format!("custom attribute {}", custom.name))?;
        }

        let mut keys = BTreeMap::new();
        for object in &config.objects {
            if keys.contains_key(&object.key) {
                return Err(ProvisionError::DuplicateKey(object.key.clone()).into());
            }
            let attrs = resolve_attributes(&dispatcher, object, &keys)
                .with_context(|| format!("object {}", object.key))?;
            let id = dispatcher
                .create(object.object_type, SwitchId(object.switch), &attrs)
                .with_context(|| format!("creating object {}", object.key))?;
            debug!(key = %object.key, object = %id, "Provisioned object");
            keys.insert(object.key.clone(), id);
        }
        info!(
            objects = keys.len(),
            custom_attributes = config.custom_attributes.len(),
            "Engine ready"
        );

        Ok(Arc::new(Self {
            dispatcher,
            config,
            keys,
        }))
    }

    /// Look up an object by its configuration key
    pub fn object(&self, key: &str) -> Option<ObjectId> {
        self.keys.get(key).copied()
    }

    /// Current aggregates of every quantity that has seen a sample
    pub fn report(&self) -> Vec<QuantityReport> {
        let schema = self.dispatcher.schema();
        let mut out = Vec::new();
        for (key, id) in &self.keys {
            let Some(type_schema) = id.object_type().and_then(|ty| schema.schema(ty)) else {
                continue;
            };
            for quantity in type_schema.quantities() {
                let counters: Vec<_> = type_schema
                    .counters()
                    .iter()
                    .filter(|c| c.quantity == quantity)
                    .collect();
                let ids: Vec<_> = counters.iter().map(|c| c.id).collect();
                let Ok(reads) = self.dispatcher.get_stats(*id, &ids) else {
                    continue;
                };
                let value = |facet: StatFacet| {
                    counters
                        .iter()
                        .zip(&reads)
                        .find(|(c, _)| c.facet == facet)
                        .and_then(|(_, r)| r.value())
                        .and_then(StatValue::as_f64)
                };
                let Some(instant) = value(StatFacet::Instant) else {
                    continue;
                };
                out.push(QuantityReport {
                    key: key.clone(),
                    object_type: type_schema.object_type,
                    quantity: counters[0].name,
                    unit: counters[0].unit,
                    instant,
                    average: value(StatFacet::Average),
                    minimum: value(StatFacet::Minimum),
                    maximum: value(StatFacet::Maximum),
                    interval_ms: value(StatFacet::Interval),
                });
            }
        }
        out
    }
}

/// Aggregates of one quantity of one object
#[derive(Debug, Clone, Serialize)]
pub struct QuantityReport {
    pub key: String,
    pub object_type: ObjectType,
    pub quantity: &'static str,
    pub unit: &'static str,
    pub instant: f64,
    pub average: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub interval_ms: Option<f64>,
}

/// Translate a configured object's attribute table into engine attributes
fn resolve_attributes(
    dispatcher: &Dispatcher,
    object: &ObjectConfig,
    keys: &BTreeMap<String, ObjectId>,
) -> Result<Vec<Attribute>, ProvisionError> {
    let schema = dispatcher.schema();
    object
        .attrs
        .iter()
        .map(|(name, value)| {
            let standard = schema
                .schema(object.object_type)
                .and_then(|s| s.attribute_by_name(name));
            if let Some(desc) = standard {
                return Ok(Attribute::new(desc.id, to_attr_value(desc, value, keys)?));
            }
            match schema.custom().attribute_by_name(object.object_type, name) {
                Some(custom) => Ok(Attribute::new(custom.id, opaque_value(name, value)?)),
                None => Err(ProvisionError::UnknownAttribute {
                    object_type: object.object_type,
                    name: name.clone(),
                }),
            }
        })
        .collect()
}

fn to_attr_value(
    desc: &AttributeDescriptor,
    value: &Value,
    keys: &BTreeMap<String, ObjectId>,
) -> Result<AttrValue, ProvisionError> {
    let wrong = |expected| ProvisionError::WrongValue {
        name: desc.name.to_string(),
        expected,
        found: value.type_str(),
    };
    match (desc.ty, value) {
        (AttrType::Bool, Value::Boolean(b)) => Ok(AttrValue::Bool(*b)),
        (AttrType::Uint { .. }, Value::Integer(i)) => u64::try_from(*i)
            .map(AttrValue::Uint)
            .map_err(|_| wrong("unsigned integer")),
        (AttrType::Int { .. }, Value::Integer(i)) => Ok(AttrValue::Int(*i)),
        // Physical values may be written in their natural unit
        (AttrType::Int { .. }, Value::Float(f)) => desc
            .precision
            .map(|p| AttrValue::Int(f64_to_fixed(*f, p)))
            .ok_or_else(|| wrong("integer")),
        (AttrType::Enum(def), Value::String(s)) => {
            def.value_of(s)
                .map(AttrValue::Enum)
                .ok_or_else(|| ProvisionError::NotInEnum {
                    name: desc.name.to_string(),
                    value: s.clone(),
                    enumeration: def.name,
                })
        }
        (AttrType::Enum(_), Value::Integer(i)) => i32::try_from(*i)
            .map(AttrValue::Enum)
            .map_err(|_| wrong("enumeration value")),
        (AttrType::Text { .. }, Value::String(s)) => Ok(AttrValue::Text(s.clone())),
        (AttrType::ObjectRef(_), Value::String(key)) => keys
            .get(key)
            .map(|id| AttrValue::ObjectRef(*id))
            .ok_or_else(|| ProvisionError::UnknownKey {
                name: desc.name.to_string(),
                key: key.clone(),
            }),
        (AttrType::Opaque, v) => opaque_value(desc.name, v),
        (ty, _) => Err(wrong(expected_kind(ty))),
    }
}

fn expected_kind(ty: AttrType) -> &'static str {
    match ty {
        AttrType::Bool => "boolean",
        AttrType::Uint { .. } => "unsigned integer",
        AttrType::Int { .. } => "integer",
        AttrType::Enum(_) => "enumeration name",
        AttrType::Text { .. } => "string",
        AttrType::ObjectRef(_) => "object key",
        AttrType::Opaque => "scalar or byte array",
    }
}

/// Custom attributes carry whatever scalar they were given; arrays of
/// integers become raw bytes.
fn opaque_value(name: &str, value: &Value) -> Result<AttrValue, ProvisionError> {
    let wrong = || ProvisionError::WrongValue {
        name: name.to_string(),
        expected: "scalar or byte array",
        found: value.type_str(),
    };
    match value {
        Value::Boolean(b) => Ok(AttrValue::Bool(*b)),
        Value::Integer(i) => Ok(AttrValue::Int(*i)),
        Value::String(s) => Ok(AttrValue::Text(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_integer()
                    .and_then(|i| u8::try_from(i).ok())
                    .ok_or_else(wrong)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(AttrValue::Opaque),
        _ => Err(wrong()),
    }
}

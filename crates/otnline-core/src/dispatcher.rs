//! CRUD dispatcher and statistics front end
//!
//! Every public operation returns `Result<_, OtnError>`. Structural failures
//! (unknown object, unknown switch, capacity) fail the whole call; batch reads
//! report per-id outcomes through [`ElementResult`].

use std::collections::BTreeSet;
use std::sync::{Arc, MutexGuard};

use tracing::{debug, info, trace};

use crate::attr::{AttrValue, Attribute};
use crate::custom::CustomRangeError;
use crate::error::{ElementResult, OtnError};
use crate::ids::{is_custom, AttrId, CounterId, ObjectId, ObjectType, QuantityId, SwitchId};
use crate::schema::{NoObjects, ObjectResolver, SchemaRegistry};
use crate::stats::{
    Clock, StatCounterDescriptor, StatFacet, StatRead, StatSample, StatsEngine, StatsMode,
    TelemetrySample,
};
use crate::store::{ObjectEntry, ObjectStore, Relink, StatsSlot, StoreLimits};
use crate::switch::SwitchDirectory;

/// Outcome of reading one attribute inside a batch
pub type AttrRead = ElementResult<AttrValue>;

/// Outcome of clearing one counter inside a batch
pub type StatClear = ElementResult<()>;

#[derive(Debug, Clone, Copy)]
enum Writer {
    /// Caller write, restricted to create-and-set attributes
    Caller,
    /// Backend update of a read-only attribute
    Backend,
}

/// Front end for object lifecycle, attribute access and statistics
pub struct Dispatcher {
    schema: SchemaRegistry,
    store: ObjectStore,
    stats: StatsEngine,
    switches: Arc<dyn SwitchDirectory>,
}

impl Dispatcher {
    pub fn new(
        schema: SchemaRegistry,
        limits: StoreLimits,
        switches: Arc<dyn SwitchDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schema,
            store: ObjectStore::new(limits),
            stats: StatsEngine::new(clock),
            switches,
        }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn declare_custom_attribute(
        &self,
        object_type: ObjectType,
        id: AttrId,
        name: impl Into<String>,
        writable: bool,
    ) -> Result<(), CustomRangeError> {
        self.schema
            .custom()
            .declare_attribute(object_type, id, name, writable)
    }

    pub fn declare_custom_counter(
        &self,
        object_type: ObjectType,
        id: CounterId,
        quantity: QuantityId,
        facet: StatFacet,
        precision: u8,
    ) -> Result<(), CustomRangeError> {
        self.schema
            .custom()
            .declare_counter(object_type, id, quantity, facet, precision)
    }

    /// Live objects of one type, ascending
    pub fn objects(&self, object_type: ObjectType) -> Vec<ObjectId> {
        self.store.ids_of(object_type)
    }

    pub fn switch_of(&self, id: ObjectId) -> Result<SwitchId, OtnError> {
        Ok(self.entry(id)?.switch())
    }

    fn entry(&self, id: ObjectId) -> Result<Arc<ObjectEntry>, OtnError> {
        self.store.get(id).ok_or(OtnError::ObjectNotFound(id))
    }

    /// Create an object and return its id
    pub fn create(
        &self,
        object_type: ObjectType,
        switch: SwitchId,
        attrs: &[Attribute],
    ) -> Result<ObjectId, OtnError> {
        if !self.switches.contains(switch) {
            debug!(object_type = %object_type, switch = %switch, "Create rejected: unknown switch");
            return Err(OtnError::InvalidSwitch(switch));
        }
        let result = self.store.insert_with(object_type, switch, |objects| {
            let resolved = self
                .schema
                .validate_create_list(object_type, attrs, objects)?;
            let refs = self.schema.references_in(object_type, &resolved);
            Ok((resolved, refs))
        });
        match &result {
            Ok(id) => info!(
                object = %id,
                object_type = %object_type,
                switch = %switch,
                "Created object"
            ),
            Err(e) => debug!(object_type = %object_type, error = %e, "Create rejected"),
        }
        result
    }

    /// Remove an object and discard its statistics
    pub fn remove(&self, id: ObjectId) -> Result<(), OtnError> {
        let result = self
            .store
            .remove_with(id, |object_type, attrs| self.schema.references_in(object_type, attrs));
        match &result {
            Ok(entry) => info!(object = %id, object_type = %entry.object_type(), "Removed object"),
            Err(e) => debug!(object = %id, error = %e, "Remove rejected"),
        }
        result.map(|_| ())
    }

    /// Change one create-and-set attribute
    pub fn set_attribute(&self, id: ObjectId, attr: &Attribute) -> Result<(), OtnError> {
        self.write_attribute(id, attr, Writer::Caller)
    }

    /// Update a read-only attribute on behalf of the backend
    pub fn publish_attribute(&self, id: ObjectId, attr: &Attribute) -> Result<(), OtnError> {
        self.write_attribute(id, attr, Writer::Backend)
    }

    fn write_attribute(
        &self,
        id: ObjectId,
        attr: &Attribute,
        writer: Writer,
    ) -> Result<(), OtnError> {
        let result = self.try_write(id, attr, writer);
        match &result {
            Ok(()) => debug!(object = %id, attr = attr.id, ?writer, "Attribute written"),
            Err(e) => debug!(object = %id, attr = attr.id, error = %e, "Attribute write rejected"),
        }
        result
    }

    fn try_write(&self, id: ObjectId, attr: &Attribute, writer: Writer) -> Result<(), OtnError> {
        let entry = self.entry(id)?;
        let object_type = entry.object_type();
        let validate = |objects: &dyn ObjectResolver| -> Result<(), OtnError> {
            match writer {
                Writer::Caller => self.schema.validate_set(object_type, attr, objects)?,
                Writer::Backend => self.schema.validate_publish(object_type, attr, objects)?,
            };
            Ok(())
        };

        if self.schema.lookup(object_type, attr.id)?.is_relational() {
            // Reference changes run under the store write lock with the reverse index
            return self.store.update_linked(id, |objects, state| {
                validate(objects)?;
                let old = state
                    .attrs
                    .insert(attr.id, attr.value.clone())
                    .and_then(|v| v.as_object_ref());
                Ok(Relink {
                    old,
                    new: attr.value.as_object_ref(),
                })
            });
        }

        let mut state = entry.lock_state();
        if state.is_removed() {
            return Err(OtnError::ObjectNotFound(id));
        }
        validate(&NoObjects)?;
        state.attrs.insert(attr.id, attr.value.clone());
        Ok(())
    }

    /// Read a batch of attributes. Each id gets its own outcome.
    pub fn get_attribute(&self, id: ObjectId, ids: &[AttrId]) -> Result<Vec<AttrRead>, OtnError> {
        let entry = self.entry(id)?;
        let object_type = entry.object_type();
        let state = entry.lock_state();
        if state.is_removed() {
            return Err(OtnError::ObjectNotFound(id));
        }
        let mut stats: Option<MutexGuard<'_, StatsSlot>> = None;

        let reads = ids
            .iter()
            .map(|&attr_id| {
                let result = self.schema.lookup(object_type, attr_id).and_then(|desc| {
                    if let Some(quantity) = desc.live {
                        let slot = stats.get_or_insert_with(|| entry.lock_stats());
                        if let Some(raw) = slot.sample.as_ref().and_then(|s| s.instant(quantity)) {
                            return Ok(AttrValue::Int(raw));
                        }
                    }
                    if let Some(value) = state.attrs.get(&attr_id) {
                        return Ok(value.clone());
                    }
                    if is_custom(attr_id)
                        && self.schema.custom().attribute(object_type, attr_id).is_none()
                    {
                        return Err(OtnError::Unsupported(attr_id));
                    }
                    Err(OtnError::NotFound(attr_id))
                });
                AttrRead { id: attr_id, result }
            })
            .collect();
        Ok(reads)
    }

    /// Feed one telemetry sample into the object's statistics
    pub fn ingest(&self, sample: &TelemetrySample) -> Result<(), OtnError> {
        let entry = self.entry(sample.object_id)?;
        let object_type = entry.object_type();
        if !self.schema.measures(object_type, sample.quantity) {
            return Err(OtnError::Unsupported(sample.quantity));
        }
        let mut slot = entry.lock_stats();
        if slot.is_removed() {
            return Err(OtnError::ObjectNotFound(sample.object_id));
        }
        let stats = slot.sample.get_or_insert_with(StatSample::default);
        self.stats
            .apply(stats, sample.quantity, sample.value, sample.timestamp);
        trace!(
            object = %sample.object_id,
            quantity = sample.quantity,
            value = sample.value,
            "Applied telemetry sample"
        );
        Ok(())
    }

    pub fn get_stats(
        &self,
        id: ObjectId,
        counters: &[CounterId],
    ) -> Result<Vec<StatRead>, OtnError> {
        self.get_stats_ext(id, counters, StatsMode::Read)
    }

    /// Read counters, optionally resetting the quantities behind them under
    /// the same lock as the read.
    pub fn get_stats_ext(
        &self,
        id: ObjectId,
        counters: &[CounterId],
        mode: StatsMode,
    ) -> Result<Vec<StatRead>, OtnError> {
        let entry = self.entry(id)?;
        let descriptors = self.counter_descriptors(entry.object_type(), counters);
        let mut slot = entry.lock_stats();
        if slot.is_removed() {
            return Err(OtnError::ObjectNotFound(id));
        }

        let reads = descriptors
            .iter()
            .map(|(counter_id, desc)| StatRead {
                id: *counter_id,
                result: desc
                    .clone()
                    .and_then(|d| self.stats.read(slot.sample.as_ref(), &d)),
            })
            .collect();

        if mode == StatsMode::ReadAndClear {
            let stats = slot.sample.get_or_insert_with(StatSample::default);
            for quantity in cleared_quantities(&descriptors) {
                self.stats.clear(stats, quantity);
            }
            debug!(object = %id, counters = counters.len(), "Read and cleared statistics");
        }
        Ok(reads)
    }

    /// Reset the aggregation state of every quantity behind the requested counters
    pub fn clear_stats(
        &self,
        id: ObjectId,
        counters: &[CounterId],
    ) -> Result<Vec<StatClear>, OtnError> {
        let entry = self.entry(id)?;
        let descriptors = self.counter_descriptors(entry.object_type(), counters);
        let mut slot = entry.lock_stats();
        if slot.is_removed() {
            return Err(OtnError::ObjectNotFound(id));
        }
        let stats = slot.sample.get_or_insert_with(StatSample::default);
        for quantity in cleared_quantities(&descriptors) {
            self.stats.clear(stats, quantity);
        }
        let cleared = descriptors
            .into_iter()
            .map(|(counter_id, desc)| StatClear {
                id: counter_id,
                result: desc.map(|_| ()),
            })
            .collect();
        debug!(object = %id, counters = counters.len(), "Cleared statistics");
        Ok(cleared)
    }

    fn counter_descriptors(
        &self,
        object_type: ObjectType,
        counters: &[CounterId],
    ) -> Vec<(CounterId, Result<StatCounterDescriptor, OtnError>)> {
        counters
            .iter()
            .map(|&id| (id, self.schema.lookup_counter(object_type, id)))
            .collect()
    }
}

/// Distinct quantities behind the valid counters of a request
fn cleared_quantities(
    descriptors: &[(CounterId, Result<StatCounterDescriptor, OtnError>)],
) -> BTreeSet<QuantityId> {
    descriptors
        .iter()
        .filter_map(|(_, d)| d.as_ref().ok())
        .map(|d| d.quantity)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{AttrType, AttributeDescriptor, Mutability};
    use crate::catalog::{self, device, ocm, osc, wss};
    use crate::error::{Status, ViolationKind};
    use crate::stats::{ManualClock, StatValue};
    use crate::switch::StaticSwitches;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const SWITCH: SwitchId = SwitchId(0x21);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn dispatcher_with(limits: StoreLimits) -> (Arc<ManualClock>, Dispatcher) {
        let clock = Arc::new(ManualClock::new(t0()));
        let dispatcher = Dispatcher::new(
            catalog::standard_registry().unwrap(),
            limits,
            Arc::new(StaticSwitches::new([SWITCH])),
            clock.clone(),
        );
        (clock, dispatcher)
    }

    fn dispatcher() -> (Arc<ManualClock>, Dispatcher) {
        dispatcher_with(StoreLimits::default())
    }

    fn text(s: &str) -> AttrValue {
        AttrValue::Text(s.to_string())
    }

    fn ocm_channel(d: &Dispatcher) -> ObjectId {
        d.create(
            ObjectType::ChannelMonitorChannel,
            SWITCH,
            &[
                Attribute::new(ocm::channel::NAME, text("ch-1")),
                Attribute::new(ocm::channel::LOWER_FREQUENCY, AttrValue::Uint(191_000_000)),
                Attribute::new(ocm::channel::UPPER_FREQUENCY, AttrValue::Uint(191_100_000)),
            ],
        )
        .unwrap()
    }

    fn media_channel(d: &Dispatcher, index: u64) -> ObjectId {
        use wss::media_channel as mc;
        d.create(
            ObjectType::SwitchMediaChannel,
            SWITCH,
            &[
                Attribute::new(mc::INDEX, AttrValue::Uint(index)),
                Attribute::new(mc::LOWER_FREQUENCY, AttrValue::Uint(191_300_000)),
                Attribute::new(mc::UPPER_FREQUENCY, AttrValue::Uint(191_350_000)),
            ],
        )
        .unwrap()
    }

    fn power_slot(d: &Dispatcher, parent: ObjectId) -> Result<ObjectId, OtnError> {
        use wss::power_slot as ps;
        d.create(
            ObjectType::SwitchSpectrumPowerSlot,
            SWITCH,
            &[
                Attribute::new(ps::MEDIA_CHANNEL, AttrValue::ObjectRef(parent)),
                Attribute::new(ps::LOWER_FREQUENCY, AttrValue::Uint(191_300_000)),
                Attribute::new(ps::UPPER_FREQUENCY, AttrValue::Uint(191_312_500)),
            ],
        )
    }

    /// A valid value for every mandatory attribute of a type
    fn mandatory_list(d: &Dispatcher, ty: ObjectType) -> Vec<Attribute> {
        let parent = (ty == ObjectType::SwitchSpectrumPowerSlot).then(|| media_channel(d, 99));
        d.schema()
            .schema(ty)
            .unwrap()
            .attributes()
            .iter()
            .filter(|desc| desc.mutability == Mutability::MandatoryOnCreate)
            .map(|desc| {
                let value = match desc.ty {
                    AttrType::Text { .. } => text("x"),
                    AttrType::Uint { .. } => AttrValue::Uint(desc.id as u64 + 1),
                    AttrType::ObjectRef(_) => AttrValue::ObjectRef(parent.unwrap()),
                    other => panic!("no sample value for {other:?}"),
                };
                Attribute::new(desc.id, value)
            })
            .collect()
    }

    fn sample(
        id: ObjectId,
        quantity: QuantityId,
        value: i64,
        at: DateTime<Utc>,
    ) -> TelemetrySample {
        TelemetrySample {
            object_id: id,
            quantity,
            value,
            timestamp: at,
        }
    }

    fn raw(read: &StatRead) -> Option<i64> {
        read.value().and_then(StatValue::raw)
    }

    #[test]
    fn test_create_resolves_mandatory_and_defaults() {
        let (_clock, d) = dispatcher();
        for ty in ObjectType::ALL {
            let supplied = mandatory_list(&d, ty);
            let id = d.create(ty, SWITCH, &supplied).unwrap();
            assert_eq!(id.object_type(), Some(ty));

            let schema = d.schema().schema(ty).unwrap();
            let ids: Vec<_> = schema.attributes().iter().map(|desc| desc.id).collect();
            let reads = d.get_attribute(id, &ids).unwrap();
            for (desc, read) in schema.attributes().iter().zip(&reads) {
                if let Some(attr) = supplied.iter().find(|a| a.id == desc.id) {
                    assert_eq!(read.value(), Some(&attr.value), "{ty}.{}", desc.name);
                } else if let Some(default) = &desc.default {
                    assert_eq!(read.value(), Some(default), "{ty}.{}", desc.name);
                } else {
                    assert_eq!(read.status(), Status::NotFound, "{ty}.{}", desc.name);
                }
            }

            // Past the standard block, outside the custom window
            let past_end = d.get_attribute(id, &[schema.attr_end()]).unwrap();
            assert_eq!(past_end[0].status(), Status::InvalidAttribute);
        }
    }

    #[test]
    fn test_create_missing_each_mandatory() {
        let (_clock, d) = dispatcher();
        for ty in ObjectType::ALL {
            let full = mandatory_list(&d, ty);
            for skip in &full {
                let partial: Vec<_> = full.iter().filter(|a| a.id != skip.id).cloned().collect();
                assert_eq!(
                    d.create(ty, SWITCH, &partial),
                    Err(OtnError::MissingMandatoryAttribute(skip.id)),
                    "{ty}"
                );
            }
        }
    }

    #[test]
    fn test_create_rejections() {
        let (_clock, d) = dispatcher();
        let mut attrs = mandatory_list(&d, ObjectType::ChannelMonitor);
        assert_eq!(
            d.create(ObjectType::ChannelMonitor, SwitchId(7), &attrs),
            Err(OtnError::InvalidSwitch(SwitchId(7)))
        );

        attrs.push(Attribute::new(9, AttrValue::Bool(true)));
        assert_eq!(
            d.create(ObjectType::ChannelMonitor, SWITCH, &attrs),
            Err(OtnError::InvalidAttribute {
                id: 9,
                kind: ViolationKind::Unknown
            })
        );

        let dup = [
            Attribute::new(device::ADMIN_STATE, AttrValue::Bool(true)),
            Attribute::new(device::ADMIN_STATE, AttrValue::Bool(false)),
        ];
        assert_eq!(
            d.create(ObjectType::Device, SWITCH, &dup).unwrap_err().status(),
            Status::InvalidAttribute
        );

        let enum_out = [
            Attribute::new(wss::media_channel::INDEX, AttrValue::Uint(1)),
            Attribute::new(wss::media_channel::LOWER_FREQUENCY, AttrValue::Uint(1)),
            Attribute::new(wss::media_channel::UPPER_FREQUENCY, AttrValue::Uint(2)),
            Attribute::new(wss::media_channel::ADMIN_STATE, AttrValue::Enum(7)),
        ];
        assert_eq!(
            d.create(ObjectType::SwitchMediaChannel, SWITCH, &enum_out),
            Err(OtnError::InvalidAttribute {
                id: wss::media_channel::ADMIN_STATE,
                kind: ViolationKind::NotInEnum
            })
        );
        assert!(d.store().is_empty());
    }

    #[test]
    fn test_capacity_per_type() {
        let (_clock, d) = dispatcher_with(StoreLimits::new(8).with_limit(ObjectType::Device, 1));
        let first = d.create(ObjectType::Device, SWITCH, &[]).unwrap();
        assert_eq!(
            d.create(ObjectType::Device, SWITCH, &[]),
            Err(OtnError::ResourceExhausted(ObjectType::Device))
        );
        d.remove(first).unwrap();
        let second = d.create(ObjectType::Device, SWITCH, &[]).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_create_only_fixed_after_create() {
        let (_clock, d) = dispatcher();
        let id = ocm_channel(&d);
        assert_eq!(
            d.set_attribute(id, &Attribute::new(ocm::channel::NAME, text("renamed"))),
            Err(OtnError::AttributeNotSettable(ocm::channel::NAME))
        );
        assert_eq!(
            d.set_attribute(id, &Attribute::new(ocm::channel::POWER, AttrValue::Int(-100))),
            Err(OtnError::AttributeNotSettable(ocm::channel::POWER))
        );
    }

    #[test]
    fn test_create_only_class() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_type(
                ObjectType::ChannelMonitor,
                vec![
                    AttributeDescriptor::new(0, "name", AttrType::NAME, Mutability::CreateOnly),
                    AttributeDescriptor::new(1, "gain", AttrType::I32, Mutability::CreateAndSet),
                ],
            )
            .unwrap();
        let d = Dispatcher::new(
            registry,
            StoreLimits::default(),
            Arc::new(StaticSwitches::new([SWITCH])),
            Arc::new(ManualClock::new(t0())),
        );
        let id = d
            .create(ObjectType::ChannelMonitor, SWITCH, &[Attribute::new(0, text("a"))])
            .unwrap();
        assert_eq!(
            d.set_attribute(id, &Attribute::new(0, text("b"))),
            Err(OtnError::AttributeNotSettable(0))
        );
        d.set_attribute(id, &Attribute::new(1, AttrValue::Int(-12))).unwrap();
        assert_eq!(d.get_attribute(id, &[1]).unwrap()[0].value(), Some(&AttrValue::Int(-12)));
    }

    #[test]
    fn test_set_attribute() {
        let (_clock, d) = dispatcher();
        let id = d.create(ObjectType::Device, SWITCH, &[]).unwrap();
        d.set_attribute(id, &Attribute::new(device::ALARM_ACT_TIME, AttrValue::Uint(500)))
            .unwrap();
        assert_eq!(
            d.set_attribute(id, &Attribute::new(device::ALARM_ACT_TIME, AttrValue::Int(5))),
            Err(OtnError::InvalidAttribute {
                id: device::ALARM_ACT_TIME,
                kind: ViolationKind::TypeMismatch
            })
        );
        let reads = d.get_attribute(id, &[device::ALARM_ACT_TIME]).unwrap();
        assert_eq!(reads[0].value(), Some(&AttrValue::Uint(500)));

        d.remove(id).unwrap();
        assert_eq!(
            d.set_attribute(id, &Attribute::new(device::ADMIN_STATE, AttrValue::Bool(false))),
            Err(OtnError::ObjectNotFound(id))
        );
    }

    #[test]
    fn test_get_attribute_partial_success() {
        let (_clock, d) = dispatcher();
        let id = d.create(ObjectType::Device, SWITCH, &[]).unwrap();
        let reads = d
            .get_attribute(id, &[device::ADMIN_STATE, 40, 0x1000_0009, device::ALARM_DEACT_TIME])
            .unwrap();
        let statuses: Vec<_> = reads.iter().map(ElementResult::status).collect();
        assert_eq!(
            statuses,
            [
                Status::Success,
                Status::InvalidAttribute,
                Status::Unsupported,
                Status::Success
            ]
        );
        assert_eq!(reads[3].value(), Some(&AttrValue::Uint(10_000)));

        let missing = ObjectId::new(ObjectType::Device, 4242).unwrap();
        assert_eq!(
            d.get_attribute(missing, &[device::ADMIN_STATE]),
            Err(OtnError::ObjectNotFound(missing))
        );
    }

    #[test]
    fn test_custom_attribute_round_trip() {
        let (_clock, d) = dispatcher();
        d.declare_custom_attribute(ObjectType::Device, 0x1000_0005, "fan_curve", true)
            .unwrap();
        let id = d.create(ObjectType::Device, SWITCH, &[]).unwrap();

        // Declared but never written
        assert_eq!(
            d.get_attribute(id, &[0x1000_0005]).unwrap()[0].status(),
            Status::NotFound
        );

        let blob = AttrValue::Opaque(vec![0xde, 0xad, 0x00, 0x01]);
        d.set_attribute(id, &Attribute::new(0x1000_0005, blob.clone()))
            .unwrap();
        let reads = d.get_attribute(id, &[0x1000_0005, 0x1000_0006]).unwrap();
        assert_eq!(reads[0].value(), Some(&blob));
        assert_eq!(reads[1].result, Err(OtnError::Unsupported(0x1000_0006)));

        assert_eq!(
            d.set_attribute(id, &Attribute::new(0x1000_0006, AttrValue::Bool(true))),
            Err(OtnError::Unsupported(0x1000_0006))
        );
    }

    #[test]
    fn test_custom_attribute_flags() {
        let (_clock, d) = dispatcher();
        d.declare_custom_attribute(ObjectType::ChannelMonitor, 0x1000_0001, "vendor_serial", false)
            .unwrap();
        let mut attrs = mandatory_list(&d, ObjectType::ChannelMonitor);
        // Undeclared custom ids are accepted on create and stored as given
        attrs.push(Attribute::new(0x1000_0002, AttrValue::Uint(3)));
        let id = d.create(ObjectType::ChannelMonitor, SWITCH, &attrs).unwrap();
        assert_eq!(
            d.get_attribute(id, &[0x1000_0002]).unwrap()[0].value(),
            Some(&AttrValue::Uint(3))
        );

        let serial = Attribute::new(0x1000_0001, text("SN-0042"));
        assert_eq!(
            d.set_attribute(id, &serial),
            Err(OtnError::AttributeNotSettable(0x1000_0001))
        );
        d.publish_attribute(id, &serial).unwrap();
        assert_eq!(
            d.get_attribute(id, &[0x1000_0001]).unwrap()[0].value(),
            Some(&serial.value)
        );
    }

    #[test]
    fn test_publish_read_only() {
        use wss::media_channel as mc;
        let (_clock, d) = dispatcher();
        let id = media_channel(&d, 1);
        d.publish_attribute(id, &Attribute::new(mc::OPER_STATUS, AttrValue::Enum(1)))
            .unwrap();
        assert_eq!(
            d.get_attribute(id, &[mc::OPER_STATUS]).unwrap()[0].value(),
            Some(&AttrValue::Enum(1))
        );
        assert_eq!(
            d.publish_attribute(id, &Attribute::new(mc::ASE_STATUS, AttrValue::Enum(5))),
            Err(OtnError::InvalidAttribute {
                id: mc::ASE_STATUS,
                kind: ViolationKind::NotInEnum
            })
        );
        assert_eq!(
            d.publish_attribute(id, &Attribute::new(mc::ADMIN_STATE, AttrValue::Enum(1))),
            Err(OtnError::AttributeNotSettable(mc::ADMIN_STATE))
        );
    }

    #[test]
    fn test_remove_blocked_by_reference() {
        let (_clock, d) = dispatcher();
        let parent = media_channel(&d, 1);
        let child = power_slot(&d, parent).unwrap();

        assert_eq!(
            d.remove(parent),
            Err(OtnError::ObjectInUse {
                id: parent,
                referrers: 1
            })
        );
        d.remove(child).unwrap();
        d.remove(parent).unwrap();
        assert_eq!(d.remove(parent), Err(OtnError::ObjectNotFound(parent)));
    }

    #[test]
    fn test_relink_rejected_keeps_reverse_index() {
        let (_clock, d) = dispatcher();
        let parent = media_channel(&d, 1);
        let other = media_channel(&d, 2);
        let child = power_slot(&d, parent).unwrap();

        let relink = Attribute::new(wss::power_slot::MEDIA_CHANNEL, AttrValue::ObjectRef(other));
        assert_eq!(
            d.set_attribute(child, &relink),
            Err(OtnError::AttributeNotSettable(wss::power_slot::MEDIA_CHANNEL))
        );
        assert_eq!(d.store().read().referrers(parent), 1);
        assert_eq!(d.store().read().referrers(other), 0);

        let current = d.get_attribute(child, &[wss::power_slot::MEDIA_CHANNEL]).unwrap();
        assert_eq!(current[0].value(), Some(&AttrValue::ObjectRef(parent)));
        d.remove(other).unwrap();
    }

    #[test]
    fn test_reference_validation() {
        let (_clock, d) = dispatcher();
        let device = d.create(ObjectType::Device, SWITCH, &[]).unwrap();
        assert_eq!(
            power_slot(&d, device),
            Err(OtnError::InvalidAttribute {
                id: wss::power_slot::MEDIA_CHANNEL,
                kind: ViolationKind::WrongReferenceType
            })
        );
        let gone = media_channel(&d, 2);
        d.remove(gone).unwrap();
        assert_eq!(
            power_slot(&d, gone),
            Err(OtnError::InvalidAttribute {
                id: wss::power_slot::MEDIA_CHANNEL,
                kind: ViolationKind::DanglingReference
            })
        );
    }

    #[test]
    fn test_ocm_power_scenario() {
        let (clock, d) = dispatcher();
        let id = ocm_channel(&d);
        let power = ocm::channel::POWER_QUANTITY;
        let counters: Vec<CounterId> = (0..7).collect();

        d.ingest(&sample(id, power, -500, t0() + Duration::seconds(1)))
            .unwrap();
        d.ingest(&sample(id, power, -300, t0() + Duration::seconds(2)))
            .unwrap();
        clock.advance(Duration::seconds(30));

        let reads = d.get_stats(id, &counters).unwrap();
        assert_eq!(raw(&reads[0]), Some(-300));
        assert_eq!(raw(&reads[1]), Some(-400));
        assert_eq!(raw(&reads[2]), Some(-500));
        assert_eq!(raw(&reads[3]), Some(-300));
        assert_eq!(reads[4].value(), Some(&StatValue::Millis(30_000)));
        assert_eq!(reads[0].value().and_then(StatValue::as_f64), Some(-3.0));

        let cleared = d.clear_stats(id, &counters).unwrap();
        assert!(cleared.iter().all(|c| c.status().is_success()));

        let reads = d.get_stats(id, &counters).unwrap();
        assert_eq!(raw(&reads[0]), Some(-300));
        assert_eq!(raw(&reads[2]), Some(-300));
        assert_eq!(raw(&reads[3]), Some(-300));
        assert_eq!(reads[4].value(), Some(&StatValue::Millis(0)));

        // Live attribute mirrors the instant value
        let attr = d.get_attribute(id, &[ocm::channel::POWER]).unwrap();
        assert_eq!(attr[0].value(), Some(&AttrValue::Int(-300)));
    }

    #[test]
    fn test_read_and_clear() {
        let (clock, d) = dispatcher();
        let sc = d
            .create(
                ObjectType::SupervisoryChannel,
                SWITCH,
                &[Attribute::new(osc::NAME, text("osc-1"))],
            )
            .unwrap();
        let q = osc::OUTPUT_POWER_QUANTITY;
        let base = q * 7;
        d.ingest(&sample(sc, q, 120, t0())).unwrap();
        d.ingest(&sample(sc, q, 80, t0() + Duration::seconds(1)))
            .unwrap();
        clock.advance(Duration::seconds(5));

        // Instant and max only; every aggregate of the quantity resets
        let before = d
            .get_stats_ext(sc, &[base, base + 3], StatsMode::ReadAndClear)
            .unwrap();
        assert_eq!(raw(&before[0]), Some(80));
        assert_eq!(raw(&before[1]), Some(120));

        let after = d.get_stats(sc, &(base..base + 7).collect::<Vec<_>>()).unwrap();
        assert_eq!(raw(&after[0]), Some(80));
        assert_eq!(raw(&after[1]), Some(80));
        assert_eq!(raw(&after[2]), Some(80));
        assert_eq!(raw(&after[3]), Some(80));
        assert_eq!(after[4].value(), Some(&StatValue::Millis(0)));
        let cleared_at = t0() + Duration::seconds(5);
        assert_eq!(after[5].value(), Some(&StatValue::Timestamp(cleared_at)));
        assert_eq!(after[6].value(), Some(&StatValue::Timestamp(cleared_at)));

        // Asking for the instant alone still restarts the interval
        clock.advance(Duration::seconds(3));
        d.get_stats_ext(sc, &[base], StatsMode::ReadAndClear).unwrap();
        let interval = d.get_stats(sc, &[base + 4]).unwrap();
        assert_eq!(interval[0].value(), Some(&StatValue::Millis(0)));

        // Other quantities of the same object are untouched
        d.ingest(&sample(sc, osc::INPUT_POWER_QUANTITY, -20, t0())).unwrap();
        let other = d.get_stats(sc, &[2]).unwrap();
        assert_eq!(raw(&other[0]), Some(-20));
    }

    #[test]
    fn test_clear_before_first_sample() {
        let (clock, d) = dispatcher();
        let id = ocm_channel(&d);
        let q = ocm::channel::POWER_QUANTITY;
        clock.advance(Duration::seconds(60));
        let cleared = d.clear_stats(id, &(0..7).collect::<Vec<_>>()).unwrap();
        assert!(cleared.iter().all(|c| c.status().is_success()));

        clock.advance(Duration::seconds(1));
        d.ingest(&sample(id, q, -500, clock.now())).unwrap();
        let reads = d.get_stats(id, &[0, 4]).unwrap();
        assert_eq!(raw(&reads[0]), Some(-500));
        assert_eq!(reads[1].value(), Some(&StatValue::Millis(1000)));
    }

    #[test]
    fn test_stats_partial_success() {
        let (_clock, d) = dispatcher();
        let id = ocm_channel(&d);
        let reads = d.get_stats(id, &[0, 7, 0x1000_0000]).unwrap();
        assert_eq!(reads[0].result, Err(OtnError::NotFound(0)));
        assert_eq!(reads[1].result, Err(OtnError::Unsupported(7)));
        assert_eq!(reads[2].result, Err(OtnError::Unsupported(0x1000_0000)));

        let device = d.create(ObjectType::Device, SWITCH, &[]).unwrap();
        let reads = d.get_stats(device, &[0, 1]).unwrap();
        assert!(reads.iter().all(|r| r.status() == Status::Unsupported));
        assert_eq!(d.ingest(&sample(device, 0, 1, t0())), Err(OtnError::Unsupported(0)));
    }

    #[test]
    fn test_custom_counter() {
        let (_clock, d) = dispatcher();
        let id = ocm_channel(&d);
        d.declare_custom_counter(
            ObjectType::ChannelMonitorChannel,
            0x1000_0010,
            5,
            StatFacet::Maximum,
            1,
        )
        .unwrap();
        d.ingest(&sample(id, 5, 17, t0())).unwrap();
        d.ingest(&sample(id, 5, 12, t0())).unwrap();
        let reads = d.get_stats(id, &[0x1000_0010]).unwrap();
        assert_eq!(
            reads[0].value(),
            Some(&StatValue::Fixed {
                raw: 17,
                precision: 1
            })
        );
    }

    #[test]
    fn test_remove_discards_stats() {
        let (_clock, d) = dispatcher();
        let id = ocm_channel(&d);
        d.ingest(&sample(id, 0, -100, t0())).unwrap();
        let entry = d.store().get(id).unwrap();
        d.remove(id).unwrap();
        assert!(entry.lock_stats().sample.is_none());
        assert_eq!(d.ingest(&sample(id, 0, -100, t0())), Err(OtnError::ObjectNotFound(id)));
        assert_eq!(d.get_stats(id, &[0]), Err(OtnError::ObjectNotFound(id)));
    }

    #[test]
    fn test_concurrent_ingest_and_remove() {
        let (_clock, d) = dispatcher();
        let d = Arc::new(d);
        let ids: Vec<_> = (0..16).map(|_| ocm_channel(&d)).collect();

        let feeder = {
            let d = d.clone();
            let ids = ids.clone();
            std::thread::spawn(move || {
                for round in 0..200 {
                    for id in &ids {
                        let _ = d.ingest(&sample(*id, 0, -round, t0()));
                    }
                }
            })
        };
        for id in &ids {
            d.remove(*id).unwrap();
        }
        feeder.join().unwrap();
        for id in &ids {
            assert!(d.store().get(*id).is_none());
        }
        assert!(d.store().is_empty());
    }

    #[test]
    fn test_switch_of() {
        let (_clock, d) = dispatcher();
        let id = d.create(ObjectType::Device, SWITCH, &[]).unwrap();
        assert_eq!(d.switch_of(id), Ok(SWITCH));
        assert_eq!(d.objects(ObjectType::Device), vec![id]);
        assert!(d.objects(ObjectType::ChannelMonitor).is_empty());
    }
}

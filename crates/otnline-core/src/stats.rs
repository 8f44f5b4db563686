//! Statistics aggregation for externally measured physical quantities
//!
//! Each physical quantity of an object is described by seven counters, one
//! per [`StatFacet`]. Telemetry samples update the instant value and the
//! rolling aggregates of the current interval; clearing a facet starts a new
//! interval for that facet seeded with the current instant value.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::attr::fixed_to_f64;
use crate::error::{ElementResult, OtnError};
use crate::ids::{CounterId, ObjectId, QuantityId};

/// Aspect of a physical quantity a counter reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatFacet {
    Instant,
    Average,
    Minimum,
    Maximum,
    /// Time elapsed since the interval started
    Interval,
    MinimumTime,
    MaximumTime,
}

impl StatFacet {
    pub const ALL: [StatFacet; 7] = [
        StatFacet::Instant,
        StatFacet::Average,
        StatFacet::Minimum,
        StatFacet::Maximum,
        StatFacet::Interval,
        StatFacet::MinimumTime,
        StatFacet::MaximumTime,
    ];

    /// Position of the facet within a quantity's block of counter ids
    pub fn offset(self) -> u32 {
        match self {
            StatFacet::Instant => 0,
            StatFacet::Average => 1,
            StatFacet::Minimum => 2,
            StatFacet::Maximum => 3,
            StatFacet::Interval => 4,
            StatFacet::MinimumTime => 5,
            StatFacet::MaximumTime => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatFacet::Instant => "instant",
            StatFacet::Average => "avg",
            StatFacet::Minimum => "min",
            StatFacet::Maximum => "max",
            StatFacet::Interval => "interval",
            StatFacet::MinimumTime => "min_time",
            StatFacet::MaximumTime => "max_time",
        }
    }
}

impl fmt::Display for StatFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema entry for one statistics counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatCounterDescriptor {
    pub id: CounterId,
    /// Name of the physical quantity
    pub name: &'static str,
    pub quantity: QuantityId,
    pub facet: StatFacet,
    pub precision: u8,
    pub unit: &'static str,
}

/// The seven counters describing one physical quantity.
///
/// Counter ids are `quantity * 7 + facet offset`.
pub fn quantity_counters(
    quantity: QuantityId,
    name: &'static str,
    precision: u8,
    unit: &'static str,
) -> Vec<StatCounterDescriptor> {
    StatFacet::ALL
        .iter()
        .map(|facet| StatCounterDescriptor {
            id: quantity * StatFacet::ALL.len() as u32 + facet.offset(),
            name,
            quantity,
            facet: *facet,
            precision,
            unit,
        })
        .collect()
}

/// Whether a statistics read also resets the requested aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsMode {
    Read,
    ReadAndClear,
}

/// Value of one counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatValue {
    /// Fixed-point physical value in units of `10^-precision`
    Fixed { raw: i64, precision: u8 },
    /// Interval length in milliseconds
    Millis(u64),
    Timestamp(DateTime<Utc>),
}

impl StatValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Fixed { raw, precision } => Some(fixed_to_f64(*raw, *precision)),
            StatValue::Millis(ms) => Some(*ms as f64),
            StatValue::Timestamp(_) => None,
        }
    }

    pub fn raw(&self) -> Option<i64> {
        match self {
            StatValue::Fixed { raw, .. } => Some(*raw),
            _ => None,
        }
    }
}

/// Outcome of reading one counter inside a batch
pub type StatRead = ElementResult<StatValue>;

/// One measurement delivered by the telemetry source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub object_id: ObjectId,
    pub quantity: QuantityId,
    /// Fixed-point value in the quantity's units
    pub value: i64,
    pub timestamp: DateTime<Utc>,
}

/// Source of "now" for interval bookkeeping
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Aggregation state of one physical quantity
#[derive(Debug, Clone)]
struct QuantityStats {
    instant: i64,
    sum: i128,
    count: u64,
    min: (i64, DateTime<Utc>),
    max: (i64, DateTime<Utc>),
    interval_start: DateTime<Utc>,
}

impl QuantityStats {
    fn first(value: i64, at: DateTime<Utc>, interval_start: DateTime<Utc>) -> Self {
        Self {
            instant: value,
            sum: i128::from(value),
            count: 1,
            min: (value, at),
            max: (value, at),
            interval_start,
        }
    }

    fn record(&mut self, value: i64, at: DateTime<Utc>) {
        self.instant = value;
        self.sum += i128::from(value);
        self.count += 1;
        if value < self.min.0 {
            self.min = (value, at);
        }
        if value > self.max.0 {
            self.max = (value, at);
        }
    }

    fn average(&self) -> i64 {
        if self.count == 0 {
            return self.instant;
        }
        (self.sum as f64 / self.count as f64).round() as i64
    }

    fn read(&self, facet: StatFacet, precision: u8, now: DateTime<Utc>) -> StatValue {
        let fixed = |raw| StatValue::Fixed { raw, precision };
        match facet {
            StatFacet::Instant => fixed(self.instant),
            StatFacet::Average => fixed(self.average()),
            StatFacet::Minimum => fixed(self.min.0),
            StatFacet::Maximum => fixed(self.max.0),
            StatFacet::Interval => {
                let elapsed = (now - self.interval_start).num_milliseconds().max(0);
                StatValue::Millis(elapsed as u64)
            }
            StatFacet::MinimumTime => StatValue::Timestamp(self.min.1),
            StatFacet::MaximumTime => StatValue::Timestamp(self.max.1),
        }
    }

    /// Restart the interval at `now`, reseeding every aggregate from the instant
    fn clear(&mut self, now: DateTime<Utc>) {
        self.sum = i128::from(self.instant);
        self.count = 1;
        self.min = (self.instant, now);
        self.max = (self.instant, now);
        self.interval_start = now;
    }
}

/// Statistics state of one object, created on its first telemetry sample
#[derive(Debug, Clone, Default)]
pub struct StatSample {
    quantities: HashMap<QuantityId, QuantityStats>,
    /// Clears of quantities that had no data yet; the first sample starts its interval here
    pending_clears: HashMap<QuantityId, DateTime<Utc>>,
}

impl StatSample {
    /// Current instant value of a quantity
    pub fn instant(&self, quantity: QuantityId) -> Option<i64> {
        self.quantities.get(&quantity).map(|q| q.instant)
    }
}

/// Applies samples and serves reads against [`StatSample`]s
pub struct StatsEngine {
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
}

impl StatsEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self { clock, started_at }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fold one sample into the object's statistics
    pub fn apply(
        &self,
        sample: &mut StatSample,
        quantity: QuantityId,
        value: i64,
        at: DateTime<Utc>,
    ) {
        match sample.quantities.get_mut(&quantity) {
            Some(stats) => stats.record(value, at),
            None => {
                let interval_start = sample
                    .pending_clears
                    .remove(&quantity)
                    .unwrap_or(self.started_at);
                sample
                    .quantities
                    .insert(quantity, QuantityStats::first(value, at, interval_start));
            }
        }
    }

    /// Read one counter; `NotFound` until the quantity has seen a sample
    pub fn read(
        &self,
        sample: Option<&StatSample>,
        counter: &StatCounterDescriptor,
    ) -> Result<StatValue, OtnError> {
        sample
            .and_then(|s| s.quantities.get(&counter.quantity))
            .map(|q| q.read(counter.facet, counter.precision, self.now()))
            .ok_or(OtnError::NotFound(counter.id))
    }

    /// Reset all aggregation state of one quantity. The instant value is left alone.
    pub fn clear(&self, sample: &mut StatSample, quantity: QuantityId) {
        let now = self.now();
        match sample.quantities.get_mut(&quantity) {
            Some(stats) => stats.clear(now),
            None => {
                sample.pending_clears.insert(quantity, now);
            }
        }
    }
}

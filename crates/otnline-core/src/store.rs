//! In-memory object store
//!
//! The store map is guarded by one `RwLock`; each object carries its own
//! configuration lock and a separate statistics lock. Lock order is always
//! store map, then object configuration, then object statistics.
//!
//! Relational attributes are mirrored in a reverse index (referenced object
//! to referrers) so that in-use checks on remove need no scan.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::attr::AttrMap;
use crate::error::OtnError;
use crate::ids::{ObjectId, ObjectType, SwitchId};
use crate::schema::ObjectResolver;
use crate::stats::StatSample;

/// Maximum live instances per object type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreLimits {
    pub default_max: usize,
    #[serde(default)]
    pub per_type: HashMap<ObjectType, usize>,
}

impl StoreLimits {
    pub fn new(default_max: usize) -> Self {
        Self {
            default_max,
            per_type: HashMap::new(),
        }
    }

    pub fn with_limit(mut self, object_type: ObjectType, max: usize) -> Self {
        self.per_type.insert(object_type, max);
        self
    }

    pub fn max_for(&self, object_type: ObjectType) -> usize {
        self.per_type
            .get(&object_type)
            .copied()
            .unwrap_or(self.default_max)
    }
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Configuration state of one object
#[derive(Debug, Default)]
pub struct InstanceState {
    removed: bool,
    pub attrs: AttrMap,
}

impl InstanceState {
    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// Statistics state of one object
#[derive(Debug, Default)]
pub struct StatsSlot {
    removed: bool,
    pub sample: Option<StatSample>,
}

impl StatsSlot {
    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// One stored object
#[derive(Debug)]
pub struct ObjectEntry {
    id: ObjectId,
    object_type: ObjectType,
    switch: SwitchId,
    state: Mutex<InstanceState>,
    stats: Mutex<StatsSlot>,
}

impl ObjectEntry {
    fn new(id: ObjectId, object_type: ObjectType, switch: SwitchId, attrs: AttrMap) -> Self {
        Self {
            id,
            object_type,
            switch,
            state: Mutex::new(InstanceState {
                removed: false,
                attrs,
            }),
            stats: Mutex::new(StatsSlot::default()),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn switch(&self) -> SwitchId {
        self.switch
    }

    pub fn lock_state(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock_stats(&self) -> MutexGuard<'_, StatsSlot> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Contents of the store map
#[derive(Debug, Default)]
pub struct StoreInner {
    objects: HashMap<ObjectId, Arc<ObjectEntry>>,
    live: HashMap<ObjectType, usize>,
    referrers: HashMap<ObjectId, BTreeSet<ObjectId>>,
}

impl StoreInner {
    pub fn get(&self, id: ObjectId) -> Option<&Arc<ObjectEntry>> {
        self.objects.get(&id)
    }

    pub fn referrers(&self, id: ObjectId) -> usize {
        self.referrers.get(&id).map_or(0, BTreeSet::len)
    }

    fn link(&mut self, from: ObjectId, to: ObjectId) {
        self.referrers.entry(to).or_default().insert(from);
    }

    fn unlink(&mut self, from: ObjectId, to: ObjectId) {
        if let Some(set) = self.referrers.get_mut(&to) {
            set.remove(&from);
            if set.is_empty() {
                self.referrers.remove(&to);
            }
        }
    }
}

impl ObjectResolver for StoreInner {
    fn object_type_of(&self, id: ObjectId) -> Option<ObjectType> {
        self.objects.get(&id).map(|e| e.object_type)
    }
}

/// Change of one relational attribute during a set
#[derive(Debug, Clone, Copy, Default)]
pub struct Relink {
    pub old: Option<ObjectId>,
    pub new: Option<ObjectId>,
}

/// Collection of live objects, keyed by generated id
#[derive(Debug)]
pub struct ObjectStore {
    inner: RwLock<StoreInner>,
    serial: AtomicU64,
    limits: StoreLimits,
}

impl ObjectStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            serial: AtomicU64::new(0),
            limits,
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: ObjectId) -> Option<Arc<ObjectEntry>> {
        self.read().objects.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the live objects of one type, ascending
    pub fn ids_of(&self, object_type: ObjectType) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self
            .read()
            .objects
            .values()
            .filter(|e| e.object_type == object_type)
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn allocate(&self, object_type: ObjectType) -> Result<ObjectId, OtnError> {
        let serial = self.serial.fetch_add(1, Ordering::Relaxed) + 1;
        ObjectId::new(object_type, serial).ok_or(OtnError::ResourceExhausted(object_type))
    }

    /// Insert a new object.
    ///
    /// `resolve` runs under the store write lock, so references it validates
    /// cannot disappear before the new object is linked to them. It returns
    /// the resolved attributes and the ids they reference.
    pub fn insert_with<F>(
        &self,
        object_type: ObjectType,
        switch: SwitchId,
        resolve: F,
    ) -> Result<ObjectId, OtnError>
    where
        F: FnOnce(&dyn ObjectResolver) -> Result<(AttrMap, Vec<ObjectId>), OtnError>,
    {
        let mut inner = self.write();
        let live = inner.live.get(&object_type).copied().unwrap_or(0);
        if live >= self.limits.max_for(object_type) {
            return Err(OtnError::ResourceExhausted(object_type));
        }
        let (attrs, refs) = resolve(&*inner)?;
        let id = self.allocate(object_type)?;
        for target in refs {
            inner.link(id, target);
        }
        inner
            .objects
            .insert(id, Arc::new(ObjectEntry::new(id, object_type, switch, attrs)));
        *inner.live.entry(object_type).or_default() += 1;
        Ok(id)
    }

    /// Remove an object unless something still references it.
    ///
    /// `references` maps the object's type and attributes to the ids it
    /// points at. The object is marked removed under both of its locks before it leaves
    /// the map, so no telemetry update can land afterwards.
    pub fn remove_with<F>(&self, id: ObjectId, references: F) -> Result<Arc<ObjectEntry>, OtnError>
    where
        F: FnOnce(ObjectType, &AttrMap) -> Vec<ObjectId>,
    {
        let mut inner = self.write();
        let entry = inner
            .objects
            .get(&id)
            .cloned()
            .ok_or(OtnError::ObjectNotFound(id))?;
        let referrers = inner.referrers(id);
        if referrers > 0 {
            return Err(OtnError::ObjectInUse { id, referrers });
        }

        let targets = {
            let mut state = entry.lock_state();
            let mut stats = entry.lock_stats();
            state.removed = true;
            stats.removed = true;
            stats.sample = None;
            references(entry.object_type, &state.attrs)
        };
        for target in targets {
            inner.unlink(id, target);
        }
        inner.objects.remove(&id);
        if let Some(count) = inner.live.get_mut(&entry.object_type) {
            *count = count.saturating_sub(1);
        }
        Ok(entry)
    }

    /// Run a write that may change a relational attribute.
    ///
    /// Holds the store write lock for the duration so the reverse index and
    /// the attribute map change together.
    pub fn update_linked<F>(&self, id: ObjectId, update: F) -> Result<(), OtnError>
    where
        F: FnOnce(&dyn ObjectResolver, &mut InstanceState) -> Result<Relink, OtnError>,
    {
        let mut inner = self.write();
        let entry = inner
            .objects
            .get(&id)
            .cloned()
            .ok_or(OtnError::ObjectNotFound(id))?;
        let relink = {
            let mut state = entry.lock_state();
            if state.removed {
                return Err(OtnError::ObjectNotFound(id));
            }
            update(&*inner, &mut state)?
        };
        if let Some(old) = relink.old {
            inner.unlink(id, old);
        }
        if let Some(new) = relink.new {
            inner.link(id, new);
        }
        Ok(())
    }
}

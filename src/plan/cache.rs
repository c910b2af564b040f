//! Plan cache - copy-on-write map of compiled plans
//!
//! Readers load the current snapshot without locking. Writers serialize on a
//! mutex, clone the snapshot, insert, and swap the pointer; a published
//! snapshot is never mutated. Entries are never evicted.

use std::any::TypeId;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::CompiledStruct;

type Snapshot = FxHashMap<TypeId, Arc<CompiledStruct>>;

pub struct PlanCache {
    snapshot: ArcSwap<Snapshot>,
    writer: Mutex<()>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            writer: Mutex::new(()),
        }
    }

    pub fn get(&self, key: TypeId) -> Option<Arc<CompiledStruct>> {
        self.snapshot.load().get(&key).cloned()
    }

    /// Publish `plan` for `key`, returning the plan now in the cache.
    ///
    /// If another caller published first, its plan is kept and returned.
    pub fn publish(&self, key: TypeId, plan: CompiledStruct) -> Arc<CompiledStruct> {
        let _guard = self.writer.lock();
        let current = self.snapshot.load_full();
        if let Some(existing) = current.get(&key) {
            return Arc::clone(existing);
        }

        let plan = Arc::new(plan);
        let mut next = Snapshot::clone(&current);
        next.insert(key, Arc::clone(&plan));
        self.snapshot.store(Arc::new(next));
        tracing::debug!(
            record = plan.type_name(),
            fields = plan.len(),
            cached = current.len() + 1,
            "Published record plan"
        );
        plan
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache").field("len", &self.len()).finish()
    }
}

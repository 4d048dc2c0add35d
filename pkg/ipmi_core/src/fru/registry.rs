use std::sync::{Arc, Mutex};

use super::handle::{FruHandle, FruIdentity};

/// Tracks the set of live FRU handles for a BMC. Holding an `Arc<FruHandle>`
/// here is this crate's refcount: a handle stays alive as long as either the
/// registry or some outstanding caller/I-O closure holds a clone.
pub struct FruRegistry {
    handles: Mutex<Vec<Arc<FruHandle>>>,
}

impl FruRegistry {
    pub fn new() -> Self {
        FruRegistry {
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, handle: Arc<FruHandle>) {
        self.handles.lock().unwrap().push(handle);
    }

    pub fn remove(&self, identity: &FruIdentity) -> Option<Arc<FruHandle>> {
        let mut handles = self.handles.lock().unwrap();
        let pos = handles.iter().position(|h| &h.identity == identity)?;
        Some(handles.remove(pos))
    }

    pub fn find(&self, identity: &FruIdentity) -> Option<Arc<FruHandle>> {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .find(|h| &h.identity == identity)
            .cloned()
    }

    /// Visits every currently-registered FRU. Each handle's strong count is
    /// bumped by cloning it out of the registry's lock before the visitor
    /// runs, so the visitor never runs while the registry lock is held, and
    /// a handle removed mid-iteration is still visited (the snapshot clone
    /// keeps it alive).
    pub fn iterate(&self, mut visitor: impl FnMut(&Arc<FruHandle>)) {
        let snapshot: Vec<Arc<FruHandle>> = self.handles.lock().unwrap().clone();
        for handle in &snapshot {
            visitor(handle);
        }
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

//! Named slot stores on one participant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use canopy_runtime::Message;
use tracing::{debug, trace};

use crate::slots::ChildSlotStore;

/// Slot stores registered on this participant, keyed by registration name.
///
/// Deliveries can arrive before the local gather registers its store, so
/// lookups create the store on demand.
#[derive(Debug)]
pub struct SlotRegistry {
    world_size: usize,
    stores: Mutex<HashMap<String, Arc<ChildSlotStore>>>,
}

impl SlotRegistry {
    /// Create an empty registry for a cluster of `world_size` participants.
    pub fn new(world_size: usize) -> Self {
        Self {
            world_size,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Cluster size every store in this registry expects.
    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// Get the store registered as `name`, creating it if absent.
    pub fn get_or_create(&self, name: &str) -> Arc<ChildSlotStore> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(registration = name, world_size = self.world_size, "Registered slot store");
                Arc::new(ChildSlotStore::new(name, self.world_size))
            })
            .clone()
    }

    /// Get the store registered as `name`.
    pub fn get(&self, name: &str) -> Option<Arc<ChildSlotStore>> {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Remove the store registered as `name`.
    pub fn deregister(&self, name: &str) -> Option<Arc<ChildSlotStore>> {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Remove `store` if it is still the one registered under its name.
    pub fn release(&self, store: &Arc<ChildSlotStore>) -> bool {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        match stores.get(store.registration()) {
            Some(current) if Arc::ptr_eq(current, store) => {
                stores.remove(store.registration());
                debug!(registration = store.registration(), "Released slot store");
                true
            }
            _ => false,
        }
    }

    /// Number of registered stores.
    pub fn len(&self) -> usize {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if no store is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply an incoming message to the store it names.
    pub fn dispatch(&self, message: Message) {
        match message {
            Message::DeliverRecords(deliver) => {
                trace!(
                    registration = %deliver.registration,
                    source = deliver.source,
                    slot = %deliver.slot,
                    records = deliver.records.len(),
                    "Dispatching delivery"
                );
                self.get_or_create(&deliver.registration).accept(deliver);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::SlotState;
    use canopy_runtime::DeliverRecords;
    use canopy_topology::SlotId;

    #[test]
    fn get_or_create_is_idempotent() {
        let registry = SlotRegistry::new(4);
        let a = registry.get_or_create("call-1");
        let b = registry.get_or_create("call-1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert_eq!(a.world_size(), 4);
    }

    #[test]
    fn names_are_isolated() {
        let registry = SlotRegistry::new(4);
        let first = registry.get_or_create("call-1");
        let second = registry.get_or_create("call-2");
        first.append_and_signal(SlotId::A, Vec::new());
        assert_eq!(second.state(SlotId::A), SlotState::Empty);
    }

    #[test]
    fn dispatch_creates_store_on_demand() {
        let registry = SlotRegistry::new(3);
        assert!(registry.get("early").is_none());

        registry.dispatch(
            DeliverRecords {
                registration: "early".into(),
                target: 0,
                source: 1,
                slot: SlotId::A,
                world_size: 3,
                records: Vec::new(),
            }
            .into(),
        );

        let store = registry.get("early").unwrap();
        assert_eq!(store.state(SlotId::A), SlotState::Ready);
    }

    #[test]
    fn release_only_removes_same_store() {
        let registry = SlotRegistry::new(2);
        let stale = registry.get_or_create("call");
        registry.deregister("call");
        let fresh = registry.get_or_create("call");

        assert!(!registry.release(&stale));
        assert_eq!(registry.len(), 1);
        assert!(registry.release(&fresh));
        assert!(registry.is_empty());
    }

    #[test]
    fn deregister_removes_store() {
        let registry = SlotRegistry::new(2);
        registry.get_or_create("done");
        assert!(registry.deregister("done").is_some());
        assert!(registry.is_empty());
        assert!(registry.deregister("done").is_none());
    }
}

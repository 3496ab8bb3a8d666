//! # memory_store.rs
//!
//! Process-local `HiveStore`. Every operation runs under a single lock, so
//! the uniqueness checks and the write they guard are one atomic step, the
//! same guarantee the unique indexes give in MongoDB. Used by the tests and
//! by `HIVE_STORE=memory` for running the bridge without a database.

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use parking_lot::Mutex;
use crate::lib::constants::{COLL_ATTENDANCE, COLL_LOCATIONS, COLL_NODES, COLL_NODE_EVENTS};
use crate::lib::errors::StoreError;
use crate::lib::store::HiveStore;
use crate::structs::location::{Location, LocationKey};
use crate::structs::node::{Node, NodeField, NodeIdentity, NodePatch};
use crate::structs::telemetry::{AttendanceRecord, NodeEvent, NodeSignals};


#[derive(Debug, Default)]
struct State {
    locations: Vec<Location>,
    nodes: Vec<Node>,
    events: Vec<NodeEvent>,
    attendance: Vec<AttendanceRecord>,
}

impl State {
    /// First unique constraint `candidate` would break against the other nodes.
    fn node_conflict(&self, candidate: &Node) -> Option<&'static str> {
        let others = || self.nodes.iter().filter(|n| n.id != candidate.id);
        let identity = NodeIdentity {
            name: Some(candidate.name.as_str()),
            ip_address: Some(candidate.ip_address.as_str()),
            mac_address: Some(candidate.mac_address.as_str()),
        };
        for field in NodeField::PRIORITY {
            if others().any(|n| field.collides(n, &identity)) {
                return Some(field.as_str());
            }
        }
        if candidate.location_id.is_some() && others().any(|n| n.location_id == candidate.location_id) {
            return Some("location_id");
        }
        None
    }
}


#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HiveStore for MemoryStore {
    async fn insert_location(&self, mut location: Location) -> Result<Location, StoreError> {
        let mut state = self.state.lock();
        let key = location.key();
        if state.locations.iter().any(|l| l.key() == key) {
            return Err(StoreError::Duplicate { field: "location" });
        }
        location.id = Some(ObjectId::new());
        state.locations.push(location.clone());
        Ok(location)
    }

    async fn find_location(&self, id: &ObjectId) -> Result<Option<Location>, StoreError> {
        let state = self.state.lock();
        Ok(state.locations.iter().find(|l| l.id.as_ref() == Some(id)).cloned())
    }

    async fn find_location_by_key(&self, key: &LocationKey) -> Result<Option<Location>, StoreError> {
        let state = self.state.lock();
        Ok(state.locations.iter().find(|l| &l.key() == key).cloned())
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        let mut out = self.state.lock().locations.clone();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn delete_location(&self, id: &ObjectId) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        let before = state.locations.len();
        state.locations.retain(|l| l.id.as_ref() != Some(id));
        Ok(state.locations.len() != before)
    }

    async fn insert_node(&self, mut node: Node) -> Result<Node, StoreError> {
        let mut state = self.state.lock();
        node.id = Some(ObjectId::new());
        if let Some(field) = state.node_conflict(&node) {
            return Err(StoreError::Duplicate { field });
        }
        state.nodes.push(node.clone());
        Ok(node)
    }

    async fn find_node(&self, id: &ObjectId) -> Result<Option<Node>, StoreError> {
        let state = self.state.lock();
        Ok(state.nodes.iter().find(|n| n.id.as_ref() == Some(id)).cloned())
    }

    async fn find_node_at_location(
        &self,
        location_id: &ObjectId,
        exclude: Option<&ObjectId>,
    ) -> Result<Option<Node>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .nodes
            .iter()
            .filter(|n| exclude.is_none() || n.id.as_ref() != exclude)
            .find(|n| n.location_id.as_ref() == Some(location_id))
            .cloned())
    }

    async fn find_node_collisions(
        &self,
        identity: &NodeIdentity<'_>,
        exclude: Option<&ObjectId>,
    ) -> Result<Vec<Node>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .nodes
            .iter()
            .filter(|n| exclude.is_none() || n.id.as_ref() != exclude)
            .filter(|n| NodeField::PRIORITY.iter().any(|f| f.collides(n, identity)))
            .cloned()
            .collect())
    }

    async fn update_node(&self, id: &ObjectId, patch: &NodePatch) -> Result<Option<Node>, StoreError> {
        let mut state = self.state.lock();
        let Some(idx) = state.nodes.iter().position(|n| n.id.as_ref() == Some(id)) else {
            return Ok(None);
        };
        let mut updated = state.nodes[idx].clone();
        patch.apply(&mut updated, Utc::now());
        if let Some(field) = state.node_conflict(&updated) {
            return Err(StoreError::Duplicate { field });
        }
        state.nodes[idx] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_node(&self, id: &ObjectId) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        let before = state.nodes.len();
        state.nodes.retain(|n| n.id.as_ref() != Some(id));
        Ok(state.nodes.len() != before)
    }

    async fn count_nodes(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().nodes.len() as u64)
    }

    async fn latest_signals(&self) -> Result<Vec<NodeSignals>, StoreError> {
        let state = self.state.lock();
        let mut out: Vec<NodeSignals> = state
            .nodes
            .iter()
            .map(|node| {
                let node_id = node.id;
                NodeSignals {
                    node: node.clone(),
                    last_event: state
                        .events
                        .iter()
                        .filter(|e| Some(e.node_id) == node_id)
                        .map(|e| e.date_time)
                        .max(),
                    last_attendance: state
                        .attendance
                        .iter()
                        .filter(|a| Some(a.node_id) == node_id)
                        .map(|a| a.date_time)
                        .max(),
                }
            })
            .collect();
        out.sort_by(|a, b| a.node.name.cmp(&b.node.name));
        Ok(out)
    }

    async fn append_node_event(&self, mut event: NodeEvent) -> Result<(), StoreError> {
        event.id.get_or_insert_with(ObjectId::new);
        self.state.lock().events.push(event);
        Ok(())
    }

    async fn append_attendance(&self, mut record: AttendanceRecord) -> Result<(), StoreError> {
        record.id.get_or_insert_with(ObjectId::new);
        self.state.lock().attendance.push(record);
        Ok(())
    }

    fn database_name(&self) -> &str {
        "memory"
    }

    async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        Ok([COLL_LOCATIONS, COLL_NODES, COLL_NODE_EVENTS, COLL_ATTENDANCE]
            .iter()
            .map(|s| s.to_string())
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::node::{RamUnit, StorageUnit};

    fn node(name: &str, ip: &str, mac: &str, location_id: Option<ObjectId>) -> Node {
        let now = Utc::now();
        Node {
            id: None,
            name: name.into(),
            ip_address: ip.into(),
            mac_address: mac.into(),
            model: None,
            brand: None,
            ram_size: 512,
            ram_unit: RamUnit::MB,
            storage_size: 16,
            storage_unit: StorageUnit::GB,
            storage_type: "microSD".into(),
            is_poe_compatible: false,
            is_wireless_connectivity: true,
            location_id,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    #[tokio::test]
    async fn unique_fields_are_enforced_on_insert() {
        let store = MemoryStore::new();
        let loc = ObjectId::new();
        store.insert_node(node("a", "10.0.0.1", "AA:AA:AA:AA:AA:01", Some(loc))).await.unwrap();

        let dup_ip = store.insert_node(node("b", "10.0.0.1", "AA:AA:AA:AA:AA:02", None)).await;
        assert!(matches!(dup_ip, Err(StoreError::Duplicate { field: "ip_address" })));

        let dup_loc = store.insert_node(node("c", "10.0.0.3", "AA:AA:AA:AA:AA:03", Some(loc))).await;
        assert!(matches!(dup_loc, Err(StoreError::Duplicate { field: "location_id" })));

        // unassigned nodes never collide on location
        store.insert_node(node("d", "10.0.0.4", "AA:AA:AA:AA:AA:04", None)).await.unwrap();
        store.insert_node(node("e", "10.0.0.5", "AA:AA:AA:AA:AA:05", None)).await.unwrap();
        assert_eq!(store.count_nodes().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn update_checks_uniqueness_against_other_nodes_only() {
        let store = MemoryStore::new();
        let a = store.insert_node(node("a", "10.0.0.1", "AA:AA:AA:AA:AA:01", None)).await.unwrap();
        store.insert_node(node("b", "10.0.0.2", "AA:AA:AA:AA:AA:02", None)).await.unwrap();
        let a_id = a.id.unwrap();

        let same_name = NodePatch { name: Some("a".into()), ..Default::default() };
        assert!(store.update_node(&a_id, &same_name).await.unwrap().is_some());

        let taken = NodePatch { mac_address: Some("AA:AA:AA:AA:AA:02".into()), ..Default::default() };
        let res = store.update_node(&a_id, &taken).await;
        assert!(matches!(res, Err(StoreError::Duplicate { field: "mac_address" })));
        let unchanged = store.find_node(&a_id).await.unwrap().unwrap();
        assert_eq!(unchanged.mac_address, "AA:AA:AA:AA:AA:01");

        assert!(store.update_node(&ObjectId::new(), &same_name).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_signals_picks_the_newest_of_each_stream() {
        let store = MemoryStore::new();
        let n = store.insert_node(node("a", "10.0.0.1", "AA:AA:AA:AA:AA:01", None)).await.unwrap();
        let node_id = n.id.unwrap();
        let now = Utc::now();
        for mins in [30, 3, 12] {
            store
                .append_node_event(NodeEvent {
                    id: None,
                    node_id,
                    is_powered: true,
                    is_receiving_data: true,
                    date_time: now - chrono::Duration::minutes(mins),
                })
                .await
                .unwrap();
        }

        let signals = store.latest_signals().await.unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].last_event, Some(now - chrono::Duration::minutes(3)));
        assert_eq!(signals[0].last_attendance, None);
    }
}

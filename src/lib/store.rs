//! # store.rs
//!
//! Persistence seam for locations, nodes and telemetry. Implementations must
//! enforce the uniqueness rules themselves (node name, ip address, mac
//! address, one node per location, location identity) and report a
//! violation as `StoreError::Duplicate`; callers may pre-check for a nicer
//! message but the store is what makes the rule hold under concurrency.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use crate::lib::errors::StoreError;
use crate::structs::location::{Location, LocationKey};
use crate::structs::node::{Node, NodeIdentity, NodePatch};
use crate::structs::telemetry::{AttendanceRecord, NodeEvent, NodeSignals};


#[async_trait]
pub trait HiveStore: Send + Sync {
    /// Inserts a location, returning it with its assigned id.
    async fn insert_location(&self, location: Location) -> Result<Location, StoreError>;
    async fn find_location(&self, id: &ObjectId) -> Result<Option<Location>, StoreError>;
    async fn find_location_by_key(&self, key: &LocationKey) -> Result<Option<Location>, StoreError>;
    /// All locations sorted by name.
    async fn list_locations(&self) -> Result<Vec<Location>, StoreError>;
    /// Returns whether a location was removed.
    async fn delete_location(&self, id: &ObjectId) -> Result<bool, StoreError>;

    /// Inserts a node, returning it with its assigned id.
    async fn insert_node(&self, node: Node) -> Result<Node, StoreError>;
    async fn find_node(&self, id: &ObjectId) -> Result<Option<Node>, StoreError>;
    /// The node assigned to `location_id`, ignoring `exclude`.
    async fn find_node_at_location(
        &self,
        location_id: &ObjectId,
        exclude: Option<&ObjectId>,
    ) -> Result<Option<Node>, StoreError>;
    /// Every node sharing any of the given identity values, ignoring `exclude`.
    async fn find_node_collisions(
        &self,
        identity: &NodeIdentity<'_>,
        exclude: Option<&ObjectId>,
    ) -> Result<Vec<Node>, StoreError>;
    /// Applies `patch` atomically and returns the updated node, or `None`
    /// when no node has the id.
    async fn update_node(&self, id: &ObjectId, patch: &NodePatch) -> Result<Option<Node>, StoreError>;
    /// Returns whether a node was removed.
    async fn delete_node(&self, id: &ObjectId) -> Result<bool, StoreError>;
    async fn count_nodes(&self) -> Result<u64, StoreError>;
    /// Every node with its latest event and attendance timestamps, sorted by name.
    async fn latest_signals(&self) -> Result<Vec<NodeSignals>, StoreError>;

    async fn append_node_event(&self, event: NodeEvent) -> Result<(), StoreError>;
    async fn append_attendance(&self, record: AttendanceRecord) -> Result<(), StoreError>;

    /// Name of the backing database, reported by the health check.
    fn database_name(&self) -> &str;
    async fn collection_names(&self) -> Result<Vec<String>, StoreError>;
}

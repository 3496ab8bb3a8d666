//! # registry.rs
//!
//! Node and location lifecycle on top of a `HiveStore`: input validation,
//! location resolution, the one-node-per-location rule and identity
//! uniqueness. The pre-checks here only produce specific error messages;
//! the store's unique constraints are what hold under concurrent writes.

use chrono::{DateTime, Utc};
use log::{debug, info};
use mongodb::bson::oid::ObjectId;
use crate::lib::constants::{DEFAULT_RAM_SIZE, DEFAULT_STORAGE_SIZE, DEFAULT_STORAGE_TYPE};
use crate::lib::errors::{ServiceError, StoreError};
use crate::lib::status::{self, FleetSummary};
use crate::lib::store::HiveStore;
use crate::lib::validation::{is_valid_ipv4, non_empty, normalize_mac};
use crate::structs::location::{Level, Location, LocationInput, LocationKey};
use crate::structs::node::{
    Node, NodeField, NodeIdentity, NodeInput, NodePatch, NodeView, RamUnit, StorageUnit,
};


/// Result of an idempotent location create.
#[derive(Debug, Clone)]
pub enum LocationOutcome {
    Created(Location),
    Existing(Location),
}

impl LocationOutcome {
    pub fn location(&self) -> &Location {
        match self {
            Self::Created(l) | Self::Existing(l) => l,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}


fn parse_id(raw: &str, what: &str) -> Result<ObjectId, ServiceError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| ServiceError::validation(format!("invalid {what} id")))
}

fn trimmed(s: Option<&str>) -> Option<String> {
    non_empty(s).map(String::from)
}

fn normalize_level(level: Option<Level>) -> Option<Level> {
    match level {
        Some(Level::Text(s)) => trimmed(Some(&s)).map(Level::Text),
        other => other,
    }
}


/// Creates a location unless one with the same (name, building, level, room)
/// exists, in which case that one is returned unchanged.
///
/// The insert is attempted first and a duplicate key answer falls back to a
/// lookup, so two racing creates of the same location both end up with the
/// same record.
pub async fn create_location(
    store: &dyn HiveStore,
    input: LocationInput,
) -> Result<LocationOutcome, ServiceError> {
    let name = trimmed(input.name.as_deref())
        .ok_or_else(|| ServiceError::validation("name is required"))?;
    let now = Utc::now();
    let location = Location {
        id: None,
        name,
        building: trimmed(input.building.as_deref()),
        level: normalize_level(input.level),
        room: trimmed(input.room.as_deref()),
        description: trimmed(input.description.as_deref()),
        created_at: Some(now),
        updated_at: Some(now),
    };
    let key = location.key();

    match store.insert_location(location).await {
        Ok(created) => {
            info!("Created location '{}'", created.name);
            Ok(LocationOutcome::Created(created))
        }
        Err(StoreError::Duplicate { .. }) => match store.find_location_by_key(&key).await? {
            Some(existing) => {
                debug!("Location '{}' already exists, returning it", existing.name);
                Ok(LocationOutcome::Existing(existing))
            }
            None => Err(ServiceError::StoreUnavailable(format!(
                "location '{}' reported as duplicate but not found",
                key.name
            ))),
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn list_locations(store: &dyn HiveStore) -> Result<Vec<Location>, ServiceError> {
    Ok(store.list_locations().await?)
}

/// Deletes a location that no node references.
pub async fn delete_location(store: &dyn HiveStore, id: &str) -> Result<(), ServiceError> {
    let id = parse_id(id, "location")?;
    if store.find_location(&id).await?.is_none() {
        return Err(ServiceError::not_found("Location not found"));
    }
    if let Some(node) = store.find_node_at_location(&id, None).await? {
        return Err(ServiceError::LocationInUse {
            node_id: node.id.unwrap_or(id),
            node_name: node.name,
        });
    }
    if !store.delete_location(&id).await? {
        return Err(ServiceError::not_found("Location not found"));
    }
    info!("Deleted location {}", id.to_hex());
    Ok(())
}


/// Resolves the location a node request points at: an existing id, an
/// inline location (created idempotently), or none.
async fn resolve_location(
    store: &dyn HiveStore,
    input: &NodeInput,
) -> Result<Option<ObjectId>, ServiceError> {
    if let Some(raw) = non_empty(input.location_id.as_deref()) {
        let id = ObjectId::parse_str(raw)
            .map_err(|_| ServiceError::validation("location_id must be ObjectId"))?;
        if store.find_location(&id).await?.is_none() {
            return Err(ServiceError::validation("location_id not found"));
        }
        return Ok(Some(id));
    }
    if let Some(inline) = &input.location {
        if non_empty(inline.name.as_deref()).is_none() {
            return Err(ServiceError::validation("location.name is required"));
        }
        let outcome = create_location(store, inline.clone()).await?;
        return Ok(outcome.location().id);
    }
    Ok(None)
}

/// Fails when `location_id` is already taken by a node other than `exclude`.
async fn ensure_location_free(
    store: &dyn HiveStore,
    location_id: &ObjectId,
    exclude: Option<&ObjectId>,
) -> Result<(), ServiceError> {
    match store.find_node_at_location(location_id, exclude).await? {
        Some(occupant) => Err(ServiceError::LocationOccupied {
            node_id: occupant.id.unwrap_or(*location_id),
            node_name: occupant.name,
        }),
        None => Ok(()),
    }
}

/// Collisions are reported by `NodeField::PRIORITY`: the error names the
/// first colliding field and carries the full list.
async fn ensure_identity_free(
    store: &dyn HiveStore,
    identity: &NodeIdentity<'_>,
    exclude: Option<&ObjectId>,
) -> Result<(), ServiceError> {
    if identity.is_empty() {
        return Ok(());
    }
    let existing = store.find_node_collisions(identity, exclude).await?;
    let fields: Vec<&'static str> = NodeField::PRIORITY
        .into_iter()
        .filter(|f| existing.iter().any(|n| f.collides(n, identity)))
        .map(NodeField::as_str)
        .collect();
    match fields.first() {
        Some(&field) => Err(ServiceError::Duplicate { field, fields }),
        None => Ok(()),
    }
}

fn validated_ip(raw: &str) -> Result<String, ServiceError> {
    let ip = raw.trim();
    if !is_valid_ipv4(ip) {
        return Err(ServiceError::validation("invalid ip_address"));
    }
    Ok(ip.to_string())
}

fn validated_mac(raw: &str) -> Result<String, ServiceError> {
    normalize_mac(raw.trim()).ok_or_else(|| ServiceError::validation("invalid mac_address (AA:BB:...)"))
}

fn validated_size(size: Option<i32>, field: &str) -> Result<Option<i32>, ServiceError> {
    match size {
        Some(v) if v < 0 => Err(ServiceError::validation(format!("{field} must not be negative"))),
        other => Ok(other),
    }
}

/// Validates every field present in `input`. Absent fields stay `None`.
/// Blank `model`/`brand` clear the value.
fn validate_fields(input: &NodeInput) -> Result<NodePatch, ServiceError> {
    let name = match input.name.as_deref() {
        Some(raw) => Some(trimmed(Some(raw)).ok_or_else(|| ServiceError::validation("name is required"))?),
        None => None,
    };
    Ok(NodePatch {
        name,
        ip_address: input.ip_address.as_deref().map(validated_ip).transpose()?,
        mac_address: input.mac_address.as_deref().map(validated_mac).transpose()?,
        model: input.model.as_deref().map(|m| trimmed(Some(m))),
        brand: input.brand.as_deref().map(|b| trimmed(Some(b))),
        ram_size: validated_size(input.ram_size, "ram_size")?,
        ram_unit: non_empty(input.ram_unit.as_deref())
            .map(str::parse::<RamUnit>)
            .transpose()
            .map_err(ServiceError::Validation)?,
        storage_size: validated_size(input.storage_size, "storage_size")?,
        storage_unit: non_empty(input.storage_unit.as_deref())
            .map(str::parse::<StorageUnit>)
            .transpose()
            .map_err(ServiceError::Validation)?,
        storage_type: trimmed(input.storage_type.as_deref()),
        is_poe_compatible: input.is_poe_compatible,
        is_wireless_connectivity: input.is_wireless_connectivity,
        location_id: None,
    })
}


/// Registers a new node.
///
/// Checks run in this order: name, ip address, mac address, location
/// resolution, location occupancy, identity collisions. Hardware fields
/// that are left out get defaults instead of being rejected.
pub async fn create_node(store: &dyn HiveStore, input: NodeInput) -> Result<Node, ServiceError> {
    if non_empty(input.name.as_deref()).is_none() {
        return Err(ServiceError::validation("name is required"));
    }
    let ip_address = validated_ip(input.ip_address.as_deref().unwrap_or_default())?;
    let mac_address = validated_mac(input.mac_address.as_deref().unwrap_or_default())?;
    let fields = validate_fields(&input)?;

    let location_id = resolve_location(store, &input).await?;
    if let Some(loc) = &location_id {
        ensure_location_free(store, loc, None).await?;
    }

    let now = Utc::now();
    let node = Node {
        id: None,
        name: fields.name.unwrap_or_default(),
        ip_address,
        mac_address,
        model: fields.model.flatten(),
        brand: fields.brand.flatten(),
        ram_size: fields.ram_size.unwrap_or(DEFAULT_RAM_SIZE),
        ram_unit: fields.ram_unit.unwrap_or_default(),
        storage_size: fields.storage_size.unwrap_or(DEFAULT_STORAGE_SIZE),
        storage_unit: fields.storage_unit.unwrap_or_default(),
        storage_type: fields.storage_type.unwrap_or_else(|| DEFAULT_STORAGE_TYPE.to_string()),
        is_poe_compatible: fields.is_poe_compatible.unwrap_or(false),
        is_wireless_connectivity: fields.is_wireless_connectivity.unwrap_or(false),
        location_id,
        created_at: Some(now),
        updated_at: Some(now),
    };
    let identity = NodeIdentity {
        name: Some(&node.name),
        ip_address: Some(&node.ip_address),
        mac_address: Some(&node.mac_address),
    };
    ensure_identity_free(store, &identity, None).await?;

    let created = store.insert_node(node).await?;
    info!("Registered node '{}' ({})", created.name, created.mac_address);
    Ok(created)
}

/// Applies a partial update. Only fields present in `input` are validated
/// and written; the location and identity checks ignore the node itself.
pub async fn update_node(store: &dyn HiveStore, id: &str, input: NodeInput) -> Result<Node, ServiceError> {
    let id = parse_id(id, "node")?;
    let mut patch = validate_fields(&input)?;
    if store.find_node(&id).await?.is_none() {
        return Err(ServiceError::not_found("node not found"));
    }

    if let Some(loc) = resolve_location(store, &input).await? {
        ensure_location_free(store, &loc, Some(&id)).await?;
        patch.location_id = Some(loc);
    }
    ensure_identity_free(store, &patch.identity(), Some(&id)).await?;

    match store.update_node(&id, &patch).await? {
        Some(node) => {
            info!("Updated node '{}'", node.name);
            Ok(node)
        }
        None => Err(ServiceError::not_found("node not found")),
    }
}

/// Removes a node. Its location and telemetry are left untouched.
pub async fn delete_node(store: &dyn HiveStore, id: &str) -> Result<(), ServiceError> {
    let id = parse_id(id, "node")?;
    if !store.delete_node(&id).await? {
        return Err(ServiceError::not_found("node not found"));
    }
    info!("Deleted node {}", id.to_hex());
    Ok(())
}

pub async fn count_nodes(store: &dyn HiveStore) -> Result<u64, ServiceError> {
    Ok(store.count_nodes().await?)
}

/// Every node with its derived status and last signal time, sorted by name.
pub async fn list_nodes(store: &dyn HiveStore, now: DateTime<Utc>) -> Result<Vec<NodeView>, ServiceError> {
    let signals = store.latest_signals().await?;
    Ok(signals
        .iter()
        .map(|s| NodeView::from(&s.node).with_liveness(status::derive(s.last_event, s.last_attendance, now)))
        .collect())
}

pub async fn summarize(store: &dyn HiveStore, now: DateTime<Utc>) -> Result<FleetSummary, ServiceError> {
    let signals = store.latest_signals().await?;
    Ok(FleetSummary::tally(
        signals.iter().map(|s| status::derive(s.last_event, s.last_attendance, now).status),
    ))
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::lib::memory_store::MemoryStore;
    use crate::lib::status::NodeStatus;
    use crate::structs::telemetry::{AttendanceRecord, NodeEvent, NodeSignals};
    use async_trait::async_trait;
    use tokio::task::yield_now;

    fn location(name: &str, room: &str) -> LocationInput {
        LocationInput {
            name: Some(name.into()),
            building: Some("245".into()),
            level: Some(Level::Text("3".into())),
            room: Some(room.into()),
            description: None,
        }
    }

    fn node_input(name: &str, ip: &str, mac: &str) -> NodeInput {
        NodeInput {
            name: Some(name.into()),
            ip_address: Some(ip.into()),
            mac_address: Some(mac.into()),
            ..Default::default()
        }
    }

    fn hex(node: &Node) -> String {
        node.id.unwrap().to_hex()
    }

    #[tokio::test]
    async fn creating_a_location_twice_returns_the_same_record() {
        let store = MemoryStore::new();
        let first = create_location(&store, location("LOC001", "3.064")).await.unwrap();
        let second = create_location(&store, location(" LOC001 ", "3.064")).await.unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(first.location().id, second.location().id);
        assert_eq!(list_locations(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn location_requires_a_name() {
        let store = MemoryStore::new();
        let err = create_location(&store, LocationInput { name: Some("   ".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m == "name is required"));
    }

    #[tokio::test]
    async fn locations_are_listed_by_name() {
        let store = MemoryStore::new();
        for name in ["LOC003", "LOC001", "LOC002"] {
            create_location(&store, location(name, "1.001")).await.unwrap();
        }
        let names: Vec<String> = list_locations(&store).await.unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, ["LOC001", "LOC002", "LOC003"]);
    }

    #[tokio::test]
    async fn example_node_is_stored_with_upper_case_mac_and_defaults() {
        let store = MemoryStore::new();
        let node = create_node(&store, node_input("Lab A", "10.51.33.101", "b8:27:eb:12:34:56")).await.unwrap();

        assert_eq!(node.mac_address, "B8:27:EB:12:34:56");
        assert_eq!(node.ip_address, "10.51.33.101");
        assert_eq!((node.ram_size, node.ram_unit), (0, RamUnit::MB));
        assert_eq!((node.storage_size, node.storage_unit), (0, StorageUnit::GB));
        assert_eq!(node.storage_type, "microSD");
        assert!(!node.is_poe_compatible);
        assert_eq!(node.location_id, None);
    }

    #[tokio::test]
    async fn node_fields_are_validated_in_order() {
        let store = MemoryStore::new();
        let cases = [
            (node_input(" ", "300.1.1.1", "zz"), "name is required"),
            (node_input("n", "300.1.1.1", "zz"), "invalid ip_address"),
            (node_input("n", "10.0.0.1", "b8:27:eb:12:34"), "invalid mac_address (AA:BB:...)"),
        ];
        for (input, expected) in cases {
            let err = create_node(&store, input).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(ref m) if m == expected), "{err:?}");
        }

        let mut bad_unit = node_input("n", "10.0.0.1", "b8:27:eb:12:34:56");
        bad_unit.storage_unit = Some("PB".into());
        assert!(matches!(create_node(&store, bad_unit).await, Err(ServiceError::Validation(_))));
        assert_eq!(count_nodes(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn location_reference_must_exist() {
        let store = MemoryStore::new();
        let mut input = node_input("n", "10.0.0.1", "b8:27:eb:12:34:56");
        input.location_id = Some("not-an-id".into());
        let err = create_node(&store, input.clone()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m == "location_id must be ObjectId"));

        input.location_id = Some(ObjectId::new().to_hex());
        let err = create_node(&store, input).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m == "location_id not found"));
    }

    #[tokio::test]
    async fn inline_location_reuses_an_existing_record() {
        let store = MemoryStore::new();
        let existing = create_location(&store, location("LOC001", "3.064")).await.unwrap();

        let mut input = node_input("Lab A", "10.51.33.101", "b8:27:eb:12:34:56");
        input.location = Some(location("LOC001", "3.064"));
        let node = create_node(&store, input).await.unwrap();

        assert_eq!(node.location_id, existing.location().id);
        assert_eq!(list_locations(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_node_on_a_location_conflicts_but_self_update_does_not() {
        let store = MemoryStore::new();
        let loc = create_location(&store, location("LOC001", "3.064")).await.unwrap();
        let loc_id = loc.location().id.unwrap().to_hex();

        let mut a = node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01");
        a.location_id = Some(loc_id.clone());
        let a = create_node(&store, a).await.unwrap();

        let mut b = node_input("Lab B", "10.0.0.2", "AA:AA:AA:AA:AA:02");
        b.location_id = Some(loc_id.clone());
        let err = create_node(&store, b).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "location already assigned to node \"Lab A\"");

        // reassigning the same location to its own node is fine
        let patch = NodeInput { location_id: Some(loc_id.clone()), ..Default::default() };
        let updated = update_node(&store, &hex(&a), patch).await.unwrap();
        assert_eq!(updated.location_id, a.location_id);

        // but moving another node onto it is not
        let b = create_node(&store, node_input("Lab B", "10.0.0.2", "AA:AA:AA:AA:AA:02")).await.unwrap();
        let patch = NodeInput { location_id: Some(loc_id), ..Default::default() };
        let err = update_node(&store, &hex(&b), patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::LocationOccupied { ref node_name, .. } if node_name == "Lab A"));
    }

    #[tokio::test]
    async fn duplicates_are_reported_by_priority_with_all_fields() {
        let store = MemoryStore::new();
        create_node(&store, node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01")).await.unwrap();
        create_node(&store, node_input("Lab B", "10.0.0.2", "AA:AA:AA:AA:AA:02")).await.unwrap();

        let err = create_node(&store, node_input("Lab C", "10.0.0.1", "aa:aa:aa:aa:aa:02")).await.unwrap_err();
        match err {
            ServiceError::Duplicate { field, fields } => {
                assert_eq!(field, "ip_address");
                assert_eq!(fields, ["ip_address", "mac_address"]);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }

        let err = create_node(&store, node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01")).await.unwrap_err();
        assert_eq!(err.to_string(), "name already exists");
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields() {
        let store = MemoryStore::new();
        let mut input = node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01");
        input.model = Some("Raspberry Pi Zero W".into());
        input.ram_size = Some(512);
        let node = create_node(&store, input).await.unwrap();

        let patch = NodeInput {
            ip_address: Some("10.0.0.9".into()),
            mac_address: Some("aa-aa-aa-aa-aa-09".into()),
            ..Default::default()
        };
        let updated = update_node(&store, &hex(&node), patch).await.unwrap();
        assert_eq!(updated.ip_address, "10.0.0.9");
        assert_eq!(updated.mac_address, "AA:AA:AA:AA:AA:09");
        assert_eq!(updated.name, "Lab A");
        assert_eq!(updated.model.as_deref(), Some("Raspberry Pi Zero W"));
        assert_eq!(updated.ram_size, 512);

        let bad = NodeInput { ip_address: Some("10.0.0".into()), ..Default::default() };
        assert!(matches!(update_node(&store, &hex(&node), bad).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn update_rejects_names_taken_by_other_nodes() {
        let store = MemoryStore::new();
        let a = create_node(&store, node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01")).await.unwrap();
        create_node(&store, node_input("Lab B", "10.0.0.2", "AA:AA:AA:AA:AA:02")).await.unwrap();

        let rename = NodeInput { name: Some("Lab B".into()), ..Default::default() };
        let err = update_node(&store, &hex(&a), rename).await.unwrap_err();
        assert_eq!(err.to_string(), "name already exists");

        let keep = NodeInput { name: Some("Lab A".into()), ..Default::default() };
        assert!(update_node(&store, &hex(&a), keep).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store = MemoryStore::new();
        let missing = ObjectId::new().to_hex();
        let patch = NodeInput { name: Some("x".into()), ..Default::default() };
        assert!(matches!(update_node(&store, &missing, patch).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(delete_node(&store, &missing).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(delete_location(&store, &missing).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(delete_node(&store, "xyz").await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn deleting_a_referenced_location_names_the_node() {
        let store = MemoryStore::new();
        let used = create_location(&store, location("LOC001", "3.064")).await.unwrap();
        let free = create_location(&store, location("LOC002", "3.063")).await.unwrap();

        let mut input = node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01");
        input.location_id = used.location().id.map(|id| id.to_hex());
        let node = create_node(&store, input).await.unwrap();

        let used_id = used.location().id.unwrap().to_hex();
        match delete_location(&store, &used_id).await.unwrap_err() {
            ServiceError::LocationInUse { node_id, node_name } => {
                assert_eq!(Some(node_id), node.id);
                assert_eq!(node_name, "Lab A");
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        delete_location(&store, &free.location().id.unwrap().to_hex()).await.unwrap();

        // once the node is gone the location can go too
        delete_node(&store, &hex(&node)).await.unwrap();
        delete_location(&store, &used_id).await.unwrap();
        assert!(list_locations(&store).await.unwrap().is_empty());
    }

    /// Hands control back to the scheduler before every store call, so
    /// requests joined on one task interleave between their checks and
    /// their writes.
    struct YieldingStore(MemoryStore);

    #[async_trait]
    impl HiveStore for YieldingStore {
        async fn insert_location(&self, location: Location) -> Result<Location, StoreError> {
            yield_now().await;
            self.0.insert_location(location).await
        }
        async fn find_location(&self, id: &ObjectId) -> Result<Option<Location>, StoreError> {
            yield_now().await;
            self.0.find_location(id).await
        }
        async fn find_location_by_key(&self, key: &LocationKey) -> Result<Option<Location>, StoreError> {
            yield_now().await;
            self.0.find_location_by_key(key).await
        }
        async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
            yield_now().await;
            self.0.list_locations().await
        }
        async fn delete_location(&self, id: &ObjectId) -> Result<bool, StoreError> {
            yield_now().await;
            self.0.delete_location(id).await
        }
        async fn insert_node(&self, node: Node) -> Result<Node, StoreError> {
            yield_now().await;
            self.0.insert_node(node).await
        }
        async fn find_node(&self, id: &ObjectId) -> Result<Option<Node>, StoreError> {
            yield_now().await;
            self.0.find_node(id).await
        }
        async fn find_node_at_location(
            &self,
            location_id: &ObjectId,
            exclude: Option<&ObjectId>,
        ) -> Result<Option<Node>, StoreError> {
            yield_now().await;
            self.0.find_node_at_location(location_id, exclude).await
        }
        async fn find_node_collisions(
            &self,
            identity: &NodeIdentity<'_>,
            exclude: Option<&ObjectId>,
        ) -> Result<Vec<Node>, StoreError> {
            yield_now().await;
            self.0.find_node_collisions(identity, exclude).await
        }
        async fn update_node(&self, id: &ObjectId, patch: &NodePatch) -> Result<Option<Node>, StoreError> {
            yield_now().await;
            self.0.update_node(id, patch).await
        }
        async fn delete_node(&self, id: &ObjectId) -> Result<bool, StoreError> {
            yield_now().await;
            self.0.delete_node(id).await
        }
        async fn count_nodes(&self) -> Result<u64, StoreError> {
            self.0.count_nodes().await
        }
        async fn latest_signals(&self) -> Result<Vec<NodeSignals>, StoreError> {
            self.0.latest_signals().await
        }
        async fn append_node_event(&self, event: NodeEvent) -> Result<(), StoreError> {
            self.0.append_node_event(event).await
        }
        async fn append_attendance(&self, record: AttendanceRecord) -> Result<(), StoreError> {
            self.0.append_attendance(record).await
        }
        fn database_name(&self) -> &str {
            self.0.database_name()
        }
        async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
            self.0.collection_names().await
        }
    }

    fn single_winner(results: [Result<Node, ServiceError>; 2]) -> ServiceError {
        let [ra, rb] = results;
        match (ra, rb) {
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => e,
            (a, b) => panic!("expected exactly one success, got {a:?} and {b:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_creates_on_one_location_admit_exactly_one() {
        let store = YieldingStore(MemoryStore::new());
        let loc = create_location(&store, location("LOC001", "3.064")).await.unwrap();
        let loc_id = loc.location().id.unwrap().to_hex();

        let mut a = node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01");
        a.location_id = Some(loc_id.clone());
        let mut b = node_input("Lab B", "10.0.0.2", "AA:AA:AA:AA:AA:02");
        b.location_id = Some(loc_id);

        // both requests pass the occupancy pre-check; the store refuses the later write
        let (ra, rb) = tokio::join!(create_node(&store, a), create_node(&store, b));
        match single_winner([ra, rb]) {
            ServiceError::Duplicate { field, fields } => {
                assert_eq!(field, "location_id");
                assert_eq!(fields, ["location_id"]);
            }
            other => panic!("expected a storage duplicate, got {other:?}"),
        }
        assert_eq!(count_nodes(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_creates_with_one_mac_admit_exactly_one() {
        let store = YieldingStore(MemoryStore::new());
        let a = node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01");
        let b = node_input("Lab B", "10.0.0.2", "aa:aa:aa:aa:aa:01");

        let (ra, rb) = tokio::join!(create_node(&store, a), create_node(&store, b));
        let err = single_winner([ra, rb]);
        assert!(matches!(err, ServiceError::Duplicate { field: "mac_address", .. }), "{err:?}");
    }

    #[tokio::test]
    async fn negative_sizes_are_rejected() {
        let store = MemoryStore::new();
        let mut input = node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01");
        input.storage_size = Some(-16);
        let err = create_node(&store, input).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m == "storage_size must not be negative"));

        let node = create_node(&store, node_input("Lab A", "10.0.0.1", "AA:AA:AA:AA:AA:01")).await.unwrap();
        let patch = NodeInput { ram_size: Some(-1), ..Default::default() };
        let err = update_node(&store, &hex(&node), patch).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref m) if m == "ram_size must not be negative"));
    }

    #[tokio::test]
    async fn lower_case_mac_on_record_still_collides() {
        let store = MemoryStore::new();
        let now = Utc::now();
        // a record written outside the bridge, with its mac left lower-case
        store
            .insert_node(Node {
                id: None,
                name: "Lab B - Cameron".into(),
                ip_address: "100.64.0.2".into(),
                mac_address: "00:e0:4c:36:05:dc".into(),
                model: None,
                brand: None,
                ram_size: 512,
                ram_unit: RamUnit::MB,
                storage_size: 16,
                storage_unit: StorageUnit::GB,
                storage_type: "microSD".into(),
                is_poe_compatible: true,
                is_wireless_connectivity: true,
                location_id: None,
                created_at: None,
                updated_at: Some(now),
            })
            .await
            .unwrap();

        let err = create_node(&store, node_input("Lab X", "10.9.9.9", "00:E0:4C:36:05:DC")).await.unwrap_err();
        assert_eq!(err.to_string(), "mac_address already exists");
    }

    #[tokio::test]
    async fn listing_derives_status_from_both_streams() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let fresh = create_node(&store, node_input("A fresh", "10.0.0.1", "AA:AA:AA:AA:AA:01")).await.unwrap();
        let stale = create_node(&store, node_input("B stale", "10.0.0.2", "AA:AA:AA:AA:AA:02")).await.unwrap();
        create_node(&store, node_input("C silent", "10.0.0.3", "AA:AA:AA:AA:AA:03")).await.unwrap();

        store
            .append_node_event(NodeEvent {
                id: None,
                node_id: fresh.id.unwrap(),
                is_powered: true,
                is_receiving_data: true,
                date_time: now - Duration::minutes(5),
            })
            .await
            .unwrap();
        store
            .append_attendance(AttendanceRecord {
                id: None,
                node_id: stale.id.unwrap(),
                packet_type: 1,
                device_id: "c0ffee".into(),
                signal_strength: Some(-61),
                date_time: now - Duration::minutes(15),
            })
            .await
            .unwrap();

        let views = list_nodes(&store, now).await.unwrap();
        let statuses: Vec<(&str, Option<NodeStatus>)> = views.iter().map(|v| (v.name.as_str(), v.status)).collect();
        assert_eq!(
            statuses,
            [
                ("A fresh", Some(NodeStatus::Online)),
                ("B stale", Some(NodeStatus::Offline)),
                ("C silent", Some(NodeStatus::Offline)),
            ]
        );
        assert_eq!(views[1].last_seen, Some(now - Duration::minutes(15)));
        assert_eq!(views[2].last_seen, None);

        let summary = summarize(&store, now).await.unwrap();
        assert_eq!((summary.total, summary.online, summary.offline, summary.window_min), (3, 1, 2, 10));
    }
}

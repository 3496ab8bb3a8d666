//! # mongodb.rs
//!
//! MongoDB backed `HiveStore`. Uniqueness lives in the indexes created by
//! `ensure_indexes`; duplicate key failures (E11000) are mapped back to the
//! field whose index rejected the write.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::{error, info, warn};
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use crate::lib::config::Config;
use crate::lib::constants::{
    COLL_ATTENDANCE, COLL_LOCATIONS, COLL_NODES, COLL_NODE_EVENTS, IDX_ATTENDANCE_BY_NODE,
    IDX_EVENTS_BY_NODE, IDX_LOCATION_IDENTITY, IDX_NODE_IP, IDX_NODE_LOCATION, IDX_NODE_MAC,
    IDX_NODE_NAME,
};
use crate::lib::errors::{ConfigError, StoreError};
use crate::lib::store::HiveStore;
use crate::structs::location::{Location, LocationKey};
use crate::structs::node::{Node, NodeIdentity, NodePatch};
use crate::structs::telemetry::{AttendanceRecord, NodeEvent, NodeSignals};


pub async fn initialize_client(config: &Config) -> anyhow::Result<Client> {
    let uri = config.mongodb_uri.as_deref().ok_or(ConfigError::Missing("MONGODB_URI"))?;
    let options = ClientOptions::parse(uri).await?;
    Ok(Client::with_options(options)?)
}


impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        match duplicate_key_message(&e) {
            Some(msg) => StoreError::Duplicate { field: duplicate_field(msg) },
            None => StoreError::Unavailable(e.to_string()),
        }
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(e: bson::ser::Error) -> Self {
        StoreError::Codec(e.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(e: bson::de::Error) -> Self {
        StoreError::Codec(e.to_string())
    }
}

/// Server message of a duplicate key (code 11000) failure, if `e` is one.
fn duplicate_key_message(e: &mongodb::error::Error) -> Option<&str> {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000 => Some(we.message.as_str()),
        ErrorKind::Command(ce) if ce.code == 11000 => Some(ce.message.as_str()),
        _ => None,
    }
}

/// Maps an E11000 message such as
/// `E11000 duplicate key error collection: db.nodes index: uniq_node_name dup key: { name: "x" }`
/// to the field the index guards.
pub fn duplicate_field(message: &str) -> &'static str {
    let index = message
        .split("index: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("");
    match index {
        IDX_NODE_NAME | "name_1" => "name",
        IDX_NODE_IP | "ip_address_1" => "ip_address",
        IDX_NODE_MAC | "mac_address_1" => "mac_address",
        IDX_NODE_LOCATION | "location_id_1" => "location_id",
        IDX_LOCATION_IDENTITY => "location",
        _ => "field",
    }
}


pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connects, pings the server and makes sure the indexes exist.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let client = initialize_client(config).await?;
        let db = client.database(&config.db_name);
        db.run_command(doc! { "ping": 1 }).await?;
        info!("Connected to MongoDB database '{}'", config.db_name);

        let store = Self { db };
        if let Err(e) = store.ensure_indexes().await {
            warn!("Index creation skipped: {}", e);
        }
        Ok(store)
    }

    fn locations(&self) -> Collection<Location> {
        self.db.collection(COLL_LOCATIONS)
    }

    fn nodes(&self) -> Collection<Node> {
        self.db.collection(COLL_NODES)
    }

    pub async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        let unique = |name: &str| IndexOptions::builder().unique(true).name(name.to_string()).build();

        let nodes = self.nodes();
        for (field, name) in [("name", IDX_NODE_NAME), ("ip_address", IDX_NODE_IP), ("mac_address", IDX_NODE_MAC)] {
            nodes
                .create_index(IndexModel::builder().keys(doc! { field: 1 }).options(unique(name)).build())
                .await?;
        }

        // One node per location. Unassigned nodes (null location_id) are outside the filter.
        let per_location = IndexOptions::builder()
            .unique(true)
            .name(IDX_NODE_LOCATION.to_string())
            .partial_filter_expression(doc! { "location_id": { "$type": "objectId" } })
            .build();
        nodes
            .create_index(IndexModel::builder().keys(doc! { "location_id": 1 }).options(per_location).build())
            .await?;

        self.locations()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "name": 1, "building": 1, "level": 1, "room": 1 })
                    .options(unique(IDX_LOCATION_IDENTITY))
                    .build(),
            )
            .await?;

        for (coll, name) in [(COLL_NODE_EVENTS, IDX_EVENTS_BY_NODE), (COLL_ATTENDANCE, IDX_ATTENDANCE_BY_NODE)] {
            self.db
                .collection::<Document>(coll)
                .create_index(
                    IndexModel::builder()
                        .keys(doc! { "node_id": 1, "date_time": -1 })
                        .options(IndexOptions::builder().name(name.to_string()).build())
                        .build(),
                )
                .await?;
        }

        info!("Indexes ensured");
        Ok(())
    }
}


fn key_filter(key: &LocationKey) -> Result<Document, StoreError> {
    Ok(doc! {
        "name": key.name.as_str(),
        "building": bson::to_bson(&key.building)?,
        "level": bson::to_bson(&key.level)?,
        "room": bson::to_bson(&key.room)?,
    })
}

/// Matches `mac_address` without regard to case. Records written outside
/// the bridge may hold lower-case addresses, which the unique index does
/// not fold.
fn mac_filter(mac: &str) -> Document {
    let pattern: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit() || *c == ':')
        .collect();
    doc! { "mac_address": { "$regex": format!("^{}$", pattern), "$options": "i" } }
}

fn excluding(mut filter: Document, exclude: Option<&ObjectId>) -> Document {
    if let Some(id) = exclude {
        filter.insert("_id", doc! { "$ne": *id });
    }
    filter
}

fn patch_document(patch: &NodePatch) -> Result<Document, StoreError> {
    let mut set = Document::new();
    if let Some(v) = &patch.name { set.insert("name", v.as_str()); }
    if let Some(v) = &patch.ip_address { set.insert("ip_address", v.as_str()); }
    if let Some(v) = &patch.mac_address { set.insert("mac_address", v.as_str()); }
    if let Some(v) = &patch.model { set.insert("model", v.clone()); }
    if let Some(v) = &patch.brand { set.insert("brand", v.clone()); }
    if let Some(v) = patch.ram_size { set.insert("ram_size", bson::to_bson(&v)?); }
    if let Some(v) = &patch.ram_unit { set.insert("ram_unit", bson::to_bson(v)?); }
    if let Some(v) = patch.storage_size { set.insert("storage_size", bson::to_bson(&v)?); }
    if let Some(v) = &patch.storage_unit { set.insert("storage_unit", bson::to_bson(v)?); }
    if let Some(v) = &patch.storage_type { set.insert("storage_type", v.as_str()); }
    if let Some(v) = patch.is_poe_compatible { set.insert("is_poe_compatible", v); }
    if let Some(v) = patch.is_wireless_connectivity { set.insert("is_wireless_connectivity", v); }
    if let Some(v) = patch.location_id { set.insert("location_id", v); }
    set.insert("updated_at", bson::DateTime::from_chrono(Utc::now()));
    Ok(set)
}

/// Latest timestamp of `node_id` in `from`, as a `$lookup` stage writing to `as_field`.
fn latest_lookup(from: &str, as_field: &str) -> Document {
    doc! {
        "$lookup": {
            "from": from,
            "let": { "nid": "$_id" },
            "pipeline": [
                { "$match": { "$expr": { "$eq": ["$node_id", "$$nid"] } } },
                { "$sort": { "date_time": -1 } },
                { "$limit": 1 },
                { "$project": { "_id": 0, "dt": "$date_time" } },
            ],
            "as": as_field,
        }
    }
}

fn datetime_field(doc: &Document, key: &str) -> Option<chrono::DateTime<Utc>> {
    match doc.get(key) {
        Some(Bson::DateTime(dt)) => Some(dt.to_chrono()),
        _ => None,
    }
}


#[async_trait]
impl HiveStore for MongoStore {
    async fn insert_location(&self, mut location: Location) -> Result<Location, StoreError> {
        location.id = Some(ObjectId::new());
        self.locations().insert_one(&location).await?;
        Ok(location)
    }

    async fn find_location(&self, id: &ObjectId) -> Result<Option<Location>, StoreError> {
        Ok(self.locations().find_one(doc! { "_id": *id }).await?)
    }

    async fn find_location_by_key(&self, key: &LocationKey) -> Result<Option<Location>, StoreError> {
        Ok(self.locations().find_one(key_filter(key)?).await?)
    }

    async fn list_locations(&self) -> Result<Vec<Location>, StoreError> {
        let cursor = self.locations().find(doc! {}).sort(doc! { "name": 1 }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_location(&self, id: &ObjectId) -> Result<bool, StoreError> {
        let result = self.locations().delete_one(doc! { "_id": *id }).await?;
        Ok(result.deleted_count == 1)
    }

    async fn insert_node(&self, mut node: Node) -> Result<Node, StoreError> {
        node.id = Some(ObjectId::new());
        self.nodes().insert_one(&node).await?;
        Ok(node)
    }

    async fn find_node(&self, id: &ObjectId) -> Result<Option<Node>, StoreError> {
        Ok(self.nodes().find_one(doc! { "_id": *id }).await?)
    }

    async fn find_node_at_location(
        &self,
        location_id: &ObjectId,
        exclude: Option<&ObjectId>,
    ) -> Result<Option<Node>, StoreError> {
        let filter = excluding(doc! { "location_id": *location_id }, exclude);
        Ok(self.nodes().find_one(filter).await?)
    }

    async fn find_node_collisions(
        &self,
        identity: &NodeIdentity<'_>,
        exclude: Option<&ObjectId>,
    ) -> Result<Vec<Node>, StoreError> {
        let mut any_of = Vec::new();
        if let Some(v) = identity.name { any_of.push(doc! { "name": v }); }
        if let Some(v) = identity.ip_address { any_of.push(doc! { "ip_address": v }); }
        if let Some(v) = identity.mac_address { any_of.push(mac_filter(v)); }
        if any_of.is_empty() {
            return Ok(Vec::new());
        }
        let filter = excluding(doc! { "$or": any_of }, exclude);
        let cursor = self.nodes().find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_node(&self, id: &ObjectId, patch: &NodePatch) -> Result<Option<Node>, StoreError> {
        let set = patch_document(patch)?;
        Ok(self
            .nodes()
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn delete_node(&self, id: &ObjectId) -> Result<bool, StoreError> {
        let result = self.nodes().delete_one(doc! { "_id": *id }).await?;
        Ok(result.deleted_count == 1)
    }

    async fn count_nodes(&self) -> Result<u64, StoreError> {
        Ok(self.nodes().estimated_document_count().await?)
    }

    async fn latest_signals(&self) -> Result<Vec<NodeSignals>, StoreError> {
        let pipeline = vec![
            latest_lookup(COLL_NODE_EVENTS, "ev"),
            latest_lookup(COLL_ATTENDANCE, "att"),
            doc! { "$addFields": {
                "last_ev": { "$arrayElemAt": ["$ev.dt", 0] },
                "last_att": { "$arrayElemAt": ["$att.dt", 0] },
            } },
            doc! { "$project": { "ev": 0, "att": 0 } },
            doc! { "$sort": { "name": 1 } },
        ];
        let mut cursor = self.nodes().aggregate(pipeline).await?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let last_event = datetime_field(&doc, "last_ev");
            let last_attendance = datetime_field(&doc, "last_att");
            match bson::from_document::<Node>(doc) {
                Ok(node) => out.push(NodeSignals { node, last_event, last_attendance }),
                Err(e) => {
                    error!("Failed to deserialize node from status pipeline: {}", e);
                    return Err(e.into());
                }
            }
        }
        Ok(out)
    }

    async fn append_node_event(&self, event: NodeEvent) -> Result<(), StoreError> {
        self.db.collection::<NodeEvent>(COLL_NODE_EVENTS).insert_one(&event).await?;
        Ok(())
    }

    async fn append_attendance(&self, record: AttendanceRecord) -> Result<(), StoreError> {
        self.db.collection::<AttendanceRecord>(COLL_ATTENDANCE).insert_one(&record).await?;
        Ok(())
    }

    fn database_name(&self) -> &str {
        self.db.name()
    }

    async fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.db.list_collection_names().await?)
    }
}

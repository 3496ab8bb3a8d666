use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use std::fmt;
use std::str::FromStr;
use crate::lib::status::{Liveness, NodeStatus};
use crate::structs::location::LocationInput;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RamUnit {
    #[default]
    MB,
    GB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StorageUnit {
    MB,
    #[default]
    GB,
    TB,
}

impl FromStr for RamUnit {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MB" => Ok(Self::MB),
            "GB" => Ok(Self::GB),
            _ => Err(format!("invalid ram_unit '{}' (expected MB or GB)", s.trim())),
        }
    }
}

impl FromStr for StorageUnit {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MB" => Ok(Self::MB),
            "GB" => Ok(Self::GB),
            "TB" => Ok(Self::TB),
            _ => Err(format!("invalid storage_unit '{}' (expected MB, GB or TB)", s.trim())),
        }
    }
}


/// Node identity fields that must be unique across the collection.
/// The order of the variants is the order in which collisions are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeField {
    Name,
    IpAddress,
    MacAddress,
}

impl NodeField {
    pub const PRIORITY: [NodeField; 3] = [NodeField::Name, NodeField::IpAddress, NodeField::MacAddress];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeField::Name => "name",
            NodeField::IpAddress => "ip_address",
            NodeField::MacAddress => "mac_address",
        }
    }

    /// Whether `node` holds the same value for this field as `identity`.
    /// MAC addresses compare without case, since older records may hold
    /// lower-case ones.
    pub fn collides(self, node: &Node, identity: &NodeIdentity<'_>) -> bool {
        match self {
            NodeField::Name => identity.name == Some(node.name.as_str()),
            NodeField::IpAddress => identity.ip_address == Some(node.ip_address.as_str()),
            NodeField::MacAddress => identity
                .mac_address
                .is_some_and(|mac| mac.eq_ignore_ascii_case(&node.mac_address)),
        }
    }
}

impl fmt::Display for NodeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// Represents the structure of a node (sensor device) stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename="_id", skip_serializing_if="Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub model: Option<String>,
    pub brand: Option<String>,
    pub ram_size: i32,
    pub ram_unit: RamUnit,
    pub storage_size: i32,
    pub storage_unit: StorageUnit,
    pub storage_type: String,
    pub is_poe_compatible: bool,
    pub is_wireless_connectivity: bool,
    pub location_id: Option<ObjectId>,
    #[serde(default, with = "crate::structs::bson_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::structs::bson_time", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}


/// Identity values looked up for collisions. `None` fields are not checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeIdentity<'a> {
    pub name: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub mac_address: Option<&'a str>,
}

impl NodeIdentity<'_> {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.ip_address.is_none() && self.mac_address.is_none()
    }
}


/// Validated partial update of a node. Only `Some` fields are written.
/// `model`/`brand` use a nested option so they can be cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub model: Option<Option<String>>,
    pub brand: Option<Option<String>>,
    pub ram_size: Option<i32>,
    pub ram_unit: Option<RamUnit>,
    pub storage_size: Option<i32>,
    pub storage_unit: Option<StorageUnit>,
    pub storage_type: Option<String>,
    pub is_poe_compatible: Option<bool>,
    pub is_wireless_connectivity: Option<bool>,
    pub location_id: Option<ObjectId>,
}

impl NodePatch {
    pub fn identity(&self) -> NodeIdentity<'_> {
        NodeIdentity {
            name: self.name.as_deref(),
            ip_address: self.ip_address.as_deref(),
            mac_address: self.mac_address.as_deref(),
        }
    }

    /// Applies the patch to an in-memory node.
    pub fn apply(&self, node: &mut Node, now: DateTime<Utc>) {
        if let Some(v) = &self.name { node.name = v.clone(); }
        if let Some(v) = &self.ip_address { node.ip_address = v.clone(); }
        if let Some(v) = &self.mac_address { node.mac_address = v.clone(); }
        if let Some(v) = &self.model { node.model = v.clone(); }
        if let Some(v) = &self.brand { node.brand = v.clone(); }
        if let Some(v) = self.ram_size { node.ram_size = v; }
        if let Some(v) = self.ram_unit { node.ram_unit = v; }
        if let Some(v) = self.storage_size { node.storage_size = v; }
        if let Some(v) = self.storage_unit { node.storage_unit = v; }
        if let Some(v) = &self.storage_type { node.storage_type = v.clone(); }
        if let Some(v) = self.is_poe_compatible { node.is_poe_compatible = v; }
        if let Some(v) = self.is_wireless_connectivity { node.is_wireless_connectivity = v; }
        if let Some(v) = self.location_id { node.location_id = Some(v); }
        node.updated_at = Some(now);
    }
}


/// Node fields as received from the dashboard on create (`POST /v1/nodes`)
/// and partial update (`PATCH /v1/nodes/{id}`). A location can be given
/// either as `location_id` or as an inline `location` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeInput {
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub model: Option<String>,
    pub brand: Option<String>,
    pub ram_size: Option<i32>,
    pub ram_unit: Option<String>,
    pub storage_size: Option<i32>,
    pub storage_unit: Option<String>,
    pub storage_type: Option<String>,
    pub is_poe_compatible: Option<bool>,
    pub is_wireless_connectivity: Option<bool>,
    pub location_id: Option<String>,
    pub location: Option<LocationInput>,
}


/// Node as returned by the API, optionally with its derived liveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub ip_address: String,
    pub mac_address: String,
    pub model: Option<String>,
    pub brand: Option<String>,
    pub ram_size: i32,
    pub ram_unit: RamUnit,
    pub storage_size: i32,
    pub storage_unit: StorageUnit,
    pub storage_type: String,
    pub is_poe_compatible: bool,
    pub is_wireless_connectivity: bool,
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl NodeView {
    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.status = Some(liveness.status);
        self.last_seen = liveness.last_seen;
        self
    }
}

impl From<&Node> for NodeView {
    fn from(n: &Node) -> Self {
        Self {
            id: n.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            name: n.name.clone(),
            ip_address: n.ip_address.clone(),
            mac_address: n.mac_address.clone(),
            model: n.model.clone(),
            brand: n.brand.clone(),
            ram_size: n.ram_size,
            ram_unit: n.ram_unit,
            storage_size: n.storage_size,
            storage_unit: n.storage_unit,
            storage_type: n.storage_type.clone(),
            is_poe_compatible: n.is_poe_compatible,
            is_wireless_connectivity: n.is_wireless_connectivity,
            location_id: n.location_id.map(|oid| oid.to_hex()),
            status: None,
            last_seen: None,
        }
    }
}

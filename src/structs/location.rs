use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;


/// Building level of a location. Seed data stores levels as strings ("3"),
/// while the dashboard may post plain numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Level {
    Number(i64),
    Text(String),
}


/// Represents the structure of a location stored in the database.
/// Optional identity fields are stored as explicit nulls so the
/// (name, building, level, room) unique index treats them consistently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename="_id", skip_serializing_if="Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub building: Option<String>,
    pub level: Option<Level>,
    pub room: Option<String>,
    #[serde(default, skip_serializing_if="Option::is_none")]
    pub description: Option<String>,
    #[serde(default, with = "crate::structs::bson_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::structs::bson_time", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Location {
    pub fn key(&self) -> LocationKey {
        LocationKey {
            name: self.name.clone(),
            building: self.building.clone(),
            level: self.level.clone(),
            room: self.room.clone(),
        }
    }
}


/// The identity 4-tuple of a location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey {
    pub name: String,
    pub building: Option<String>,
    pub level: Option<Level>,
    pub room: Option<String>,
}


/// Location fields as received from the dashboard, either on
/// `POST /v1/locations` or inline in a node request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationInput {
    pub name: Option<String>,
    pub building: Option<String>,
    pub level: Option<Level>,
    pub room: Option<String>,
    pub description: Option<String>,
}


/// Location as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub building: Option<String>,
    pub level: Option<Level>,
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&Location> for LocationView {
    fn from(l: &Location) -> Self {
        Self {
            id: l.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            name: l.name.clone(),
            building: l.building.clone(),
            level: l.level.clone(),
            room: l.room.clone(),
            description: l.description.clone(),
        }
    }
}

use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::oid::ObjectId;


/// Power/data status signal written by a node (`nodeEvents` collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEvent {
    #[serde(rename="_id", skip_serializing_if="Option::is_none")]
    pub id: Option<ObjectId>,
    pub node_id: ObjectId,
    pub is_powered: bool,
    pub is_receiving_data: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub date_time: DateTime<Utc>,
}


/// A device sighting logged by a node (`attendanceHistory` collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename="_id", skip_serializing_if="Option::is_none")]
    pub id: Option<ObjectId>,
    pub node_id: ObjectId,
    pub packet_type: i32,
    pub device_id: String, // hashed device id
    pub signal_strength: Option<i32>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub date_time: DateTime<Utc>,
}


/// A node together with the timestamps of its most recent telemetry.
#[derive(Debug, Clone)]
pub struct NodeSignals {
    pub node: super::node::Node,
    pub last_event: Option<DateTime<Utc>>,
    pub last_attendance: Option<DateTime<Utc>>,
}

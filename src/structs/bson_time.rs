//! Optional chrono timestamps stored as BSON datetimes. Documents written
//! by the provisioning script carry no timestamps, so a missing or null
//! field reads as `None`.
//!
//! Use with `#[serde(default, with = "crate::structs::bson_time")]`.

use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    value.map(bson::DateTime::from_chrono).serialize(serializer)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|dt| dt.to_chrono()))
}

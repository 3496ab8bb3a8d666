//! # status.rs
//!
//! Read-time liveness of nodes. A node is online when its most recent
//! signal, from either the node event stream or the attendance stream,
//! lies within the freshness window. Nothing here is stored.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use crate::lib::constants::FRESHNESS_WINDOW_MIN;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub last_seen: Option<DateTime<Utc>>,
    pub status: NodeStatus,
}


/// Fleet level counts, serialized the way the dashboard stat cards read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total: u64,
    pub online: u64,
    pub offline: u64,
    #[serde(rename = "windowMin")]
    pub window_min: i64,
}

impl FleetSummary {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = NodeStatus>,
    {
        let (total, online) = statuses.into_iter().fold((0u64, 0u64), |(total, online), s| {
            (total + 1, online + u64::from(s == NodeStatus::Online))
        });
        Self { total, online, offline: total - online, window_min: FRESHNESS_WINDOW_MIN }
    }
}


pub fn freshness_window() -> Duration {
    Duration::minutes(FRESHNESS_WINDOW_MIN)
}

/// The newer of the two timestamps. A missing side never wins.
pub fn last_seen(
    last_event: Option<DateTime<Utc>>,
    last_attendance: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    last_event.max(last_attendance)
}

pub fn derive(
    last_event: Option<DateTime<Utc>>,
    last_attendance: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Liveness {
    let last_seen = last_seen(last_event, last_attendance);
    let status = match last_seen {
        Some(ts) if now - ts <= freshness_window() => NodeStatus::Online,
        _ => NodeStatus::Offline,
    };
    Liveness { last_seen, status }
}

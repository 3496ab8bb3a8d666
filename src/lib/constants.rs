//! # constants.rs
//!
//! This module contains constant values shared by the bridge: collection
//! names, index names, defaults and the liveness window.

/// Default port used when running the service.
pub const PUBLIC_PORT: u16 = 8080;

/// Default interface the server binds to.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default database name
pub const DEFAULT_DB_NAME: &str = "dynamicpopulationdensity_db";

/// Name and version reported by `GET /`
pub const SERVICE_NAME: &str = "hivemetrics-bridge API";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

// Collection names
pub const COLL_LOCATIONS: &str = "locations";
pub const COLL_NODES: &str = "nodes";
pub const COLL_NODE_EVENTS: &str = "nodeEvents";
pub const COLL_ATTENDANCE: &str = "attendanceHistory";

// Index names. Duplicate key errors are mapped back to fields through these.
pub const IDX_NODE_NAME: &str = "uniq_node_name";
pub const IDX_NODE_IP: &str = "uniq_node_ip_address";
pub const IDX_NODE_MAC: &str = "uniq_node_mac_address";
pub const IDX_NODE_LOCATION: &str = "uniq_node_per_location";
pub const IDX_LOCATION_IDENTITY: &str = "uniq_location_identity";
pub const IDX_EVENTS_BY_NODE: &str = "node_date_desc";
pub const IDX_ATTENDANCE_BY_NODE: &str = "node_attendance_date_desc";

/// Minutes since the last signal within which a node counts as online.
pub const FRESHNESS_WINDOW_MIN: i64 = 10;

// Hardware defaults applied when a node request leaves them out
pub const DEFAULT_RAM_SIZE: i32 = 0;
pub const DEFAULT_STORAGE_SIZE: i32 = 0;
pub const DEFAULT_STORAGE_TYPE: &str = "microSD";

// Session token lifetimes
pub const ACCESS_TOKEN_TTL_MIN: i64 = 10;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;
pub const REFRESH_COOKIE: &str = "refresh";

// Demo sign-in defaults
pub const DEFAULT_DEMO_EMAIL: &str = "demo@hivemetrics.local";
pub const DEFAULT_DEMO_PASSWORD: &str = "letmein123";

/// Dev server origins of the dashboard SPA, allowed by CORS unless overridden.
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];

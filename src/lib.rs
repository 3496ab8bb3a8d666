pub mod api {
    pub mod auth;
    pub mod health;
    pub mod locations;
    pub mod nodes;
    pub mod routes;
}

pub mod lib {
    pub mod auth;
    pub mod config;
    pub mod constants;
    pub mod errors;
    pub mod initializer;
    pub mod memory_store;
    pub mod mongodb;
    pub mod registry;
    pub mod status;
    pub mod store;
    pub mod validation;
}

pub mod structs {
    pub mod bson_time;
    pub mod location;
    pub mod node;
    pub mod telemetry;
}

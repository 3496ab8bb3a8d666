//! # config.rs
//!
//! Runtime configuration, read once at startup from `.env` and the process
//! environment and then passed explicitly to whatever needs it.

use std::env;
use std::path::PathBuf;
use dotenv::dotenv;
use crate::lib::constants::{
    DEFAULT_CORS_ORIGINS, DEFAULT_DB_NAME, DEFAULT_DEMO_EMAIL, DEFAULT_DEMO_PASSWORD, DEFAULT_HOST,
    PUBLIC_PORT,
};
use crate::lib::errors::ConfigError;


/// Which `HiveStore` implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}


#[derive(Debug, Clone)]
pub struct Config {
    /// Only `None` when running on the memory store.
    pub mongodb_uri: Option<String>,
    pub db_name: String,
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub seed: bool,
    pub cors_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
    pub jwt_secret: Option<String>,
    pub refresh_secret: Option<String>,
    pub demo_email: String,
    pub demo_password: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(source: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| source(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let store = match get("HIVE_STORE").as_deref() {
            None | Some("mongo") | Some("mongodb") => StoreBackend::Mongo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => return Err(ConfigError::Invalid { var: "HIVE_STORE", value: other.to_string() }),
        };

        let mongodb_uri = match get("MONGODB_URI") {
            Some(uri) => Some(uri),
            None => match get("MONGO_HOST") {
                Some(host) => {
                    let port = get("MONGO_PORT").ok_or(ConfigError::Missing("MONGO_PORT"))?;
                    let user = get("MONGO_ROOT_USERNAME").ok_or(ConfigError::Missing("MONGO_ROOT_USERNAME"))?;
                    let pass = get("MONGO_ROOT_PASSWORD").ok_or(ConfigError::Missing("MONGO_ROOT_PASSWORD"))?;
                    Some(format!("mongodb://{}:{}@{}:{}/", user, pass, host, port))
                }
                None => None,
            },
        };
        if store == StoreBackend::Mongo && mongodb_uri.is_none() {
            return Err(ConfigError::Missing("MONGODB_URI"));
        }

        let port = match get("PORT") {
            Some(p) => p.parse::<u16>().map_err(|_| ConfigError::Invalid { var: "PORT", value: p })?,
            None => PUBLIC_PORT,
        };

        let seed = match get("HIVE_SEED") {
            Some(v) => parse_flag(&v).ok_or(ConfigError::Invalid { var: "HIVE_SEED", value: v })?,
            None => false,
        };

        let cors_origins = match get("CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            mongodb_uri,
            db_name: get("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            store,
            seed,
            cors_origins,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            jwt_secret: get("JWT_SECRET"),
            refresh_secret: get("REFRESH_SECRET"),
            demo_email: get("DEMO_EMAIL").unwrap_or_else(|| DEFAULT_DEMO_EMAIL.to_string()),
            demo_password: get("DEMO_PASSWORD").unwrap_or_else(|| DEFAULT_DEMO_PASSWORD.to_string()),
        })
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

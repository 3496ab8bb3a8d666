use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use thiserror::Error;


/// Failures reported by a `HiveStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write. `field` names the colliding field.
    #[error("{field} already exists")]
    Duplicate { field: &'static str },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A document could not be converted to or from its stored form.
    #[error("document codec error: {0}")]
    Codec(String),
}


/// Error taxonomy of the node/location registry.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Identity collision. `field` is the highest priority colliding field,
    /// `fields` lists every colliding field in priority order.
    #[error("{field} already exists")]
    Duplicate { field: &'static str, fields: Vec<&'static str> },

    #[error("location already assigned to node \"{node_name}\"")]
    LocationOccupied { node_id: ObjectId, node_name: String },

    #[error("Location cannot be deleted - assigned to node")]
    LocationInUse { node_id: ObjectId, node_name: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Duplicate { .. } | Self::LocationOccupied { .. } | Self::LocationInUse { .. }
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate { field } => Self::Duplicate { field, fields: vec![field] },
            StoreError::Unavailable(msg) | StoreError::Codec(msg) => Self::StoreUnavailable(msg),
        }
    }
}


/// Problems found while reading the environment at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },
}


/// Session token and sign-in failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("demo-only")]
    DemoOnly,

    #[error("invalid")]
    InvalidCredentials,

    #[error("missing sub")]
    MissingSub,

    #[error("Missing token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("no refresh token")]
    MissingRefresh,

    #[error("invalid refresh token")]
    InvalidRefresh,

    #[error("token signing failed: {0}")]
    Signing(String),
}


#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub msg: String,
    pub details: Option<Value>,
}
impl ApiError {
    fn new(status: StatusCode, msg: impl std::fmt::Display) -> Self {
        Self { status, msg: msg.to_string(), details: None }
    }
    pub fn bad_request(e: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, e)
    }
    pub fn unauthorized(e: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, e)
    }
    pub fn not_found(e: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, e)
    }
    pub fn conflict(e: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::CONFLICT, e)
    }
    pub fn internal_error(e: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e)
    }
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.msg)
    }
}
impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode { self.status }
    fn error_response(&self) -> HttpResponse {
        let mut body = json!({ "error": self.msg });
        if let (Some(Value::Object(extra)), Value::Object(map)) = (&self.details, &mut body) {
            for (k, v) in extra {
                map.insert(k.clone(), v.clone());
            }
        }
        HttpResponse::build(self.status).json(body)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match &e {
            ServiceError::Validation(_) => ApiError::bad_request(&e),
            ServiceError::NotFound(_) => ApiError::not_found(&e),
            ServiceError::Duplicate { fields, .. } => {
                ApiError::conflict(&e).with_details(json!({ "fields": fields }))
            }
            ServiceError::LocationOccupied { node_id, node_name }
            | ServiceError::LocationInUse { node_id, node_name } => ApiError::conflict(&e)
                .with_details(json!({ "nodeId": node_id.to_hex(), "nodeName": node_name })),
            ServiceError::StoreUnavailable(_) => {
                log::error!("Store failure: {}", e);
                ApiError::internal_error("internal error")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::DemoOnly | AuthError::MissingSub => ApiError::bad_request(&e),
            AuthError::Signing(_) => {
                log::error!("Auth failure: {}", e);
                ApiError::internal_error("internal error")
            }
            _ => ApiError::unauthorized(&e),
        }
    }
}

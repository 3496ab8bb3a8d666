use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde_json::json;
use crate::lib::constants::{SERVICE_NAME, SERVICE_VERSION};
use crate::lib::errors::ApiError;
use crate::lib::store::HiveStore;


/// GET /
pub async fn service_banner() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": SERVICE_NAME, "version": SERVICE_VERSION }))
}

/// GET /v1/health
///
/// Reports the database in use and its collections. Answers 500 when the
/// store cannot be reached.
pub async fn health(store: web::Data<dyn HiveStore>) -> Result<impl Responder, ApiError> {
    let collections = store.collection_names().await.map_err(|e| {
        error!("Health check failed: {}", e);
        ApiError::internal_error(e)
    })?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "db": store.database_name(),
        "collections": collections,
    })))
}

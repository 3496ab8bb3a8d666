use actix_web::{
    web::{self, Path},
    HttpResponse, Responder,
};
use chrono::Utc;
use log::debug;
use serde_json::json;
use crate::lib::errors::ApiError;
use crate::lib::registry;
use crate::lib::store::HiveStore;
use crate::structs::node::{NodeInput, NodeView};


/// POST /v1/nodes
pub async fn create_node(
    store: web::Data<dyn HiveStore>,
    body: web::Json<NodeInput>,
) -> Result<impl Responder, ApiError> {
    debug!("Received node: {:?}", body);
    let node = registry::create_node(store.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(NodeView::from(&node)))
}

/// PATCH /v1/nodes/{node_id}
pub async fn update_node(
    store: web::Data<dyn HiveStore>,
    path: Path<String>,
    body: web::Json<NodeInput>,
) -> Result<impl Responder, ApiError> {
    let node_id = path.into_inner();
    debug!("Received update for node {}: {:?}", node_id, body);
    let node = registry::update_node(store.get_ref(), &node_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(NodeView::from(&node)))
}

/// DELETE /v1/nodes/{node_id}
pub async fn delete_node(
    store: web::Data<dyn HiveStore>,
    path: Path<String>,
) -> Result<impl Responder, ApiError> {
    let node_id = path.into_inner();
    registry::delete_node(store.get_ref(), &node_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

/// GET /v1/nodes/all
///
/// Every node with `status` and `last_seen` derived at request time.
pub async fn get_nodes(store: web::Data<dyn HiveStore>) -> Result<impl Responder, ApiError> {
    let nodes = registry::list_nodes(store.get_ref(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(nodes))
}

/// GET /v1/nodes/summary
pub async fn get_summary(store: web::Data<dyn HiveStore>) -> Result<impl Responder, ApiError> {
    let summary = registry::summarize(store.get_ref(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// GET /v1/nodes/count
pub async fn get_count(store: web::Data<dyn HiveStore>) -> Result<impl Responder, ApiError> {
    let count = registry::count_nodes(store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "count": count })))
}

use actix_web::{
    web::{self, Path},
    HttpResponse, Responder,
};
use log::debug;
use crate::lib::errors::ApiError;
use crate::lib::registry;
use crate::lib::store::HiveStore;
use crate::structs::location::{LocationInput, LocationView};


/// POST /v1/locations
///
/// Idempotent on (name, building, level, room): 201 with the new location,
/// or 200 with the one that already existed.
pub async fn create_location(
    store: web::Data<dyn HiveStore>,
    body: web::Json<LocationInput>,
) -> Result<impl Responder, ApiError> {
    debug!("Received location: {:?}", body);
    let outcome = registry::create_location(store.get_ref(), body.into_inner()).await?;
    let view = LocationView::from(outcome.location());
    if outcome.is_created() {
        Ok(HttpResponse::Created().json(view))
    } else {
        Ok(HttpResponse::Ok().json(view))
    }
}

/// GET /v1/locations/all
pub async fn get_locations(store: web::Data<dyn HiveStore>) -> Result<impl Responder, ApiError> {
    let locations = registry::list_locations(store.get_ref()).await?;
    let out: Vec<LocationView> = locations.iter().map(LocationView::from).collect();
    Ok(HttpResponse::Ok().json(out))
}

/// DELETE /v1/locations/{location_id}
pub async fn delete_location(
    store: web::Data<dyn HiveStore>,
    path: Path<String>,
) -> Result<impl Responder, ApiError> {
    let location_id = path.into_inner();
    registry::delete_location(store.get_ref(), &location_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

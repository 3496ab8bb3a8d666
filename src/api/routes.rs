use actix_web::{error::JsonPayloadError, web, HttpRequest};
use log::debug;
use crate::api::{auth, health, locations, nodes};
use crate::lib::errors::ApiError;


/// Malformed or mistyped JSON bodies answer 400 with the usual error shape.
fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("Rejected request body: {}", err);
    ApiError::bad_request(format!("invalid JSON body: {}", err)).into()
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(json_error)
}

/// Registers every bridge route. Store and auth keys are expected as app
/// data (`web::Data<dyn HiveStore>` and `web::Data<AuthKeys>`).
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .app_data(json_config())

        .service(web::resource("/").name("/")
            .route(web::get().to(health::service_banner))) // Service name and version
        .service(web::resource("/v1/health").name("/v1/health")
            .route(web::get().to(health::health))) // Database and collections in use

        // Locations
        .service(web::resource("/v1/locations").name("/v1/locations")
            .route(web::post().to(locations::create_location))) // Create, or return the existing one
        .service(web::resource("/v1/locations/all").name("/v1/locations/all")
            .route(web::get().to(locations::get_locations)))
        .service(web::resource("/v1/locations/{location_id}").name("/v1/locations/{location_id}")
            .route(web::delete().to(locations::delete_location))) // Refused while a node is assigned

        // Nodes. The fixed paths are registered before /v1/nodes/{node_id}.
        .service(web::resource("/v1/nodes").name("/v1/nodes")
            .route(web::post().to(nodes::create_node)))
        .service(web::resource("/v1/nodes/all").name("/v1/nodes/all")
            .route(web::get().to(nodes::get_nodes))) // With derived status and last_seen
        .service(web::resource("/v1/nodes/summary").name("/v1/nodes/summary")
            .route(web::get().to(nodes::get_summary)))
        .service(web::resource("/v1/nodes/count").name("/v1/nodes/count")
            .route(web::get().to(nodes::get_count)))
        .service(web::resource("/v1/nodes/{node_id}").name("/v1/nodes/{node_id}")
            .route(web::patch().to(nodes::update_node))
            .route(web::delete().to(nodes::delete_node)))

        // Session tokens
        .service(web::resource("/v1/auth/login").name("/v1/auth/login")
            .route(web::post().to(auth::login)))
        .service(web::resource("/v1/auth/refresh").name("/v1/auth/refresh")
            .route(web::post().to(auth::refresh)))
        .service(web::resource("/v1/auth/msal-bridge").name("/v1/auth/msal-bridge")
            .route(web::post().to(auth::msal_bridge)))
        .service(web::resource("/v1/auth/logout").name("/v1/auth/logout")
            .route(web::post().to(auth::logout)))
        .service(web::resource("/v1/auth/me").name("/v1/auth/me")
            .route(web::get().to(auth::me)));
}

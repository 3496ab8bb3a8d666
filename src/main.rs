use std::sync::Arc;
use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use log::{info, warn};
use hivemetrics_bridge::api::routes;
use hivemetrics_bridge::lib::auth::AuthKeys;
use hivemetrics_bridge::lib::config::{Config, StoreBackend};
use hivemetrics_bridge::lib::initializer::seed_sample_data;
use hivemetrics_bridge::lib::memory_store::MemoryStore;
use hivemetrics_bridge::lib::mongodb::MongoStore;
use hivemetrics_bridge::lib::store::HiveStore;


fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    let store: Arc<dyn HiveStore> = match config.store {
        StoreBackend::Mongo => Arc::new(MongoStore::connect(&config).await?),
        StoreBackend::Memory => {
            warn!("Using the in-memory store, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    if config.seed {
        seed_sample_data(store.as_ref()).await?;
    }

    let keys = web::Data::new(AuthKeys::from_config(&config)?);
    let store = web::Data::from(store);
    let origins = config.cors_origins.clone();
    let static_dir = config.static_dir.clone().filter(|dir| {
        let exists = dir.is_dir();
        if !exists {
            warn!("Static directory {} not found, dashboard will not be served", dir.display());
        }
        exists
    });

    info!("Starting hivemetrics bridge at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let mut app = App::new()
            .wrap(Logger::default())
            .wrap(cors(&origins))

            // Store and token keys shared by every route
            .app_data(store.clone())
            .app_data(keys.clone())
            .configure(routes::configure);

        // Built dashboard, served last so the API routes take precedence
        if let Some(dir) = &static_dir {
            app = app.service(actix_files::Files::new("/", dir).index_file("index.html"));
        }
        app
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

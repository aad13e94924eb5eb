pub mod api;
pub mod atomic;
pub mod auth;
pub mod bus;
pub mod config;
pub mod error;
pub mod hooks;
pub mod model;
pub mod schema;
pub mod server;
pub mod store;
pub mod validation;

use axum::Router;
use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::atomic::Processor;
use crate::bus::{Dispatcher, Services};
use crate::config::AppConfig;
use crate::schema::SchemaContainer;
use crate::server::JsonApiServer;
use crate::store::MemoryStore;
use crate::validation::SchemaValidators;

/// Router for `services`, serving `schemas` under `base_url`.
pub fn build_router(base_url: &str, schemas: Arc<SchemaContainer>, services: Services) -> Router {
    let server = Arc::new(JsonApiServer::new(base_url, schemas));
    let processor = Processor::new(Dispatcher::new(services));
    create_router(AppState::new(server, processor), base_url)
}

/// Router backed by an in-memory store, validating against `schemas`.
pub fn build_app(config: &AppConfig, schemas: Arc<SchemaContainer>) -> Router {
    let store = Arc::new(MemoryStore::new(schemas.clone()));
    let services =
        Services::new(store).with_validators(Arc::new(SchemaValidators::new(schemas.clone())));
    build_router(&config.jsonapi.base_url, schemas, services)
}

/// Load `.env`, configuration and the schema file, then serve until shutdown.
pub async fn run_server() -> anyhow::Result<()> {
    use axum::serve;
    use env_logger::Builder;
    use log::LevelFilter;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    println!("JSON:API Atomic Operations server");

    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    let schemas = Arc::new(SchemaContainer::load(config.schema_path())?);
    println!(
        "Serving {} resource type(s) from {}",
        schemas.resources.len(),
        config.schema_path()
    );

    let app = build_app(&config, schemas);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    println!(
        "Server running on http://{}{}",
        bind_address, config.jsonapi.base_url
    );
    println!(
        "Atomic operations endpoint: POST http://{}{}/operations",
        bind_address, config.jsonapi.base_url
    );

    serve(listener, app).await?;

    Ok(())
}

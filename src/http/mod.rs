mod error;
mod handlers;

pub use error::ApiError;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{dev::Server, http::header, middleware::Condition, web, App, HttpServer};
use std::path::Path;
use std::sync::Arc;

use crate::config::HttpConfig;
use crate::metrics::Metrics;
use crate::service::OrderService;

/// Register the query, health and metrics routes.
///
/// Expects `web::Data<Arc<OrderService>>` and `web::Data<Arc<Metrics>>` in
/// the app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/order/{order_uid}", web::get().to(handlers::get_order))
        .route("/health", web::get().to(handlers::health))
        .route("/metrics", web::get().to(handlers::metrics));
}

/// Browser access policy: GET only, from the configured origins. `"*"`
/// allows any origin.
pub fn cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(300);

    allowed_origins.iter().fold(cors, |cors, origin| {
        if origin == "*" {
            cors.allow_any_origin()
        } else {
            cors.allowed_origin(origin)
        }
    })
}

/// Front-end assets served at `/`. Register after the API routes so they
/// take precedence.
pub fn static_files(dir: &Path) -> Files {
    Files::new("/", dir).index_file("index.html")
}

/// Bind the HTTP server. The returned `Server` must be awaited (or spawned)
/// to start serving; stop it through `Server::handle`.
pub fn start_http_server(
    config: &HttpConfig,
    service: Arc<OrderService>,
    metrics: Arc<Metrics>,
) -> std::io::Result<Server> {
    tracing::info!("🌐 Starting HTTP server on http://{}", config.addr);

    let origins = config.cors_allowed_origins.clone();
    if origins.is_empty() {
        tracing::info!("No CORS origins configured, cross-origin requests are not answered");
    }

    let static_dir = config.static_dir.clone().filter(|dir| {
        let exists = dir.is_dir();
        if !exists {
            tracing::warn!(static_dir = %dir.display(), "Static directory not found, not serving it");
        }
        exists
    });

    let server = HttpServer::new(move || {
        let static_dir = static_dir.clone();
        App::new()
            .wrap(Condition::new(!origins.is_empty(), cors(&origins)))
            .app_data(web::Data::new(service.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .configure(configure)
            .configure(move |cfg| {
                if let Some(dir) = static_dir {
                    cfg.service(static_files(&dir));
                }
            })
    })
    .disable_signals()
    .bind(config.addr.as_str())?
    .run();

    Ok(server)
}

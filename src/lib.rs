pub mod application;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

#[cfg(test)]
mod test_support;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use application::catalog_service::CatalogService;
use application::order_service::OrderService;
use auth::JwtKeys;
use errors::AppError;
use infrastructure::catalog_repo::DieselCatalogRepository;
use infrastructure::order_repo::DieselOrderRepository;

pub use config::Config;
pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    for version in applied {
        log::info!("applied migration {}", version);
    }
    Ok(())
}

/// Build and return an actix-web `Server` bound to the configured address.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(pool: DbPool, config: &Config) -> std::io::Result<actix_web::dev::Server> {
    let orders = web::Data::new(OrderService::new(
        DieselOrderRepository::new(pool.clone())
            .with_lock_timeout(config.checkout_lock_timeout_ms),
    ));
    let catalog = web::Data::new(CatalogService::new(DieselCatalogRepository::new(pool)));
    let keys = web::Data::new(JwtKeys::new(config.jwt_secret.as_bytes()));

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(orders.clone())
            .app_data(catalog.clone())
            .app_data(keys.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .wrap(Logger::default())
            .route("/healthz/", web::get().to(handlers::healthz))
            .service(
                web::scope("/api")
                    .route("/schema/", web::get().to(handlers::openapi_json))
                    .service(
                        web::scope("/catalog")
                            .route(
                                "/categories/",
                                web::get().to(handlers::catalog::list_categories),
                            )
                            .route("/products/", web::get().to(handlers::catalog::list_products))
                            .route(
                                "/products/{id}/",
                                web::get().to(handlers::catalog::get_product),
                            ),
                    )
                    .service(
                        web::scope("/orders")
                            .route("", web::get().to(handlers::orders::list_orders))
                            .route("/me/cart", web::get().to(handlers::orders::my_cart))
                            .route(
                                "/me/cart/add-item",
                                web::post().to(handlers::orders::add_item),
                            )
                            .route(
                                "/me/cart/set-item",
                                web::post().to(handlers::orders::set_item),
                            )
                            .route(
                                "/me/cart/remove-item",
                                web::post().to(handlers::orders::remove_item),
                            )
                            .route(
                                "/me/cart/checkout",
                                web::post().to(handlers::orders::checkout),
                            )
                            .route("/{id}", web::get().to(handlers::orders::get_order)),
                    ),
            )
    })
    .bind(config.addr())?
    .run())
}

use catalog_orders_service::{build_server, create_pool, run_migrations, Config};
use dotenvy::dotenv;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(std::io::Error::other)?;
    log::debug!("loaded {:?}", config);

    let pool = create_pool(&config.database_url, config.pool_max_size)
        .map_err(std::io::Error::other)?;
    run_migrations(&pool).map_err(std::io::Error::other)?;

    log::info!("Starting server at http://{}", config.addr());

    build_server(pool, &config)?.await
}

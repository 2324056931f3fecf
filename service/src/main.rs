use actix_web::{middleware, web, App, HttpServer};
use env_logger::Env;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "fixtures/config.yml".to_string());
    let config = abi::Config::load(&config_path)?;

    log::info!("connecting to {}", config.db.to_url());
    let manager = web::Data::new(service::from_config(&config).await?);

    let addr = (config.server.host.clone(), config.server.port);
    log::info!("starting server at http://{}:{}", addr.0, addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(manager.clone())
            .wrap(middleware::Logger::default())
            .configure(service::routes)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}

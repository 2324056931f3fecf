mod error;
mod handlers;

pub use error::ApiError;

use abi::Config;
use actix_web::web;
use booking::BookingManager;

/// Wire config to a migrated store and a ready manager.
pub async fn from_config(config: &Config) -> anyhow::Result<BookingManager> {
    let manager = BookingManager::from_config(config).await?;
    sqlx::migrate!("../migrations").run(manager.pool()).await?;
    Ok(manager)
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/villas")
            .route("/{id}", web::put().to(handlers::upsert_villa))
            .route("/{id}", web::get().to(handlers::get_villa))
            .route("/{id}/calendar", web::get().to(handlers::villa_calendar))
            .route(
                "/{id}/availability",
                web::get().to(handlers::check_availability),
            )
            .route("/{id}/stats", web::get().to(handlers::villa_stats)),
    )
    .service(
        web::scope("/bookings")
            .route("", web::post().to(handlers::create_booking))
            .route("", web::get().to(handlers::list_bookings))
            .route("/{id}", web::get().to(handlers::get_booking))
            .route("/{id}/confirm", web::post().to(handlers::confirm_booking))
            .route("/{id}/cancel", web::post().to(handlers::cancel_booking)),
    );
}

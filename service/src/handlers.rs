use abi::{BookingQuery, BookingStatus, DateRange, NewBooking, Villa};
use actix_web::{web, HttpResponse};
use booking::{BookingManager, Bookings};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::ApiError;

type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct UpsertVilla {
    pub name: String,
    pub nightly_rate: i64,
    pub max_occupancy: i32,
}

pub async fn upsert_villa(
    manager: web::Data<BookingManager>,
    path: web::Path<String>,
    body: web::Json<UpsertVilla>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let villa = manager
        .upsert_villa(Villa::new(
            path.into_inner(),
            body.name,
            body.nightly_rate,
            body.max_occupancy,
        ))
        .await?;

    Ok(HttpResponse::Ok().json(villa))
}

pub async fn get_villa(
    manager: web::Data<BookingManager>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let villa = manager.get_villa(&path).await?;
    Ok(HttpResponse::Ok().json(villa))
}

pub async fn villa_calendar(
    manager: web::Data<BookingManager>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let occupied = manager.occupied_ranges(&path).await?;
    Ok(HttpResponse::Ok().json(occupied))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Booking id to ignore, for reschedule probes.
    pub exclude: Option<String>,
}

pub async fn check_availability(
    manager: web::Data<BookingManager>,
    path: web::Path<String>,
    params: web::Query<AvailabilityParams>,
) -> Result<HttpResponse> {
    let range = DateRange::new(params.check_in, params.check_out).map_err(ApiError)?;
    let available = manager
        .is_available(&path, range, params.exclude.as_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "available": available })))
}

pub async fn villa_stats(
    manager: web::Data<BookingManager>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let summary = manager.status_counts(&path).await?;
    Ok(HttpResponse::Ok().json(summary))
}

pub async fn create_booking(
    manager: web::Data<BookingManager>,
    body: web::Json<NewBooking>,
) -> Result<HttpResponse> {
    let booking = manager.reserve(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(booking))
}

pub async fn get_booking(
    manager: web::Data<BookingManager>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let booking = manager.get(&path).await?;
    Ok(HttpResponse::Ok().json(booking))
}

pub async fn confirm_booking(
    manager: web::Data<BookingManager>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let booking = manager.confirm(&path).await?;
    Ok(HttpResponse::Ok().json(booking))
}

pub async fn cancel_booking(
    manager: web::Data<BookingManager>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let booking = manager.cancel(&path).await?;
    Ok(HttpResponse::Ok().json(booking))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub villa_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

pub async fn list_bookings(
    manager: web::Data<BookingManager>,
    params: web::Query<ListParams>,
) -> Result<HttpResponse> {
    let params = params.into_inner();

    let query = BookingQuery {
        villa_id: params.villa_id,
        status: params.status,
        from: params.from,
        until: params.until,
    };

    let bookings = manager.query(query).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

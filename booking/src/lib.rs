use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use abi::{
    Booking, BookingId, BookingQuery, DateRange, Error, NewBooking, PricingPolicy, StatusSummary,
    Villa, VillaId,
};
use async_trait::async_trait;
use sqlx::SqlitePool;

mod manager;

/// Reservation engine over a SQLite pool. All writes for one villa funnel
/// through that villa's lock so an availability check and its insert are
/// one indivisible step; unrelated villas never wait on each other.
#[derive(Debug)]
pub struct BookingManager {
    pool: SqlitePool,
    pricing: PricingPolicy,
    villa_locks: Mutex<HashMap<VillaId, Arc<tokio::sync::Mutex<()>>>>,
}

#[async_trait]
pub trait Bookings {
    /// make a reservation: validate, then atomically re-check availability
    /// and insert; the loser of a race on overlapping dates gets
    /// `Error::Unavailable`
    async fn reserve(&self, booking: NewBooking) -> Result<Booking, Error>;
    /// confirm a pending booking
    async fn confirm(&self, id: &str) -> Result<Booking, Error>;
    /// cancel a pending or confirmed booking, releasing its dates
    async fn cancel(&self, id: &str) -> Result<Booking, Error>;
    /// get booking by id
    async fn get(&self, id: &str) -> Result<Booking, Error>;
    /// can this window still be booked? `exclude` skips one booking id to
    /// support reschedule checks
    async fn is_available(
        &self,
        villa_id: &str,
        range: DateRange,
        exclude: Option<&BookingId>,
    ) -> Result<bool, Error>;
    /// occupied windows for a villa, check-in ascending; pending and
    /// confirmed only
    async fn occupied_ranges(&self, villa_id: &str) -> Result<Vec<DateRange>, Error>;
    /// filter bookings, check-in ascending
    async fn query(&self, query: BookingQuery) -> Result<Vec<Booking>, Error>;
    /// booking counts per status for one villa
    async fn status_counts(&self, villa_id: &str) -> Result<StatusSummary, Error>;
    /// catalog upsert; never touches existing bookings
    async fn upsert_villa(&self, villa: Villa) -> Result<Villa, Error>;
    /// get villa by id
    async fn get_villa(&self, villa_id: &str) -> Result<Villa, Error>;
}

use std::sync::Arc;

use abi::{
    is_transient, Booking, BookingConflict, BookingId, BookingQuery, BookingStatus, Config,
    DateRange, Error, NewBooking, PricingPolicy, StatusSummary, Villa,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{sqlite::SqlitePoolOptions, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{BookingManager, Bookings};

const READ_RETRIES: u32 = 3;

/// Re-runs a read on transient store failures, a bounded number of times.
/// Only reads go through this; a write retried after an ambiguous failure
/// could book twice.
macro_rules! retry_read {
    ($op:expr) => {{
        let mut attempt = 0;
        loop {
            match $op {
                Err(e) if is_transient(&e) && attempt + 1 < READ_RETRIES => {
                    attempt += 1;
                    log::warn!("transient store error, retrying read (attempt {attempt}): {e}");
                }
                other => break other,
            }
        }
    }};
}

impl BookingManager {
    pub fn new(pool: SqlitePool, pricing: PricingPolicy) -> Self {
        Self {
            pool,
            pricing,
            villa_locks: Default::default(),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.db.max_connections)
            .connect(&config.db.to_url())
            .await?;

        Ok(Self::new(pool, config.pricing))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// One lock per villa id. Lock granularity is the unit, so bookings
    /// for different villas never serialize against each other.
    fn villa_lock(&self, villa_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .villa_locks
            .lock()
            .expect("villa lock registry poisoned");
        locks.entry(villa_id.to_string()).or_default().clone()
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Booking>, Error> {
        let booking = retry_read!(
            sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE idempotency_key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
        )?;

        Ok(booking)
    }

    async fn transition(&self, id: &str, next: BookingStatus) -> Result<Booking, Error> {
        // The status guard lives in the UPDATE itself, so two actors racing
        // on the same row cannot both win.
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE bookings SET status = ");
        qb.push_bind(next);
        qb.push(" WHERE id = ");
        qb.push_bind(id.to_string());
        qb.push(" AND status IN (");
        let mut from_statuses = qb.separated(", ");
        for from in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            if from.can_transition_to(next) {
                from_statuses.push_bind(from);
            }
        }
        qb.push(") RETURNING *");

        match qb
            .build_query_as::<Booking>()
            .fetch_optional(&self.pool)
            .await?
        {
            Some(booking) => {
                log::info!("booking {} is now {}", booking.id, booking.status);
                Ok(booking)
            }
            None => {
                // No row moved: distinguish a missing booking from a
                // lifecycle violation.
                let current = self.get(id).await?;
                Err(Error::InvalidTransition {
                    id: id.to_string(),
                    from: current.status,
                    to: next,
                })
            }
        }
    }
}

#[async_trait]
impl Bookings for BookingManager {
    async fn reserve(&self, booking: NewBooking) -> Result<Booking, Error> {
        let range = booking.validate()?;

        let villa = self.get_villa(&booking.villa_id).await?;
        if booking.guests > villa.max_occupancy {
            return Err(Error::OccupancyExceeded {
                requested: booking.guests,
                max: villa.max_occupancy,
            });
        }

        let lock = self.villa_lock(&villa.id);
        let _guard = lock.lock().await;

        // Under the lock, so two replays of the same key serialize: the
        // first inserts, the second gets the original row back.
        if let Some(key) = &booking.idempotency_key {
            if let Some(existing) = self.find_by_idempotency_key(key).await? {
                return Ok(existing);
            }
        }

        // Check and insert share one transaction under the villa lock: a
        // timeout or caller cancellation rolls back to no booking at all.
        let mut tx = self.pool.begin().await?;

        if let Some(existing) = blocking_range(&mut *tx, &villa.id, range, None).await? {
            return Err(Error::Unavailable(BookingConflict {
                villa_id: villa.id,
                requested: range,
                existing,
            }));
        }

        let total_price = self.pricing.total(villa.nightly_rate, &range);
        let id = Uuid::new_v4().to_string();

        let created = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings \
             (id, villa_id, guest_name, guest_contact, check_in, check_out, guests, total_price, status, idempotency_key) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?) RETURNING *",
        )
        .bind(&id)
        .bind(&booking.villa_id)
        .bind(&booking.guest_name)
        .bind(&booking.guest_contact)
        .bind(range.check_in)
        .bind(range.check_out)
        .bind(booking.guests)
        .bind(total_price)
        .bind(&booking.idempotency_key)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!(
            "reserved villa {} [{}, {}) for {} ({})",
            created.villa_id,
            created.check_in,
            created.check_out,
            created.total_price,
            created.id,
        );

        Ok(created)
    }

    async fn confirm(&self, id: &str) -> Result<Booking, Error> {
        self.transition(id, BookingStatus::Confirmed).await
    }

    async fn cancel(&self, id: &str) -> Result<Booking, Error> {
        self.transition(id, BookingStatus::Cancelled).await
    }

    async fn get(&self, id: &str) -> Result<Booking, Error> {
        let booking = retry_read!(
            sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
        )?;

        booking.ok_or_else(|| Error::BookingNotFound(id.to_string()))
    }

    async fn is_available(
        &self,
        villa_id: &str,
        range: DateRange,
        exclude: Option<&BookingId>,
    ) -> Result<bool, Error> {
        let range = DateRange::new(range.check_in, range.check_out)?;
        self.get_villa(villa_id).await?;

        let exclude = exclude.map(String::as_str);
        let hit = retry_read!(blocking_range(&self.pool, villa_id, range, exclude).await)?;

        Ok(hit.is_none())
    }

    async fn occupied_ranges(&self, villa_id: &str) -> Result<Vec<DateRange>, Error> {
        self.get_villa(villa_id).await?;

        // Single statement, so the calendar is one consistent snapshot.
        let rows: Vec<(NaiveDate, NaiveDate)> = retry_read!(
            sqlx::query_as(
                "SELECT check_in, check_out FROM bookings \
                 WHERE villa_id = ? AND status IN ('pending', 'confirmed') \
                 ORDER BY check_in",
            )
            .bind(villa_id)
            .fetch_all(&self.pool)
            .await
        )?;

        Ok(rows
            .into_iter()
            .map(|(check_in, check_out)| DateRange {
                check_in,
                check_out,
            })
            .collect())
    }

    async fn query(&self, query: BookingQuery) -> Result<Vec<Booking>, Error> {
        query.validate()?;

        let bookings = retry_read!(run_query(&self.pool, &query).await)?;
        Ok(bookings)
    }

    async fn status_counts(&self, villa_id: &str) -> Result<StatusSummary, Error> {
        self.get_villa(villa_id).await?;

        let rows: Vec<(BookingStatus, i64)> = retry_read!(
            sqlx::query_as(
                "SELECT status, COUNT(*) FROM bookings WHERE villa_id = ? GROUP BY status",
            )
            .bind(villa_id)
            .fetch_all(&self.pool)
            .await
        )?;

        let mut summary = StatusSummary::default();
        for (status, count) in rows {
            match status {
                BookingStatus::Pending => summary.pending = count,
                BookingStatus::Confirmed => summary.confirmed = count,
                BookingStatus::Cancelled => summary.cancelled = count,
            }
        }

        Ok(summary)
    }

    async fn upsert_villa(&self, villa: Villa) -> Result<Villa, Error> {
        villa.validate()?;

        sqlx::query(
            "INSERT INTO villas (id, name, nightly_rate, max_occupancy) VALUES (?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
             name = excluded.name, \
             nightly_rate = excluded.nightly_rate, \
             max_occupancy = excluded.max_occupancy",
        )
        .bind(&villa.id)
        .bind(&villa.name)
        .bind(villa.nightly_rate)
        .bind(villa.max_occupancy)
        .execute(&self.pool)
        .await?;

        Ok(villa)
    }

    async fn get_villa(&self, villa_id: &str) -> Result<Villa, Error> {
        let villa = retry_read!(
            sqlx::query_as::<_, Villa>("SELECT * FROM villas WHERE id = ?")
                .bind(villa_id)
                .fetch_optional(&self.pool)
                .await
        )?;

        villa.ok_or_else(|| Error::VillaNotFound(villa_id.to_string()))
    }
}

/// Earliest pending/confirmed booking holding any night of `range`, if one
/// exists. Half-open test: `[a, b)` blocks `[c, d)` iff `a < d && c < b`,
/// so back-to-back stays on the same calendar day pass.
async fn blocking_range<'e, E>(
    executor: E,
    villa_id: &str,
    range: DateRange,
    exclude: Option<&str>,
) -> Result<Option<DateRange>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: Option<(NaiveDate, NaiveDate)> = sqlx::query_as(
        "SELECT check_in, check_out FROM bookings \
         WHERE villa_id = ? AND status IN ('pending', 'confirmed') \
         AND check_in < ? AND check_out > ? \
         AND (? IS NULL OR id <> ?) \
         ORDER BY check_in LIMIT 1",
    )
    .bind(villa_id)
    .bind(range.check_out)
    .bind(range.check_in)
    .bind(exclude)
    .bind(exclude)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|(check_in, check_out)| DateRange {
        check_in,
        check_out,
    }))
}

async fn run_query(pool: &SqlitePool, query: &BookingQuery) -> Result<Vec<Booking>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM bookings WHERE 1 = 1");

    if let Some(villa_id) = &query.villa_id {
        qb.push(" AND villa_id = ");
        qb.push_bind(villa_id.clone());
    }

    if let Some(status) = query.status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }

    if let Some(until) = query.until {
        qb.push(" AND check_in < ");
        qb.push_bind(until);
    }

    if let Some(from) = query.from {
        qb.push(" AND check_out > ");
        qb.push_bind(from);
    }

    qb.push(" ORDER BY check_in");

    qb.build_query_as::<Booking>().fetch_all(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const VILLA: &str = "villa-uluwatu-9";

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn range(check_in: &str, check_out: &str) -> DateRange {
        DateRange::new(date(check_in), date(check_out)).unwrap()
    }

    fn request(check_in: &str, check_out: &str) -> NewBooking {
        NewBooking::new(
            VILLA,
            "Made Wira",
            "+62 812 0000 1111",
            date(check_in),
            date(check_out),
            2,
        )
    }

    async fn test_manager() -> BookingManager {
        test_manager_with(PricingPolicy::default()).await
    }

    async fn test_manager_with(pricing: PricingPolicy) -> BookingManager {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("../migrations").run(&pool).await.unwrap();

        let manager = BookingManager::new(pool, pricing);
        manager
            .upsert_villa(Villa::new(VILLA, "Uluwatu Cliff", 2_500_000, 4))
            .await
            .unwrap();
        manager
    }

    #[tokio::test]
    async fn reserve_should_work_for_valid_window() {
        let manager = test_manager().await;

        let booking = manager.reserve(request("2024-07-01", "2024-07-04")).await.unwrap();

        assert!(!booking.id.is_empty());
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_price, 7_500_000);
        assert_eq!(booking.range(), range("2024-07-01", "2024-07-04"));
    }

    #[tokio::test]
    async fn reserve_applies_service_fee_from_policy() {
        let manager = test_manager_with(PricingPolicy::with_service_fee(5)).await;

        let booking = manager.reserve(request("2024-07-01", "2024-07-04")).await.unwrap();
        assert_eq!(booking.total_price, 7_875_000);
    }

    #[tokio::test]
    async fn overlapping_reserve_should_reject() {
        let manager = test_manager().await;
        manager.reserve(request("2024-01-01", "2024-01-05")).await.unwrap();

        let err = manager
            .reserve(request("2024-01-03", "2024-01-07"))
            .await
            .unwrap_err();

        match err {
            Error::Unavailable(conflict) => {
                assert_eq!(conflict.villa_id, VILLA);
                assert_eq!(conflict.requested, range("2024-01-03", "2024-01-07"));
                assert_eq!(conflict.existing, range("2024-01-01", "2024-01-05"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn back_to_back_stays_both_succeed() {
        let manager = test_manager().await;

        manager.reserve(request("2024-01-01", "2024-01-05")).await.unwrap();
        manager.reserve(request("2024-01-05", "2024-01-10")).await.unwrap();

        let occupied = manager.occupied_ranges(VILLA).await.unwrap();
        assert_eq!(
            occupied,
            vec![range("2024-01-01", "2024-01-05"), range("2024-01-05", "2024-01-10")]
        );
    }

    #[tokio::test]
    async fn concurrent_reserves_have_one_winner() {
        let manager = test_manager().await;

        let (a, b) = tokio::join!(
            manager.reserve(request("2024-03-01", "2024-03-03")),
            manager.reserve(request("2024-03-01", "2024-03-03")),
        );

        assert!(
            a.is_ok() != b.is_ok(),
            "exactly one of the two racing reserves must win: {a:?} / {b:?}"
        );
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(Error::Unavailable(_))));

        let rows = manager.query(BookingQuery::for_villa(VILLA)).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn occupancy_exceeded_creates_no_booking() {
        let manager = test_manager().await;

        let mut booking = request("2024-07-01", "2024-07-04");
        booking.guests = 5;

        let err = manager.reserve(booking).await.unwrap_err();
        assert_eq!(err, Error::OccupancyExceeded { requested: 5, max: 4 });

        let rows = manager.query(BookingQuery::for_villa(VILLA)).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn reserve_unknown_villa_should_reject() {
        let manager = test_manager().await;

        let mut booking = request("2024-07-01", "2024-07-04");
        booking.villa_id = "villa-nowhere".to_string();

        let err = manager.reserve(booking).await.unwrap_err();
        assert_eq!(err, Error::VillaNotFound("villa-nowhere".to_string()));
    }

    #[tokio::test]
    async fn confirm_then_cancel_should_walk_the_lifecycle() {
        let manager = test_manager().await;
        let booking = manager.reserve(request("2024-06-01", "2024-06-05")).await.unwrap();

        let confirmed = manager.confirm(&booking.id).await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        // dates and price never move with the status
        assert_eq!(confirmed.range(), booking.range());
        assert_eq!(confirmed.total_price, booking.total_price);

        let cancelled = manager.cancel(&booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancelling_frees_the_window() {
        let manager = test_manager().await;
        let booking = manager.reserve(request("2024-06-01", "2024-06-05")).await.unwrap();
        manager.confirm(&booking.id).await.unwrap();
        manager.cancel(&booking.id).await.unwrap();

        assert!(manager
            .is_available(VILLA, range("2024-06-01", "2024-06-05"), None)
            .await
            .unwrap());
        manager.reserve(request("2024-06-01", "2024-06-05")).await.unwrap();
    }

    #[tokio::test]
    async fn double_cancel_should_reject() {
        let manager = test_manager().await;
        let booking = manager.reserve(request("2024-06-01", "2024-06-05")).await.unwrap();
        manager.cancel(&booking.id).await.unwrap();

        let err = manager.cancel(&booking.id).await.unwrap_err();
        assert_eq!(
            err,
            Error::InvalidTransition {
                id: booking.id.clone(),
                from: BookingStatus::Cancelled,
                to: BookingStatus::Cancelled,
            }
        );

        let current = manager.get(&booking.id).await.unwrap();
        assert_eq!(current.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn confirm_cancelled_should_reject() {
        let manager = test_manager().await;
        let booking = manager.reserve(request("2024-06-01", "2024-06-05")).await.unwrap();
        manager.cancel(&booking.id).await.unwrap();

        let err = manager.confirm(&booking.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn transition_on_unknown_booking_should_reject() {
        let manager = test_manager().await;

        let err = manager.confirm("no-such-booking").await.unwrap_err();
        assert_eq!(err, Error::BookingNotFound("no-such-booking".to_string()));
    }

    #[tokio::test]
    async fn idempotency_key_replay_returns_original() {
        let manager = test_manager().await;

        let booking = request("2024-08-01", "2024-08-04").with_idempotency_key("intake-42");
        let first = manager.reserve(booking.clone()).await.unwrap();
        let replay = manager.reserve(booking).await.unwrap();

        assert_eq!(first, replay);
        let rows = manager.query(BookingQuery::for_villa(VILLA)).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn is_available_exclude_supports_reschedule() {
        let manager = test_manager().await;
        let booking = manager.reserve(request("2024-09-01", "2024-09-05")).await.unwrap();

        // shifting the same booking by a day is fine once it ignores itself
        let shifted = range("2024-09-02", "2024-09-06");
        assert!(!manager.is_available(VILLA, shifted, None).await.unwrap());
        assert!(manager
            .is_available(VILLA, shifted, Some(&booking.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn occupied_ranges_excludes_cancelled_and_sorts() {
        let manager = test_manager().await;

        let late = manager.reserve(request("2024-10-20", "2024-10-25")).await.unwrap();
        let dropped = manager.reserve(request("2024-10-10", "2024-10-12")).await.unwrap();
        manager.reserve(request("2024-10-01", "2024-10-05")).await.unwrap();
        manager.confirm(&late.id).await.unwrap();
        manager.cancel(&dropped.id).await.unwrap();

        let occupied = manager.occupied_ranges(VILLA).await.unwrap();
        assert_eq!(
            occupied,
            vec![range("2024-10-01", "2024-10-05"), range("2024-10-20", "2024-10-25")]
        );
    }

    #[tokio::test]
    async fn query_filters_by_status_and_window() {
        let manager = test_manager().await;

        let first = manager.reserve(request("2024-11-01", "2024-11-05")).await.unwrap();
        manager.reserve(request("2024-11-10", "2024-11-12")).await.unwrap();
        manager.confirm(&first.id).await.unwrap();

        let confirmed = manager
            .query(BookingQuery::for_villa(VILLA).with_status(BookingStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, first.id);

        let november_first_week = manager
            .query(BookingQuery::for_villa(VILLA).within(range("2024-11-01", "2024-11-08")))
            .await
            .unwrap();
        assert_eq!(november_first_week.len(), 1);
        assert_eq!(november_first_week[0].id, first.id);
    }

    #[tokio::test]
    async fn status_counts_should_aggregate() {
        let manager = test_manager().await;

        let a = manager.reserve(request("2024-12-01", "2024-12-03")).await.unwrap();
        let b = manager.reserve(request("2024-12-05", "2024-12-07")).await.unwrap();
        manager.reserve(request("2024-12-10", "2024-12-12")).await.unwrap();
        manager.confirm(&a.id).await.unwrap();
        manager.cancel(&b.id).await.unwrap();

        let summary = manager.status_counts(VILLA).await.unwrap();
        assert_eq!(
            summary,
            StatusSummary {
                pending: 1,
                confirmed: 1,
                cancelled: 1,
            }
        );
    }

    #[tokio::test]
    async fn rate_change_never_reprices_existing_bookings() {
        let manager = test_manager().await;
        let booking = manager.reserve(request("2024-07-01", "2024-07-04")).await.unwrap();

        manager
            .upsert_villa(Villa::new(VILLA, "Uluwatu Cliff", 9_000_000, 4))
            .await
            .unwrap();

        let stored = manager.get(&booking.id).await.unwrap();
        assert_eq!(stored.total_price, 7_500_000);

        // but a new booking prices at the new rate
        let fresh = manager.reserve(request("2024-07-10", "2024-07-11")).await.unwrap();
        assert_eq!(fresh.total_price, 9_000_000);
    }
}

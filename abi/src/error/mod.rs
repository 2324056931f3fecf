mod conflict;

use chrono::NaiveDate;
use thiserror::Error;

pub use conflict::*;

use crate::{BookingId, BookingStatus, VillaId};

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid date range: check-in {check_in} is not before check-out {check_out}")]
    InvalidRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("invalid villa id: {0:?}")]
    InvalidVillaId(VillaId),

    #[error("invalid nightly rate: {0}")]
    InvalidNightlyRate(i64),

    #[error("invalid max occupancy: {0}")]
    InvalidMaxOccupancy(i32),

    #[error("invalid guest count: {0}")]
    InvalidGuestCount(i32),

    #[error("guest count {requested} exceeds max occupancy {max}")]
    OccupancyExceeded { requested: i32, max: i32 },

    #[error("date range unavailable: {0}")]
    Unavailable(BookingConflict),

    #[error("booking {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),

    #[error("villa not found: {0}")]
    VillaNotFound(VillaId),

    #[error("db error: {0}")]
    Database(sqlx::Error),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // sqlx::Error is not PartialEq; any two db errors compare equal
            (Self::Database(_), Self::Database(_)) => true,
            (
                Self::InvalidRange {
                    check_in: a1,
                    check_out: b1,
                },
                Self::InvalidRange {
                    check_in: a2,
                    check_out: b2,
                },
            ) => a1 == a2 && b1 == b2,
            (Self::InvalidVillaId(v1), Self::InvalidVillaId(v2)) => v1 == v2,
            (Self::InvalidNightlyRate(v1), Self::InvalidNightlyRate(v2)) => v1 == v2,
            (Self::InvalidMaxOccupancy(v1), Self::InvalidMaxOccupancy(v2)) => v1 == v2,
            (Self::InvalidGuestCount(v1), Self::InvalidGuestCount(v2)) => v1 == v2,
            (
                Self::OccupancyExceeded {
                    requested: r1,
                    max: m1,
                },
                Self::OccupancyExceeded {
                    requested: r2,
                    max: m2,
                },
            ) => r1 == r2 && m1 == m2,
            (Self::Unavailable(v1), Self::Unavailable(v2)) => v1 == v2,
            (
                Self::InvalidTransition {
                    id: i1,
                    from: f1,
                    to: t1,
                },
                Self::InvalidTransition {
                    id: i2,
                    from: f2,
                    to: t2,
                },
            ) => i1 == i2 && f1 == f2 && t1 == t2,
            (Self::BookingNotFound(v1), Self::BookingNotFound(v2)) => v1 == v2,
            (Self::VillaNotFound(v1), Self::VillaNotFound(v2)) => v1 == v2,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e)
    }
}

/// Infrastructure failures worth a bounded retry on read paths. Writes are
/// never retried automatically.
pub fn is_transient(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
}

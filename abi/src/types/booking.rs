use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{BookingId, BookingStatus, DateRange, Error, VillaId};

/// A stored reservation. Dates and total price are snapshotted at intake
/// and never change afterwards; only `status` moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: BookingId,
    pub villa_id: VillaId,
    pub guest_name: String,
    /// Opaque contact blob (phone, email, whatever the caller collected).
    pub guest_contact: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    /// Whole currency units, computed once via the pricing policy.
    pub total_price: i64,
    pub status: BookingStatus,
    pub idempotency_key: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Booking {
    pub fn range(&self) -> DateRange {
        DateRange {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }
}

/// Booking intake payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub villa_id: VillaId,
    pub guest_name: String,
    pub guest_contact: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    /// Client-supplied token so an ambiguous failure can be retried
    /// without booking twice.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl NewBooking {
    pub fn new(
        villa_id: impl Into<String>,
        guest_name: impl Into<String>,
        guest_contact: impl Into<String>,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: i32,
    ) -> Self {
        Self {
            villa_id: villa_id.into(),
            guest_name: guest_name.into(),
            guest_contact: guest_contact.into(),
            check_in,
            check_out,
            guests,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Shape checks that need no store access. Occupancy is checked later
    /// against the villa record.
    pub fn validate(&self) -> Result<DateRange, Error> {
        if self.villa_id.is_empty() {
            return Err(Error::InvalidVillaId(self.villa_id.clone()));
        }

        if self.guests < 1 {
            return Err(Error::InvalidGuestCount(self.guests));
        }

        DateRange::new(self.check_in, self.check_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn validate_should_return_range() {
        let booking = NewBooking::new(
            "villa-uluwatu-9",
            "Made Wira",
            "+62 812 0000 1111",
            date("2024-07-01"),
            date("2024-07-04"),
            2,
        );
        let range = booking.validate().unwrap();
        assert_eq!(range.nights(), 3);
    }

    #[test]
    fn intake_json_omits_idempotency_key_by_default() {
        let booking: NewBooking = serde_json::from_value(serde_json::json!({
            "villa_id": "villa-uluwatu-9",
            "guest_name": "Made Wira",
            "guest_contact": "+62 812 0000 1111",
            "check_in": "2024-07-01",
            "check_out": "2024-07-04",
            "guests": 2,
        }))
        .unwrap();

        assert_eq!(booking.idempotency_key, None);
        assert!(booking.validate().is_ok());
    }

    #[test]
    fn validate_should_reject_bad_input() {
        let mut booking = NewBooking::new(
            "villa-uluwatu-9",
            "Made Wira",
            "+62 812 0000 1111",
            date("2024-07-04"),
            date("2024-07-01"),
            2,
        );
        assert!(matches!(
            booking.validate(),
            Err(Error::InvalidRange { .. })
        ));

        booking.check_out = date("2024-07-08");
        booking.guests = 0;
        assert!(matches!(
            booking.validate(),
            Err(Error::InvalidGuestCount(0))
        ));

        booking.guests = 2;
        booking.villa_id = String::new();
        assert!(matches!(
            booking.validate(),
            Err(Error::InvalidVillaId(_))
        ));
    }
}

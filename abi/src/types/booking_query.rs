use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{BookingStatus, DateRange, Error, VillaId};

/// Filter for the read-only reporting surface. Results are always ordered
/// by check-in ascending. The date window keeps the half-open overlap
/// semantics: a booking matches when its stay intersects `[from, until)`,
/// and either side may be left open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingQuery {
    pub villa_id: Option<VillaId>,
    pub status: Option<BookingStatus>,
    /// Only bookings whose stay ends after this date.
    pub from: Option<NaiveDate>,
    /// Only bookings whose stay starts before this date.
    pub until: Option<NaiveDate>,
}

impl BookingQuery {
    pub fn for_villa(villa_id: impl Into<String>) -> Self {
        Self {
            villa_id: Some(villa_id.into()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn within(mut self, window: DateRange) -> Self {
        self.from = Some(window.check_in);
        self.until = Some(window.check_out);
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let (Some(from), Some(until)) = (self.from, self.until) {
            if from >= until {
                return Err(Error::InvalidRange {
                    check_in: from,
                    check_out: until,
                });
            }
        }

        Ok(())
    }
}

/// Aggregate booking counts per status for one villa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub pending: i64,
    pub confirmed: i64,
    pub cancelled: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn within_sets_both_window_sides() {
        let window = DateRange::new(date("2024-07-01"), date("2024-07-08")).unwrap();
        let query = BookingQuery::for_villa("villa-uluwatu-9").within(window);
        assert_eq!(query.from, Some(date("2024-07-01")));
        assert_eq!(query.until, Some(date("2024-07-08")));
        assert!(query.validate().is_ok());
    }

    #[test]
    fn one_sided_window_is_valid() {
        let query = BookingQuery {
            from: Some(date("2024-07-01")),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
    }

    #[test]
    fn inverted_window_should_reject() {
        let query = BookingQuery {
            from: Some(date("2024-07-08")),
            until: Some(date("2024-07-01")),
            ..Default::default()
        };
        assert!(matches!(query.validate(), Err(Error::InvalidRange { .. })));
    }
}

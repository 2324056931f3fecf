use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Half-open stay window `[check_in, check_out)`: the night of the
/// check-out date is not occupied, so a departing and an arriving guest
/// can share that calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, Error> {
        if check_in >= check_out {
            return Err(Error::InvalidRange {
                check_in,
                check_out,
            });
        }

        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// Whole nights in the stay, always >= 1 for a valid range.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// `[a, b)` and `[c, d)` overlap iff `a < d && c < b`.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{Error, VillaId};

/// Catalog unit. The nightly rate here is only an input to intake; the
/// rate a booking was priced with is snapshotted on the booking row and
/// never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Villa {
    pub id: VillaId,
    pub name: String,
    /// Whole currency units (rupiah) per night.
    pub nightly_rate: i64,
    pub max_occupancy: i32,
}

impl Villa {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        nightly_rate: i64,
        max_occupancy: i32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nightly_rate,
            max_occupancy,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.id.is_empty() {
            return Err(Error::InvalidVillaId(self.id.clone()));
        }

        if self.nightly_rate <= 0 {
            return Err(Error::InvalidNightlyRate(self.nightly_rate));
        }

        if self.max_occupancy <= 0 {
            return Err(Error::InvalidMaxOccupancy(self.max_occupancy));
        }

        Ok(())
    }
}

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{DateRange, VillaId};

/// Why a reservation attempt was refused: the requested window against
/// the earliest booking already holding part of it. The engine finds the
/// blocking row inside the same transaction as the insert, so this is
/// built from data rather than parsed out of a constraint message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConflict {
    pub villa_id: VillaId,
    pub requested: DateRange,
    pub existing: DateRange,
}

impl fmt::Display for BookingConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "villa {}: requested [{}, {}) blocked by existing [{}, {})",
            self.villa_id,
            self.requested.check_in,
            self.requested.check_out,
            self.existing.check_in,
            self.existing.check_out,
        )
    }
}

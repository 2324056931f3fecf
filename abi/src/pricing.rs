use serde::{Deserialize, Serialize};

use crate::DateRange;

/// Pricing input for intake: nightly rate times nights, plus an optional
/// flat service fee. The fee is an explicit configuration value; no flow
/// infers it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Flat service fee in percent, applied after the nightly total and
    /// rounded half-up to the nearest whole currency unit.
    #[serde(default)]
    pub service_fee_percent: Option<u8>,
}

impl PricingPolicy {
    pub fn with_service_fee(percent: u8) -> Self {
        Self {
            service_fee_percent: Some(percent),
        }
    }

    /// Whole-currency total for a stay. Integer arithmetic only, so
    /// identical inputs always produce the identical total.
    pub fn total(&self, nightly_rate: i64, range: &DateRange) -> i64 {
        let base = nightly_rate * range.nights();

        match self.service_fee_percent {
            Some(percent) => base + (base * percent as i64 + 50) / 100,
            None => base,
        }
    }
}

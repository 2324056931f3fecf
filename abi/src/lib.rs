mod config;
mod error;
mod pricing;
mod types;

pub use config::*;
pub use error::*;
pub use pricing::*;
pub use types::*;

/// Opaque unit identifier, supplied by the external catalog.
pub type VillaId = String;

/// Opaque booking identifier, generated at intake.
pub type BookingId = String;

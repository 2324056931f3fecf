mod booking;
mod booking_query;
mod booking_status;
mod date_range;
mod villa;

pub use booking::*;
pub use booking_query::*;
pub use booking_status::*;
pub use date_range::*;
pub use villa::*;

//! Domain models for cross-venue price monitoring.

mod fees;
mod opportunity;
mod sample;
mod venue;

pub use fees::FeeModel;
pub use opportunity::Opportunity;
pub use sample::PriceSample;
pub use venue::Venue;

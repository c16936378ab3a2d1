pub mod bookings;
pub mod directory;
pub mod payments;

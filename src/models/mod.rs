pub mod appointment;
pub mod barber;
pub mod business_hours;
pub mod service;

pub use appointment::{Appointment, AppointmentStatus, BookedSlot};
pub use barber::Barber;
pub use business_hours::BusinessHours;
pub use service::Service;

//! Data models
//!
//! Entities stored by the scheduling backend (User, Session,
//! AvailabilityWindow, Appointment) and the derived views returned to
//! callers (OpenSlot, BookedAppointment, StudentAppointment).

mod appointment;
mod availability;
mod session;
mod user;

pub use appointment::{Appointment, AppointmentStatus, BookedAppointment, StudentAppointment};
pub use availability::{
    AvailabilityWindow, CreatedWindow, OpenSlot, ProfessorSlots, ProfessorSummary, TimeWindow,
};
pub use session::Session;
pub use user::{RegisterInput, User, UserRole};

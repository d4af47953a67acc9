//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They:
//! - Validate input
//! - Enforce the booking rules on top of the store constraints
//! - Translate repository outcomes into typed errors

pub mod appointment;
pub mod availability;
pub mod password;
pub mod user;

pub use appointment::{AppointmentService, BookingError};
pub use availability::{project_open_slots, AvailabilityError, AvailabilityService};
pub use password::{hash_password, verify_password};
pub use user::{UserService, UserServiceError};

//! Appointment service
//!
//! Booking and cancellation.
//!
//! `book` does a cheap pre-check for an existing scheduled appointment so the
//! common conflict is reported without a write, but the pre-check is not what
//! keeps a window single-booked. The insert itself is guarded by the
//! active-claim unique index; a booker that passes the pre-check and then
//! loses the insert race gets the same `Conflict` as one that failed it.

use crate::db::repositories::{AppointmentRepository, AvailabilityRepository, UserRepository};
use crate::models::{Appointment, BookedAppointment, StudentAppointment};
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;

const SLOT_UNAVAILABLE: &str = "Time slot not found or unavailable";
const SLOT_TAKEN: &str = "Time slot already booked";
const APPOINTMENT_NOT_FOUND: &str = "Appointment not found or already cancelled";

/// Error types for booking operations
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The window already has a scheduled appointment
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct AppointmentService {
    appointment_repo: Arc<dyn AppointmentRepository>,
    availability_repo: Arc<dyn AvailabilityRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl AppointmentService {
    pub fn new(
        appointment_repo: Arc<dyn AppointmentRepository>,
        availability_repo: Arc<dyn AvailabilityRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            appointment_repo,
            availability_repo,
            user_repo,
        }
    }

    /// Book a window for a student.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the window does not exist or its professor is gone
    /// - `Conflict` if the window already has a scheduled appointment,
    ///   including when a concurrent booking won the insert
    /// - `Internal` for database errors
    pub async fn book(
        &self,
        student_id: i64,
        availability_id: i64,
    ) -> Result<BookedAppointment, BookingError> {
        let window = self
            .availability_repo
            .get_by_id(availability_id)
            .await
            .context("Failed to get availability window")?
            .ok_or_else(|| BookingError::NotFound(SLOT_UNAVAILABLE.to_string()))?;

        if self
            .appointment_repo
            .find_scheduled_by_availability(availability_id)
            .await
            .context("Failed to check existing appointment")?
            .is_some()
        {
            tracing::debug!(student_id, availability_id, "Booking rejected: window already booked");
            return Err(BookingError::Conflict(SLOT_TAKEN.to_string()));
        }

        let professor = self
            .user_repo
            .get_by_id(window.professor_id)
            .await
            .context("Failed to get professor")?
            .ok_or_else(|| BookingError::NotFound("Professor not found".to_string()))?;

        let appointment = self
            .appointment_repo
            .create_if_unclaimed(student_id, window.professor_id, availability_id)
            .await
            .context("Failed to create appointment")?
            .ok_or_else(|| {
                tracing::debug!(student_id, availability_id, "Booking lost the insert race");
                BookingError::Conflict(SLOT_TAKEN.to_string())
            })?;

        tracing::info!(
            appointment_id = appointment.id,
            student_id,
            professor_id = professor.id,
            availability_id,
            "Appointment booked"
        );

        Ok(BookedAppointment {
            id: appointment.id,
            student_id,
            professor_id: professor.id,
            professor_name: professor.username,
            start_time: window.start_time,
            end_time: window.end_time,
            status: appointment.status,
        })
    }

    /// Cancel a scheduled appointment on behalf of its professor.
    ///
    /// # Errors
    ///
    /// `NotFound` if the appointment does not exist, belongs to another
    /// professor, or is already cancelled. The three cases are not told apart.
    pub async fn cancel(&self, appointment_id: i64, professor_id: i64) -> Result<(), BookingError> {
        let cancelled = self
            .appointment_repo
            .cancel(appointment_id, professor_id)
            .await
            .context("Failed to cancel appointment")?;

        if !cancelled {
            return Err(BookingError::NotFound(APPOINTMENT_NOT_FOUND.to_string()));
        }

        tracing::info!(appointment_id, professor_id, "Appointment cancelled");
        Ok(())
    }

    /// A student's scheduled appointments, ascending by start time
    pub async fn list_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<StudentAppointment>, BookingError> {
        Ok(self
            .appointment_repo
            .list_scheduled_by_student(student_id)
            .await
            .context("Failed to list student appointments")?)
    }

    /// Window ids that currently carry a scheduled appointment for a professor
    pub async fn booked_window_ids(&self, professor_id: i64) -> Result<HashSet<i64>, BookingError> {
        Ok(self
            .appointment_repo
            .booked_window_ids(professor_id)
            .await
            .context("Failed to list booked windows")?)
    }

    /// Fetch an appointment by id, any status
    pub async fn get(&self, appointment_id: i64) -> Result<Appointment, BookingError> {
        self.appointment_repo
            .get_by_id(appointment_id)
            .await
            .context("Failed to get appointment")?
            .ok_or_else(|| BookingError::NotFound("Appointment not found".to_string()))
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, setup_pool, window_at};
    use crate::db::repositories::{
        SqlxAppointmentRepository, SqlxAvailabilityRepository, SqlxUserRepository,
    };
    use crate::models::UserRole;
    use crate::services::AvailabilityService;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Book { student: usize, window: usize },
        Cancel { booking: usize },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 0usize..4).prop_map(|(student, window)| Op::Book { student, window }),
            (0usize..8).prop_map(|booking| Op::Cancel { booking }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// After any sequence of bookings and cancellations, every window has
        /// at most one scheduled appointment and the open slots are exactly
        /// the windows without one.
        #[test]
        fn booked_and_open_partition_windows(ops in prop::collection::vec(op_strategy(), 1..20)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let pool = setup_pool().await;
                let prof = seed_user(&pool, "turing", UserRole::Professor).await;
                let mut students = Vec::new();
                for i in 0..3 {
                    students.push(seed_user(&pool, &format!("s{}", i), UserRole::Student).await);
                }

                let windows = SqlxAvailabilityRepository::boxed(pool.clone());
                let appointments = SqlxAppointmentRepository::boxed(pool.clone());
                let users = SqlxUserRepository::boxed(pool.clone());
                let booking = AppointmentService::new(appointments.clone(), windows.clone(), users.clone());
                let availability = AvailabilityService::new(windows, appointments, users);

                let declared: Vec<i64> = availability
                    .declare(prof, &[window_at(9, 10), window_at(10, 11), window_at(11, 12), window_at(12, 13)])
                    .await
                    .unwrap()
                    .iter()
                    .map(|w| w.id)
                    .collect();

                let mut model: std::collections::HashMap<i64, i64> = Default::default();
                let mut bookings: Vec<(i64, i64)> = Vec::new();

                for op in ops {
                    match op {
                        Op::Book { student, window } => {
                            let window_id = declared[window];
                            let result = booking.book(students[student], window_id).await;
                            if model.contains_key(&window_id) {
                                assert!(matches!(result, Err(BookingError::Conflict(_))));
                            } else {
                                let booked = result.expect("Free window should book");
                                model.insert(window_id, booked.id);
                                bookings.push((booked.id, window_id));
                            }
                        }
                        Op::Cancel { booking: idx } => {
                            let Some(&(appointment_id, window_id)) = bookings.get(idx) else {
                                continue;
                            };
                            let result = booking.cancel(appointment_id, prof).await;
                            if model.get(&window_id) == Some(&appointment_id) {
                                result.expect("Scheduled appointment should cancel");
                                model.remove(&window_id);
                            } else {
                                assert!(matches!(result, Err(BookingError::NotFound(_))));
                            }
                        }
                    }
                }

                let booked = booking.booked_window_ids(prof).await.unwrap();
                let expected: HashSet<i64> = model.keys().copied().collect();
                assert_eq!(booked, expected);

                let open: HashSet<i64> = availability
                    .open_slots(prof)
                    .await
                    .unwrap()
                    .iter()
                    .map(|s| s.id)
                    .collect();
                assert!(open.is_disjoint(&booked));
                assert_eq!(open.len() + booked.len(), declared.len());
            });
        }
    }
}

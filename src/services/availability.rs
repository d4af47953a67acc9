//! Availability service
//!
//! Professors declare windows; students browse the ones still open.
//!
//! A window is "open" when no scheduled appointment references it. That is
//! never stored on the window: `open_slots` recomputes it from the declared
//! windows and the booked window ids on every call, so a cancelled booking
//! makes its window reappear without any write to `availability`.

use crate::db::repositories::{AppointmentRepository, AvailabilityRepository, UserRepository};
use crate::models::{AvailabilityWindow, OpenSlot, ProfessorSlots, ProfessorSummary, TimeWindow};
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;

/// Error types for availability operations
#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct AvailabilityService {
    availability_repo: Arc<dyn AvailabilityRepository>,
    appointment_repo: Arc<dyn AppointmentRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl AvailabilityService {
    pub fn new(
        availability_repo: Arc<dyn AvailabilityRepository>,
        appointment_repo: Arc<dyn AppointmentRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            availability_repo,
            appointment_repo,
            user_repo,
        }
    }

    /// Declare a batch of windows for a professor.
    ///
    /// Windows are processed in order. A window the professor already has
    /// (same start and end) is skipped and left out of the result, including
    /// a repeat inside the same batch.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for the first window whose end is not after its start.
    /// Windows earlier in the batch have already been stored at that point
    /// and stay stored.
    pub async fn declare(
        &self,
        professor_id: i64,
        windows: &[TimeWindow],
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let mut created = Vec::with_capacity(windows.len());

        for (index, window) in windows.iter().enumerate() {
            if !window.is_well_formed() {
                return Err(AvailabilityError::InvalidInput(format!(
                    "Invalid time slot at index {}: end_time must be after start_time",
                    index
                )));
            }

            match self
                .availability_repo
                .create(professor_id, window)
                .await
                .context("Failed to store availability window")?
            {
                Some(stored) => created.push(stored),
                None => tracing::debug!(
                    professor_id,
                    start = %window.start_time,
                    end = %window.end_time,
                    "Skipping duplicate availability window"
                ),
            }
        }

        tracing::info!(
            professor_id,
            requested = windows.len(),
            created = created.len(),
            "Availability declared"
        );
        Ok(created)
    }

    /// All windows the professor has declared, in creation order
    pub async fn list_owned(
        &self,
        professor_id: i64,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        Ok(self
            .availability_repo
            .list_by_professor(professor_id)
            .await
            .context("Failed to list availability windows")?)
    }

    /// Resolve a bookable window by id
    pub async fn lookup(&self, window_id: i64) -> Result<AvailabilityWindow, AvailabilityError> {
        self.availability_repo
            .get_by_id(window_id)
            .await
            .context("Failed to get availability window")?
            .ok_or_else(|| {
                AvailabilityError::NotFound("Time slot not found or unavailable".to_string())
            })
    }

    /// Declared windows of a professor minus the ones currently booked,
    /// ascending by start time
    pub async fn open_slots(&self, professor_id: i64) -> Result<Vec<OpenSlot>, AvailabilityError> {
        let windows = self.list_owned(professor_id).await?;
        let booked = self
            .appointment_repo
            .booked_window_ids(professor_id)
            .await
            .context("Failed to list booked windows")?;

        Ok(project_open_slots(windows, &booked))
    }

    /// A professor's identity plus their open slots.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown or is not a professor.
    pub async fn professor_slots(
        &self,
        professor_id: i64,
    ) -> Result<ProfessorSlots, AvailabilityError> {
        let professor = self
            .user_repo
            .get_by_id(professor_id)
            .await
            .context("Failed to get professor")?
            .filter(|user| user.is_professor())
            .ok_or_else(|| AvailabilityError::NotFound("Professor not found".to_string()))?;

        let available_slots = self.open_slots(professor.id).await?;

        Ok(ProfessorSlots {
            professor: ProfessorSummary {
                id: professor.id,
                username: professor.username,
            },
            available_slots,
        })
    }
}

/// Drop booked windows and order the rest by start time.
///
/// `windows` is expected in creation order; the sort is stable so equal
/// start times keep that order.
pub fn project_open_slots(windows: Vec<AvailabilityWindow>, booked: &HashSet<i64>) -> Vec<OpenSlot> {
    let mut open: Vec<OpenSlot> = windows
        .into_iter()
        .filter(|w| !booked.contains(&w.id))
        .map(OpenSlot::from)
        .collect();
    open.sort_by_key(|slot| slot.start_time);
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, setup_pool, window_at};
    use crate::db::repositories::{
        SqlxAppointmentRepository, SqlxAvailabilityRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::UserRole;

    struct Fixture {
        pool: DynDatabasePool,
        service: AvailabilityService,
        appointments: Arc<dyn AppointmentRepository>,
        prof: i64,
        student: i64,
    }

    async fn fixture() -> Fixture {
        let pool = setup_pool().await;
        let prof = seed_user(&pool, "turing", UserRole::Professor).await;
        let student = seed_user(&pool, "alice", UserRole::Student).await;
        let appointments = SqlxAppointmentRepository::boxed(pool.clone());
        let service = AvailabilityService::new(
            SqlxAvailabilityRepository::boxed(pool.clone()),
            appointments.clone(),
            SqlxUserRepository::boxed(pool.clone()),
        );
        Fixture {
            pool,
            service,
            appointments,
            prof,
            student,
        }
    }

    #[tokio::test]
    async fn test_declare_skips_duplicates() {
        let f = fixture().await;

        let first = f
            .service
            .declare(f.prof, &[window_at(10, 11), window_at(11, 12)])
            .await
            .expect("Failed to declare");
        assert_eq!(first.len(), 2);

        // One repeat of an earlier window, one repeat inside the batch, one new
        let second = f
            .service
            .declare(f.prof, &[window_at(10, 11), window_at(13, 14), window_at(13, 14)])
            .await
            .expect("Failed to declare");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].start_time, window_at(13, 14).start_time);

        assert_eq!(f.service.list_owned(f.prof).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_declare_empty_batch() {
        let f = fixture().await;
        assert!(f.service.declare(f.prof, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declare_malformed_window_keeps_earlier_inserts() {
        let f = fixture().await;
        let backwards = TimeWindow::new(window_at(12, 13).end_time, window_at(12, 13).start_time);

        let result = f
            .service
            .declare(f.prof, &[window_at(9, 10), backwards, window_at(15, 16)])
            .await;

        match result {
            Err(AvailabilityError::InvalidInput(msg)) => assert!(msg.contains("index 1")),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }

        let owned = f.service.list_owned(f.prof).await.unwrap();
        assert_eq!(owned.len(), 1, "Only the window before the bad one is stored");
        assert_eq!(owned[0].start_time, window_at(9, 10).start_time);
    }

    #[tokio::test]
    async fn test_lookup() {
        let f = fixture().await;
        let created = f.service.declare(f.prof, &[window_at(10, 11)]).await.unwrap();

        let found = f.service.lookup(created[0].id).await.unwrap();
        assert_eq!(found.professor_id, f.prof);

        assert!(matches!(
            f.service.lookup(9999).await,
            Err(AvailabilityError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_slots_sorted_and_subtracted() {
        let f = fixture().await;
        let windows = f
            .service
            .declare(f.prof, &[window_at(14, 15), window_at(9, 10), window_at(11, 12)])
            .await
            .unwrap();

        let slots = f.service.open_slots(f.prof).await.unwrap();
        let starts: Vec<_> = slots.iter().map(|s| s.start_time).collect();
        assert_eq!(
            starts,
            vec![
                window_at(9, 10).start_time,
                window_at(11, 12).start_time,
                window_at(14, 15).start_time
            ]
        );

        // Book the 9:00 window; it drops out until the booking is cancelled
        let nine = windows[1].id;
        let appt = f
            .appointments
            .create_if_unclaimed(f.student, f.prof, nine)
            .await
            .unwrap()
            .unwrap();

        let slots = f.service.open_slots(f.prof).await.unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.id != nine));

        f.appointments.cancel(appt.id, f.prof).await.unwrap();
        let slots = f.service.open_slots(f.prof).await.unwrap();
        assert_eq!(slots.first().map(|s| s.id), Some(nine));
    }

    #[tokio::test]
    async fn test_open_slots_equal_start_keeps_creation_order() {
        let f = fixture().await;
        let created = f
            .service
            .declare(f.prof, &[window_at(10, 12), window_at(10, 11)])
            .await
            .unwrap();

        let ids: Vec<i64> = f.service.open_slots(f.prof).await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![created[0].id, created[1].id]);
    }

    #[tokio::test]
    async fn test_professor_slots() {
        let f = fixture().await;
        f.service.declare(f.prof, &[window_at(10, 11)]).await.unwrap();

        let view = f.service.professor_slots(f.prof).await.unwrap();
        assert_eq!(view.professor.username, "turing");
        assert_eq!(view.available_slots.len(), 1);

        for id in [f.student, 9999] {
            assert!(matches!(
                f.service.professor_slots(id).await,
                Err(AvailabilityError::NotFound(_))
            ));
        }

        // A professor with no windows gets an empty list
        let other = seed_user(&f.pool, "hopper", UserRole::Professor).await;
        assert!(f.service.open_slots(other).await.unwrap().is_empty());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn windows_from(starts: &[i64]) -> Vec<AvailabilityWindow> {
        let base = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        starts
            .iter()
            .enumerate()
            .map(|(i, offset)| AvailabilityWindow {
                id: i as i64 + 1,
                professor_id: 1,
                start_time: base + Duration::minutes(*offset),
                end_time: base + Duration::minutes(*offset + 30),
                is_available: true,
                created_at: base,
            })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// Open slots are exactly the unbooked windows
        #[test]
        fn open_slots_are_declared_minus_booked(
            starts in prop::collection::vec(0i64..600, 0..30),
            booked_mask in prop::collection::vec(any::<bool>(), 30),
        ) {
            let windows = windows_from(&starts);
            let booked: HashSet<i64> = windows
                .iter()
                .zip(&booked_mask)
                .filter(|(_, b)| **b)
                .map(|(w, _)| w.id)
                .collect();

            let open = project_open_slots(windows.clone(), &booked);

            let open_ids: HashSet<i64> = open.iter().map(|s| s.id).collect();
            let expected: HashSet<i64> = windows
                .iter()
                .map(|w| w.id)
                .filter(|id| !booked.contains(id))
                .collect();
            prop_assert_eq!(open_ids, expected);
            prop_assert_eq!(open.len(), windows.len() - booked.len());
        }

        /// Output is sorted by start time, ties broken by creation (id) order
        #[test]
        fn open_slots_are_stably_sorted(starts in prop::collection::vec(0i64..20, 0..30)) {
            let open = project_open_slots(windows_from(&starts), &HashSet::new());

            for pair in open.windows(2) {
                prop_assert!(
                    (pair[0].start_time, pair[0].id) < (pair[1].start_time, pair[1].id)
                );
            }
        }
    }
}

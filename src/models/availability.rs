//! Availability model
//!
//! A window is a `[start_time, end_time)` interval a professor declared free.
//! Windows are write-once: they are never updated or deleted, and whether a
//! window is bookable right now is derived from the appointments that
//! reference it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A declared availability window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: i64,
    pub professor_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Always true for stored windows; only `true` windows are ever listed
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

/// Requested window in a `declare` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    /// A window must end strictly after it starts.
    pub fn is_well_formed(&self) -> bool {
        self.end_time > self.start_time
    }
}

/// A window that was actually inserted by `declare`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedWindow {
    pub availability_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<&AvailabilityWindow> for CreatedWindow {
    fn from(window: &AvailabilityWindow) -> Self {
        Self {
            availability_id: window.id,
            start_time: window.start_time,
            end_time: window.end_time,
        }
    }
}

/// A declared window with no scheduled appointment on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSlot {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub professor_id: i64,
}

impl From<AvailabilityWindow> for OpenSlot {
    fn from(window: AvailabilityWindow) -> Self {
        Self {
            id: window.id,
            start_time: window.start_time,
            end_time: window.end_time,
            professor_id: window.professor_id,
        }
    }
}

/// Public identity of a professor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessorSummary {
    pub id: i64,
    pub username: String,
}

/// A professor together with their currently bookable windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessorSlots {
    pub professor: ProfessorSummary,
    pub available_slots: Vec<OpenSlot>,
}

//! Traits describing collaborators of the scheduling core and their stock implementations.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};

use crate::model::{Bin, BinId, Booking, BookingId, Feedback, Resident, ResidentId, TimeSlot};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to collaborator backends.
pub enum PortError {
    /// Backend did not answer or answered with garbage.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    /// Internal backend error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Lookup of resident accounts and the bins linked to them.
pub trait ResidentDirectory: Send + Sync {
    /// Fetch a resident by id, `None` when unknown.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend fails.
    async fn resident(&self, id: &ResidentId) -> Result<Option<Resident>, PortError>;

    /// Fetch snapshots of the given bins. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend fails.
    async fn bins(&self, ids: &[BinId]) -> Result<Vec<Bin>, PortError>;
}

/// Append-only storage behind the booking store.
///
/// Records are never removed; status changes are applied in place through
/// [`BookingRepository::booking_mut`].
pub trait BookingRepository: Send {
    /// Append a booking.
    fn insert_booking(&mut self, booking: Booking);

    /// Look up a booking.
    fn booking(&self, id: &BookingId) -> Option<&Booking>;

    /// Look up a booking for modification.
    fn booking_mut(&mut self, id: &BookingId) -> Option<&mut Booking>;

    /// All bookings in insertion order.
    fn bookings(&self) -> Box<dyn Iterator<Item = &Booking> + '_>;

    /// Append a feedback record.
    fn insert_feedback(&mut self, feedback: Feedback);

    /// All feedback in insertion order.
    fn feedback(&self) -> Box<dyn Iterator<Item = &Feedback> + '_>;

    /// Feedback referencing the given booking, if any.
    fn feedback_for(&self, booking_id: &BookingId) -> Option<&Feedback> {
        self.feedback()
            .find(|feedback| &feedback.booking_id == booking_id)
    }
}

/// Decides whether a time slot on a given day is already taken.
pub trait SlotAvailability: Send + Sync {
    /// Whether `slot` on `date` can no longer be booked.
    fn is_blocked(&self, date: NaiveDate, slot: &TimeSlot) -> bool;
}

/// Availability that never blocks a slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSlots;

impl SlotAvailability for OpenSlots {
    fn is_blocked(&self, _date: NaiveDate, _slot: &TimeSlot) -> bool {
        false
    }
}

/// Deterministic demo conflicts: mornings are full on days divisible by 7,
/// evenings on days divisible by 5.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayOfMonthPattern;

impl SlotAvailability for DayOfMonthPattern {
    fn is_blocked(&self, date: NaiveDate, slot: &TimeSlot) -> bool {
        let day = date.day();
        match slot.id.as_str() {
            "morning" => day % 7 == 0,
            "evening" => day % 5 == 0,
            _ => false,
        }
    }
}

/// Source of the current local wall-clock time.
pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;

    /// Current local date.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Clock reading the host's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    #[must_use]
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.checked_add_signed(step).unwrap_or(NaiveDateTime::MAX);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

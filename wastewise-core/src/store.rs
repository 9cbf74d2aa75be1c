//! Booking lifecycle on top of a [`BookingRepository`].
//!
//! Every status change runs under one lock so that checking the current state
//! and writing the new one cannot interleave with another caller.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Duration, NaiveDateTime, NaiveTime};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SchedulingRules;
use crate::model::{Booking, BookingId, BookingStatus, Feedback, FeedbackId, ResidentId};
use crate::ports::BookingRepository;
use crate::validation::{NewBooking, NewFeedback};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors raised by booking lifecycle operations.
pub enum StoreError {
    /// No booking with that id.
    #[error("Booking {0} not found")]
    NotFound(BookingId),
    /// The operation is not allowed in the booking's current state.
    #[error("Booking is {current}, expected {expected}")]
    InvalidStatus {
        /// State the booking is in.
        current: BookingStatus,
        /// State the operation requires.
        expected: BookingStatus,
    },
    /// Not enough notice left before the pickup.
    #[error("Bookings can only be cancelled at least {hours} hours before collection")]
    TooLate {
        /// Required notice in hours.
        hours: i64,
    },
    /// The booking already has feedback.
    #[error("Feedback has already been submitted for booking {0}")]
    FeedbackExists(BookingId),
}

/// Vector-backed repository, the default storage.
#[derive(Debug, Default)]
pub struct InMemoryBookings {
    bookings: Vec<Booking>,
    index: HashMap<BookingId, usize>,
    feedback: Vec<Feedback>,
}

impl BookingRepository for InMemoryBookings {
    fn insert_booking(&mut self, booking: Booking) {
        self.index.insert(booking.id.clone(), self.bookings.len());
        self.bookings.push(booking);
    }

    fn booking(&self, id: &BookingId) -> Option<&Booking> {
        self.index
            .get(id)
            .and_then(|position| self.bookings.get(*position))
    }

    fn booking_mut(&mut self, id: &BookingId) -> Option<&mut Booking> {
        self.index
            .get(id)
            .and_then(|position| self.bookings.get_mut(*position))
    }

    fn bookings(&self) -> Box<dyn Iterator<Item = &Booking> + '_> {
        Box::new(self.bookings.iter())
    }

    fn insert_feedback(&mut self, feedback: Feedback) {
        self.feedback.push(feedback);
    }

    fn feedback(&self) -> Box<dyn Iterator<Item = &Feedback> + '_> {
        Box::new(self.feedback.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Aggregate figures over the whole store.
pub struct BookingStatistics {
    /// All bookings ever created.
    pub total_bookings: usize,
    /// Bookings awaiting collection.
    pub confirmed: usize,
    /// Collected bookings.
    pub completed: usize,
    /// Cancelled bookings.
    pub cancelled: usize,
    /// Feedback records.
    pub total_feedback: usize,
    /// Mean rating rounded to one decimal, `0.0` without feedback.
    pub average_rating: f64,
}

/// Creates bookings and applies lifecycle transitions.
pub struct BookingStore {
    repository: Mutex<Box<dyn BookingRepository>>,
    cancellation_notice: Duration,
    cancellation_anchor: NaiveTime,
    completion_offset: Duration,
}

impl BookingStore {
    /// Create a store over an empty [`InMemoryBookings`].
    #[must_use]
    pub fn new(rules: &SchedulingRules) -> Self {
        Self::with_repository(rules, Box::new(InMemoryBookings::default()))
    }

    /// Create a store over the given repository.
    #[must_use]
    pub fn with_repository(
        rules: &SchedulingRules,
        repository: Box<dyn BookingRepository>,
    ) -> Self {
        Self {
            repository: Mutex::new(repository),
            cancellation_notice: rules.cancellation_notice(),
            cancellation_anchor: rules.cancellation_anchor,
            completion_offset: rules.completion_offset(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn BookingRepository>> {
        self.repository
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a validated booking as `confirmed`.
    ///
    /// `slot_start` is the start of the booked time slot and anchors the
    /// estimated completion time.
    pub fn create(&self, draft: NewBooking, slot_start: NaiveTime, now: NaiveDateTime) -> Booking {
        let mut repository = self.lock();
        let sequence = repository.bookings().count() + 1;

        let booking = Booking {
            id: BookingId(generate_id("BK", now, sequence)),
            resident_id: draft.resident_id,
            bin_ids: draft.bin_ids,
            waste_type: draft.waste_type,
            scheduled_date: draft.scheduled_date,
            time_slot: draft.time_slot,
            total_fee: draft.total_fee,
            estimated_weight: draft.estimated_weight,
            status: BookingStatus::Confirmed,
            created_at: now,
            estimated_completion: draft
                .scheduled_date
                .and_time(slot_start)
                .checked_add_signed(self.completion_offset)
                .unwrap_or(NaiveDateTime::MAX),
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            feedback_id: None,
        };
        repository.insert_booking(booking.clone());

        tracing::info!(
            booking = %booking.id,
            resident = %booking.resident_id,
            date = %booking.scheduled_date,
            slot = %booking.time_slot,
            "booking confirmed"
        );
        booking
    }

    /// Cancel a confirmed booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`], [`StoreError::InvalidStatus`] when the
    /// booking is not confirmed, or [`StoreError::TooLate`] when less than the
    /// required notice remains before the anchor time on the scheduled date.
    pub fn cancel(
        &self,
        id: &BookingId,
        reason: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<Booking, StoreError> {
        let mut repository = self.lock();
        let booking = repository
            .booking_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        expect_status(booking, BookingStatus::Confirmed)?;
        let anchor = booking.scheduled_date.and_time(self.cancellation_anchor);
        if anchor - now < self.cancellation_notice {
            return Err(StoreError::TooLate {
                hours: self.cancellation_notice.num_hours(),
            });
        }

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(now);
        booking.cancellation_reason = Some(reason.unwrap_or_default().to_owned());

        tracing::info!(booking = %booking.id, "booking cancelled");
        Ok(booking.clone())
    }

    /// Mark a confirmed booking as collected.
    ///
    /// This is the hook for the collection crew; residents cannot trigger it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] or [`StoreError::InvalidStatus`] when
    /// the booking is not confirmed.
    pub fn mark_completed(
        &self,
        id: &BookingId,
        now: NaiveDateTime,
    ) -> Result<Booking, StoreError> {
        let mut repository = self.lock();
        let booking = repository
            .booking_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        expect_status(booking, BookingStatus::Confirmed)?;
        booking.status = BookingStatus::Completed;
        booking.completed_at = Some(now);

        tracing::info!(booking = %booking.id, "booking completed");
        Ok(booking.clone())
    }

    /// Attach feedback to a completed booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`], [`StoreError::InvalidStatus`] when the
    /// booking is not completed, or [`StoreError::FeedbackExists`].
    pub fn attach_feedback(
        &self,
        draft: NewFeedback,
        now: NaiveDateTime,
    ) -> Result<Feedback, StoreError> {
        let mut repository = self.lock();
        let sequence = repository.feedback().count() + 1;

        let resident_id = {
            let booking = repository
                .booking(&draft.booking_id)
                .ok_or_else(|| StoreError::NotFound(draft.booking_id.clone()))?;
            expect_status(booking, BookingStatus::Completed)?;
            booking.resident_id.clone()
        };
        if repository.feedback_for(&draft.booking_id).is_some() {
            return Err(StoreError::FeedbackExists(draft.booking_id));
        }

        let feedback = Feedback {
            id: FeedbackId(generate_id("FB", now, sequence)),
            booking_id: draft.booking_id,
            resident_id,
            rating: draft.rating,
            comment: draft.comment,
            submitted_at: now,
        };
        if let Some(booking) = repository.booking_mut(&feedback.booking_id) {
            booking.feedback_id = Some(feedback.id.clone());
        }
        repository.insert_feedback(feedback.clone());

        tracing::info!(
            booking = %feedback.booking_id,
            rating = feedback.rating,
            "feedback recorded"
        );
        Ok(feedback)
    }

    /// Look up a booking.
    #[must_use]
    pub fn booking(&self, id: &BookingId) -> Option<Booking> {
        self.lock().booking(id).cloned()
    }

    /// Bookings of a resident, newest first; equal timestamps keep insertion order.
    #[must_use]
    pub fn list_by_resident(&self, resident_id: &ResidentId) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .lock()
            .bookings()
            .filter(|booking| &booking.resident_id == resident_id)
            .cloned()
            .collect();
        bookings.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        bookings
    }

    /// Mean rating over all feedback, rounded to one decimal; `0.0` without feedback.
    #[must_use]
    pub fn average_rating(&self) -> f64 {
        average_rating(self.lock().feedback().map(|feedback| feedback.rating))
    }

    /// Counts per status and the average rating.
    #[must_use]
    pub fn statistics(&self) -> BookingStatistics {
        let repository = self.lock();
        let mut stats = BookingStatistics::default();
        for booking in repository.bookings() {
            stats.total_bookings += 1;
            match booking.status {
                BookingStatus::Confirmed => stats.confirmed += 1,
                BookingStatus::Completed => stats.completed += 1,
                BookingStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats.total_feedback = repository.feedback().count();
        stats.average_rating =
            average_rating(repository.feedback().map(|feedback| feedback.rating));
        stats
    }
}

fn expect_status(booking: &Booking, expected: BookingStatus) -> Result<(), StoreError> {
    if booking.status == expected {
        Ok(())
    } else {
        Err(StoreError::InvalidStatus {
            current: booking.status,
            expected,
        })
    }
}

fn average_rating(ratings: impl Iterator<Item = u8>) -> f64 {
    let (sum, count) = ratings.fold((0_u32, 0_u32), |(sum, count), rating| {
        (sum + u32::from(rating), count + 1)
    });
    if count == 0 {
        return 0.0;
    }
    (f64::from(sum) / f64::from(count) * 10.0).round() / 10.0
}

/// `<prefix>-<millis>-<sequence>-<random>`; the sequence keeps ids unique per store.
fn generate_id(prefix: &str, now: NaiveDateTime, sequence: usize) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..10_000);
    format!(
        "{prefix}-{}-{sequence}-{suffix}",
        now.and_utc().timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::NaiveDate;

    use super::*;
    use crate::model::BinId;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).expect("valid date")
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        date(day).and_hms_opt(hour, 0, 0).expect("valid time")
    }

    fn morning() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).expect("valid time")
    }

    fn draft(resident: &str, day: u32) -> NewBooking {
        NewBooking {
            resident_id: ResidentId::from(resident),
            bin_ids: vec![BinId::from("BIN-1")],
            waste_type: "regular".to_owned(),
            scheduled_date: date(day),
            time_slot: "morning".to_owned(),
            total_fee: 590,
            estimated_weight: None,
        }
    }

    fn feedback(booking: &Booking, rating: u8) -> NewFeedback {
        NewFeedback {
            booking_id: booking.id.clone(),
            rating,
            comment: None,
        }
    }

    fn store() -> BookingStore {
        BookingStore::new(&SchedulingRules::default())
    }

    #[test]
    fn created_bookings_are_confirmed_with_completion_estimate() {
        let store = store();
        let booking = store.create(draft("R-1", 22), morning(), at(19, 9));

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.created_at, at(19, 9));
        assert_eq!(booking.estimated_completion, at(22, 10));
        assert!(booking.id.0.starts_with("BK-"));
        assert_eq!(store.booking(&booking.id), Some(booking));
    }

    #[test]
    fn ids_are_unique_within_a_store() {
        let store = store();
        let first = store.create(draft("R-1", 22), morning(), at(19, 9));
        let second = store.create(draft("R-1", 22), morning(), at(19, 9));
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn cancel_only_from_confirmed_with_enough_notice() {
        let store = store();
        let booking = store.create(draft("R-1", 22), morning(), at(19, 9));

        let cancelled = store
            .cancel(&booking.id, Some("Moving house"), at(20, 9))
            .expect("cancellable");
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancelled_at, Some(at(20, 9)));
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Moving house"));

        assert_eq!(
            store.cancel(&booking.id, None, at(20, 9)),
            Err(StoreError::InvalidStatus {
                current: BookingStatus::Cancelled,
                expected: BookingStatus::Confirmed,
            })
        );
    }

    #[test]
    fn cancel_inside_notice_window_is_too_late() {
        let store = store();
        let booking = store.create(draft("R-1", 22), morning(), at(19, 9));

        // 08:00 on the 22nd is 23 hours away
        assert_eq!(
            store.cancel(&booking.id, None, at(21, 9)),
            Err(StoreError::TooLate { hours: 24 })
        );
        // exactly 24 hours is still fine
        let cancelled = store
            .cancel(&booking.id, None, at(21, 8))
            .expect("exactly on the boundary");
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some(""));
    }

    #[test]
    fn completed_bookings_cannot_be_cancelled() {
        let store = store();
        let booking = store.create(draft("R-1", 22), morning(), at(19, 9));
        store
            .mark_completed(&booking.id, at(22, 10))
            .expect("completable");

        assert!(matches!(
            store.cancel(&booking.id, None, at(19, 10)),
            Err(StoreError::InvalidStatus { .. })
        ));
        assert_eq!(
            store.cancel(&BookingId::from("BK-missing"), None, at(19, 10)),
            Err(StoreError::NotFound(BookingId::from("BK-missing")))
        );
    }

    #[test]
    fn feedback_requires_completion_and_is_unique() {
        let store = store();
        let booking = store.create(draft("R-1", 22), morning(), at(19, 9));

        assert!(matches!(
            store.attach_feedback(feedback(&booking, 5), at(20, 9)),
            Err(StoreError::InvalidStatus {
                current: BookingStatus::Confirmed,
                ..
            })
        ));

        store
            .mark_completed(&booking.id, at(22, 10))
            .expect("completable");
        let recorded = store
            .attach_feedback(feedback(&booking, 4), at(22, 12))
            .expect("first feedback");
        assert_eq!(recorded.resident_id, ResidentId::from("R-1"));
        assert_eq!(
            store.booking(&booking.id).and_then(|stored| stored.feedback_id),
            Some(recorded.id)
        );

        assert_eq!(
            store.attach_feedback(feedback(&booking, 1), at(22, 13)),
            Err(StoreError::FeedbackExists(booking.id.clone()))
        );
    }

    #[test]
    fn racing_cancellations_succeed_once() {
        let store = store();
        let booking = store.create(draft("R-1", 22), morning(), at(19, 9));

        let outcomes: Vec<Result<Booking, StoreError>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| store.cancel(&booking.id, None, at(19, 10))))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("cancel thread"))
                .collect()
        });

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(outcomes.iter().all(|outcome| matches!(
            outcome,
            Ok(_) | Err(StoreError::InvalidStatus { .. })
        )));
        assert_eq!(store.statistics().cancelled, 1);
    }

    #[test]
    fn racing_feedback_is_recorded_once() {
        let store = store();
        let booking = store.create(draft("R-1", 22), morning(), at(19, 9));
        store
            .mark_completed(&booking.id, at(22, 10))
            .expect("completable");

        let outcomes: Vec<Result<Feedback, StoreError>> = thread::scope(|scope| {
            let handles: Vec<_> = (1..=5)
                .map(|rating| {
                    let draft = feedback(&booking, rating);
                    scope.spawn(|| store.attach_feedback(draft, at(22, 12)))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("feedback thread"))
                .collect()
        });

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
        assert!(outcomes.iter().all(|outcome| matches!(
            outcome,
            Ok(_) | Err(StoreError::FeedbackExists(_))
        )));
        assert_eq!(store.statistics().total_feedback, 1);
    }

    #[test]
    fn history_is_newest_first_and_stable_on_ties() {
        let store = store();
        let older = store.create(draft("R-1", 22), morning(), at(19, 9));
        let tie_a = store.create(draft("R-1", 23), morning(), at(19, 11));
        let tie_b = store.create(draft("R-1", 26), morning(), at(19, 11));
        store.create(draft("R-2", 22), morning(), at(19, 12));

        let ids: Vec<BookingId> = store
            .list_by_resident(&ResidentId::from("R-1"))
            .into_iter()
            .map(|booking| booking.id)
            .collect();
        assert_eq!(ids, vec![tie_a.id, tie_b.id, older.id]);
        assert!(store.list_by_resident(&ResidentId::from("R-404")).is_empty());
    }

    #[test]
    fn average_rating_rounds_to_one_decimal() {
        let store = store();
        assert!(store.average_rating().abs() < f64::EPSILON);

        for (day, rating) in [(22, 5), (23, 4), (26, 4)] {
            let booking = store.create(draft("R-1", day), morning(), at(19, 9));
            store
                .mark_completed(&booking.id, at(day, 10))
                .expect("completable");
            store
                .attach_feedback(feedback(&booking, rating), at(day, 12))
                .expect("feedback");
        }

        assert!((store.average_rating() - 4.3).abs() < 1e-9);
        let stats = store.statistics();
        assert_eq!(stats.total_bookings, 3);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.total_feedback, 3);
    }
}

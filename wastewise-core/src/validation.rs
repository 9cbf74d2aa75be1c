//! Payload checks for bookings and feedback.
//!
//! Each check collects every problem instead of stopping at the first one, and
//! a payload that passes is turned into its typed counterpart.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::SchedulingRules;
use crate::dates::{DateRules, parse_iso_date};
use crate::model::{BinId, BookingId, ResidentId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Booking payload as sent by a client.
pub struct BookingRequest {
    /// Resident placing the booking.
    pub resident_id: Option<String>,
    /// Bins to empty.
    pub bin_ids: Option<Vec<String>>,
    /// Waste type key.
    pub waste_type: Option<String>,
    /// Collection day as `YYYY-MM-DD`.
    pub scheduled_date: Option<String>,
    /// Time slot key.
    pub time_slot: Option<String>,
    /// Fee quoted to the resident.
    pub total_fee: Option<u32>,
    /// Weight estimate in kg.
    pub estimated_weight: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Feedback payload as sent by a client.
pub struct FeedbackRequest {
    /// Booking being rated.
    pub booking_id: Option<String>,
    /// Rating, expected to be a whole number from 1 to 5.
    pub rating: Option<f64>,
    /// Optional free text.
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// Booking payload that passed validation.
pub struct NewBooking {
    /// Resident placing the booking.
    pub resident_id: ResidentId,
    /// Bins to empty, in request order.
    pub bin_ids: Vec<BinId>,
    /// Waste type key.
    pub waste_type: String,
    /// Collection day.
    pub scheduled_date: NaiveDate,
    /// Time slot key.
    pub time_slot: String,
    /// Fee quoted to the resident.
    pub total_fee: u32,
    /// Weight estimate in kg.
    pub estimated_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Feedback payload that passed validation.
pub struct NewFeedback {
    /// Booking being rated.
    pub booking_id: BookingId,
    /// Rating from 1 to 5.
    pub rating: u8,
    /// Optional free text.
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Every problem found in a payload.
pub struct ValidationReport {
    /// Human-readable messages in check order.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Whether no problem was found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Checks booking and feedback payloads.
#[derive(Debug, Clone)]
pub struct Validator {
    date_rules: DateRules,
    max_bins_per_booking: usize,
    max_comment_chars: usize,
}

impl Validator {
    /// Create a validator using `date_rules` for scheduled dates.
    #[must_use]
    pub fn new(rules: &SchedulingRules, date_rules: DateRules) -> Self {
        Self {
            date_rules,
            max_bins_per_booking: rules.max_bins_per_booking,
            max_comment_chars: rules.max_feedback_comment_chars,
        }
    }

    /// Check a booking payload.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationReport`] listing every violated rule.
    pub fn validate_booking(
        &self,
        request: &BookingRequest,
        now: NaiveDateTime,
    ) -> Result<NewBooking, ValidationReport> {
        let mut report = ValidationReport::default();

        let resident_id = present(request.resident_id.as_deref());
        if resident_id.is_none() {
            report.push("Resident ID is required");
        }

        let bin_ids: Vec<&str> = request
            .bin_ids
            .iter()
            .flatten()
            .map(|id| id.trim())
            .collect();
        if bin_ids.is_empty() {
            report.push("At least one bin must be selected");
        } else if bin_ids.len() > self.max_bins_per_booking {
            report.push(format!(
                "Maximum {} bins allowed per booking",
                self.max_bins_per_booking
            ));
        }
        if bin_ids.iter().any(|id| id.is_empty()) {
            report.push("Bin IDs must not be blank");
        }
        let mut seen = HashSet::new();
        if !bin_ids.iter().all(|id| seen.insert(*id)) {
            report.push("Each bin may only be listed once");
        }

        let waste_type = present(request.waste_type.as_deref());
        if waste_type.is_none() {
            report.push("Waste type is required");
        }

        let scheduled_date = match present(request.scheduled_date.as_deref()) {
            None => {
                report.push("Scheduled date is required");
                None
            }
            Some(raw) => match parse_iso_date(raw) {
                None => {
                    report.push("Scheduled date must be a valid YYYY-MM-DD date");
                    None
                }
                Some(date) => match self.date_rules.validate(date, now) {
                    Ok(()) => Some(date),
                    Err(rejection) => {
                        report.push(rejection.to_string());
                        None
                    }
                },
            },
        };

        let time_slot = present(request.time_slot.as_deref());
        if time_slot.is_none() {
            report.push("Time slot is required");
        }

        tracing::debug!(errors = report.errors.len(), "validated booking payload");

        match (resident_id, waste_type, scheduled_date, time_slot) {
            (Some(resident_id), Some(waste_type), Some(scheduled_date), Some(time_slot))
                if report.is_valid() =>
            {
                Ok(NewBooking {
                    resident_id: ResidentId::from(resident_id),
                    bin_ids: bin_ids.into_iter().map(BinId::from).collect(),
                    waste_type: waste_type.to_owned(),
                    scheduled_date,
                    time_slot: time_slot.to_owned(),
                    total_fee: request.total_fee.unwrap_or_default(),
                    estimated_weight: request.estimated_weight,
                })
            }
            _ => Err(report),
        }
    }

    /// Check a feedback payload.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationReport`] listing every violated rule.
    pub fn validate_feedback(
        &self,
        request: &FeedbackRequest,
    ) -> Result<NewFeedback, ValidationReport> {
        let mut report = ValidationReport::default();

        let booking_id = present(request.booking_id.as_deref());
        if booking_id.is_none() {
            report.push("Booking ID is required");
        }

        let rating = match request.rating {
            None => {
                report.push("Rating is required");
                None
            }
            Some(raw) => {
                let rating = whole_rating(raw);
                if rating.is_none() {
                    report.push("Rating must be a whole number between 1 and 5");
                }
                rating
            }
        };

        let comment = request
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty());
        if comment.is_some_and(|comment| comment.chars().count() > self.max_comment_chars) {
            report.push(format!(
                "Comment must not exceed {} characters",
                self.max_comment_chars
            ));
        }

        match (booking_id, rating) {
            (Some(booking_id), Some(rating)) if report.is_valid() => Ok(NewFeedback {
                booking_id: BookingId::from(booking_id),
                rating,
                comment: comment.map(str::to_owned),
            }),
            _ => Err(report),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn whole_rating(raw: f64) -> Option<u8> {
    (1..=5_u8).find(|candidate| (f64::from(*candidate) - raw).abs() < f64::EPSILON)
}

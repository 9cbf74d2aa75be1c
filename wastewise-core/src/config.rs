//! Business rules that tune scheduling, pricing, and cancellation.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::model::BillingModelKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Tunable rules shared by date validation, fees, validation, and the store.
///
/// Missing keys in a deserialized document fall back to [`SchedulingRules::default`].
pub struct SchedulingRules {
    /// Minimum wall-clock hours between now and a bookable collection moment.
    pub min_advance_booking_hours: i64,
    /// Latest bookable day, counted in calendar days from today.
    pub max_advance_booking_days: i64,
    /// Upper bound on bins in a single booking.
    pub max_bins_per_booking: usize,
    /// Hours of notice required before the cancellation anchor.
    pub cancellation_notice_hours: i64,
    /// Time of day on the scheduled date the cancellation notice is measured against.
    pub cancellation_anchor: NaiveTime,
    /// Hours after slot start a pickup is expected to be finished.
    pub completion_offset_hours: i64,
    /// Tax applied to every fee subtotal.
    pub tax_rate: f64,
    /// Currency code echoed on fee breakdowns.
    pub currency: String,
    /// Maximum feedback comment length in characters.
    pub max_feedback_comment_chars: usize,
    /// Model used when a fee request does not name one.
    pub default_billing_model: BillingModelKind,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            min_advance_booking_hours: 24,
            max_advance_booking_days: 30,
            max_bins_per_booking: 5,
            cancellation_notice_hours: 24,
            cancellation_anchor: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            completion_offset_hours: 2,
            tax_rate: 0.18,
            currency: "LKR".to_owned(),
            max_feedback_comment_chars: 500,
            default_billing_model: BillingModelKind::Flat,
        }
    }
}

/// Longest notice or horizon a rule may ask for.
pub(crate) const MAX_RULE_DAYS: i64 = 366;
const MAX_RULE_HOURS: i64 = MAX_RULE_DAYS * 24;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// A rule value outside the range the scheduler supports.
#[error("{field} must be {allowed}")]
pub struct RulesError {
    /// camelCase key of the offending rule.
    pub field: &'static str,
    /// Human-readable allowed range.
    pub allowed: &'static str,
}

impl SchedulingRules {
    /// Check every rule is within the supported range.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] naming the first rule out of range.
    pub fn validate(&self) -> Result<(), RulesError> {
        let hours = 0..=MAX_RULE_HOURS;
        let checks = [
            (
                "minAdvanceBookingHours",
                "between 0 and 8784",
                hours.contains(&self.min_advance_booking_hours),
            ),
            (
                "maxAdvanceBookingDays",
                "between 1 and 366",
                (1..=MAX_RULE_DAYS).contains(&self.max_advance_booking_days),
            ),
            (
                "maxBinsPerBooking",
                "at least 1",
                self.max_bins_per_booking >= 1,
            ),
            (
                "cancellationNoticeHours",
                "between 0 and 8784",
                hours.contains(&self.cancellation_notice_hours),
            ),
            (
                "completionOffsetHours",
                "between 0 and 24",
                (0..=24).contains(&self.completion_offset_hours),
            ),
            (
                "taxRate",
                "a number between 0 and 1",
                (0.0..=1.0).contains(&self.tax_rate),
            ),
            (
                "currency",
                "a non-empty code",
                !self.currency.trim().is_empty(),
            ),
        ];

        match checks.into_iter().find(|(_, _, valid)| !valid) {
            Some((field, allowed, _)) => Err(RulesError { field, allowed }),
            None => Ok(()),
        }
    }

    /// Minimum notice for a new booking.
    #[must_use]
    pub fn min_advance(&self) -> Duration {
        hours_or_max(self.min_advance_booking_hours)
    }

    /// Minimum notice for a cancellation.
    #[must_use]
    pub fn cancellation_notice(&self) -> Duration {
        hours_or_max(self.cancellation_notice_hours)
    }

    /// Offset from slot start to the estimated completion time.
    #[must_use]
    pub fn completion_offset(&self) -> Duration {
        hours_or_max(self.completion_offset_hours)
    }
}

/// Out-of-range hours saturate instead of overflowing.
fn hours_or_max(hours: i64) -> Duration {
    Duration::try_hours(hours).unwrap_or(if hours < 0 {
        Duration::MIN
    } else {
        Duration::MAX
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults_for_missing_keys() {
        let rules: SchedulingRules =
            serde_json::from_str(r#"{"maxBinsPerBooking": 3, "currency": "USD"}"#)
                .expect("rules parse");

        assert_eq!(rules.max_bins_per_booking, 3);
        assert_eq!(rules.currency, "USD");
        assert_eq!(rules.min_advance_booking_hours, 24);
        assert_eq!(rules.default_billing_model, BillingModelKind::Flat);
        assert_eq!(
            rules.cancellation_anchor,
            NaiveTime::from_hms_opt(8, 0, 0).expect("valid time")
        );
        assert_eq!(rules.validate(), Ok(()));
    }

    #[test]
    fn out_of_range_documents_are_rejected() {
        let huge_horizon: SchedulingRules =
            serde_json::from_str(r#"{"maxAdvanceBookingDays": 1000000000}"#).expect("rules parse");
        assert_eq!(
            huge_horizon.validate(),
            Err(RulesError {
                field: "maxAdvanceBookingDays",
                allowed: "between 1 and 366",
            })
        );

        let huge_notice: SchedulingRules =
            serde_json::from_str(r#"{"minAdvanceBookingHours": 9223372036854775807}"#)
                .expect("rules parse");
        assert_eq!(
            huge_notice.validate().map_err(|err| err.field),
            Err("minAdvanceBookingHours")
        );
        assert_eq!(huge_notice.min_advance(), Duration::MAX);

        let negative_tax: SchedulingRules =
            serde_json::from_str(r#"{"taxRate": -0.5}"#).expect("rules parse");
        assert_eq!(negative_tax.validate().map_err(|err| err.field), Err("taxRate"));
    }
}

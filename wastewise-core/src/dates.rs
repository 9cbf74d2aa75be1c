//! Rules deciding which days a pickup may be scheduled on.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::{MAX_RULE_DAYS, SchedulingRules};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar date.
#[must_use]
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reason a collection date was refused. Variants are listed in evaluation order.
pub enum DateRejection {
    /// Day lies before today.
    #[error("Cannot schedule collection for past dates")]
    InPast,
    /// Not enough notice between now and the collection moment.
    #[error("Collection must be scheduled at least {hours} hours in advance")]
    InsufficientNotice {
        /// Required notice in hours.
        hours: i64,
    },
    /// Day lies beyond the booking horizon.
    #[error("Collection cannot be scheduled more than {days} days in advance")]
    BeyondHorizon {
        /// Horizon in days.
        days: i64,
    },
    /// Saturday or Sunday.
    #[error("Collection is not available on weekends")]
    Weekend,
    /// Day is on the blackout list.
    #[error("Collection is not available on {0} (holiday or service closure)")]
    Blackout(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Bookable day as presented to residents.
pub struct AvailableDate {
    /// Calendar date.
    pub date: NaiveDate,
    /// Short form such as `Tue, Oct 20`.
    pub display_date: String,
    /// Full weekday name.
    pub day_name: String,
}

impl AvailableDate {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            display_date: date.format("%a, %b %-d").to_string(),
            day_name: date.format("%A").to_string(),
        }
    }
}

/// Advance-notice, horizon, weekend, and blackout rules for collection days.
#[derive(Debug, Clone)]
pub struct DateRules {
    min_advance: Duration,
    max_advance_days: i64,
    blackout_dates: BTreeSet<NaiveDate>,
}

impl DateRules {
    /// Build the rules from configuration and the catalog's blackout list.
    ///
    /// Horizons longer than a year are capped at 366 days.
    #[must_use]
    pub fn new(rules: &SchedulingRules, blackout_dates: BTreeSet<NaiveDate>) -> Self {
        Self {
            min_advance: rules.min_advance(),
            max_advance_days: rules.max_advance_booking_days.min(MAX_RULE_DAYS),
            blackout_dates,
        }
    }

    /// Check a calendar day, evaluated at local midnight.
    ///
    /// # Errors
    ///
    /// Returns the first [`DateRejection`] that applies.
    pub fn validate(&self, date: NaiveDate, now: NaiveDateTime) -> Result<(), DateRejection> {
        self.validate_moment(date.and_time(NaiveTime::MIN), now)
    }

    /// Check an exact collection moment.
    ///
    /// Notice is measured in wall-clock hours, the horizon in calendar days.
    ///
    /// # Errors
    ///
    /// Returns the first [`DateRejection`] that applies.
    pub fn validate_moment(
        &self,
        moment: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), DateRejection> {
        let date = moment.date();
        let today = now.date();

        if date < today {
            return Err(DateRejection::InPast);
        }
        if moment - now < self.min_advance {
            return Err(DateRejection::InsufficientNotice {
                hours: self.min_advance.num_hours(),
            });
        }
        if (date - today).num_days() > self.max_advance_days {
            return Err(DateRejection::BeyondHorizon {
                days: self.max_advance_days,
            });
        }
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(DateRejection::Weekend);
        }
        if self.blackout_dates.contains(&date) {
            return Err(DateRejection::Blackout(date));
        }
        Ok(())
    }

    /// Valid days strictly after `after`, in ascending order, up to the horizon.
    pub fn valid_dates_after(
        &self,
        after: NaiveDate,
        now: NaiveDateTime,
    ) -> impl Iterator<Item = NaiveDate> + '_ {
        let horizon = Duration::try_days(self.max_advance_days)
            .and_then(|span| now.date().checked_add_signed(span))
            .unwrap_or(NaiveDate::MAX);
        after
            .iter_days()
            .skip(1)
            .take_while(move |date| *date <= horizon)
            .filter(move |date| self.validate(*date, now).is_ok())
    }

    /// Bookable days from tomorrow up to the horizon.
    #[must_use]
    pub fn available_dates(&self, now: NaiveDateTime) -> Vec<AvailableDate> {
        self.valid_dates_after(now.date(), now)
            .map(AvailableDate::new)
            .collect()
    }
}

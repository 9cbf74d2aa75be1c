//! Failures of the scheduling facade and the envelopes clients receive.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::DateRejection;
use crate::fees::FeeError;
use crate::model::{BookingId, BookingStatus, TimeSlot};
use crate::ports::PortError;
use crate::store::StoreError;
use crate::validation::ValidationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Broad class of a failure, for callers that only care about the category.
pub enum ErrorKind {
    /// Caller-supplied data is malformed or incomplete.
    Validation,
    /// A referenced resident or booking does not exist.
    NotFound,
    /// The operation is not legal in the current lifecycle state.
    InvalidStatus,
    /// A time-window guard was violated.
    TooLate,
    /// The requested slot is taken.
    SlotUnavailable,
    /// An account or business constraint forbids the operation.
    BusinessRule,
    /// The fee engine failed unexpectedly.
    Calculation,
    /// Any other unexpected failure.
    System,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Errors returned by [`crate::service::SchedulingService`].
pub enum SchedulingError {
    /// Payload failed validation.
    #[error("Validation failed: {}", .0.errors.join("; "))]
    Validation(ValidationReport),
    /// Resident id was blank.
    #[error("Resident ID is required")]
    MissingResidentId,
    /// Resident is unknown.
    #[error("Resident {0} not found")]
    ResidentNotFound(String),
    /// Resident account is not active.
    #[error("Resident account is not active")]
    AccountInactive,
    /// Resident has no linked bins.
    #[error("No bins are linked to this account")]
    NoBinsLinked,
    /// None of the resident's bins is in service.
    #[error("No active bins are linked to this account")]
    NoActiveBins,
    /// Date or time slot was blank.
    #[error("Date and time slot are required")]
    MissingParameters,
    /// Date failed the scheduling rules.
    #[error("{0}")]
    InvalidDate(String),
    /// Time slot key is unknown.
    #[error("Unknown time slot: {0}")]
    InvalidTimeSlot(String),
    /// The slot is already taken on that day.
    #[error("The {slot} slot on {date} is no longer available")]
    SlotUnavailable {
        /// Requested day.
        date: NaiveDate,
        /// Requested slot key.
        slot: String,
        /// Other slots still open that day.
        alternative_slots: Vec<TimeSlot>,
        /// Next day on which the requested slot is open.
        next_available_date: Option<NaiveDate>,
    },
    /// Fee request without a waste type.
    #[error("Waste type is required")]
    MissingWasteType,
    /// Fee request without bins.
    #[error("At least one bin must be selected")]
    NoBinsSelected,
    /// Waste type key is unknown.
    #[error("Unknown waste type: {0}")]
    InvalidWasteType(String),
    /// Billing model key is unknown.
    #[error("Unknown billing model: {0}")]
    InvalidBillingModel(String),
    /// Booking is unknown.
    #[error("Booking {0} not found")]
    BookingNotFound(BookingId),
    /// Booking is in the wrong state.
    #[error("Booking is {current}, this requires a {expected} booking")]
    InvalidBookingStatus {
        /// State the booking is in.
        current: BookingStatus,
        /// State the operation requires.
        expected: BookingStatus,
    },
    /// Cancellation notice window has passed.
    #[error("Bookings can only be cancelled at least {hours} hours before collection")]
    CancellationTooLate {
        /// Required notice in hours.
        hours: i64,
    },
    /// Feedback was already given.
    #[error("Feedback has already been submitted for booking {0}")]
    FeedbackExists(BookingId),
    /// Notification template key is unknown.
    #[error("Unknown notification template: {0}")]
    UnknownTemplate(String),
    /// Fee engine failure that is not the caller's fault.
    #[error("Fee calculation failed: {0}")]
    Calculation(String),
    /// Unexpected failure, e.g. of a collaborator backend.
    #[error("System error: {0}")]
    System(String),
}

impl SchedulingError {
    /// Machine-readable code clients branch on.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SchedulingError::Validation(_) => "VALIDATION_ERROR",
            SchedulingError::MissingResidentId => "MISSING_RESIDENT_ID",
            SchedulingError::ResidentNotFound(_) => "RESIDENT_NOT_FOUND",
            SchedulingError::AccountInactive => "ACCOUNT_INACTIVE",
            SchedulingError::NoBinsLinked => "NO_BINS_LINKED",
            SchedulingError::NoActiveBins => "NO_ACTIVE_BINS",
            SchedulingError::MissingParameters => "MISSING_PARAMETERS",
            SchedulingError::InvalidDate(_) => "INVALID_DATE",
            SchedulingError::InvalidTimeSlot(_) => "INVALID_TIME_SLOT",
            SchedulingError::SlotUnavailable { .. } => "SLOT_UNAVAILABLE",
            SchedulingError::MissingWasteType => "MISSING_WASTE_TYPE",
            SchedulingError::NoBinsSelected => "NO_BINS_SELECTED",
            SchedulingError::InvalidWasteType(_) => "INVALID_WASTE_TYPE",
            SchedulingError::InvalidBillingModel(_) => "INVALID_BILLING_MODEL",
            SchedulingError::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            SchedulingError::InvalidBookingStatus { .. } => "INVALID_BOOKING_STATUS",
            SchedulingError::CancellationTooLate { .. } => "CANCELLATION_TOO_LATE",
            SchedulingError::FeedbackExists(_) => "FEEDBACK_EXISTS",
            SchedulingError::UnknownTemplate(_) => "UNKNOWN_TEMPLATE",
            SchedulingError::Calculation(_) => "CALCULATION_ERROR",
            SchedulingError::System(_) => "SYSTEM_ERROR",
        }
    }

    /// Category of the failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulingError::Validation(_)
            | SchedulingError::MissingResidentId
            | SchedulingError::MissingParameters
            | SchedulingError::InvalidDate(_)
            | SchedulingError::InvalidTimeSlot(_)
            | SchedulingError::MissingWasteType
            | SchedulingError::NoBinsSelected
            | SchedulingError::InvalidWasteType(_)
            | SchedulingError::InvalidBillingModel(_)
            | SchedulingError::UnknownTemplate(_) => ErrorKind::Validation,
            SchedulingError::ResidentNotFound(_) | SchedulingError::BookingNotFound(_) => {
                ErrorKind::NotFound
            }
            SchedulingError::AccountInactive
            | SchedulingError::NoBinsLinked
            | SchedulingError::NoActiveBins
            | SchedulingError::FeedbackExists(_) => ErrorKind::BusinessRule,
            SchedulingError::InvalidBookingStatus { .. } => ErrorKind::InvalidStatus,
            SchedulingError::CancellationTooLate { .. } => ErrorKind::TooLate,
            SchedulingError::SlotUnavailable { .. } => ErrorKind::SlotUnavailable,
            SchedulingError::Calculation(_) => ErrorKind::Calculation,
            SchedulingError::System(_) => ErrorKind::System,
        }
    }

    /// Structured context attached to the error envelope.
    #[must_use]
    pub fn details(&self) -> Option<ErrorDetails> {
        match self {
            SchedulingError::Validation(report) => Some(ErrorDetails::Validation {
                errors: report.errors.clone(),
            }),
            SchedulingError::SlotUnavailable {
                alternative_slots,
                next_available_date,
                ..
            } => Some(ErrorDetails::SlotConflict {
                alternative_slots: alternative_slots.clone(),
                next_available_date: *next_available_date,
            }),
            SchedulingError::InvalidBookingStatus { current, .. } => {
                Some(ErrorDetails::Status {
                    current_status: *current,
                })
            }
            _ => None,
        }
    }
}

impl From<StoreError> for SchedulingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SchedulingError::BookingNotFound(id),
            StoreError::InvalidStatus { current, expected } => {
                SchedulingError::InvalidBookingStatus { current, expected }
            }
            StoreError::TooLate { hours } => SchedulingError::CancellationTooLate { hours },
            StoreError::FeedbackExists(id) => SchedulingError::FeedbackExists(id),
        }
    }
}

impl From<FeeError> for SchedulingError {
    fn from(err: FeeError) -> Self {
        match err {
            FeeError::UnknownBillingModel(model) => SchedulingError::InvalidBillingModel(model),
            FeeError::UnknownWasteType(waste_type) => {
                SchedulingError::InvalidWasteType(waste_type)
            }
            FeeError::NoBins => SchedulingError::NoBinsSelected,
            FeeError::InvalidWeight(_) => SchedulingError::Validation(ValidationReport {
                errors: vec![err.to_string()],
            }),
            FeeError::Overflow(_) => SchedulingError::Calculation(err.to_string()),
        }
    }
}

impl From<DateRejection> for SchedulingError {
    fn from(err: DateRejection) -> Self {
        SchedulingError::InvalidDate(err.to_string())
    }
}

impl From<PortError> for SchedulingError {
    fn from(err: PortError) -> Self {
        SchedulingError::System(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
/// Extra context carried by some errors.
pub enum ErrorDetails {
    /// Every violated validation rule.
    Validation {
        /// Messages in check order.
        errors: Vec<String>,
    },
    /// Alternatives for a taken slot.
    SlotConflict {
        /// Other slots still open that day.
        alternative_slots: Vec<TimeSlot>,
        /// Next day on which the requested slot is open.
        next_available_date: Option<NaiveDate>,
    },
    /// Lifecycle state that blocked the operation.
    Status {
        /// State the booking is in.
        current_status: BookingStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Failure envelope: `{success: false, error, code, details?}`.
pub struct ErrorEnvelope {
    /// Always `false`.
    pub success: bool,
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code.
    pub code: String,
    /// Structured context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl From<&SchedulingError> for ErrorEnvelope {
    fn from(err: &SchedulingError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            code: err.code().to_owned(),
            details: err.details(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// Outcome of a facade call in the shape clients consume.
pub enum Envelope<T> {
    /// `{success: true, data}`.
    Success {
        /// Always `true`.
        success: bool,
        /// Operation-specific payload.
        data: T,
    },
    /// `{success: false, error, code, details?}`.
    Failure(ErrorEnvelope),
}

impl<T> From<Result<T, SchedulingError>> for Envelope<T> {
    fn from(result: Result<T, SchedulingError>) -> Self {
        match result {
            Ok(data) => Envelope::Success {
                success: true,
                data,
            },
            Err(err) => Envelope::Failure(ErrorEnvelope::from(&err)),
        }
    }
}

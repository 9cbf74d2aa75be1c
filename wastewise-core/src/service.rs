//! High-level scheduling facade combining date rules, fees, validation, and the store.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::SchedulingRules;
use crate::dates::{AvailableDate, DateRules, parse_iso_date};
use crate::error::SchedulingError;
use crate::fees::{FeeBreakdown, FeeEngine};
use crate::model::{
    AccountStatus, Bin, BillingModelKind, Booking, BookingId, Catalog, Feedback, Resident,
    ResidentId, TimeSlot, WasteTypeDefinition,
};
use crate::notify::{Notification, Outbox, TemplateVars};
use crate::plugin::{SchedulingPlugin, ServiceArea};
use crate::ports::{BookingRepository, Clock, ResidentDirectory, SlotAvailability, SystemClock};
use crate::store::{BookingStatistics, BookingStore};
use crate::validation::{BookingRequest, FeedbackRequest, ValidationReport, Validator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
/// Fee quote request as sent by a client.
pub struct FeeRequest {
    /// Waste type key.
    pub waste_type: Option<String>,
    /// Bins to price; only the count matters.
    pub bin_ids: Option<Vec<String>>,
    /// Billing model key, the configured default when absent.
    pub billing_model: Option<String>,
    /// Weight estimate in kg, `0` when absent.
    pub estimated_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Bins of a resident eligible for pickup.
pub struct ResidentBins {
    /// Resident record.
    pub resident: Resident,
    /// Active linked bins.
    pub bins: Vec<Bin>,
    /// Active smart bins whose fill level reached their auto-pickup threshold.
    pub auto_pickup_bins: Vec<Bin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Confirmation that a slot can be booked.
pub struct SlotCheck {
    /// Requested day.
    pub date: NaiveDate,
    /// Requested slot.
    pub time_slot: TimeSlot,
    /// Always `true`; conflicts are reported as errors.
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Bookings of a resident, newest first.
pub struct BookingHistory {
    /// Bookings, newest first.
    pub bookings: Vec<Booking>,
    /// Number of bookings.
    pub total_bookings: usize,
}

/// Public entry point for fee quotes, bookings, cancellations, and feedback.
pub struct SchedulingService {
    area: ServiceArea,
    catalog: Arc<Catalog>,
    rules: SchedulingRules,
    directory: Arc<dyn ResidentDirectory>,
    availability: Arc<dyn SlotAvailability>,
    clock: Arc<dyn Clock>,
    dates: DateRules,
    fees: FeeEngine,
    validator: Validator,
    store: BookingStore,
    outbox: Outbox,
}

impl SchedulingService {
    /// Create a service over the plugin's collaborators, using the system clock
    /// and an in-memory booking store.
    #[must_use]
    pub fn new(plugin: SchedulingPlugin, rules: SchedulingRules) -> Self {
        let dates = DateRules::new(&rules, plugin.catalog.blackout_dates.clone());
        Self {
            fees: FeeEngine::new(Arc::clone(&plugin.catalog), &rules),
            validator: Validator::new(&rules, dates.clone()),
            store: BookingStore::new(&rules),
            outbox: Outbox::default(),
            dates,
            area: plugin.area,
            catalog: plugin.catalog,
            directory: plugin.directory,
            availability: plugin.availability,
            clock: Arc::new(SystemClock),
            rules,
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the booking storage. Bookings already created are dropped.
    #[must_use]
    pub fn with_repository(mut self, repository: Box<dyn BookingRepository>) -> Self {
        self.store = BookingStore::with_repository(&self.rules, repository);
        self
    }

    /// Area this service schedules for.
    #[must_use]
    pub fn area(&self) -> &ServiceArea {
        &self.area
    }

    /// Rules in effect.
    #[must_use]
    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    /// Underlying booking store, e.g. for the crew's completion hook.
    #[must_use]
    pub fn store(&self) -> &BookingStore {
        &self.store
    }

    /// Collectable waste types.
    #[must_use]
    pub fn waste_types(&self) -> &[WasteTypeDefinition] {
        &self.catalog.waste_types
    }

    /// Bookable time slots.
    #[must_use]
    pub fn time_slots(&self) -> &[TimeSlot] {
        &self.catalog.time_slots
    }

    /// Days that can currently be booked.
    #[must_use]
    pub fn available_dates(&self) -> Vec<AvailableDate> {
        self.dates.available_dates(self.clock.now())
    }

    /// Active bins of a resident plus those waiting for an automatic pickup.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::MissingResidentId`],
    /// [`SchedulingError::ResidentNotFound`], [`SchedulingError::AccountInactive`],
    /// [`SchedulingError::NoBinsLinked`], [`SchedulingError::NoActiveBins`], or
    /// [`SchedulingError::System`] when the directory fails.
    pub async fn resident_bins(&self, resident_id: &str) -> Result<ResidentBins, SchedulingError> {
        let resident_id = required(resident_id).ok_or(SchedulingError::MissingResidentId)?;

        let resident = self
            .directory
            .resident(&ResidentId::from(resident_id))
            .await?
            .ok_or_else(|| SchedulingError::ResidentNotFound(resident_id.to_owned()))?;
        if resident.account_status != AccountStatus::Active {
            return Err(SchedulingError::AccountInactive);
        }
        if resident.linked_bins.is_empty() {
            return Err(SchedulingError::NoBinsLinked);
        }

        let bins: Vec<Bin> = self
            .directory
            .bins(&resident.linked_bins)
            .await?
            .into_iter()
            .filter(Bin::is_active)
            .collect();
        if bins.is_empty() {
            return Err(SchedulingError::NoActiveBins);
        }
        let auto_pickup_bins = bins
            .iter()
            .filter(|bin| bin.needs_auto_pickup())
            .cloned()
            .collect();

        Ok(ResidentBins {
            resident,
            bins,
            auto_pickup_bins,
        })
    }

    /// Check that `time_slot` can be booked on `date` (`YYYY-MM-DD`).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::MissingParameters`],
    /// [`SchedulingError::InvalidDate`], [`SchedulingError::InvalidTimeSlot`],
    /// or [`SchedulingError::SlotUnavailable`] with alternatives.
    pub fn check_availability(
        &self,
        date: &str,
        time_slot: &str,
    ) -> Result<SlotCheck, SchedulingError> {
        let (Some(raw_date), Some(slot_id)) = (required(date), required(time_slot)) else {
            return Err(SchedulingError::MissingParameters);
        };
        let day = parse_iso_date(raw_date).ok_or_else(|| {
            SchedulingError::InvalidDate("Date must be a valid YYYY-MM-DD date".to_owned())
        })?;
        let now = self.clock.now();
        self.dates.validate(day, now)?;

        let slot = self.open_slot(day, slot_id, now)?;
        Ok(SlotCheck {
            date: day,
            time_slot: slot.clone(),
            available: true,
        })
    }

    fn open_slot(
        &self,
        date: NaiveDate,
        slot_id: &str,
        now: NaiveDateTime,
    ) -> Result<&TimeSlot, SchedulingError> {
        let slot = self
            .catalog
            .time_slot(slot_id)
            .ok_or_else(|| SchedulingError::InvalidTimeSlot(slot_id.to_owned()))?;
        if !self.availability.is_blocked(date, slot) {
            return Ok(slot);
        }

        let alternative_slots = self
            .catalog
            .time_slots
            .iter()
            .filter(|other| other.id != slot.id && !self.availability.is_blocked(date, other))
            .cloned()
            .collect();
        let next_available_date = self
            .dates
            .valid_dates_after(date, now)
            .find(|candidate| !self.availability.is_blocked(*candidate, slot));

        tracing::debug!(%date, slot = slot_id, "slot unavailable");
        Err(SchedulingError::SlotUnavailable {
            date,
            slot: slot.id.clone(),
            alternative_slots,
            next_available_date,
        })
    }

    /// Quote a pickup.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::MissingWasteType`],
    /// [`SchedulingError::NoBinsSelected`], [`SchedulingError::InvalidWasteType`],
    /// [`SchedulingError::InvalidBillingModel`], a validation error for a bad
    /// weight, or [`SchedulingError::Calculation`].
    pub fn calculate_fee(&self, request: &FeeRequest) -> Result<FeeBreakdown, SchedulingError> {
        let waste_type = required(request.waste_type.as_deref().unwrap_or_default())
            .ok_or(SchedulingError::MissingWasteType)?;
        let bin_count = request.bin_ids.as_ref().map_or(0, Vec::len);
        if bin_count == 0 {
            return Err(SchedulingError::NoBinsSelected);
        }
        if self.catalog.waste_type(waste_type).is_none() {
            return Err(SchedulingError::InvalidWasteType(waste_type.to_owned()));
        }

        let model = match request.billing_model.as_deref().and_then(required) {
            Some(raw) => raw
                .parse::<BillingModelKind>()
                .map_err(|err| SchedulingError::InvalidBillingModel(err.0))?,
            None => self.rules.default_billing_model,
        };
        let weight = request.estimated_weight.unwrap_or_default();

        self.fees
            .compute(model, waste_type, bin_count, weight)
            .map_err(SchedulingError::from)
    }

    /// Validate and store a booking, then notify the resident.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Validation`] listing every problem,
    /// [`SchedulingError::InvalidWasteType`], [`SchedulingError::InvalidTimeSlot`],
    /// or [`SchedulingError::SlotUnavailable`] when the slot was taken meanwhile.
    pub fn submit_booking(&self, request: &BookingRequest) -> Result<Booking, SchedulingError> {
        let now = self.clock.now();
        let draft = self
            .validator
            .validate_booking(request, now)
            .map_err(SchedulingError::Validation)?;

        let waste_type = self
            .catalog
            .waste_type(&draft.waste_type)
            .ok_or_else(|| SchedulingError::InvalidWasteType(draft.waste_type.clone()))?;
        let slot = self.open_slot(draft.scheduled_date, &draft.time_slot, now)?;

        let booking = self.store.create(draft, slot.start, now);

        let vars = template_vars(&[
            ("bookingId", booking.id.to_string()),
            ("date", booking.scheduled_date.to_string()),
            ("timeSlot", slot.label.clone()),
            ("wasteType", waste_type.label.clone()),
            ("totalFee", booking.total_fee.to_string()),
            ("currency", self.rules.currency.clone()),
        ]);
        self.notify_best_effort(&booking.resident_id, "booking_confirmed", &vars);

        Ok(booking)
    }

    /// Rate a completed booking.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Validation`], [`SchedulingError::BookingNotFound`],
    /// [`SchedulingError::InvalidBookingStatus`], or [`SchedulingError::FeedbackExists`].
    pub fn submit_feedback(&self, request: &FeedbackRequest) -> Result<Feedback, SchedulingError> {
        let draft = self
            .validator
            .validate_feedback(request)
            .map_err(SchedulingError::Validation)?;
        let feedback = self.store.attach_feedback(draft, self.clock.now())?;

        let vars = template_vars(&[
            ("bookingId", feedback.booking_id.to_string()),
            ("rating", feedback.rating.to_string()),
        ]);
        self.notify_best_effort(&feedback.resident_id, "feedback_received", &vars);

        Ok(feedback)
    }

    /// Bookings of a resident, newest first. Unknown residents get an empty history.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::MissingResidentId`] for a blank id.
    pub fn booking_history(&self, resident_id: &str) -> Result<BookingHistory, SchedulingError> {
        let resident_id = required(resident_id).ok_or(SchedulingError::MissingResidentId)?;
        let bookings = self.store.list_by_resident(&ResidentId::from(resident_id));
        Ok(BookingHistory {
            total_bookings: bookings.len(),
            bookings,
        })
    }

    /// Look up a single booking.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::BookingNotFound`].
    pub fn booking(&self, booking_id: &str) -> Result<Booking, SchedulingError> {
        let id = BookingId::from(booking_id.trim());
        self.store
            .booking(&id)
            .ok_or(SchedulingError::BookingNotFound(id))
    }

    /// Cancel a confirmed booking and notify the resident.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Validation`] for a blank id,
    /// [`SchedulingError::BookingNotFound`], [`SchedulingError::InvalidBookingStatus`],
    /// or [`SchedulingError::CancellationTooLate`].
    pub fn cancel_booking(
        &self,
        booking_id: &str,
        reason: Option<&str>,
    ) -> Result<Booking, SchedulingError> {
        let booking_id = required(booking_id).ok_or_else(|| {
            SchedulingError::Validation(ValidationReport {
                errors: vec!["Booking ID is required".to_owned()],
            })
        })?;
        let booking = self
            .store
            .cancel(&BookingId::from(booking_id), reason, self.clock.now())?;

        let vars = template_vars(&[
            ("bookingId", booking.id.to_string()),
            ("date", booking.scheduled_date.to_string()),
        ]);
        self.notify_best_effort(&booking.resident_id, "booking_cancelled", &vars);

        Ok(booking)
    }

    /// Render a catalog template for a resident and record it in the outbox.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::MissingResidentId`] or
    /// [`SchedulingError::UnknownTemplate`]; neither is fatal to callers.
    pub fn send_notification(
        &self,
        resident_id: &str,
        template_key: &str,
        vars: &TemplateVars,
    ) -> Result<Notification, SchedulingError> {
        let resident_id = required(resident_id).ok_or(SchedulingError::MissingResidentId)?;
        let Some(template) = self.catalog.template(template_key) else {
            tracing::warn!(template = template_key, "unknown notification template");
            return Err(SchedulingError::UnknownTemplate(template_key.to_owned()));
        };
        Ok(self.outbox.send(
            &ResidentId::from(resident_id),
            template_key,
            template,
            vars,
            self.clock.now(),
        ))
    }

    fn notify_best_effort(
        &self,
        resident_id: &ResidentId,
        template_key: &str,
        vars: &TemplateVars,
    ) {
        if let Err(err) = self.send_notification(&resident_id.0, template_key, vars) {
            tracing::warn!(resident = %resident_id, error = %err, "notification not sent");
        }
    }

    /// Notifications sent to a resident, newest first.
    #[must_use]
    pub fn notifications(&self, resident_id: &str) -> Vec<Notification> {
        self.outbox.for_resident(&ResidentId::from(resident_id.trim()))
    }

    /// Booking counts and average rating across all residents.
    #[must_use]
    pub fn statistics(&self) -> BookingStatistics {
        self.store.statistics()
    }
}

fn required(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn template_vars(pairs: &[(&str, String)]) -> TemplateVars {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect()
}

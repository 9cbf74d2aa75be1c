//! Scripted walk through a pickup's lifecycle against the demo catalog.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::{Value, json};
use wastewise_core::{
    BookingRequest, Clock, FeeRequest, FeedbackRequest, ManualClock, SchedulingService,
    SystemClock, TimeSlot,
};

const RESIDENT: &str = "R-1001";
const WASTE_TYPE: &str = "regular";
const ESTIMATED_WEIGHT_KG: f64 = 25.0;

/// Run the scenario on a frozen copy of the wall clock and return every step's result.
pub(crate) async fn run(service: SchedulingService) -> Result<Value> {
    let clock = Arc::new(ManualClock::new(SystemClock.now()));
    let service = service.with_clock(Arc::clone(&clock) as Arc<dyn Clock>);

    let resident_bins = service.resident_bins(RESIDENT).await?;
    let bin_ids: Vec<String> = resident_bins
        .bins
        .iter()
        .take(2)
        .map(|bin| bin.id.to_string())
        .collect();

    let quote = service.calculate_fee(&FeeRequest {
        waste_type: Some(WASTE_TYPE.to_owned()),
        bin_ids: Some(bin_ids.clone()),
        billing_model: Some(resident_bins.resident.billing_model.as_str().to_owned()),
        estimated_weight: Some(ESTIMATED_WEIGHT_KG),
    })?;

    let (date, slot) = first_open_slot(&service).context("no open slot within the horizon")?;
    let booking = service.submit_booking(&request(&bin_ids, date, &slot, quote.total))?;
    tracing::info!(booking = %booking.id, "demo booking placed");

    clock.set(booking.estimated_completion);
    let completed = service.store().mark_completed(&booking.id, clock.now())?;
    let feedback = service.submit_feedback(&FeedbackRequest {
        booking_id: Some(booking.id.to_string()),
        rating: Some(5.0),
        comment: Some("Crew was on time".to_owned()),
    })?;

    let (later_date, later_slot) =
        first_open_slot(&service).context("no open slot for the second booking")?;
    let second = service.submit_booking(&request(&bin_ids, later_date, &later_slot, quote.total))?;
    let cancelled = service.cancel_booking(&second.id.to_string(), Some("Travelling"))?;

    Ok(json!({
        "residentBins": resident_bins,
        "quote": quote,
        "booking": booking,
        "completed": completed,
        "feedback": feedback,
        "cancelled": cancelled,
        "history": service.booking_history(RESIDENT)?,
        "notifications": service.notifications(RESIDENT),
        "statistics": service.statistics(),
    }))
}

fn first_open_slot(service: &SchedulingService) -> Option<(NaiveDate, TimeSlot)> {
    service.available_dates().into_iter().find_map(|day| {
        service
            .time_slots()
            .iter()
            .find_map(|slot| service.check_availability(&day.date.to_string(), &slot.id).ok())
            .map(|check| (day.date, check.time_slot))
    })
}

fn request(bin_ids: &[String], date: NaiveDate, slot: &TimeSlot, total_fee: u32) -> BookingRequest {
    BookingRequest {
        resident_id: Some(RESIDENT.to_owned()),
        bin_ids: Some(bin_ids.to_vec()),
        waste_type: Some(WASTE_TYPE.to_owned()),
        scheduled_date: Some(date.to_string()),
        time_slot: Some(slot.id.clone()),
        total_fee: Some(total_fee),
        estimated_weight: Some(ESTIMATED_WEIGHT_KG),
    }
}

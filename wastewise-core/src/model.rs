//! Domain data structures for waste types, bins, residents, and bookings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::notify::NotificationTemplate;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a resident account.
pub struct ResidentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a physical bin.
pub struct BinId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a booking, generated by the store.
pub struct BookingId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a feedback record, generated by the store.
pub struct FeedbackId(pub String);

macro_rules! display_id {
    ($($id:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $id {
                fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                    formatter.write_str(&self.0)
                }
            }

            impl From<&str> for $id {
                fn from(raw: &str) -> Self {
                    Self(raw.to_owned())
                }
            }
        )+
    };
}

display_id!(ResidentId, BinId, BookingId, FeedbackId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Catalog entry describing a collectable waste type.
pub struct WasteTypeDefinition {
    /// Unique key, e.g. `regular` or `recyclable`.
    pub id: String,
    /// Human-friendly name.
    pub label: String,
    /// Base fee in whole currency units.
    pub base_fee: u32,
    /// Scales per-kg charges; `0.0` makes weight free.
    pub weight_multiplier: f64,
    /// Short explanation shown to residents.
    pub description: String,
    /// Icon name used by clients.
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Algorithm family used to turn bin count and weight into a fee.
pub enum BillingModelKind {
    /// Waste-type base fee plus a charge per additional bin.
    Flat,
    /// Base rate plus per-kg pricing, floored at a minimum charge.
    WeightBased,
    /// Per-bin pricing with per-kg pricing above a weight threshold.
    Hybrid,
}

impl BillingModelKind {
    /// Wire name of the model.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BillingModelKind::Flat => "flat",
            BillingModelKind::WeightBased => "weightBased",
            BillingModelKind::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for BillingModelKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown billing model: {0}")]
/// Raised when a billing model key is not one of the supported models.
pub struct UnknownBillingModel(pub String);

impl FromStr for BillingModelKind {
    type Err = UnknownBillingModel;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "flat" => Ok(BillingModelKind::Flat),
            "weightBased" => Ok(BillingModelKind::WeightBased),
            "hybrid" => Ok(BillingModelKind::Hybrid),
            other => Err(UnknownBillingModel(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Parameters of the flat billing model.
pub struct FlatRate {
    /// Nominal base rate; flat pricing charges the waste type's base fee instead.
    pub base_rate: u32,
    /// Charge for every bin beyond the first.
    pub per_bin_charge: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Parameters of the weight-based billing model.
pub struct WeightRate {
    /// Fixed part of every weight-based fee.
    pub base_rate: u32,
    /// Charge per kilogram before the waste type multiplier.
    pub per_kg_rate: u32,
    /// Floor applied to base rate plus weight fee.
    pub minimum_charge: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Parameters of the hybrid billing model.
pub struct HybridRate {
    /// Fixed part of every hybrid fee.
    pub base_rate: u32,
    /// Charge for every bin beyond the first.
    pub per_bin_charge: u32,
    /// Charge per kilogram above the threshold.
    pub per_kg_rate: u32,
    /// Weight in kg that is included without weight pricing.
    pub weight_threshold_kg: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Parameters of all supported billing models.
pub struct BillingModels {
    /// Flat model.
    pub flat: FlatRate,
    /// Weight-based model.
    pub weight_based: WeightRate,
    /// Hybrid model.
    pub hybrid: HybridRate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Named collection window on a collection day.
pub struct TimeSlot {
    /// Unique key, e.g. `morning`.
    pub id: String,
    /// Display label including the window.
    pub label: String,
    /// Start of the window.
    pub start: NaiveTime,
    /// End of the window.
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Operational state of a bin.
pub enum BinStatus {
    /// In service.
    Active,
    /// Temporarily out of service.
    Maintenance,
    /// Decommissioned.
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
/// Sensor capabilities of a bin.
///
/// An auto-pickup threshold can only exist on a smart bin whose sensor is enabled.
pub enum BinSensor {
    /// Ordinary bin without electronics.
    Standard,
    /// Smart bin with its fill sensor switched off.
    SmartSensorOff,
    /// Smart bin reporting fill levels.
    #[serde(rename_all = "camelCase")]
    SmartSensorOn {
        /// Fill percentage (0-100) from which a pickup is requested automatically.
        auto_pickup_threshold: Option<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Snapshot of a bin linked to a resident.
pub struct Bin {
    /// Unique identifier.
    pub id: BinId,
    /// Waste type key the bin is meant for.
    pub bin_type: String,
    /// Capacity in liters.
    pub capacity_liters: u32,
    /// Current fill level in percent (0-100).
    pub fill_level: u8,
    /// Operational state.
    pub status: BinStatus,
    /// Sensor capabilities.
    pub sensor: BinSensor,
}

impl Bin {
    /// Whether the bin has smart electronics.
    #[must_use]
    pub fn is_smart_bin(&self) -> bool {
        !matches!(self.sensor, BinSensor::Standard)
    }

    /// Whether the fill sensor reports readings.
    #[must_use]
    pub fn sensor_enabled(&self) -> bool {
        matches!(self.sensor, BinSensor::SmartSensorOn { .. })
    }

    /// Auto-pickup threshold, present only for smart bins with an enabled sensor.
    #[must_use]
    pub fn auto_pickup_threshold(&self) -> Option<u8> {
        match self.sensor {
            BinSensor::SmartSensorOn {
                auto_pickup_threshold,
            } => auto_pickup_threshold,
            BinSensor::Standard | BinSensor::SmartSensorOff => None,
        }
    }

    /// Whether the bin is in service.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == BinStatus::Active
    }

    /// Whether the sensor reading has reached the auto-pickup threshold.
    #[must_use]
    pub fn needs_auto_pickup(&self) -> bool {
        self.auto_pickup_threshold()
            .is_some_and(|threshold| self.fill_level >= threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Account state of a resident.
pub enum AccountStatus {
    /// Account may book pickups.
    Active,
    /// Account is disabled.
    Inactive,
    /// Account is blocked, e.g. for unpaid fees.
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Resident record as returned by the resident directory.
pub struct Resident {
    /// Unique identifier.
    pub id: ResidentId,
    /// Display name.
    pub name: String,
    /// Account state.
    pub account_status: AccountStatus,
    /// Bins registered to the resident.
    pub linked_bins: Vec<BinId>,
    /// Billing model the resident is subscribed to.
    pub billing_model: BillingModelKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Lifecycle state of a booking.
pub enum BookingStatus {
    /// Accepted and awaiting collection.
    Confirmed,
    /// Collected by the crew.
    Completed,
    /// Withdrawn by the resident.
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        };
        formatter.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Scheduled pickup.
pub struct Booking {
    /// Unique identifier.
    pub id: BookingId,
    /// Resident who booked.
    pub resident_id: ResidentId,
    /// Bins to be emptied, in the order given.
    pub bin_ids: Vec<BinId>,
    /// Waste type key.
    pub waste_type: String,
    /// Collection day.
    pub scheduled_date: NaiveDate,
    /// Time slot key.
    pub time_slot: String,
    /// Agreed fee in whole currency units.
    pub total_fee: u32,
    /// Weight estimate supplied with the booking, in kg.
    pub estimated_weight: Option<f64>,
    /// Current lifecycle state.
    pub status: BookingStatus,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Slot start plus the configured completion offset.
    pub estimated_completion: NaiveDateTime,
    /// Time the crew reported completion.
    pub completed_at: Option<NaiveDateTime>,
    /// Time of cancellation.
    pub cancelled_at: Option<NaiveDateTime>,
    /// Reason given on cancellation.
    pub cancellation_reason: Option<String>,
    /// Feedback left after completion.
    pub feedback_id: Option<FeedbackId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Rating left by a resident for a completed booking.
pub struct Feedback {
    /// Unique identifier.
    pub id: FeedbackId,
    /// Rated booking.
    pub booking_id: BookingId,
    /// Resident copied from the booking.
    pub resident_id: ResidentId,
    /// Rating from 1 to 5.
    pub rating: u8,
    /// Optional free text.
    pub comment: Option<String>,
    /// Submission time.
    pub submitted_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Static reference data loaded at startup.
pub struct Catalog {
    /// Collectable waste types.
    pub waste_types: Vec<WasteTypeDefinition>,
    /// Billing model parameters.
    pub billing_models: BillingModels,
    /// Bookable time slots, in display order.
    pub time_slots: Vec<TimeSlot>,
    /// Days excluded from scheduling.
    pub blackout_dates: BTreeSet<NaiveDate>,
    /// Notification templates by key.
    pub templates: BTreeMap<String, NotificationTemplate>,
}

impl Catalog {
    /// Look up a waste type by key.
    #[must_use]
    pub fn waste_type(&self, id: &str) -> Option<&WasteTypeDefinition> {
        self.waste_types.iter().find(|waste_type| waste_type.id == id)
    }

    /// Look up a time slot by key.
    #[must_use]
    pub fn time_slot(&self, id: &str) -> Option<&TimeSlot> {
        self.time_slots.iter().find(|slot| slot.id == id)
    }

    /// Look up a notification template by key.
    #[must_use]
    pub fn template(&self, key: &str) -> Option<&NotificationTemplate> {
        self.templates.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(sensor: BinSensor, fill_level: u8) -> Bin {
        Bin {
            id: BinId::from("BIN-1"),
            bin_type: "regular".to_owned(),
            capacity_liters: 240,
            fill_level,
            status: BinStatus::Active,
            sensor,
        }
    }

    #[test]
    fn threshold_only_exists_on_enabled_smart_bins() {
        let plain = bin(BinSensor::Standard, 90);
        assert!(!plain.is_smart_bin());
        assert_eq!(plain.auto_pickup_threshold(), None);

        let offline = bin(BinSensor::SmartSensorOff, 90);
        assert!(offline.is_smart_bin());
        assert!(!offline.sensor_enabled());
        assert_eq!(offline.auto_pickup_threshold(), None);
        assert!(!offline.needs_auto_pickup());

        let online = bin(
            BinSensor::SmartSensorOn {
                auto_pickup_threshold: Some(80),
            },
            80,
        );
        assert!(online.sensor_enabled());
        assert_eq!(online.auto_pickup_threshold(), Some(80));
        assert!(online.needs_auto_pickup());
    }

    #[test]
    fn fill_below_threshold_does_not_need_pickup() {
        let online = bin(
            BinSensor::SmartSensorOn {
                auto_pickup_threshold: Some(80),
            },
            79,
        );
        assert!(!online.needs_auto_pickup());
    }

    #[test]
    fn billing_model_keys_round_trip_through_from_str() {
        for kind in [
            BillingModelKind::Flat,
            BillingModelKind::WeightBased,
            BillingModelKind::Hybrid,
        ] {
            assert_eq!(kind.as_str().parse::<BillingModelKind>(), Ok(kind));
        }
        assert_eq!(
            "perLiter".parse::<BillingModelKind>(),
            Err(UnknownBillingModel("perLiter".to_owned()))
        );
    }
}

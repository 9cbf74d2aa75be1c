//! Demo deployment for the Colombo municipal pickup service.
//!
//! Everything here is static reference data plus an in-memory resident
//! directory standing in for the council's account backend.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use wastewise_core::{
    model::{
        AccountStatus, BillingModelKind, BillingModels, Bin, BinId, BinSensor, BinStatus, Catalog,
        FlatRate, HybridRate, Resident, ResidentId, TimeSlot, WasteTypeDefinition, WeightRate,
    },
    notify::NotificationTemplate,
    plugin::{SchedulingPlugin, ServiceArea},
    ports::{DayOfMonthPattern, PortError, ResidentDirectory},
};

/// Public and Poya holidays on which crews do not run.
const BLACKOUT_DATES: &[(i32, u32, u32)] = &[
    (2026, 1, 15),
    (2026, 2, 4),
    (2026, 4, 13),
    (2026, 4, 14),
    (2026, 5, 1),
    (2026, 10, 25),
    (2026, 11, 8),
    (2026, 11, 24),
    (2026, 12, 23),
    (2026, 12, 25),
    (2027, 1, 15),
    (2027, 2, 4),
];

/// Build the plugin bundle for the Colombo deployment.
#[must_use]
pub fn plugin() -> SchedulingPlugin {
    SchedulingPlugin {
        area: service_area(),
        catalog: Arc::new(catalog()),
        directory: Arc::new(DemoResidentDirectory::seeded()),
        availability: Arc::new(DayOfMonthPattern),
    }
}

fn service_area() -> ServiceArea {
    ServiceArea {
        id: String::from("colombo"),
        name: String::from("Colombo Municipal Council"),
    }
}

/// Waste types, billing models, time slots, blackout dates, and templates.
#[must_use]
pub fn catalog() -> Catalog {
    Catalog {
        waste_types: waste_types(),
        billing_models: BillingModels {
            flat: FlatRate {
                base_rate: 500,
                per_bin_charge: 200,
            },
            weight_based: WeightRate {
                base_rate: 300,
                per_kg_rate: 50,
                minimum_charge: 500,
            },
            hybrid: HybridRate {
                base_rate: 400,
                per_bin_charge: 150,
                per_kg_rate: 40,
                weight_threshold_kg: 20.0,
            },
        },
        time_slots: vec![
            slot("morning", "Morning (8:00 AM - 12:00 PM)", 8, 12),
            slot("afternoon", "Afternoon (12:00 PM - 4:00 PM)", 12, 16),
            slot("evening", "Evening (4:00 PM - 7:00 PM)", 16, 19),
        ],
        blackout_dates: BLACKOUT_DATES
            .iter()
            .filter_map(|&(year, month, day)| NaiveDate::from_ymd_opt(year, month, day))
            .collect::<BTreeSet<_>>(),
        templates: templates(),
    }
}

fn waste_types() -> Vec<WasteTypeDefinition> {
    let entry = |id: &str,
                 label: &str,
                 base_fee: u32,
                 weight_multiplier: f64,
                 description: &str,
                 icon: &str| WasteTypeDefinition {
        id: id.to_owned(),
        label: label.to_owned(),
        base_fee,
        weight_multiplier,
        description: description.to_owned(),
        icon: icon.to_owned(),
    };

    vec![
        entry("regular", "General Waste", 500, 1.0, "Mixed household waste", "trash"),
        entry(
            "recyclable",
            "Recyclables",
            300,
            0.8,
            "Paper, plastic, glass, and metal",
            "recycle",
        ),
        entry(
            "organic",
            "Organic Waste",
            400,
            0.9,
            "Food scraps and garden waste",
            "leaf",
        ),
        entry(
            "hazardous",
            "Hazardous Waste",
            1500,
            2.5,
            "Batteries, chemicals, and paint",
            "warning",
        ),
        entry(
            "electronic",
            "E-Waste",
            1000,
            1.5,
            "Electronics and appliances",
            "laptop",
        ),
    ]
}

fn slot(id: &str, label: &str, start_hour: u32, end_hour: u32) -> TimeSlot {
    TimeSlot {
        id: id.to_owned(),
        label: label.to_owned(),
        start: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap_or(NaiveTime::MIN),
        end: NaiveTime::from_hms_opt(end_hour, 0, 0).unwrap_or(NaiveTime::MIN),
    }
}

fn templates() -> BTreeMap<String, NotificationTemplate> {
    [
        (
            "booking_confirmed",
            "Pickup confirmed",
            "Your {wasteType} pickup on {date} ({timeSlot}) is confirmed. \
             Booking ID: {bookingId}. Total: {currency} {totalFee}.",
        ),
        (
            "booking_cancelled",
            "Pickup cancelled",
            "Booking {bookingId} for {date} has been cancelled.",
        ),
        (
            "feedback_received",
            "Thanks for your feedback",
            "You rated booking {bookingId} {rating}/5.",
        ),
        (
            "pickup_reminder",
            "Pickup tomorrow",
            "Reminder: your {wasteType} pickup is scheduled for {date} ({timeSlot}).",
        ),
    ]
    .into_iter()
    .map(|(key, title, body)| {
        (
            key.to_owned(),
            NotificationTemplate {
                title: title.to_owned(),
                body: body.to_owned(),
            },
        )
    })
    .collect()
}

/// Resident lookup backed by a fixed set of demo accounts.
pub struct DemoResidentDirectory {
    residents: HashMap<ResidentId, Resident>,
    bins: HashMap<BinId, Bin>,
}

impl DemoResidentDirectory {
    /// Directory preloaded with the demo accounts and bins.
    ///
    /// `R-1001` is an active household with four bins, `R-2001` is suspended,
    /// `R-3001` has no bins, and `R-4001` only has bins out of service.
    #[must_use]
    pub fn seeded() -> Self {
        let residents = vec![
            resident(
                "R-1001",
                "Nimal Perera",
                AccountStatus::Active,
                &["BIN-001", "BIN-002", "BIN-003", "BIN-004"],
                BillingModelKind::Hybrid,
            ),
            resident(
                "R-2001",
                "Kamala Silva",
                AccountStatus::Suspended,
                &["BIN-201"],
                BillingModelKind::Flat,
            ),
            resident(
                "R-3001",
                "Ruwan Fernando",
                AccountStatus::Active,
                &[],
                BillingModelKind::Flat,
            ),
            resident(
                "R-4001",
                "Sita Jayawardena",
                AccountStatus::Active,
                &["BIN-401", "BIN-402"],
                BillingModelKind::WeightBased,
            ),
        ];
        let bins = vec![
            bin(
                "BIN-001",
                "regular",
                240,
                85,
                BinStatus::Active,
                BinSensor::SmartSensorOn {
                    auto_pickup_threshold: Some(80),
                },
            ),
            bin("BIN-002", "recyclable", 120, 40, BinStatus::Active, BinSensor::Standard),
            bin("BIN-003", "organic", 240, 92, BinStatus::Active, BinSensor::SmartSensorOff),
            bin("BIN-004", "hazardous", 60, 10, BinStatus::Maintenance, BinSensor::Standard),
            bin("BIN-201", "regular", 240, 50, BinStatus::Active, BinSensor::Standard),
            bin("BIN-401", "regular", 240, 70, BinStatus::Inactive, BinSensor::Standard),
            bin(
                "BIN-402",
                "organic",
                120,
                95,
                BinStatus::Maintenance,
                BinSensor::SmartSensorOn {
                    auto_pickup_threshold: Some(75),
                },
            ),
        ];

        Self {
            residents: residents
                .into_iter()
                .map(|resident| (resident.id.clone(), resident))
                .collect(),
            bins: bins.into_iter().map(|bin| (bin.id.clone(), bin)).collect(),
        }
    }
}

#[async_trait]
impl ResidentDirectory for DemoResidentDirectory {
    async fn resident(&self, id: &ResidentId) -> Result<Option<Resident>, PortError> {
        Ok(self.residents.get(id).cloned())
    }

    async fn bins(&self, ids: &[BinId]) -> Result<Vec<Bin>, PortError> {
        Ok(ids.iter().filter_map(|id| self.bins.get(id)).cloned().collect())
    }
}

fn resident(
    id: &str,
    name: &str,
    account_status: AccountStatus,
    linked_bins: &[&str],
    billing_model: BillingModelKind,
) -> Resident {
    Resident {
        id: ResidentId::from(id),
        name: name.to_owned(),
        account_status,
        linked_bins: linked_bins.iter().copied().map(BinId::from).collect(),
        billing_model,
    }
}

fn bin(
    id: &str,
    bin_type: &str,
    capacity_liters: u32,
    fill_level: u8,
    status: BinStatus,
    sensor: BinSensor,
) -> Bin {
    Bin {
        id: BinId::from(id),
        bin_type: bin_type.to_owned(),
        capacity_liters,
        fill_level,
        status,
        sensor,
    }
}

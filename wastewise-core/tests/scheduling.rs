//! End-to-end scenarios for the scheduling facade.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::json;
use wastewise_core::{
    AccountStatus, BillingModelKind, BillingModels, Bin, BinId, BinSensor, BinStatus,
    BookingRequest, BookingStatus, Catalog, Clock, DayOfMonthPattern, Envelope, ErrorKind,
    FeeRequest, FeedbackRequest, FlatRate, HybridRate, ManualClock, NotificationTemplate,
    OpenSlots, PortError, Resident, ResidentDirectory, ResidentId, SchedulingError,
    SchedulingPlugin, SchedulingRules, SchedulingService, ServiceArea, SlotAvailability,
    TimeSlot, WasteTypeDefinition, WeightRate,
};

// Monday.
fn monday_morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .expect("valid timestamp")
}

const WEDNESDAY: &str = "2026-10-21";

fn hour(value: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(value, 0, 0).expect("valid time")
}

fn catalog() -> Catalog {
    let slot = |id: &str, start, end| TimeSlot {
        id: id.to_owned(),
        label: id.to_owned(),
        start: hour(start),
        end: hour(end),
    };
    let templates = [
        ("booking_confirmed", "Booking {bookingId} on {date} confirmed"),
        ("booking_cancelled", "Booking {bookingId} cancelled"),
        ("feedback_received", "Rated {rating}/5"),
    ]
    .into_iter()
    .map(|(key, body)| {
        (
            key.to_owned(),
            NotificationTemplate {
                title: key.to_owned(),
                body: body.to_owned(),
            },
        )
    })
    .collect::<BTreeMap<_, _>>();

    Catalog {
        waste_types: vec![WasteTypeDefinition {
            id: "regular".to_owned(),
            label: "General Waste".to_owned(),
            base_fee: 500,
            weight_multiplier: 1.0,
            description: String::new(),
            icon: String::new(),
        }],
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
            slot("morning", 8, 12),
            slot("afternoon", 12, 16),
            slot("evening", 16, 19),
        ],
        blackout_dates: Default::default(),
        templates,
    }
}

#[derive(Default)]
struct FixedDirectory {
    residents: HashMap<ResidentId, Resident>,
    bins: HashMap<BinId, Bin>,
    offline: bool,
}

impl FixedDirectory {
    fn with_resident(mut self, id: &str, status: AccountStatus, bins: Vec<Bin>) -> Self {
        let resident = Resident {
            id: ResidentId::from(id),
            name: id.to_owned(),
            account_status: status,
            linked_bins: bins.iter().map(|bin| bin.id.clone()).collect(),
            billing_model: BillingModelKind::Flat,
        };
        self.residents.insert(resident.id.clone(), resident);
        self.bins
            .extend(bins.into_iter().map(|bin| (bin.id.clone(), bin)));
        self
    }
}

#[async_trait]
impl ResidentDirectory for FixedDirectory {
    async fn resident(&self, id: &ResidentId) -> Result<Option<Resident>, PortError> {
        if self.offline {
            return Err(PortError::Unavailable("directory offline".to_owned()));
        }
        Ok(self.residents.get(id).cloned())
    }

    async fn bins(&self, ids: &[BinId]) -> Result<Vec<Bin>, PortError> {
        Ok(ids.iter().filter_map(|id| self.bins.get(id)).cloned().collect())
    }
}

fn bin(id: &str, status: BinStatus, fill_level: u8, sensor: BinSensor) -> Bin {
    Bin {
        id: BinId::from(id),
        bin_type: "regular".to_owned(),
        capacity_liters: 240,
        fill_level,
        status,
        sensor,
    }
}

fn service_with(
    directory: FixedDirectory,
    availability: Arc<dyn SlotAvailability>,
) -> (SchedulingService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(monday_morning()));
    let plugin = SchedulingPlugin {
        area: ServiceArea {
            id: "test".to_owned(),
            name: "Test Area".to_owned(),
        },
        catalog: Arc::new(catalog()),
        directory: Arc::new(directory),
        availability,
    };
    let shared: Arc<dyn Clock> = Arc::clone(&clock) as Arc<dyn Clock>;
    let service = SchedulingService::new(plugin, SchedulingRules::default()).with_clock(shared);
    (service, clock)
}

fn service() -> (SchedulingService, Arc<ManualClock>) {
    service_with(FixedDirectory::default(), Arc::new(OpenSlots))
}

fn booking_request(date: &str, slot: &str) -> BookingRequest {
    BookingRequest {
        resident_id: Some("R-1".to_owned()),
        bin_ids: Some(vec!["BIN-1".to_owned(), "BIN-2".to_owned()]),
        waste_type: Some("regular".to_owned()),
        scheduled_date: Some(date.to_owned()),
        time_slot: Some(slot.to_owned()),
        total_fee: Some(826),
        estimated_weight: None,
    }
}

#[test]
fn flat_quote_adds_bins_and_tax() {
    let (service, _clock) = service();
    let fee = service
        .calculate_fee(&FeeRequest {
            waste_type: Some("regular".to_owned()),
            bin_ids: Some(vec!["BIN-1".to_owned(), "BIN-2".to_owned()]),
            billing_model: None,
            estimated_weight: None,
        })
        .expect("quote");

    assert_eq!(fee.billing_model, BillingModelKind::Flat);
    assert_eq!(fee.base_fee, 500);
    assert_eq!(fee.bin_fee, 200);
    assert_eq!(fee.subtotal, 700);
    assert_eq!(fee.tax, 126);
    assert_eq!(fee.total, 826);
    assert_eq!(fee.currency, "LKR");
}

#[test]
fn quote_errors_carry_codes() {
    let (service, _clock) = service();
    let base = FeeRequest {
        waste_type: Some("regular".to_owned()),
        bin_ids: Some(vec!["BIN-1".to_owned()]),
        billing_model: None,
        estimated_weight: None,
    };

    let cases = [
        (
            FeeRequest {
                waste_type: Some("  ".to_owned()),
                ..base.clone()
            },
            "MISSING_WASTE_TYPE",
        ),
        (
            FeeRequest {
                bin_ids: Some(Vec::new()),
                ..base.clone()
            },
            "NO_BINS_SELECTED",
        ),
        (
            FeeRequest {
                waste_type: Some("asbestos".to_owned()),
                ..base.clone()
            },
            "INVALID_WASTE_TYPE",
        ),
        (
            FeeRequest {
                billing_model: Some("perLitre".to_owned()),
                ..base.clone()
            },
            "INVALID_BILLING_MODEL",
        ),
        (
            FeeRequest {
                billing_model: Some("weightBased".to_owned()),
                estimated_weight: Some(-1.0),
                ..base
            },
            "VALIDATION_ERROR",
        ),
    ];
    for (request, code) in cases {
        let err = service.calculate_fee(&request).expect_err(code);
        assert_eq!(err.code(), code);
    }
}

#[test]
fn booking_lifecycle_with_feedback() {
    let (service, clock) = service();

    let booking = service
        .submit_booking(&booking_request(WEDNESDAY, "afternoon"))
        .expect("booking accepted");
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert!(booking.id.0.starts_with("BK-"));
    assert_eq!(
        booking.estimated_completion,
        booking.scheduled_date.and_time(hour(14))
    );

    // Residents may only rate collected pickups.
    let early = service
        .submit_feedback(&FeedbackRequest {
            booking_id: Some(booking.id.0.clone()),
            rating: Some(5.0),
            comment: None,
        })
        .expect_err("not completed yet");
    assert_eq!(early.code(), "INVALID_BOOKING_STATUS");

    clock.advance(Duration::days(2));
    service
        .store()
        .mark_completed(&booking.id, clock.now())
        .expect("crew completes");

    let feedback = FeedbackRequest {
        booking_id: Some(booking.id.0.clone()),
        rating: Some(4.0),
        comment: Some("  On time  ".to_owned()),
    };
    let recorded = service.submit_feedback(&feedback).expect("feedback accepted");
    assert_eq!(recorded.comment.as_deref(), Some("On time"));
    assert_eq!(recorded.resident_id, ResidentId::from("R-1"));

    let again = service.submit_feedback(&feedback).expect_err("duplicate");
    assert_eq!(again.code(), "FEEDBACK_EXISTS");

    let stored = service.booking(&booking.id.0).expect("stored");
    assert_eq!(stored.feedback_id, Some(recorded.id));

    let stats = service.statistics();
    assert_eq!(stats.total_bookings, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.total_feedback, 1);
    assert!((stats.average_rating - 4.0).abs() < f64::EPSILON);
}

#[test]
fn cancellation_respects_notice_window() {
    let (service, clock) = service();

    let first = service
        .submit_booking(&booking_request(WEDNESDAY, "morning"))
        .expect("booking accepted");
    let cancelled = service
        .cancel_booking(&first.id.0, Some("Away"))
        .expect("47 hours of notice");
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Away"));

    let repeat = service
        .cancel_booking(&first.id.0, None)
        .expect_err("already cancelled");
    assert_eq!(repeat.code(), "INVALID_BOOKING_STATUS");
    assert_eq!(repeat.kind(), ErrorKind::InvalidStatus);

    let second = service
        .submit_booking(&booking_request(WEDNESDAY, "evening"))
        .expect("booking accepted");
    // Tuesday 09:00, 23 hours before the 08:00 anchor.
    clock.advance(Duration::days(1));
    let late = service
        .cancel_booking(&second.id.0, None)
        .expect_err("inside the window");
    assert_eq!(late, SchedulingError::CancellationTooLate { hours: 24 });
    assert_eq!(late.code(), "CANCELLATION_TOO_LATE");

    let blank = service.cancel_booking("  ", None).expect_err("blank id");
    assert_eq!(blank.code(), "VALIDATION_ERROR");
    let unknown = service.cancel_booking("BK-0", None).expect_err("unknown id");
    assert_eq!(unknown.code(), "BOOKING_NOT_FOUND");
}

#[test]
fn invalid_booking_lists_every_problem() {
    let (service, _clock) = service();
    let request = BookingRequest {
        resident_id: None,
        bin_ids: Some(vec!["BIN-1".to_owned(), "BIN-1".to_owned()]),
        waste_type: Some("regular".to_owned()),
        scheduled_date: Some("2026-10-24".to_owned()),
        time_slot: None,
        ..BookingRequest::default()
    };

    let Err(SchedulingError::Validation(report)) = service.submit_booking(&request) else {
        panic!("expected a validation error");
    };
    assert_eq!(
        report.errors,
        vec![
            "Resident ID is required",
            "Each bin may only be listed once",
            "Collection is not available on weekends",
            "Time slot is required",
        ]
    );
}

#[test]
fn taken_slot_suggests_alternatives() {
    let (service, _clock) = service_with(FixedDirectory::default(), Arc::new(DayOfMonthPattern));

    // 21 is divisible by 7, so the morning is taken.
    let err = service
        .check_availability(WEDNESDAY, "morning")
        .expect_err("morning is full");
    let SchedulingError::SlotUnavailable {
        alternative_slots,
        next_available_date,
        ..
    } = &err
    else {
        panic!("expected a slot conflict, got {err:?}");
    };
    let alternatives: Vec<&str> = alternative_slots
        .iter()
        .map(|slot| slot.id.as_str())
        .collect();
    assert_eq!(alternatives, ["afternoon", "evening"]);
    assert_eq!(
        *next_available_date,
        NaiveDate::from_ymd_opt(2026, 10, 22)
    );

    let envelope = serde_json::to_value(Envelope::<()>::from(Err(err))).expect("serializable");
    assert_eq!(envelope["code"], json!("SLOT_UNAVAILABLE"));
    assert_eq!(envelope["details"]["nextAvailableDate"], json!("2026-10-22"));

    let booking = service.submit_booking(&booking_request(WEDNESDAY, "morning"));
    assert_eq!(
        booking.map_err(|err| err.code()),
        Err("SLOT_UNAVAILABLE")
    );

    let open = service
        .check_availability(WEDNESDAY, "afternoon")
        .expect("afternoon is open");
    assert!(open.available);
}

#[test]
fn availability_rejects_bad_input() {
    let (service, _clock) = service();

    let cases = [
        ("", "morning", "MISSING_PARAMETERS"),
        ("21/10/2026", "morning", "INVALID_DATE"),
        // Tomorrow at midnight is less than 24 hours away.
        ("2026-10-20", "morning", "INVALID_DATE"),
        (WEDNESDAY, "night", "INVALID_TIME_SLOT"),
    ];
    for (date, slot, code) in cases {
        let err = service.check_availability(date, slot).expect_err(code);
        assert_eq!(err.code(), code, "{date} {slot}");
    }
}

#[test]
fn history_is_newest_first_and_empty_for_strangers() {
    let (service, clock) = service();

    let older = service
        .submit_booking(&booking_request(WEDNESDAY, "morning"))
        .expect("booking accepted");
    clock.advance(Duration::minutes(5));
    let newer = service
        .submit_booking(&booking_request("2026-10-22", "morning"))
        .expect("booking accepted");

    let history = service.booking_history("R-1").expect("history");
    assert_eq!(history.total_bookings, 2);
    let ids: Vec<_> = history.bookings.iter().map(|booking| &booking.id).collect();
    assert_eq!(ids, [&newer.id, &older.id]);

    let empty: Envelope<_> = service.booking_history("R-unknown").into();
    assert_eq!(
        serde_json::to_value(&empty).expect("serializable"),
        json!({"success": true, "data": {"bookings": [], "totalBookings": 0}})
    );

    let blank = service.booking_history(" ").expect_err("blank id");
    assert_eq!(blank.code(), "MISSING_RESIDENT_ID");
}

#[test]
fn lifecycle_notifications_are_recorded() {
    let (service, clock) = service();

    let booking = service
        .submit_booking(&booking_request(WEDNESDAY, "morning"))
        .expect("booking accepted");
    clock.advance(Duration::minutes(1));
    service
        .cancel_booking(&booking.id.0, None)
        .expect("cancelled");

    let sent = service.notifications("R-1");
    let templates: Vec<&str> = sent.iter().map(|note| note.template.as_str()).collect();
    assert_eq!(templates, ["booking_cancelled", "booking_confirmed"]);
    assert_eq!(
        sent.last().map(|note| note.message.as_str()),
        Some(format!("Booking {} on {WEDNESDAY} confirmed", booking.id).as_str())
    );

    let err = service
        .send_notification("R-1", "pickup_reminder", &BTreeMap::new())
        .expect_err("template not in catalog");
    assert_eq!(err.code(), "UNKNOWN_TEMPLATE");
    assert_eq!(service.notifications("R-1").len(), 2);
}

#[tokio::test]
async fn resident_bins_filters_inactive_and_flags_full_smart_bins() {
    let directory = FixedDirectory::default()
        .with_resident(
            "R-1",
            AccountStatus::Active,
            vec![
                bin(
                    "BIN-1",
                    BinStatus::Active,
                    90,
                    BinSensor::SmartSensorOn {
                        auto_pickup_threshold: Some(80),
                    },
                ),
                bin("BIN-2", BinStatus::Active, 95, BinSensor::SmartSensorOff),
                bin("BIN-3", BinStatus::Maintenance, 10, BinSensor::Standard),
            ],
        )
        .with_resident("R-2", AccountStatus::Suspended, Vec::new())
        .with_resident("R-3", AccountStatus::Active, Vec::new())
        .with_resident(
            "R-4",
            AccountStatus::Active,
            vec![bin("BIN-4", BinStatus::Inactive, 0, BinSensor::Standard)],
        );
    let (service, _clock) = service_with(directory, Arc::new(OpenSlots));

    let found = service.resident_bins("R-1").await.expect("resident");
    let active: Vec<&str> = found.bins.iter().map(|bin| bin.id.0.as_str()).collect();
    assert_eq!(active, ["BIN-1", "BIN-2"]);
    let auto: Vec<&str> = found
        .auto_pickup_bins
        .iter()
        .map(|bin| bin.id.0.as_str())
        .collect();
    assert_eq!(auto, ["BIN-1"]);

    for (resident, code) in [
        ("", "MISSING_RESIDENT_ID"),
        ("R-404", "RESIDENT_NOT_FOUND"),
        ("R-2", "ACCOUNT_INACTIVE"),
        ("R-3", "NO_BINS_LINKED"),
        ("R-4", "NO_ACTIVE_BINS"),
    ] {
        let err = service.resident_bins(resident).await.expect_err(code);
        assert_eq!(err.code(), code, "{resident}");
    }
}

#[tokio::test]
async fn directory_outage_is_a_system_error() {
    let directory = FixedDirectory {
        offline: true,
        ..FixedDirectory::default()
    };
    let (service, _clock) = service_with(directory, Arc::new(OpenSlots));

    let err = service.resident_bins("R-1").await.expect_err("offline");
    assert_eq!(err.code(), "SYSTEM_ERROR");
    assert_eq!(err.kind(), ErrorKind::System);
}

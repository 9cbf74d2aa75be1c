//! Bundle of collaborators a deployment plugs into the scheduling service.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::Catalog;
use crate::ports::{ResidentDirectory, SlotAvailability};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Metadata describing the municipality a plugin serves.
pub struct ServiceArea {
    /// Unique identifier.
    pub id: String,
    /// Localized display name.
    pub name: String,
}

/// Static data and backends implementing a deployment.
pub struct SchedulingPlugin {
    /// Static metadata describing the service area.
    pub area: ServiceArea,
    /// Waste types, billing models, slots, blackout dates, and templates.
    pub catalog: Arc<Catalog>,
    /// Implementation for resident and bin lookups.
    pub directory: Arc<dyn ResidentDirectory>,
    /// Implementation deciding slot conflicts.
    pub availability: Arc<dyn SlotAvailability>,
}

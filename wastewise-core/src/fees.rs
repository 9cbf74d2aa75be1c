//! Fee calculation for the flat, weight-based, and hybrid billing models.
//!
//! Amounts are whole currency units. Tax is charged on the subtotal and rounded
//! half-up; weight charges are rounded up to the next whole unit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SchedulingRules;
use crate::model::{BillingModelKind, Catalog, WasteTypeDefinition};

/// Precision used to strip floating noise before rounding weight charges.
const WEIGHT_FEE_PRECISION: f64 = 1_000_000.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Errors raised by the fee engine.
pub enum FeeError {
    /// Billing model key is not supported.
    #[error("Unknown billing model: {0}")]
    UnknownBillingModel(String),
    /// Waste type key is not in the catalog.
    #[error("Unknown waste type: {0}")]
    UnknownWasteType(String),
    /// At least one bin must be priced.
    #[error("Bin count must be at least 1")]
    NoBins,
    /// Weight must be a finite, non-negative number of kilograms.
    #[error("Invalid estimated weight: {0}")]
    InvalidWeight(f64),
    /// An intermediate amount does not fit the currency range.
    #[error("Fee amount overflow while computing {0}")]
    Overflow(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Itemized fee for a pickup.
pub struct FeeBreakdown {
    /// Model the fee was computed with.
    pub billing_model: BillingModelKind,
    /// Waste type that was priced.
    pub waste_type: WasteTypeDefinition,
    /// Currency code of all amounts.
    pub currency: String,
    /// Number of bins priced.
    pub bin_count: usize,
    /// Weight estimate in kg.
    pub estimated_weight: f64,
    /// Base fee of the model.
    pub base_fee: u32,
    /// Charge for additional bins.
    pub bin_fee: u32,
    /// Charge for weight.
    pub weight_fee: u32,
    /// Waste-type specific surcharge.
    pub waste_type_surcharge: u32,
    /// Sum before tax.
    pub subtotal: u32,
    /// Tax on the subtotal.
    pub tax: u32,
    /// Amount due.
    pub total: u32,
}

/// Computes fee breakdowns against an injected catalog.
#[derive(Debug, Clone)]
pub struct FeeEngine {
    catalog: Arc<Catalog>,
    tax_rate: f64,
    currency: String,
}

impl FeeEngine {
    /// Create an engine pricing against `catalog` with the configured tax and currency.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, rules: &SchedulingRules) -> Self {
        Self {
            catalog,
            tax_rate: rules.tax_rate,
            currency: rules.currency.clone(),
        }
    }

    /// Compute the fee for a model given by its wire key.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::UnknownBillingModel`] for unsupported keys and any
    /// error of [`FeeEngine::compute`].
    pub fn compute_fee(
        &self,
        billing_model: &str,
        waste_type_id: &str,
        bin_count: usize,
        estimated_weight: f64,
    ) -> Result<FeeBreakdown, FeeError> {
        let model = billing_model
            .parse::<BillingModelKind>()
            .map_err(|err| FeeError::UnknownBillingModel(err.0))?;
        self.compute(model, waste_type_id, bin_count, estimated_weight)
    }

    /// Compute the fee for a pickup of `bin_count` bins weighing `estimated_weight` kg.
    ///
    /// # Errors
    ///
    /// Returns a [`FeeError`] for unknown waste types, an empty bin list, a
    /// negative or non-finite weight, or amounts that overflow.
    pub fn compute(
        &self,
        model: BillingModelKind,
        waste_type_id: &str,
        bin_count: usize,
        estimated_weight: f64,
    ) -> Result<FeeBreakdown, FeeError> {
        let waste_type = self
            .catalog
            .waste_type(waste_type_id)
            .ok_or_else(|| FeeError::UnknownWasteType(waste_type_id.to_owned()))?;
        if bin_count == 0 {
            return Err(FeeError::NoBins);
        }
        if !estimated_weight.is_finite() || estimated_weight < 0.0 {
            return Err(FeeError::InvalidWeight(estimated_weight));
        }

        let extra_bins =
            u32::try_from(bin_count - 1).map_err(|_overflow| FeeError::Overflow("bin fee"))?;
        let rates = &self.catalog.billing_models;

        let (base_fee, bin_fee, weight_fee) = match model {
            BillingModelKind::Flat => {
                let bin_fee = extra_bins
                    .checked_mul(rates.flat.per_bin_charge)
                    .ok_or(FeeError::Overflow("bin fee"))?;
                (waste_type.base_fee, bin_fee, 0)
            }
            BillingModelKind::WeightBased => {
                let rate = rates.weight_based;
                let weight_fee = weight_charge(
                    estimated_weight,
                    rate.per_kg_rate,
                    waste_type.weight_multiplier,
                )?;
                (rate.base_rate, 0, weight_fee)
            }
            BillingModelKind::Hybrid => {
                let rate = rates.hybrid;
                let bin_fee = extra_bins
                    .checked_mul(rate.per_bin_charge)
                    .ok_or(FeeError::Overflow("bin fee"))?;
                let weight_fee = if estimated_weight > rate.weight_threshold_kg {
                    let charge = weight_charge(
                        estimated_weight - rate.weight_threshold_kg,
                        rate.per_kg_rate,
                        waste_type.weight_multiplier,
                    )?;
                    // Excess too small to survive noise removal still costs one unit.
                    if rate.per_kg_rate > 0 && waste_type.weight_multiplier > 0.0 {
                        charge.max(1)
                    } else {
                        charge
                    }
                } else {
                    0
                };
                (rate.base_rate, bin_fee, weight_fee)
            }
        };

        let waste_type_surcharge = 0;
        let mut subtotal = base_fee
            .checked_add(bin_fee)
            .and_then(|sum| sum.checked_add(weight_fee))
            .and_then(|sum| sum.checked_add(waste_type_surcharge))
            .ok_or(FeeError::Overflow("subtotal"))?;
        if model == BillingModelKind::WeightBased {
            subtotal = subtotal.max(rates.weight_based.minimum_charge);
        }

        let tax = to_amount((f64::from(subtotal) * self.tax_rate).round(), "tax")?;
        let total = subtotal
            .checked_add(tax)
            .ok_or(FeeError::Overflow("total"))?;

        tracing::debug!(
            model = %model,
            waste_type = waste_type_id,
            bin_count,
            estimated_weight,
            subtotal,
            tax,
            total,
            "computed fee"
        );

        Ok(FeeBreakdown {
            billing_model: model,
            waste_type: waste_type.clone(),
            currency: self.currency.clone(),
            bin_count,
            estimated_weight,
            base_fee,
            bin_fee,
            weight_fee,
            waste_type_surcharge,
            subtotal,
            tax,
            total,
        })
    }
}

fn weight_charge(weight_kg: f64, per_kg_rate: u32, multiplier: f64) -> Result<u32, FeeError> {
    let raw = weight_kg * f64::from(per_kg_rate) * multiplier;
    let cleaned = (raw * WEIGHT_FEE_PRECISION).round() / WEIGHT_FEE_PRECISION;
    to_amount(cleaned.ceil(), "weight fee")
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "range is checked right before the cast"
)]
fn to_amount(value: f64, what: &'static str) -> Result<u32, FeeError> {
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(FeeError::Overflow(what));
    }
    Ok(value as u32)
}

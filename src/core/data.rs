use serde::Serialize;

use crate::models::nursing::NursingEntry;

/// Parses a free-text clinical value. Accepts a comma decimal separator.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Out-of-range flag for a lab value. Only numeric values with both
/// reference bounds can be flagged.
pub fn out_of_range(value: &str, min: Option<f64>, max: Option<f64>) -> bool {
    match (parse_number(value), min, max) {
        (Some(v), Some(lo), Some(hi)) => !(lo <= v && v <= hi),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FluidTotals {
    pub administered: f64,
    pub eliminated: f64,
    pub balance: f64,
}

pub fn fluid_totals(entries: &[NursingEntry]) -> FluidTotals {
    let mut totals = FluidTotals::default();
    for entry in entries {
        totals.administered += entry.intake.amount.unwrap_or(0.0);
        totals.eliminated += entry.output.amount.unwrap_or(0.0);
    }
    totals.balance = totals.administered - totals.eliminated;
    totals
}

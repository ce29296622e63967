use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::medication::PrescribedMedication;

/// Prescribed amount for one medication code, with the dosing detail of the
/// last prescription line that named it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Formulated {
    pub code: String,
    pub total: f64,
    pub dose: String,
    pub frequency: String,
    pub unit: String,
}

/// One row of the dosing sheet shown to nursing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DosingLine {
    pub code: String,
    pub dose: String,
    pub frequency: String,
    pub unit: String,
    pub formulated: f64,
    pub administered: f64,
    pub pending: f64,
}

pub const DEFAULT_UNIT: &str = "tab";

/// Sums requested quantities per code across every prescription list.
/// Lines without a code are ignored.
pub fn formulated_by_code<'a, I>(lines: I) -> Vec<Formulated>
where
    I: IntoIterator<Item = &'a PrescribedMedication>,
{
    let mut by_code: BTreeMap<String, Formulated> = BTreeMap::new();

    for line in lines {
        let code = line.code.trim();
        if code.is_empty() {
            continue;
        }
        let entry = by_code.entry(code.to_string()).or_insert_with(|| Formulated {
            code: code.to_string(),
            total: 0.0,
            dose: String::new(),
            frequency: String::new(),
            unit: DEFAULT_UNIT.to_string(),
        });
        entry.total += line.requested_quantity.unwrap_or(0.0);
        entry.dose = line.dose.clone().unwrap_or_default();
        entry.frequency = line.frequency.clone().unwrap_or_default();
        entry.unit = line
            .inventory_unit
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_UNIT.to_string());
    }

    by_code.into_values().collect()
}

/// Remaining quantity to give. Never negative.
pub fn pending(formulated: f64, administered: f64) -> f64 {
    (formulated - administered).max(0.0)
}

impl DosingLine {
    pub fn new(formulated: Formulated, administered: f64) -> Self {
        DosingLine {
            pending: pending(formulated.total, administered),
            code: formulated.code,
            dose: formulated.dose,
            frequency: formulated.frequency,
            unit: formulated.unit,
            formulated: formulated.total,
            administered,
        }
    }
}

/// Applies a stock movement (negative to consume), floored at zero.
pub fn apply_stock_delta(stock: f64, delta: f64) -> f64 {
    (stock + delta).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn line(code: &str, qty: Option<f64>, dose: &str) -> PrescribedMedication {
        PrescribedMedication {
            code: code.to_string(),
            dose: Some(dose.to_string()),
            frequency: Some("c/8h".to_string()),
            requested_quantity: qty,
            inventory_unit: None,
            route: Some("IV".to_string()),
        }
    }

    #[test]
    fn aggregates_record_and_order_lines() {
        let lines = vec![
            line("MED0001", Some(3.0), "1g"),
            line("MED0002", Some(1.0), "500mg"),
            line("MED0001", Some(2.0), "2g"),
            line("  ", Some(9.0), "x"),
        ];
        let formulated = formulated_by_code(&lines);

        assert_eq!(formulated.len(), 2);
        assert_eq!(formulated[0].code, "MED0001");
        assert_eq!(formulated[0].total, 5.0);
        assert_eq!(formulated[0].dose, "2g");
        assert_eq!(formulated[0].unit, DEFAULT_UNIT);
    }

    #[test_case(5.0, 2.0, 3.0)]
    #[test_case(5.0, 5.0, 0.0)]
    #[test_case(2.0, 7.5, 0.0)]
    #[test_case(0.0, 0.0, 0.0)]
    fn pending_is_clamped(formulated: f64, administered: f64, expected: f64) {
        assert_eq!(pending(formulated, administered), expected);
    }

    #[test]
    fn stock_never_goes_negative() {
        assert_eq!(apply_stock_delta(3.0, -5.0), 0.0);
        assert_eq!(apply_stock_delta(3.0, 2.0), 5.0);
    }
}

//! Business rules for the Stockroom inventory platform
//!
//! Pure functions only: the workflows in the backend call these before and
//! while they write, so the arithmetic is identical for every store.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{GrnDetailInput, GrnInput, ReturnInput, StockDirection, StockLineInput};

/// A broken business rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("{message}")]
    Invalid { field: String, message: String },

    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },
}

impl RuleViolation {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        RuleViolation::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

/// Subtotal of a received line: quantity times unit cost, exact.
///
/// A product outside the `Decimal` range is a validation error.
pub fn line_subtotal(quantity: i64, unit_cost: Decimal) -> Result<Decimal, RuleViolation> {
    Decimal::from(quantity)
        .checked_mul(unit_cost)
        .ok_or_else(|| RuleViolation::invalid("details.unit_cost", "Amount is too large"))
}

/// Sum of line subtotals
pub fn aggregate_total<I>(subtotals: I) -> Result<Decimal, RuleViolation>
where
    I: IntoIterator<Item = Decimal>,
{
    subtotals
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, s| acc.checked_add(s))
        .ok_or_else(|| RuleViolation::invalid("total_amount", "Amount is too large"))
}

/// Running balance after a ledger entry.
///
/// `balance_n = balance_{n-1} + quantity_in - quantity_out`; a result
/// below zero is rejected, never clamped.
pub fn next_balance(previous: i64, quantity_in: i64, quantity_out: i64) -> Result<i64, RuleViolation> {
    let raised = previous
        .checked_add(quantity_in)
        .ok_or_else(|| RuleViolation::invalid("quantity_in", "Quantity is too large"))?;
    if raised < quantity_out {
        return Err(RuleViolation::InsufficientStock {
            available: raised,
            requested: quantity_out,
        });
    }
    Ok(raised - quantity_out)
}

/// Quantity on hand after moving `quantity` units in the given direction
pub fn apply_movement(
    current: i64,
    direction: StockDirection,
    quantity: i64,
) -> Result<i64, RuleViolation> {
    validate_positive_quantity("quantity", quantity)?;
    match direction {
        StockDirection::In => next_balance(current, quantity, 0),
        StockDirection::Out => next_balance(current, 0, quantity),
    }
}

// ============================================================================
// Input Validations
// ============================================================================

pub fn validate_positive_quantity(field: &str, quantity: i64) -> Result<(), RuleViolation> {
    if quantity <= 0 {
        return Err(RuleViolation::invalid(field, "Quantity must be positive"));
    }
    Ok(())
}

/// Trim optional free text; blank becomes `None`
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate GRN header presence (number, supplier, received date)
pub fn validate_grn_header(input: &GrnInput) -> Result<(), RuleViolation> {
    if normalize_text(input.grn_number.as_deref()).is_none() {
        return Err(RuleViolation::invalid("grn_number", "GRN number is required"));
    }
    if input.supplier_id.is_none() {
        return Err(RuleViolation::invalid("supplier_id", "Supplier ID is required"));
    }
    if input.received_date.is_none() {
        return Err(RuleViolation::invalid("received_date", "Received date is required"));
    }
    Ok(())
}

/// Validate GRN detail lines are present and complete
pub fn validate_grn_details(details: &[GrnDetailInput]) -> Result<(), RuleViolation> {
    if details.is_empty() {
        return Err(RuleViolation::invalid(
            "details",
            "At least one GRN detail is required",
        ));
    }

    for (index, detail) in details.iter().enumerate() {
        let line = index + 1;
        if detail.product_id.is_none() {
            return Err(RuleViolation::invalid(
                "details.product_id",
                format!("Detail {}: product ID is required", line),
            ));
        }
        match detail.quantity_received {
            None => {
                return Err(RuleViolation::invalid(
                    "details.quantity_received",
                    format!("Detail {}: quantity received is required", line),
                ))
            }
            Some(q) if q <= 0 => {
                return Err(RuleViolation::invalid(
                    "details.quantity_received",
                    format!("Detail {}: quantity received must be positive", line),
                ))
            }
            Some(_) => {}
        }
        match detail.unit_cost {
            None => {
                return Err(RuleViolation::invalid(
                    "details.unit_cost",
                    format!("Detail {}: unit cost is required", line),
                ))
            }
            Some(c) if c < Decimal::ZERO => {
                return Err(RuleViolation::invalid(
                    "details.unit_cost",
                    format!("Detail {}: unit cost cannot be negative", line),
                ))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Validate a stock transaction has lines and every quantity is positive
pub fn validate_stock_lines(lines: &[StockLineInput]) -> Result<(), RuleViolation> {
    if lines.is_empty() {
        return Err(RuleViolation::invalid(
            "lines",
            "At least one transaction line is required",
        ));
    }
    for (index, line) in lines.iter().enumerate() {
        if line.quantity <= 0 {
            return Err(RuleViolation::invalid(
                "lines.quantity",
                format!("Line {}: quantity must be positive", index + 1),
            ));
        }
        if matches!(line.unit_cost, Some(c) if c < Decimal::ZERO) {
            return Err(RuleViolation::invalid(
                "lines.unit_cost",
                format!("Line {}: unit cost cannot be negative", index + 1),
            ));
        }
    }
    Ok(())
}

/// Validate return header presence and detail lines
pub fn validate_return_input(input: &ReturnInput) -> Result<(), RuleViolation> {
    if normalize_text(input.return_number.as_deref()).is_none() {
        return Err(RuleViolation::invalid(
            "return_number",
            "Return number is required",
        ));
    }
    if input.supplier_id.is_none() {
        return Err(RuleViolation::invalid("supplier_id", "Supplier ID is required"));
    }
    if input.return_date.is_none() {
        return Err(RuleViolation::invalid("return_date", "Return date is required"));
    }
    if input.details.is_empty() {
        return Err(RuleViolation::invalid(
            "details",
            "At least one return detail is required",
        ));
    }
    for (index, detail) in input.details.iter().enumerate() {
        let line = index + 1;
        if detail.variation_id.is_none() {
            return Err(RuleViolation::invalid(
                "details.variation_id",
                format!("Detail {}: variation ID is required", line),
            ));
        }
        match detail.quantity {
            Some(q) if q > 0 => {}
            _ => {
                return Err(RuleViolation::invalid(
                    "details.quantity",
                    format!("Detail {}: quantity must be positive", line),
                ))
            }
        }
    }
    Ok(())
}

/// Validate reorder thresholds of a variation
pub fn validate_stock_levels(min: i64, max: Option<i64>) -> Result<(), RuleViolation> {
    if min < 0 {
        return Err(RuleViolation::invalid(
            "min_stock_level",
            "Minimum stock level cannot be negative",
        ));
    }
    if let Some(max) = max {
        if max < min {
            return Err(RuleViolation::invalid(
                "max_stock_level",
                "Maximum stock level must not be below the minimum",
            ));
        }
    }
    Ok(())
}

/// Validate a catalog price
pub fn validate_price(price: Decimal) -> Result<(), RuleViolation> {
    if price < Decimal::ZERO {
        return Err(RuleViolation::invalid("price", "Price cannot be negative"));
    }
    Ok(())
}

/// Barcodes are printable ASCII without spaces
pub fn validate_barcode(barcode: &str) -> Result<(), RuleViolation> {
    if barcode.is_empty() || !barcode.chars().all(|c| c.is_ascii_graphic()) {
        return Err(RuleViolation::invalid(
            "barcode",
            "Barcode must be printable characters without spaces",
        ));
    }
    Ok(())
}

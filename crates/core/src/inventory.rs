//! Merchandise order rules: quantity limits and price computation.
//!
//! Stock movement itself is a storage-layer concern (conditional
//! decrement/restore in `eventra-db`); this module owns the pure rules
//! evaluated at order creation time and the frozen purchase snapshot.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The per-order purchase snapshot, frozen at order creation.
///
/// Catalogue price changes after creation must not retroactively change
/// an existing order, so unit price and total are computed once and
/// stored with the participation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerchPurchase {
    pub sku: String,
    pub quantity: i32,
    /// Price per unit in the smallest currency unit.
    pub unit_price: i64,
    /// `unit_price * quantity`.
    pub total: i64,
}

/// Unit price for one variant: the event's base fee plus the variant's
/// delta, floored at zero.
pub fn unit_price(reg_fee: i64, price_delta: i64) -> i64 {
    (reg_fee + price_delta).max(0)
}

/// Check an order quantity against the per-participant limit.
pub fn ensure_quantity_allowed(quantity: i32, per_participant_limit: i32) -> Result<(), CoreError> {
    if quantity < 1 {
        return Err(CoreError::Validation(
            "Quantity must be at least 1".to_string(),
        ));
    }
    if quantity > per_participant_limit {
        return Err(CoreError::Validation(format!(
            "Quantity {quantity} exceeds the per-participant limit of {per_participant_limit}"
        )));
    }
    Ok(())
}

/// Build the frozen purchase snapshot for an order.
pub fn purchase_snapshot(
    sku: &str,
    quantity: i32,
    reg_fee: i64,
    price_delta: i64,
) -> MerchPurchase {
    let unit = unit_price(reg_fee, price_delta);
    MerchPurchase {
        sku: sku.to_string(),
        quantity,
        unit_price: unit,
        total: unit * i64::from(quantity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn unit_price_floors_at_zero() {
        assert_eq!(unit_price(100, 50), 150);
        assert_eq!(unit_price(100, -30), 70);
        assert_eq!(unit_price(100, -150), 0);
        assert_eq!(unit_price(0, 0), 0);
    }

    #[test]
    fn quantity_must_be_positive_and_within_limit() {
        assert!(ensure_quantity_allowed(1, 5).is_ok());
        assert!(ensure_quantity_allowed(5, 5).is_ok());
        assert_matches!(ensure_quantity_allowed(0, 5), Err(CoreError::Validation(_)));
        assert_matches!(ensure_quantity_allowed(-2, 5), Err(CoreError::Validation(_)));
        // Stock level is irrelevant here: quantity 3 against limit 5 passes
        // this gate even if only 2 units remain, and vice versa a request
        // over the limit fails before stock is ever consulted.
        let err = ensure_quantity_allowed(3, 2).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("per-participant limit"));
    }

    #[test]
    fn snapshot_freezes_computed_total() {
        let snap = purchase_snapshot("tee-black-m", 3, 200, 50);
        assert_eq!(
            snap,
            MerchPurchase {
                sku: "tee-black-m".to_string(),
                quantity: 3,
                unit_price: 250,
                total: 750,
            }
        );
    }

    #[test]
    fn snapshot_total_is_zero_for_free_variants() {
        let snap = purchase_snapshot("sticker", 2, 0, 0);
        assert_eq!(snap.unit_price, 0);
        assert_eq!(snap.total, 0);
    }
}

//! Pure stock rules: status classification and the priority-driven restock
//! amount. Nothing here touches the store.

use crate::models::{MalformedRecord, Priority, ProductRecord, StockStatus};

/// Low-priority products are topped up by at most this many units.
pub const LOW_PRIORITY_RESTOCK_CAP: u64 = 10;

/// Classify stock against its threshold. Zero stock is always `OutOfStock`,
/// whatever the threshold.
pub fn stock_status(stock_quantity: u64, min_threshold: u64) -> StockStatus {
    if stock_quantity == 0 {
        StockStatus::OutOfStock
    } else if stock_quantity < min_threshold {
        StockStatus::BelowThreshold
    } else {
        StockStatus::Ok
    }
}

/// The fields the restock policy reads, all guaranteed present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestockInput {
    pub priority: Priority,
    pub stock_quantity: u64,
    pub min_threshold: u64,
    pub restock_quantity: u64,
}

impl TryFrom<&ProductRecord> for RestockInput {
    type Error = MalformedRecord;

    fn try_from(record: &ProductRecord) -> Result<Self, Self::Error> {
        let mut reader = record.reader();
        let priority = reader.read("priority");
        let stock_quantity = reader.read("stock_quantity");
        let min_threshold = reader.read("min_threshold");
        let restock_quantity = reader.read("restock_quantity");

        match (priority, stock_quantity, min_threshold, restock_quantity) {
            (Some(priority), Some(stock_quantity), Some(min_threshold), Some(restock_quantity)) => {
                Ok(Self {
                    priority,
                    stock_quantity,
                    min_threshold,
                    restock_quantity,
                })
            }
            _ => Err(reader.into_error()),
        }
    }
}

/// Units to add to stock. First matching rule wins:
///
/// 1. high priority below threshold: 150% of `restock_quantity`, floored
/// 2. medium priority below 70% of threshold: `restock_quantity`
/// 3. low priority and empty: `restock_quantity`, capped at 10
/// 4. anything else: nothing
pub fn restock_amount(input: &RestockInput) -> u64 {
    let RestockInput {
        priority,
        stock_quantity,
        min_threshold,
        restock_quantity,
    } = *input;

    match priority {
        Priority::High if stock_quantity < min_threshold => {
            restock_quantity.saturating_mul(3) / 2
        }
        // stock < threshold * 0.7, kept in integers
        Priority::Medium
            if (stock_quantity as u128) * 10 < (min_threshold as u128) * 7 =>
        {
            restock_quantity
        }
        Priority::Low if stock_quantity == 0 => restock_quantity.min(LOW_PRIORITY_RESTOCK_CAP),
        _ => 0,
    }
}

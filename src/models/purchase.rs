use serde::{Deserialize, Serialize};

use super::StockStatus;

/// Body of `POST /products/:id/purchase`.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// Signed so that zero and negative quantities are rejected as invalid
    /// input rather than as malformed JSON.
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    pub product_id: String,
    pub purchased_quantity: u64,
    pub remaining_stock: u64,
    pub new_status: StockStatus,
}

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::policy;

/// Threshold floor enforced on high-priority products at creation time.
pub const HIGH_PRIORITY_MIN_THRESHOLD: u64 = 10;

/// Products restocked in batches larger than this are `high_volume`.
pub const HIGH_VOLUME_RESTOCK_QUANTITY: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    HighVolume,
    LowVolume,
}

impl Category {
    pub fn for_restock_quantity(restock_quantity: u64) -> Self {
        if restock_quantity > HIGH_VOLUME_RESTOCK_QUANTITY {
            Category::HighVolume
        } else {
            Category::LowVolume
        }
    }
}

/// Derived stock classification. Never stored; see [`policy::stock_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Ok,
    BelowThreshold,
    OutOfStock,
}

/// A stored record lacks fields a typed view needs, or holds values of the
/// wrong shape for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MalformedRecord {
    pub missing: Vec<&'static str>,
    pub invalid: Vec<&'static str>,
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.missing.is_empty(), self.invalid.is_empty()) {
            (false, true) => write!(f, "missing fields in product record: {}", self.missing.join(", ")),
            (true, false) => write!(f, "invalid fields in product record: {}", self.invalid.join(", ")),
            _ => write!(
                f,
                "missing fields in product record: {}; invalid fields: {}",
                self.missing.join(", "),
                self.invalid.join(", ")
            ),
        }
    }
}

impl std::error::Error for MalformedRecord {}

/// Product as it sits in the inventory file, kept as raw JSON.
///
/// Nothing is validated on load, so one damaged record cannot make the rest
/// of the inventory unreadable, and whatever it holds is written back as is.
/// Each operation reads the fields it needs through a typed view
/// (`RestockInput`, `StockLevel`, `ProductStatusView::from_record`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRecord(Value);

impl ProductRecord {
    pub fn set_stock_quantity(&mut self, stock_quantity: u64) {
        if let Value::Object(fields) = &mut self.0 {
            fields.insert("stock_quantity".to_string(), stock_quantity.into());
        }
    }

    pub(crate) fn reader(&self) -> FieldReader<'_> {
        FieldReader {
            fields: self.0.as_object(),
            error: MalformedRecord::default(),
        }
    }
}

impl From<Value> for ProductRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&Product> for ProductRecord {
    fn from(product: &Product) -> Self {
        Self(json!({
            "product_id": product.product_id,
            "name": product.name,
            "stock_quantity": product.stock_quantity,
            "min_threshold": product.min_threshold,
            "restock_quantity": product.restock_quantity,
            "priority": product.priority,
            "category": product.category,
        }))
    }
}

/// Reads typed fields out of a record, collecting every problem it meets.
pub(crate) struct FieldReader<'a> {
    fields: Option<&'a Map<String, Value>>,
    error: MalformedRecord,
}

impl FieldReader<'_> {
    pub(crate) fn read<T: DeserializeOwned>(&mut self, name: &'static str) -> Option<T> {
        match self.fields.and_then(|fields| fields.get(name)) {
            None | Some(Value::Null) => {
                self.error.missing.push(name);
                None
            }
            Some(value) => match T::deserialize(value) {
                Ok(value) => Some(value),
                Err(_) => {
                    self.error.invalid.push(name);
                    None
                }
            },
        }
    }

    pub(crate) fn into_error(self) -> MalformedRecord {
        self.error
    }
}

/// The fields a purchase reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    pub stock_quantity: u64,
    pub min_threshold: u64,
}

impl StockLevel {
    pub fn status(&self) -> StockStatus {
        policy::stock_status(self.stock_quantity, self.min_threshold)
    }
}

impl TryFrom<&ProductRecord> for StockLevel {
    type Error = MalformedRecord;

    fn try_from(record: &ProductRecord) -> Result<Self, Self::Error> {
        let mut reader = record.reader();
        let stock_quantity = reader.read("stock_quantity");
        let min_threshold = reader.read("min_threshold");
        match (stock_quantity, min_threshold) {
            (Some(stock_quantity), Some(min_threshold)) => Ok(Self {
                stock_quantity,
                min_threshold,
            }),
            _ => Err(reader.into_error()),
        }
    }
}

/// Core product entity with every field present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub stock_quantity: u64,
    pub min_threshold: u64,
    pub restock_quantity: u64,
    pub priority: Priority,
    pub category: Category,
}

// ── Request payloads ─────────────────────────────────────────────────────────

/// Body of `POST /products`. Quantities are signed so negative input reaches
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub product_id: String,
    pub name: String,
    pub stock_quantity: i64,
    pub min_threshold: i64,
    pub restock_quantity: i64,
    pub priority: Priority,
    /// Accepted for compatibility; always replaced by the derived category.
    #[serde(default)]
    #[allow(dead_code)]
    pub category: Option<String>,
}

// ── Views ────────────────────────────────────────────────────────────────────

/// Public status view. Thresholds, name and category stay internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStatusView {
    pub product_id: String,
    pub stock_quantity: u64,
    pub status: StockStatus,
    pub priority: Priority,
}

impl ProductStatusView {
    /// Build the view from the fields it shows. `product_id` is the inventory
    /// key, so the record's own copy is not required.
    pub fn from_record(product_id: &str, record: &ProductRecord) -> Result<Self, MalformedRecord> {
        let mut reader = record.reader();
        let stock_quantity = reader.read("stock_quantity");
        let min_threshold = reader.read("min_threshold");
        let priority = reader.read("priority");
        match (stock_quantity, min_threshold, priority) {
            (Some(stock_quantity), Some(min_threshold), Some(priority)) => Ok(Self {
                product_id: product_id.to_string(),
                stock_quantity,
                status: policy::stock_status(stock_quantity, min_threshold),
                priority,
            }),
            _ => Err(reader.into_error()),
        }
    }
}

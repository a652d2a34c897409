use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{
    Category, NewProduct, Priority, Product, ProductRecord, ProductStatusView, PurchaseReceipt,
    StockLevel, HIGH_PRIORITY_MIN_THRESHOLD,
};
use crate::policy::{self, RestockInput};
use crate::store::{Inventory, InventoryStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedProduct {
    pub product: Product,
    pub inventory_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestockEntry {
    pub added: u64,
    pub new_stock: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestockSummary {
    pub restocked_products: IndexMap<String, RestockEntry>,
    pub total_restocked: usize,
    /// Every product that was not restocked, whether ineligible or malformed.
    pub skipped_products: usize,
    pub malformed_products: Vec<String>,
}

/// Inventory operations over a store that is reloaded on every call.
///
/// `lock` makes each load → mutate → save sequence a single critical section,
/// so concurrent purchases and restocks cannot lose each other's updates.
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    lock: RwLock<()>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            store,
            lock: RwLock::new(()),
        }
    }

    // ── Add ───────────────────────────────────────────────────────────────────

    pub async fn add_product(&self, payload: NewProduct) -> AppResult<AddedProduct> {
        let _guard = self.lock.write().await;
        let mut inventory = self.store.load()?;

        if inventory.contains_key(&payload.product_id) {
            warn!(product_id = %payload.product_id, "Duplicate product ID");
            return Err(AppError::Conflict("Product already exists".to_string()));
        }

        let product = validate_new_product(payload)?;
        inventory.insert(product.product_id.clone(), ProductRecord::from(&product));
        self.store.save(&inventory)?;

        info!(
            product_id = %product.product_id,
            category = ?product.category,
            inventory_count = inventory.len(),
            "Added product"
        );

        Ok(AddedProduct {
            product,
            inventory_count: inventory.len(),
        })
    }

    // ── Read ──────────────────────────────────────────────────────────────────

    pub async fn product_status(&self, product_id: &str) -> AppResult<ProductStatusView> {
        let _guard = self.lock.read().await;
        let inventory = self.store.load()?;
        let record = find_record(&inventory, product_id)?;
        let view = ProductStatusView::from_record(product_id, record)?;

        info!(product_id, status = ?view.status, "Retrieved product status");
        Ok(view)
    }

    pub async fn list_statuses(&self) -> AppResult<Vec<ProductStatusView>> {
        let _guard = self.lock.read().await;
        let inventory = self.store.load()?;

        let views = inventory
            .iter()
            .filter_map(|(product_id, record)| {
                match ProductStatusView::from_record(product_id, record) {
                    Ok(view) => Some(view),
                    Err(e) => {
                        warn!(product_id = %product_id, error = %e, "Skipping malformed product");
                        None
                    }
                }
            })
            .collect();
        Ok(views)
    }

    // ── Restock ───────────────────────────────────────────────────────────────

    pub async fn restock_all(&self) -> AppResult<RestockSummary> {
        let _guard = self.lock.write().await;
        let mut inventory = self.store.load()?;

        let mut restocked = IndexMap::new();
        let mut malformed = Vec::new();

        for (product_id, record) in inventory.iter_mut() {
            let input = match RestockInput::try_from(&*record) {
                Ok(input) => input,
                Err(e) => {
                    error!(product_id = %product_id, error = %e, "Skipping product");
                    malformed.push(product_id.clone());
                    continue;
                }
            };

            let amount = policy::restock_amount(&input);
            if amount == 0 {
                continue;
            }

            let new_stock = input.stock_quantity.saturating_add(amount);
            record.set_stock_quantity(new_stock);
            debug!(product_id = %product_id, added = amount, new_stock, "Restocked product");
            restocked.insert(
                product_id.clone(),
                RestockEntry {
                    added: amount,
                    new_stock,
                },
            );
        }

        if !restocked.is_empty() {
            self.store.save(&inventory)?;
        }

        let summary = RestockSummary {
            total_restocked: restocked.len(),
            skipped_products: inventory.len() - restocked.len(),
            restocked_products: restocked,
            malformed_products: malformed,
        };

        info!(
            restocked = summary.total_restocked,
            skipped = summary.skipped_products,
            malformed = summary.malformed_products.len(),
            "Restock completed"
        );
        Ok(summary)
    }

    // ── Purchase ──────────────────────────────────────────────────────────────

    pub async fn purchase(&self, product_id: &str, quantity: i64) -> AppResult<PurchaseReceipt> {
        let _guard = self.lock.write().await;
        let mut inventory = self.store.load()?;
        let mut level = StockLevel::try_from(find_record(&inventory, product_id)?)?;

        let quantity = u64::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                warn!(product_id, quantity, "Invalid purchase quantity");
                AppError::BadRequest("Purchase quantity must be positive".to_string())
            })?;

        if level.stock_quantity < quantity {
            warn!(
                product_id,
                requested = quantity,
                available = level.stock_quantity,
                "Insufficient stock"
            );
            return Err(AppError::InsufficientStock {
                requested: quantity,
                available: level.stock_quantity,
            });
        }

        level.stock_quantity -= quantity;
        if let Some(record) = inventory.get_mut(product_id) {
            record.set_stock_quantity(level.stock_quantity);
        }
        self.store.save(&inventory)?;

        info!(
            product_id,
            purchased = quantity,
            remaining = level.stock_quantity,
            "Purchase completed"
        );

        Ok(PurchaseReceipt {
            product_id: product_id.to_string(),
            purchased_quantity: quantity,
            remaining_stock: level.stock_quantity,
            new_status: level.status(),
        })
    }
}

fn find_record<'a>(inventory: &'a Inventory, product_id: &str) -> AppResult<&'a ProductRecord> {
    inventory.get(product_id).ok_or_else(|| {
        warn!(product_id, "Product not found");
        AppError::NotFound("Product not found".to_string())
    })
}

/// Apply creation rules: non-negative quantities, the high-priority
/// threshold floor and the derived category.
fn validate_new_product(payload: NewProduct) -> AppResult<Product> {
    if payload.product_id.trim().is_empty() {
        return Err(AppError::BadRequest("product_id must not be empty".to_string()));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }

    let stock_quantity = non_negative(payload.stock_quantity, "Stock cannot be negative")?;
    let mut min_threshold = non_negative(payload.min_threshold, "min_threshold cannot be negative")?;
    let restock_quantity =
        non_negative(payload.restock_quantity, "restock_quantity cannot be negative")?;

    if payload.priority == Priority::High && min_threshold < HIGH_PRIORITY_MIN_THRESHOLD {
        info!(
            product_id = %payload.product_id,
            from = min_threshold,
            to = HIGH_PRIORITY_MIN_THRESHOLD,
            "Raising min_threshold for high-priority product"
        );
        min_threshold = HIGH_PRIORITY_MIN_THRESHOLD;
    }

    Ok(Product {
        product_id: payload.product_id,
        name: payload.name,
        stock_quantity,
        min_threshold,
        restock_quantity,
        priority: payload.priority,
        category: Category::for_restock_quantity(restock_quantity),
    })
}

fn non_negative(value: i64, message: &str) -> AppResult<u64> {
    u64::try_from(value).map_err(|_| AppError::BadRequest(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockStatus;
    use crate::store::JsonFileStore;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<JsonFileStore>,
        service: InventoryService,
    }

    impl Fixture {
        /// The stored record for `product_id`, as raw JSON.
        fn stored(&self, product_id: &str) -> Value {
            serde_json::to_value(&self.store.load().unwrap()[product_id]).unwrap()
        }

        fn write_raw(&self, inventory: Value) {
            std::fs::write(self.store.path(), inventory.to_string()).unwrap();
        }
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("inventory.json")));
        let service = InventoryService::new(store.clone());
        Fixture {
            _dir: dir,
            store,
            service,
        }
    }

    fn new_product(id: &str, priority: Priority) -> NewProduct {
        NewProduct {
            product_id: id.to_string(),
            name: format!("Product {id}"),
            stock_quantity: 20,
            min_threshold: 5,
            restock_quantity: 40,
            priority,
            category: None,
        }
    }

    // ── Add ────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn add_raises_high_priority_threshold_to_ten() {
        let fx = fixture();
        let added = fx.service.add_product(new_product("h", Priority::High)).await.unwrap();
        assert_eq!(added.product.min_threshold, 10);
        assert_eq!(fx.stored("h")["min_threshold"], 10);
    }

    #[tokio::test]
    async fn add_keeps_threshold_for_other_priorities() {
        let fx = fixture();
        let added = fx.service.add_product(new_product("m", Priority::Medium)).await.unwrap();
        assert_eq!(added.product.min_threshold, 5);
    }

    #[tokio::test]
    async fn add_derives_category_and_ignores_caller_value() {
        let fx = fixture();

        let mut big = new_product("big", Priority::Low);
        big.restock_quantity = 60;
        big.category = Some("low_volume".to_string());
        let big = fx.service.add_product(big).await.unwrap();
        assert_eq!(big.product.category, Category::HighVolume);
        assert_eq!(fx.stored("big")["category"], "high_volume");

        let mut small = new_product("small", Priority::Low);
        small.category = Some("high_volume".to_string());
        let small = fx.service.add_product(small).await.unwrap();
        assert_eq!(small.product.category, Category::LowVolume);
        assert_eq!(small.inventory_count, 2);
    }

    #[tokio::test]
    async fn add_duplicate_is_conflict_and_leaves_inventory_unchanged() {
        let fx = fixture();
        fx.service.add_product(new_product("dup", Priority::Low)).await.unwrap();
        let before = fx.store.load().unwrap();

        let mut again = new_product("dup", Priority::High);
        again.stock_quantity = 999;
        let err = fx.service.add_product(again).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(fx.store.load().unwrap(), before);
    }

    #[tokio::test]
    async fn add_rejects_negative_quantities() {
        let fx = fixture();

        let mut p = new_product("neg", Priority::Low);
        p.stock_quantity = -1;
        let err = fx.service.add_product(p).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Stock cannot be negative"));

        let mut p = new_product("neg", Priority::Low);
        p.restock_quantity = -5;
        assert!(matches!(
            fx.service.add_product(p).await.unwrap_err(),
            AppError::BadRequest(_)
        ));

        assert!(fx.store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_rejects_blank_identity() {
        let fx = fixture();
        let p = new_product("  ", Priority::Low);
        assert!(matches!(
            fx.service.add_product(p).await.unwrap_err(),
            AppError::BadRequest(_)
        ));
    }

    // ── Status ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn status_of_unknown_product_is_not_found() {
        let fx = fixture();
        let err = fx.service.product_status("ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn status_is_derived_from_current_stock() {
        let fx = fixture();
        let mut p = new_product("s", Priority::Medium);
        p.stock_quantity = 3;
        fx.service.add_product(p).await.unwrap();

        let view = fx.service.product_status("s").await.unwrap();
        assert_eq!(view.status, StockStatus::BelowThreshold);
        assert_eq!(view.stock_quantity, 3);
        assert_eq!(view.priority, Priority::Medium);
    }

    #[tokio::test]
    async fn status_reads_store_written_elsewhere() {
        let fx = fixture();
        fx.service.add_product(new_product("ext", Priority::Low)).await.unwrap();

        let mut inventory = fx.store.load().unwrap();
        inventory["ext"].set_stock_quantity(0);
        fx.store.save(&inventory).unwrap();

        let view = fx.service.product_status("ext").await.unwrap();
        assert_eq!(view.status, StockStatus::OutOfStock);
    }

    #[tokio::test]
    async fn status_serves_record_without_name_or_category() {
        let fx = fixture();
        fx.write_raw(json!({
            "p": {
                "product_id": "p",
                "stock_quantity": 4,
                "min_threshold": 5,
                "restock_quantity": 10,
                "priority": "medium",
            }
        }));

        let view = fx.service.product_status("p").await.unwrap();
        assert_eq!(view.stock_quantity, 4);
        assert_eq!(view.status, StockStatus::BelowThreshold);
    }

    #[tokio::test]
    async fn status_of_record_missing_its_stock_is_malformed() {
        let fx = fixture();
        fx.write_raw(json!({ "p": { "product_id": "p", "priority": "low" } }));

        let err = fx.service.product_status("p").await.unwrap_err();
        assert!(matches!(err, AppError::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn list_skips_malformed_records() {
        let fx = fixture();
        fx.service.add_product(new_product("good", Priority::Low)).await.unwrap();
        let mut inventory = fx.store.load().unwrap();
        inventory.insert(
            "bad".to_string(),
            ProductRecord::from(json!({ "product_id": "bad" })),
        );
        fx.store.save(&inventory).unwrap();

        let views = fx.service.list_statuses().await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].product_id, "good");
    }

    // ── Purchase ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn purchase_decrements_and_persists() {
        let fx = fixture();
        fx.service.add_product(new_product("p", Priority::Low)).await.unwrap();

        let receipt = fx.service.purchase("p", 16).await.unwrap();
        assert_eq!(receipt.purchased_quantity, 16);
        assert_eq!(receipt.remaining_stock, 4);
        assert_eq!(receipt.new_status, StockStatus::BelowThreshold);
        assert_eq!(fx.stored("p")["stock_quantity"], 4);
    }

    #[tokio::test]
    async fn purchase_to_zero_is_out_of_stock() {
        let fx = fixture();
        fx.service.add_product(new_product("p", Priority::Low)).await.unwrap();
        let receipt = fx.service.purchase("p", 20).await.unwrap();
        assert_eq!(receipt.remaining_stock, 0);
        assert_eq!(receipt.new_status, StockStatus::OutOfStock);
    }

    #[tokio::test]
    async fn purchase_more_than_stock_is_rejected() {
        let fx = fixture();
        fx.service.add_product(new_product("p", Priority::Low)).await.unwrap();

        let err = fx.service.purchase("p", 21).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientStock { requested: 21, available: 20 }
        ));
        assert!(err.to_string().contains("20"));
        assert_eq!(fx.stored("p")["stock_quantity"], 20);
    }

    #[tokio::test]
    async fn purchase_rejects_non_positive_quantity() {
        let fx = fixture();
        fx.service.add_product(new_product("p", Priority::Low)).await.unwrap();
        for quantity in [0, -3] {
            let err = fx.service.purchase("p", quantity).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
    }

    #[tokio::test]
    async fn purchase_of_unknown_product_is_not_found() {
        let fx = fixture();
        let err = fx.service.purchase("ghost", 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn purchase_keeps_the_rest_of_a_partial_record() {
        let fx = fixture();
        let record = json!({
            "product_id": "p",
            "stock_quantity": 3,
            "min_threshold": 2,
            "restock_quantity": 10,
            "priority": "low",
            "supplier": "acme",
        });
        fx.write_raw(json!({ "p": record }));

        let receipt = fx.service.purchase("p", 1).await.unwrap();
        assert_eq!(receipt.remaining_stock, 2);
        assert_eq!(receipt.new_status, StockStatus::Ok);

        let mut expected = record;
        expected["stock_quantity"] = json!(2);
        assert_eq!(fx.stored("p"), expected);
    }

    // ── Restock ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn restock_skips_malformed_and_restocks_eligible() {
        let fx = fixture();
        let mut high = new_product("high", Priority::High);
        high.stock_quantity = 5;
        high.restock_quantity = 20;
        fx.service.add_product(high).await.unwrap();

        let mut inventory = fx.store.load().unwrap();
        inventory.insert(
            "broken".to_string(),
            ProductRecord::from(json!({
                "product_id": "broken",
                "priority": "low",
                "stock_quantity": 0,
            })),
        );
        fx.store.save(&inventory).unwrap();

        let summary = fx.service.restock_all().await.unwrap();
        assert_eq!(summary.total_restocked, 1);
        assert_eq!(summary.skipped_products, 1);
        assert_eq!(summary.malformed_products, vec!["broken".to_string()]);
        assert_eq!(
            summary.restocked_products["high"],
            RestockEntry { added: 30, new_stock: 35 }
        );

        assert_eq!(fx.stored("high")["stock_quantity"], 35);
        assert_eq!(fx.store.load().unwrap()["broken"], inventory["broken"]);
    }

    #[tokio::test]
    async fn restock_skips_record_with_out_of_range_value() {
        let fx = fixture();
        fx.write_raw(json!({
            "good": {
                "product_id": "good",
                "name": "Good",
                "stock_quantity": 0,
                "min_threshold": 5,
                "restock_quantity": 25,
                "priority": "low",
                "category": "low_volume",
            },
            "bad": {
                "product_id": "bad",
                "name": "Bad",
                "stock_quantity": -2,
                "min_threshold": 5,
                "restock_quantity": 25,
                "priority": "low",
                "category": "low_volume",
            },
        }));

        let summary = fx.service.restock_all().await.unwrap();
        assert_eq!(summary.total_restocked, 1);
        assert_eq!(summary.skipped_products, 1);
        assert_eq!(summary.malformed_products, vec!["bad".to_string()]);
        assert_eq!(summary.restocked_products["good"].new_stock, 10);

        assert_eq!(fx.stored("bad")["stock_quantity"], -2);
        let view = fx.service.product_status("good").await.unwrap();
        assert_eq!(view.stock_quantity, 10);
    }

    #[tokio::test]
    async fn restock_counts_ineligible_products_as_skipped() {
        let fx = fixture();
        let mut empty_low = new_product("low", Priority::Low);
        empty_low.stock_quantity = 0;
        empty_low.restock_quantity = 25;
        fx.service.add_product(empty_low).await.unwrap();
        fx.service.add_product(new_product("full", Priority::Medium)).await.unwrap();

        let summary = fx.service.restock_all().await.unwrap();
        assert_eq!(summary.total_restocked, 1);
        assert_eq!(summary.skipped_products, 1);
        assert!(summary.malformed_products.is_empty());
        assert_eq!(summary.restocked_products["low"].added, 10);
    }

    #[tokio::test]
    async fn restock_without_work_does_not_write() {
        let fx = fixture();
        // Compact on purpose: a save would rewrite it indented.
        let original = r#"{"broken":{"product_id":"broken"},"full":{"product_id":"full","name":"Full","stock_quantity":50,"min_threshold":5,"restock_quantity":10,"priority":"high","category":"low_volume"}}"#;
        std::fs::write(fx.store.path(), original).unwrap();

        let summary = fx.service.restock_all().await.unwrap();
        assert_eq!(summary.total_restocked, 0);
        assert_eq!(summary.skipped_products, 2);
        assert_eq!(summary.malformed_products, vec!["broken".to_string()]);
        assert_eq!(std::fs::read_to_string(fx.store.path()).unwrap(), original);
    }

    #[tokio::test]
    async fn concurrent_purchases_do_not_lose_updates() {
        let fx = fixture();
        let service = Arc::new(fx.service);
        let mut p = new_product("hot", Priority::Low);
        p.stock_quantity = 50;
        service.add_product(p).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let service = service.clone();
            tasks.spawn(async move { service.purchase("hot", 3).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let stored = serde_json::to_value(&fx.store.load().unwrap()["hot"]).unwrap();
        assert_eq!(stored["stock_quantity"], 20);
    }
}

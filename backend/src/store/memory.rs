//! In-memory store for embedded use and tests
//!
//! A unit of work takes the store-wide async lock for its whole lifetime and
//! mutates a private copy of the state. Commit swaps the copy in; drop
//! discards it. Units of work therefore run strictly one after another,
//! which rules out lost updates on any row.
//!
//! The copy is shallow: tables are reference counted, so `begin` costs one
//! pointer clone per table and a workflow pays for copying only the tables
//! it writes. Everything is serialized behind one lock, so this store suits
//! embedded use and tests, not concurrent production traffic.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    BinCardEntry, Employee, EmployeeInput, Grn, GrnDetail, Lifecycle, NewBinCardEntry, NewGrn,
    NewGrnDetail, NewReturn, NewReturnDetail, NewStock, PageRequest, Paginated, Product,
    ProductInput, ProductVariation, Return, ReturnDetail, ReturnStatus, SoftDelete, SortOrder,
    Stock, StockKey, Supplier, SupplierInput, VariationInput, Visibility,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, UnitOfWork};
use crate::error::{AppError, AppResult};
use crate::services::listing::{
    matches_search, GrnQuery, GrnSort, ReturnQuery, ReturnSort, StockQuery, StockSort,
    VariationQuery, VariationSort,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    employee: i64,
    supplier: i64,
    product: i64,
    variation: i64,
    stock: i64,
    grn: i64,
    grn_detail: i64,
    bin_card: i64,
    goods_return: i64,
    return_detail: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Tables are shared with the committed state until first written; a write
/// goes through `Arc::make_mut`, which copies only that table.
type Table<T> = Arc<BTreeMap<i64, T>>;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sequences: Sequences,
    employees: Table<Employee>,
    suppliers: Table<Supplier>,
    products: Table<Product>,
    variations: Table<ProductVariation>,
    stock: Table<Stock>,
    grns: Table<Grn>,
    grn_details: Table<GrnDetail>,
    bin_cards: Table<BinCardEntry>,
    returns: Table<Return>,
    return_details: Table<ReturnDetail>,
}

/// Store keeping everything in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Unit of work over a private copy of the state
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn visible<T: SoftDelete>(entity: Option<&T>, visibility: Visibility) -> Option<T>
where
    T: Clone,
{
    entity.filter(|e| e.visible(visibility)).cloned()
}

/// Sort by `key` in the requested direction; `key` includes the id as tie-break
fn ordered<T, K: Ord>(items: &mut [T], order: SortOrder, key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| {
        let ordering = key(a).cmp(&key(b));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn employee(&mut self, id: i64, visibility: Visibility) -> AppResult<Option<Employee>> {
        Ok(visible(self.working.employees.get(&id), visibility))
    }

    async fn insert_employee(&mut self, input: &EmployeeInput) -> AppResult<Employee> {
        let now = Utc::now();
        let employee = Employee {
            id: next_id(&mut self.working.sequences.employee),
            name: input.name.trim().to_string(),
            email: input.email.clone(),
            role: input.role,
            is_active: true,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        };
        Arc::make_mut(&mut self.working.employees).insert(employee.id, employee.clone());
        Ok(employee)
    }

    async fn supplier(&mut self, id: i64, visibility: Visibility) -> AppResult<Option<Supplier>> {
        Ok(visible(self.working.suppliers.get(&id), visibility))
    }

    async fn insert_supplier(&mut self, input: &SupplierInput, actor: i64) -> AppResult<Supplier> {
        let now = Utc::now();
        let supplier = Supplier {
            id: next_id(&mut self.working.sequences.supplier),
            name: input.name.trim().to_string(),
            contact_person: input.contact_person.clone(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            address: input.address.clone(),
            is_active: input.is_active.unwrap_or(true),
            lifecycle: Lifecycle::Active,
            created_by: Some(actor),
            updated_by: Some(actor),
            created_at: now,
            updated_at: now,
        };
        Arc::make_mut(&mut self.working.suppliers).insert(supplier.id, supplier.clone());
        Ok(supplier)
    }

    async fn update_supplier(&mut self, supplier: &Supplier) -> AppResult<Supplier> {
        let slot = Arc::make_mut(&mut self.working.suppliers)
            .get_mut(&supplier.id)
            .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;
        *slot = supplier.clone();
        Ok(supplier.clone())
    }

    async fn supplier_reference_count(&mut self, supplier_id: i64) -> AppResult<i64> {
        let grns = self
            .working
            .grns
            .values()
            .filter(|g| g.supplier_id == supplier_id)
            .count();
        let returns = self
            .working
            .returns
            .values()
            .filter(|r| r.supplier_id == supplier_id)
            .count();
        Ok((grns + returns) as i64)
    }

    async fn product(&mut self, id: i64, visibility: Visibility) -> AppResult<Option<Product>> {
        Ok(visible(self.working.products.get(&id), visibility))
    }

    async fn product_by_sku(
        &mut self,
        sku: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<Option<Product>> {
        Ok(self
            .working
            .products
            .values()
            .find(|p| {
                p.sku == sku && !p.lifecycle.is_deleted() && Some(p.id) != exclude_id
            })
            .cloned())
    }

    async fn insert_product(&mut self, input: &ProductInput, actor: i64) -> AppResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: next_id(&mut self.working.sequences.product),
            name: input.name.trim().to_string(),
            sku: input.sku.trim().to_string(),
            description: input.description.clone(),
            is_active: input.is_active.unwrap_or(true),
            lifecycle: Lifecycle::Active,
            created_by: Some(actor),
            updated_by: Some(actor),
            created_at: now,
            updated_at: now,
        };
        Arc::make_mut(&mut self.working.products).insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<Product> {
        let slot = Arc::make_mut(&mut self.working.products)
            .get_mut(&product.id)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        *slot = product.clone();
        Ok(product.clone())
    }

    async fn live_variation_count(&mut self, product_id: i64) -> AppResult<i64> {
        Ok(self
            .working
            .variations
            .values()
            .filter(|v| v.product_id == product_id && !v.lifecycle.is_deleted())
            .count() as i64)
    }

    async fn variation(
        &mut self,
        id: i64,
        visibility: Visibility,
    ) -> AppResult<Option<ProductVariation>> {
        Ok(visible(self.working.variations.get(&id), visibility))
    }

    async fn variation_by_barcode(
        &mut self,
        barcode: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<Option<ProductVariation>> {
        Ok(self
            .working
            .variations
            .values()
            .find(|v| {
                v.barcode.as_deref() == Some(barcode)
                    && !v.lifecycle.is_deleted()
                    && Some(v.id) != exclude_id
            })
            .cloned())
    }

    async fn insert_variation(
        &mut self,
        input: &VariationInput,
        actor: i64,
    ) -> AppResult<ProductVariation> {
        let now = Utc::now();
        let variation = ProductVariation {
            id: next_id(&mut self.working.sequences.variation),
            product_id: input.product_id,
            name: input.name.trim().to_string(),
            color: input.color.clone(),
            size: input.size.clone(),
            capacity: input.capacity.clone(),
            barcode: input.barcode.clone(),
            price: input.price,
            quantity: input.quantity.unwrap_or(1),
            min_stock_level: input.min_stock_level.unwrap_or(0),
            max_stock_level: input.max_stock_level,
            is_active: input.is_active.unwrap_or(true),
            lifecycle: Lifecycle::Active,
            created_by: Some(actor),
            updated_by: Some(actor),
            created_at: now,
            updated_at: now,
        };
        Arc::make_mut(&mut self.working.variations).insert(variation.id, variation.clone());
        Ok(variation)
    }

    async fn update_variation(
        &mut self,
        variation: &ProductVariation,
    ) -> AppResult<ProductVariation> {
        let slot = Arc::make_mut(&mut self.working.variations)
            .get_mut(&variation.id)
            .ok_or_else(|| AppError::NotFound("Product variation".to_string()))?;
        *slot = variation.clone();
        Ok(variation.clone())
    }

    async fn variation_reference_count(&mut self, variation_id: i64) -> AppResult<i64> {
        let entries = self
            .working
            .bin_cards
            .values()
            .filter(|e| e.variation_id == variation_id)
            .count();
        let details = self
            .working
            .return_details
            .values()
            .filter(|d| d.variation_id == variation_id)
            .count();
        let stock = self
            .working
            .stock
            .values()
            .filter(|s| s.variation_id == Some(variation_id))
            .count();
        Ok((entries + details + stock) as i64)
    }

    async fn lock_variation(&mut self, _variation_id: i64) -> AppResult<()> {
        // The unit of work already holds the store-wide lock.
        Ok(())
    }

    async fn list_variations(
        &mut self,
        query: &VariationQuery,
    ) -> AppResult<Paginated<ProductVariation>> {
        let filter = &query.filter;
        let mut items: Vec<ProductVariation> = self
            .working
            .variations
            .values()
            .filter(|v| !v.lifecycle.is_deleted())
            .filter(|v| filter.product_id.map_or(true, |id| v.product_id == id))
            .filter(|v| filter.min_price.map_or(true, |min| v.price >= min))
            .filter(|v| filter.max_price.map_or(true, |max| v.price <= max))
            .filter(|v| filter.active.map_or(true, |active| v.is_active == active))
            .filter(|v| {
                matches_search(
                    &query.search,
                    &[
                        Some(v.name.as_str()),
                        v.color.as_deref(),
                        v.size.as_deref(),
                        v.capacity.as_deref(),
                        v.barcode.as_deref(),
                    ],
                )
            })
            .cloned()
            .collect();

        match query.sort {
            VariationSort::Id => ordered(&mut items, query.order, |v| v.id),
            VariationSort::Name => ordered(&mut items, query.order, |v| (v.name.clone(), v.id)),
            VariationSort::Price => ordered(&mut items, query.order, |v| (v.price, v.id)),
            VariationSort::Quantity => ordered(&mut items, query.order, |v| (v.quantity, v.id)),
            VariationSort::CreatedAt => {
                ordered(&mut items, query.order, |v| (v.created_at, v.id))
            }
        }

        Ok(Paginated::from_sorted(items, &query.page))
    }

    async fn stock(&mut self, id: i64) -> AppResult<Option<Stock>> {
        Ok(self.working.stock.get(&id).cloned())
    }

    async fn lock_stock(&mut self, key: &StockKey) -> AppResult<Option<Stock>> {
        Ok(self
            .working
            .stock
            .values()
            .find(|s| &s.key() == key)
            .cloned())
    }

    async fn insert_stock(&mut self, stock: &NewStock) -> AppResult<Stock> {
        if let Some(existing) = self.lock_stock(&stock.key).await? {
            return Ok(existing);
        }
        let row = Stock {
            id: next_id(&mut self.working.sequences.stock),
            product_id: stock.key.product_id,
            variation_id: stock.key.variation_id,
            quantity_available: 0,
            reorder_level: stock.reorder_level,
            location: stock.key.location.clone(),
            last_updated: Utc::now(),
        };
        Arc::make_mut(&mut self.working.stock).insert(row.id, row.clone());
        Ok(row)
    }

    async fn set_stock_quantity(&mut self, stock_id: i64, quantity: i64) -> AppResult<Stock> {
        let row = Arc::make_mut(&mut self.working.stock)
            .get_mut(&stock_id)
            .ok_or_else(|| AppError::NotFound("Stock".to_string()))?;
        row.quantity_available = quantity;
        row.last_updated = Utc::now();
        Ok(row.clone())
    }

    async fn variation_stock_total(&mut self, variation_id: i64) -> AppResult<i64> {
        Ok(self
            .working
            .stock
            .values()
            .filter(|s| s.variation_id == Some(variation_id))
            .map(|s| s.quantity_available)
            .sum())
    }

    async fn list_stock(&mut self, query: &StockQuery) -> AppResult<Paginated<Stock>> {
        let filter = &query.filter;
        let mut items: Vec<Stock> = self
            .working
            .stock
            .values()
            .filter(|s| filter.product_id.map_or(true, |id| s.product_id == id))
            .filter(|s| {
                filter
                    .variation_id
                    .map_or(true, |id| s.variation_id == Some(id))
            })
            .filter(|s| {
                filter
                    .location
                    .as_deref()
                    .map_or(true, |l| s.location.eq_ignore_ascii_case(l))
            })
            .filter(|s| !filter.low_stock.unwrap_or(false) || s.is_low())
            .filter(|s| matches_search(&query.search, &[Some(s.location.as_str())]))
            .cloned()
            .collect();

        match query.sort {
            StockSort::Id => ordered(&mut items, query.order, |s| s.id),
            StockSort::QuantityAvailable => {
                ordered(&mut items, query.order, |s| (s.quantity_available, s.id))
            }
            StockSort::LastUpdated => {
                ordered(&mut items, query.order, |s| (s.last_updated, s.id))
            }
        }

        Ok(Paginated::from_sorted(items, &query.page))
    }

    async fn all_stock(&mut self) -> AppResult<Vec<Stock>> {
        Ok(self.working.stock.values().cloned().collect())
    }

    async fn grn(&mut self, id: i64) -> AppResult<Option<Grn>> {
        Ok(self.working.grns.get(&id).cloned())
    }

    async fn grn_by_number(
        &mut self,
        grn_number: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<Option<Grn>> {
        Ok(self
            .working
            .grns
            .values()
            .find(|g| g.grn_number == grn_number && Some(g.id) != exclude_id)
            .cloned())
    }

    async fn insert_grn(&mut self, grn: &NewGrn) -> AppResult<Grn> {
        let now = Utc::now();
        let row = Grn {
            id: next_id(&mut self.working.sequences.grn),
            grn_number: grn.grn_number.clone(),
            supplier_id: grn.supplier_id,
            received_by: grn.received_by,
            received_date: grn.received_date,
            total_amount: grn.total_amount,
            remarks: grn.remarks.clone(),
            stock_id: grn.stock_id,
            created_at: now,
            updated_at: now,
        };
        Arc::make_mut(&mut self.working.grns).insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_grn_detail(
        &mut self,
        grn_id: i64,
        detail: &NewGrnDetail,
    ) -> AppResult<GrnDetail> {
        let row = GrnDetail {
            id: next_id(&mut self.working.sequences.grn_detail),
            grn_id,
            product_id: detail.product_id,
            quantity_received: detail.quantity_received,
            unit_cost: detail.unit_cost,
            subtotal: detail.subtotal,
            location: detail.location.clone(),
        };
        Arc::make_mut(&mut self.working.grn_details).insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_grn(&mut self, grn: &Grn) -> AppResult<Grn> {
        let row = Arc::make_mut(&mut self.working.grns)
            .get_mut(&grn.id)
            .ok_or_else(|| AppError::NotFound("GRN".to_string()))?;
        row.remarks = grn.remarks.clone();
        row.total_amount = grn.total_amount;
        row.updated_at = grn.updated_at;
        Ok(row.clone())
    }

    async fn grn_details(&mut self, grn_id: i64) -> AppResult<Vec<GrnDetail>> {
        Ok(self
            .working
            .grn_details
            .values()
            .filter(|d| d.grn_id == grn_id)
            .cloned()
            .collect())
    }

    async fn list_grns(&mut self, query: &GrnQuery) -> AppResult<Paginated<Grn>> {
        let filter = &query.filter;
        let mut items: Vec<Grn> = self
            .working
            .grns
            .values()
            .filter(|g| filter.supplier_id.map_or(true, |id| g.supplier_id == id))
            .filter(|g| filter.received_from.map_or(true, |d| g.received_date >= d))
            .filter(|g| filter.received_to.map_or(true, |d| g.received_date <= d))
            .filter(|g| filter.min_total.map_or(true, |t| g.total_amount >= t))
            .filter(|g| filter.max_total.map_or(true, |t| g.total_amount <= t))
            .filter(|g| {
                matches_search(
                    &query.search,
                    &[Some(g.grn_number.as_str()), g.remarks.as_deref()],
                )
            })
            .cloned()
            .collect();

        match query.sort {
            GrnSort::Id => ordered(&mut items, query.order, |g| g.id),
            GrnSort::GrnNumber => {
                ordered(&mut items, query.order, |g| (g.grn_number.clone(), g.id))
            }
            GrnSort::ReceivedDate => {
                ordered(&mut items, query.order, |g| (g.received_date, g.id))
            }
            GrnSort::TotalAmount => ordered(&mut items, query.order, |g| (g.total_amount, g.id)),
        }

        Ok(Paginated::from_sorted(items, &query.page))
    }

    async fn latest_bin_card(&mut self, variation_id: i64) -> AppResult<Option<BinCardEntry>> {
        Ok(self
            .working
            .bin_cards
            .values()
            .rev()
            .find(|e| e.variation_id == variation_id)
            .cloned())
    }

    async fn append_bin_card(&mut self, entry: &NewBinCardEntry) -> AppResult<BinCardEntry> {
        let row = BinCardEntry {
            id: next_id(&mut self.working.sequences.bin_card),
            variation_id: entry.variation_id,
            transaction_date: entry.transaction_date,
            transaction_type: entry.transaction_type,
            reference_id: entry.reference_id,
            quantity_in: entry.quantity_in,
            quantity_out: entry.quantity_out,
            balance: entry.balance,
            stock_keeper_id: entry.stock_keeper_id,
            remarks: entry.remarks.clone(),
            created_at: Utc::now(),
        };
        Arc::make_mut(&mut self.working.bin_cards).insert(row.id, row.clone());
        Ok(row)
    }

    async fn bin_card_page(
        &mut self,
        variation_id: i64,
        page: &PageRequest,
    ) -> AppResult<Paginated<BinCardEntry>> {
        let entries = self.bin_card_entries(variation_id).await?;
        Ok(Paginated::from_sorted(entries, page))
    }

    async fn bin_card_entries(&mut self, variation_id: i64) -> AppResult<Vec<BinCardEntry>> {
        Ok(self
            .working
            .bin_cards
            .values()
            .filter(|e| e.variation_id == variation_id)
            .cloned()
            .collect())
    }

    async fn goods_return(&mut self, id: i64) -> AppResult<Option<Return>> {
        Ok(self.working.returns.get(&id).cloned())
    }

    async fn return_by_number(&mut self, return_number: &str) -> AppResult<Option<Return>> {
        Ok(self
            .working
            .returns
            .values()
            .find(|r| r.return_number == return_number)
            .cloned())
    }

    async fn insert_return(&mut self, goods_return: &NewReturn) -> AppResult<Return> {
        let now = Utc::now();
        let row = Return {
            id: next_id(&mut self.working.sequences.goods_return),
            return_number: goods_return.return_number.clone(),
            supplier_id: goods_return.supplier_id,
            returned_by: goods_return.returned_by,
            return_date: goods_return.return_date,
            return_type: goods_return.return_type,
            status: ReturnStatus::Pending,
            approved: false,
            reason: goods_return.reason.clone(),
            remarks: goods_return.remarks.clone(),
            created_at: now,
            updated_at: now,
        };
        Arc::make_mut(&mut self.working.returns).insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_return_detail(
        &mut self,
        return_id: i64,
        detail: &NewReturnDetail,
    ) -> AppResult<ReturnDetail> {
        let row = ReturnDetail {
            id: next_id(&mut self.working.sequences.return_detail),
            return_id,
            variation_id: detail.variation_id,
            quantity_returned: detail.quantity_returned,
            remarks: detail.remarks.clone(),
        };
        Arc::make_mut(&mut self.working.return_details).insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_return(&mut self, goods_return: &Return) -> AppResult<Return> {
        let row = Arc::make_mut(&mut self.working.returns)
            .get_mut(&goods_return.id)
            .ok_or_else(|| AppError::NotFound("Return".to_string()))?;
        row.status = goods_return.status;
        row.approved = goods_return.approved;
        row.remarks = goods_return.remarks.clone();
        row.updated_at = goods_return.updated_at;
        Ok(row.clone())
    }

    async fn return_details(&mut self, return_id: i64) -> AppResult<Vec<ReturnDetail>> {
        Ok(self
            .working
            .return_details
            .values()
            .filter(|d| d.return_id == return_id)
            .cloned()
            .collect())
    }

    async fn list_returns(&mut self, query: &ReturnQuery) -> AppResult<Paginated<Return>> {
        let filter = &query.filter;
        let mut items: Vec<Return> = self
            .working
            .returns
            .values()
            .filter(|r| filter.supplier_id.map_or(true, |id| r.supplier_id == id))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| filter.return_type.map_or(true, |t| r.return_type == t))
            .filter(|r| filter.from.map_or(true, |d| r.return_date >= d))
            .filter(|r| filter.to.map_or(true, |d| r.return_date <= d))
            .filter(|r| {
                matches_search(
                    &query.search,
                    &[
                        Some(r.return_number.as_str()),
                        r.reason.as_deref(),
                        r.remarks.as_deref(),
                    ],
                )
            })
            .cloned()
            .collect();

        match query.sort {
            ReturnSort::Id => ordered(&mut items, query.order, |r| r.id),
            ReturnSort::ReturnNumber => {
                ordered(&mut items, query.order, |r| (r.return_number.clone(), r.id))
            }
            ReturnSort::ReturnDate => ordered(&mut items, query.order, |r| (r.return_date, r.id)),
        }

        Ok(Paginated::from_sorted(items, &query.page))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

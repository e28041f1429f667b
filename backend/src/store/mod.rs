//! Persistence seam for the inventory workflows
//!
//! A [`Store`] hands out [`UnitOfWork`]s. Every read and write a workflow
//! performs goes through one unit of work; nothing is visible to other
//! requests until [`UnitOfWork::commit`] succeeds, and dropping a unit of
//! work without committing discards all of its writes.
//!
//! No operation edits or removes a bin card entry; the ledger only grows.

use async_trait::async_trait;
use shared::{
    BinCardEntry, Employee, EmployeeInput, Grn, GrnDetail, NewBinCardEntry, NewGrn, NewGrnDetail,
    NewReturn, NewReturnDetail, NewStock, PageRequest, Paginated, Product, ProductInput,
    ProductVariation, Return, ReturnDetail, Stock, StockKey, Supplier, SupplierInput,
    VariationInput, Visibility,
};

use crate::error::AppResult;
use crate::services::listing::{GrnQuery, ReturnQuery, StockQuery, VariationQuery};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Source of units of work
#[async_trait]
pub trait Store: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Whether the underlying storage is reachable
    async fn ping(&self) -> bool;
}

/// One atomic set of reads and writes
#[async_trait]
pub trait UnitOfWork: Send {
    // Employees
    async fn employee(&mut self, id: i64, visibility: Visibility) -> AppResult<Option<Employee>>;
    async fn insert_employee(&mut self, input: &EmployeeInput) -> AppResult<Employee>;

    // Suppliers
    async fn supplier(&mut self, id: i64, visibility: Visibility) -> AppResult<Option<Supplier>>;
    async fn insert_supplier(&mut self, input: &SupplierInput, actor: i64) -> AppResult<Supplier>;
    async fn update_supplier(&mut self, supplier: &Supplier) -> AppResult<Supplier>;
    /// GRNs and returns pointing at the supplier
    async fn supplier_reference_count(&mut self, supplier_id: i64) -> AppResult<i64>;

    // Products
    async fn product(&mut self, id: i64, visibility: Visibility) -> AppResult<Option<Product>>;
    /// Non-deleted product with this sku, other than `exclude_id`
    async fn product_by_sku(
        &mut self,
        sku: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<Option<Product>>;
    async fn insert_product(&mut self, input: &ProductInput, actor: i64) -> AppResult<Product>;
    async fn update_product(&mut self, product: &Product) -> AppResult<Product>;
    /// Non-deleted variations of the product
    async fn live_variation_count(&mut self, product_id: i64) -> AppResult<i64>;

    // Product variations
    async fn variation(
        &mut self,
        id: i64,
        visibility: Visibility,
    ) -> AppResult<Option<ProductVariation>>;
    /// Non-deleted variation with this barcode, other than `exclude_id`
    async fn variation_by_barcode(
        &mut self,
        barcode: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<Option<ProductVariation>>;
    async fn insert_variation(
        &mut self,
        input: &VariationInput,
        actor: i64,
    ) -> AppResult<ProductVariation>;
    async fn update_variation(
        &mut self,
        variation: &ProductVariation,
    ) -> AppResult<ProductVariation>;
    /// Bin card entries, return details and stock rows pointing at the variation
    async fn variation_reference_count(&mut self, variation_id: i64) -> AppResult<i64>;
    /// Serialize postings against one variation until this unit of work ends
    async fn lock_variation(&mut self, variation_id: i64) -> AppResult<()>;
    async fn list_variations(
        &mut self,
        query: &VariationQuery,
    ) -> AppResult<Paginated<ProductVariation>>;

    // Stock
    async fn stock(&mut self, id: i64) -> AppResult<Option<Stock>>;
    /// Fetch the stock row for `key`, holding it until this unit of work ends
    async fn lock_stock(&mut self, key: &StockKey) -> AppResult<Option<Stock>>;
    /// Create the stock row for a key at quantity zero, or return the row a
    /// concurrent request created first (locked either way)
    async fn insert_stock(&mut self, stock: &NewStock) -> AppResult<Stock>;
    async fn set_stock_quantity(&mut self, stock_id: i64, quantity: i64) -> AppResult<Stock>;
    /// Quantity available summed over every location of a variation
    async fn variation_stock_total(&mut self, variation_id: i64) -> AppResult<i64>;
    async fn list_stock(&mut self, query: &StockQuery) -> AppResult<Paginated<Stock>>;
    async fn all_stock(&mut self) -> AppResult<Vec<Stock>>;

    // Goods received notes
    async fn grn(&mut self, id: i64) -> AppResult<Option<Grn>>;
    async fn grn_by_number(
        &mut self,
        grn_number: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<Option<Grn>>;
    async fn insert_grn(&mut self, grn: &NewGrn) -> AppResult<Grn>;
    async fn insert_grn_detail(&mut self, grn_id: i64, detail: &NewGrnDetail)
        -> AppResult<GrnDetail>;
    /// Persist the mutable header fields (remarks, total amount)
    async fn update_grn(&mut self, grn: &Grn) -> AppResult<Grn>;
    async fn grn_details(&mut self, grn_id: i64) -> AppResult<Vec<GrnDetail>>;
    async fn list_grns(&mut self, query: &GrnQuery) -> AppResult<Paginated<Grn>>;

    // Bin card
    async fn latest_bin_card(&mut self, variation_id: i64) -> AppResult<Option<BinCardEntry>>;
    async fn append_bin_card(&mut self, entry: &NewBinCardEntry) -> AppResult<BinCardEntry>;
    async fn bin_card_page(
        &mut self,
        variation_id: i64,
        page: &PageRequest,
    ) -> AppResult<Paginated<BinCardEntry>>;
    async fn bin_card_entries(&mut self, variation_id: i64) -> AppResult<Vec<BinCardEntry>>;

    // Returns
    async fn goods_return(&mut self, id: i64) -> AppResult<Option<Return>>;
    async fn return_by_number(&mut self, return_number: &str) -> AppResult<Option<Return>>;
    async fn insert_return(&mut self, goods_return: &NewReturn) -> AppResult<Return>;
    async fn insert_return_detail(
        &mut self,
        return_id: i64,
        detail: &NewReturnDetail,
    ) -> AppResult<ReturnDetail>;
    /// Persist the mutable header fields (status, approved, remarks)
    async fn update_return(&mut self, goods_return: &Return) -> AppResult<Return>;
    async fn return_details(&mut self, return_id: i64) -> AppResult<Vec<ReturnDetail>>;
    async fn list_returns(&mut self, query: &ReturnQuery) -> AppResult<Paginated<Return>>;

    /// Make every write of this unit of work visible at once
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

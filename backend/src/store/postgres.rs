//! PostgreSQL store
//!
//! Each unit of work is one database transaction. Postings lock the
//! variation row, then the stock row, with `SELECT ... FOR UPDATE`, so two
//! postings against the same variation serialize on the first lock and
//! neither can read a balance the other is about to change.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    BinCardEntry, BinCardType, Employee, EmployeeInput, EmployeeRole, Grn, GrnDetail, Lifecycle,
    NewBinCardEntry, NewGrn, NewGrnDetail, NewReturn, NewReturnDetail, NewStock, PageRequest,
    Paginated, PaginationMeta, Product, ProductInput, ProductVariation, Return, ReturnDetail,
    ReturnStatus, ReturnType, SoftDelete, SortOrder, Stock, StockKey, Supplier, SupplierInput,
    VariationInput, Visibility,
};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::{Store, UnitOfWork};
use crate::error::{AppError, AppResult};
use crate::services::listing::{GrnQuery, ReturnQuery, SortColumn, StockQuery, VariationQuery};

/// Store backed by a connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// Unit of work over one open transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Rows
// ============================================================================

fn parse_column<T: FromStr<Err = String>>(value: &str) -> AppResult<T> {
    value.parse().map_err(AppError::Internal)
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn page_of<T>(items: Vec<T>, total: i64, page: &PageRequest) -> Paginated<T> {
    Paginated {
        items,
        pagination: PaginationMeta::new(u64::try_from(total).unwrap_or(0), page),
    }
}

const EMPLOYEE_COLUMNS: &str =
    "id, name, email, role, is_active, deleted_at, deleted_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: i64,
    name: String,
    email: Option<String>,
    role: String,
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = AppError;

    fn try_from(row: EmployeeRow) -> AppResult<Self> {
        Ok(Employee {
            id: row.id,
            name: row.name,
            email: row.email,
            role: parse_column::<EmployeeRole>(&row.role)?,
            is_active: row.is_active,
            lifecycle: Lifecycle::from_columns(row.deleted_at, row.deleted_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SUPPLIER_COLUMNS: &str = "id, name, contact_person, phone, email, address, is_active, \
     deleted_at, deleted_by, created_by, updated_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct SupplierRow {
    id: i64,
    name: String,
    contact_person: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<i64>,
    created_by: Option<i64>,
    updated_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SupplierRow> for Supplier {
    type Error = AppError;

    fn try_from(row: SupplierRow) -> AppResult<Self> {
        Ok(Supplier {
            id: row.id,
            name: row.name,
            contact_person: row.contact_person,
            phone: row.phone,
            email: row.email,
            address: row.address,
            is_active: row.is_active,
            lifecycle: Lifecycle::from_columns(row.deleted_at, row.deleted_by),
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, sku, description, is_active, deleted_at, deleted_by, \
     created_by, updated_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    sku: String,
    description: Option<String>,
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<i64>,
    created_by: Option<i64>,
    updated_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> AppResult<Self> {
        Ok(Product {
            id: row.id,
            name: row.name,
            sku: row.sku,
            description: row.description,
            is_active: row.is_active,
            lifecycle: Lifecycle::from_columns(row.deleted_at, row.deleted_by),
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const VARIATION_COLUMNS: &str = "id, product_id, name, color, size, capacity, barcode, price, \
     quantity, min_stock_level, max_stock_level, is_active, deleted_at, deleted_by, created_by, \
     updated_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct VariationRow {
    id: i64,
    product_id: i64,
    name: String,
    color: Option<String>,
    size: Option<String>,
    capacity: Option<String>,
    barcode: Option<String>,
    price: Decimal,
    quantity: i64,
    min_stock_level: i64,
    max_stock_level: Option<i64>,
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<i64>,
    created_by: Option<i64>,
    updated_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VariationRow> for ProductVariation {
    type Error = AppError;

    fn try_from(row: VariationRow) -> AppResult<Self> {
        Ok(ProductVariation {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            color: row.color,
            size: row.size,
            capacity: row.capacity,
            barcode: row.barcode,
            price: row.price,
            quantity: row.quantity,
            min_stock_level: row.min_stock_level,
            max_stock_level: row.max_stock_level,
            is_active: row.is_active,
            lifecycle: Lifecycle::from_columns(row.deleted_at, row.deleted_by),
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const STOCK_COLUMNS: &str =
    "id, product_id, variation_id, quantity_available, reorder_level, location, last_updated";

#[derive(sqlx::FromRow)]
struct StockRow {
    id: i64,
    product_id: i64,
    variation_id: Option<i64>,
    quantity_available: i64,
    reorder_level: i64,
    location: String,
    last_updated: DateTime<Utc>,
}

impl TryFrom<StockRow> for Stock {
    type Error = AppError;

    fn try_from(row: StockRow) -> AppResult<Self> {
        Ok(Stock {
            id: row.id,
            product_id: row.product_id,
            variation_id: row.variation_id,
            quantity_available: row.quantity_available,
            reorder_level: row.reorder_level,
            location: row.location,
            last_updated: row.last_updated,
        })
    }
}

const GRN_COLUMNS: &str = "id, grn_number, supplier_id, received_by, received_date, \
     total_amount, remarks, stock_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct GrnRow {
    id: i64,
    grn_number: String,
    supplier_id: i64,
    received_by: i64,
    received_date: NaiveDate,
    total_amount: Decimal,
    remarks: Option<String>,
    stock_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GrnRow> for Grn {
    type Error = AppError;

    fn try_from(row: GrnRow) -> AppResult<Self> {
        Ok(Grn {
            id: row.id,
            grn_number: row.grn_number,
            supplier_id: row.supplier_id,
            received_by: row.received_by,
            received_date: row.received_date,
            total_amount: row.total_amount,
            remarks: row.remarks,
            stock_id: row.stock_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const GRN_DETAIL_COLUMNS: &str =
    "id, grn_id, product_id, quantity_received, unit_cost, subtotal, location";

#[derive(sqlx::FromRow)]
struct GrnDetailRow {
    id: i64,
    grn_id: i64,
    product_id: i64,
    quantity_received: i64,
    unit_cost: Decimal,
    subtotal: Decimal,
    location: Option<String>,
}

impl TryFrom<GrnDetailRow> for GrnDetail {
    type Error = AppError;

    fn try_from(row: GrnDetailRow) -> AppResult<Self> {
        Ok(GrnDetail {
            id: row.id,
            grn_id: row.grn_id,
            product_id: row.product_id,
            quantity_received: row.quantity_received,
            unit_cost: row.unit_cost,
            subtotal: row.subtotal,
            location: row.location,
        })
    }
}

const BIN_CARD_COLUMNS: &str = "id, variation_id, transaction_date, transaction_type, \
     reference_id, quantity_in, quantity_out, balance, stock_keeper_id, remarks, created_at";

#[derive(sqlx::FromRow)]
struct BinCardRow {
    id: i64,
    variation_id: i64,
    transaction_date: NaiveDate,
    transaction_type: String,
    reference_id: Option<i64>,
    quantity_in: i64,
    quantity_out: i64,
    balance: i64,
    stock_keeper_id: i64,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BinCardRow> for BinCardEntry {
    type Error = AppError;

    fn try_from(row: BinCardRow) -> AppResult<Self> {
        Ok(BinCardEntry {
            id: row.id,
            variation_id: row.variation_id,
            transaction_date: row.transaction_date,
            transaction_type: parse_column::<BinCardType>(&row.transaction_type)?,
            reference_id: row.reference_id,
            quantity_in: row.quantity_in,
            quantity_out: row.quantity_out,
            balance: row.balance,
            stock_keeper_id: row.stock_keeper_id,
            remarks: row.remarks,
            created_at: row.created_at,
        })
    }
}

const RETURN_COLUMNS: &str = "id, return_number, supplier_id, returned_by, return_date, \
     return_type, status, approved, reason, remarks, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ReturnRow {
    id: i64,
    return_number: String,
    supplier_id: i64,
    returned_by: i64,
    return_date: NaiveDate,
    return_type: String,
    status: String,
    approved: bool,
    reason: Option<String>,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReturnRow> for Return {
    type Error = AppError;

    fn try_from(row: ReturnRow) -> AppResult<Self> {
        Ok(Return {
            id: row.id,
            return_number: row.return_number,
            supplier_id: row.supplier_id,
            returned_by: row.returned_by,
            return_date: row.return_date,
            return_type: parse_column::<ReturnType>(&row.return_type)?,
            status: parse_column::<ReturnStatus>(&row.status)?,
            approved: row.approved,
            reason: row.reason,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const RETURN_DETAIL_COLUMNS: &str = "id, return_id, variation_id, quantity_returned, remarks";

#[derive(sqlx::FromRow)]
struct ReturnDetailRow {
    id: i64,
    return_id: i64,
    variation_id: i64,
    quantity_returned: i64,
    remarks: Option<String>,
}

impl TryFrom<ReturnDetailRow> for ReturnDetail {
    type Error = AppError;

    fn try_from(row: ReturnDetailRow) -> AppResult<Self> {
        Ok(ReturnDetail {
            id: row.id,
            return_id: row.return_id,
            variation_id: row.variation_id,
            quantity_returned: row.quantity_returned,
            remarks: row.remarks,
        })
    }
}

// ============================================================================
// Listing helpers
// ============================================================================

/// `ILIKE` pattern for a search term with wildcards escaped
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_search(qb: &mut QueryBuilder<'_, Postgres>, search: &Option<String>, columns: &[&str]) {
    let Some(term) = search else {
        return;
    };
    let pattern = like_pattern(term);
    qb.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(format!("COALESCE({}, '') ILIKE ", column));
        qb.push_bind(pattern.clone());
    }
    qb.push(")");
}

fn push_order_and_page(
    qb: &mut QueryBuilder<'_, Postgres>,
    column: &'static str,
    order: SortOrder,
    page: &PageRequest,
) {
    let dir = order.as_sql();
    qb.push(format!(" ORDER BY {} {}, id {} LIMIT ", column, dir, dir));
    qb.push_bind(i64::from(page.limit));
    qb.push(" OFFSET ");
    qb.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
}

fn push_grn_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &GrnQuery) {
    let filter = &query.filter;
    if let Some(supplier_id) = filter.supplier_id {
        qb.push(" AND supplier_id = ").push_bind(supplier_id);
    }
    if let Some(from) = filter.received_from {
        qb.push(" AND received_date >= ").push_bind(from);
    }
    if let Some(to) = filter.received_to {
        qb.push(" AND received_date <= ").push_bind(to);
    }
    if let Some(min) = filter.min_total {
        qb.push(" AND total_amount >= ").push_bind(min);
    }
    if let Some(max) = filter.max_total {
        qb.push(" AND total_amount <= ").push_bind(max);
    }
    push_search(qb, &query.search, &["grn_number", "remarks"]);
}

fn push_variation_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &VariationQuery) {
    let filter = &query.filter;
    qb.push(" AND deleted_at IS NULL");
    if let Some(product_id) = filter.product_id {
        qb.push(" AND product_id = ").push_bind(product_id);
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND price <= ").push_bind(max);
    }
    if let Some(active) = filter.active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    push_search(
        qb,
        &query.search,
        &["name", "color", "size", "capacity", "barcode"],
    );
}

fn push_stock_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &StockQuery) {
    let filter = &query.filter;
    if let Some(product_id) = filter.product_id {
        qb.push(" AND product_id = ").push_bind(product_id);
    }
    if let Some(variation_id) = filter.variation_id {
        qb.push(" AND variation_id = ").push_bind(variation_id);
    }
    if let Some(location) = &filter.location {
        qb.push(" AND LOWER(location) = LOWER(")
            .push_bind(location.clone())
            .push(")");
    }
    if filter.low_stock.unwrap_or(false) {
        qb.push(" AND quantity_available <= reorder_level");
    }
    push_search(qb, &query.search, &["location"]);
}

fn push_return_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ReturnQuery) {
    let filter = &query.filter;
    if let Some(supplier_id) = filter.supplier_id {
        qb.push(" AND supplier_id = ").push_bind(supplier_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(return_type) = filter.return_type {
        qb.push(" AND return_type = ").push_bind(return_type.as_str());
    }
    if let Some(from) = filter.from {
        qb.push(" AND return_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND return_date <= ").push_bind(to);
    }
    push_search(
        qb,
        &query.search,
        &["return_number", "reason", "remarks"],
    );
}

// ============================================================================
// Unit of work
// ============================================================================

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn employee(&mut self, id: i64, visibility: Visibility) -> AppResult<Option<Employee>> {
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT {} FROM employees WHERE id = $1",
            EMPLOYEE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row
            .map(Employee::try_from)
            .transpose()?
            .filter(|e| e.visible(visibility)))
    }

    async fn insert_employee(&mut self, input: &EmployeeInput) -> AppResult<Employee> {
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "INSERT INTO employees (name, email, role) VALUES ($1, $2, $3) RETURNING {}",
            EMPLOYEE_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(input.role.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn supplier(&mut self, id: i64, visibility: Visibility) -> AppResult<Option<Supplier>> {
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            "SELECT {} FROM suppliers WHERE id = $1",
            SUPPLIER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row
            .map(Supplier::try_from)
            .transpose()?
            .filter(|s| s.visible(visibility)))
    }

    async fn insert_supplier(&mut self, input: &SupplierInput, actor: i64) -> AppResult<Supplier> {
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            INSERT INTO suppliers
                (name, contact_person, phone, email, address, is_active, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {}
            "#,
            SUPPLIER_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.address)
        .bind(input.is_active.unwrap_or(true))
        .bind(actor)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn update_supplier(&mut self, supplier: &Supplier) -> AppResult<Supplier> {
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            UPDATE suppliers
            SET name = $2, contact_person = $3, phone = $4, email = $5, address = $6,
                is_active = $7, deleted_at = $8, deleted_by = $9, updated_by = $10,
                updated_at = $11
            WHERE id = $1
            RETURNING {}
            "#,
            SUPPLIER_COLUMNS
        ))
        .bind(supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .bind(supplier.is_active)
        .bind(supplier.lifecycle.deleted_at())
        .bind(supplier.lifecycle.deleted_by())
        .bind(supplier.updated_by)
        .bind(supplier.updated_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;

        row.try_into()
    }

    async fn supplier_reference_count(&mut self, supplier_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM grns WHERE supplier_id = $1)
                 + (SELECT COUNT(*) FROM returns WHERE supplier_id = $1)
            "#,
        )
        .bind(supplier_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn product(&mut self, id: i64, visibility: Visibility) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row
            .map(Product::try_from)
            .transpose()?
            .filter(|p| p.visible(visibility)))
    }

    async fn product_by_sku(
        &mut self,
        sku: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {} FROM products
            WHERE sku = $1 AND deleted_at IS NULL AND ($2::BIGINT IS NULL OR id <> $2)
            LIMIT 1
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(sku)
        .bind(exclude_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn insert_product(&mut self, input: &ProductInput, actor: i64) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (name, sku, description, is_active, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(input.sku.trim())
        .bind(&input.description)
        .bind(input.is_active.unwrap_or(true))
        .bind(actor)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
            SET name = $2, sku = $3, description = $4, is_active = $5,
                deleted_at = $6, deleted_by = $7, updated_by = $8, updated_at = $9
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(product.is_active)
        .bind(product.lifecycle.deleted_at())
        .bind(product.lifecycle.deleted_by())
        .bind(product.updated_by)
        .bind(product.updated_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        row.try_into()
    }

    async fn live_variation_count(&mut self, product_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product_variations WHERE product_id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn variation(
        &mut self,
        id: i64,
        visibility: Visibility,
    ) -> AppResult<Option<ProductVariation>> {
        let row = sqlx::query_as::<_, VariationRow>(&format!(
            "SELECT {} FROM product_variations WHERE id = $1",
            VARIATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row
            .map(ProductVariation::try_from)
            .transpose()?
            .filter(|v| v.visible(visibility)))
    }

    async fn variation_by_barcode(
        &mut self,
        barcode: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<Option<ProductVariation>> {
        let row = sqlx::query_as::<_, VariationRow>(&format!(
            r#"
            SELECT {} FROM product_variations
            WHERE barcode = $1 AND deleted_at IS NULL AND ($2::BIGINT IS NULL OR id <> $2)
            LIMIT 1
            "#,
            VARIATION_COLUMNS
        ))
        .bind(barcode)
        .bind(exclude_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(ProductVariation::try_from).transpose()
    }

    async fn insert_variation(
        &mut self,
        input: &VariationInput,
        actor: i64,
    ) -> AppResult<ProductVariation> {
        let row = sqlx::query_as::<_, VariationRow>(&format!(
            r#"
            INSERT INTO product_variations
                (product_id, name, color, size, capacity, barcode, price, quantity,
                 min_stock_level, max_stock_level, is_active, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING {}
            "#,
            VARIATION_COLUMNS
        ))
        .bind(input.product_id)
        .bind(input.name.trim())
        .bind(&input.color)
        .bind(&input.size)
        .bind(&input.capacity)
        .bind(&input.barcode)
        .bind(input.price)
        .bind(input.quantity.unwrap_or(1))
        .bind(input.min_stock_level.unwrap_or(0))
        .bind(input.max_stock_level)
        .bind(input.is_active.unwrap_or(true))
        .bind(actor)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn update_variation(
        &mut self,
        variation: &ProductVariation,
    ) -> AppResult<ProductVariation> {
        let row = sqlx::query_as::<_, VariationRow>(&format!(
            r#"
            UPDATE product_variations
            SET product_id = $2, name = $3, color = $4, size = $5, capacity = $6,
                barcode = $7, price = $8, quantity = $9, min_stock_level = $10,
                max_stock_level = $11, is_active = $12, deleted_at = $13, deleted_by = $14,
                updated_by = $15, updated_at = $16
            WHERE id = $1
            RETURNING {}
            "#,
            VARIATION_COLUMNS
        ))
        .bind(variation.id)
        .bind(variation.product_id)
        .bind(&variation.name)
        .bind(&variation.color)
        .bind(&variation.size)
        .bind(&variation.capacity)
        .bind(&variation.barcode)
        .bind(variation.price)
        .bind(variation.quantity)
        .bind(variation.min_stock_level)
        .bind(variation.max_stock_level)
        .bind(variation.is_active)
        .bind(variation.lifecycle.deleted_at())
        .bind(variation.lifecycle.deleted_by())
        .bind(variation.updated_by)
        .bind(variation.updated_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product variation".to_string()))?;

        row.try_into()
    }

    async fn variation_reference_count(&mut self, variation_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM bin_cards WHERE variation_id = $1)
                 + (SELECT COUNT(*) FROM return_details WHERE variation_id = $1)
                 + (SELECT COUNT(*) FROM stock WHERE variation_id = $1)
            "#,
        )
        .bind(variation_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn lock_variation(&mut self, variation_id: i64) -> AppResult<()> {
        sqlx::query("SELECT id FROM product_variations WHERE id = $1 FOR UPDATE")
            .bind(variation_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn list_variations(
        &mut self,
        query: &VariationQuery,
    ) -> AppResult<Paginated<ProductVariation>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM product_variations WHERE TRUE");
        push_variation_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *self.tx).await?;

        let mut select = QueryBuilder::new(format!(
            "SELECT {} FROM product_variations WHERE TRUE",
            VARIATION_COLUMNS
        ));
        push_variation_filters(&mut select, query);
        push_order_and_page(&mut select, query.sort.column(), query.order, &query.page);
        let rows: Vec<VariationRow> = select.build_query_as().fetch_all(&mut *self.tx).await?;

        Ok(page_of(convert_all(rows)?, total, &query.page))
    }

    async fn stock(&mut self, id: i64) -> AppResult<Option<Stock>> {
        let row = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {} FROM stock WHERE id = $1",
            STOCK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Stock::try_from).transpose()
    }

    async fn lock_stock(&mut self, key: &StockKey) -> AppResult<Option<Stock>> {
        let row = sqlx::query_as::<_, StockRow>(&format!(
            r#"
            SELECT {} FROM stock
            WHERE product_id = $1 AND variation_id IS NOT DISTINCT FROM $2 AND location = $3
            FOR UPDATE
            "#,
            STOCK_COLUMNS
        ))
        .bind(key.product_id)
        .bind(key.variation_id)
        .bind(&key.location)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Stock::try_from).transpose()
    }

    async fn insert_stock(&mut self, stock: &NewStock) -> AppResult<Stock> {
        let inserted = sqlx::query_as::<_, StockRow>(&format!(
            r#"
            INSERT INTO stock (product_id, variation_id, quantity_available, reorder_level, location)
            VALUES ($1, $2, 0, $3, $4)
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            STOCK_COLUMNS
        ))
        .bind(stock.key.product_id)
        .bind(stock.key.variation_id)
        .bind(stock.reorder_level)
        .bind(&stock.key.location)
        .fetch_optional(&mut *self.tx)
        .await?;

        match inserted {
            Some(row) => row.try_into(),
            // Lost the race; the winner's row is committed and can be locked now
            None => self
                .lock_stock(&stock.key)
                .await?
                .ok_or_else(|| AppError::Internal("Stock row vanished after conflict".into())),
        }
    }

    async fn set_stock_quantity(&mut self, stock_id: i64, quantity: i64) -> AppResult<Stock> {
        let row = sqlx::query_as::<_, StockRow>(&format!(
            r#"
            UPDATE stock SET quantity_available = $2, last_updated = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            STOCK_COLUMNS
        ))
        .bind(stock_id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock".to_string()))?;

        row.try_into()
    }

    async fn variation_stock_total(&mut self, variation_id: i64) -> AppResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity_available), 0)::BIGINT FROM stock WHERE variation_id = $1",
        )
        .bind(variation_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(total)
    }

    async fn list_stock(&mut self, query: &StockQuery) -> AppResult<Paginated<Stock>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM stock WHERE TRUE");
        push_stock_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *self.tx).await?;

        let mut select =
            QueryBuilder::new(format!("SELECT {} FROM stock WHERE TRUE", STOCK_COLUMNS));
        push_stock_filters(&mut select, query);
        push_order_and_page(&mut select, query.sort.column(), query.order, &query.page);
        let rows: Vec<StockRow> = select.build_query_as().fetch_all(&mut *self.tx).await?;

        Ok(page_of(convert_all(rows)?, total, &query.page))
    }

    async fn all_stock(&mut self) -> AppResult<Vec<Stock>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {} FROM stock ORDER BY id",
            STOCK_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;

        convert_all(rows)
    }

    async fn grn(&mut self, id: i64) -> AppResult<Option<Grn>> {
        let row = sqlx::query_as::<_, GrnRow>(&format!(
            "SELECT {} FROM grns WHERE id = $1",
            GRN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Grn::try_from).transpose()
    }

    async fn grn_by_number(
        &mut self,
        grn_number: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<Option<Grn>> {
        let row = sqlx::query_as::<_, GrnRow>(&format!(
            "SELECT {} FROM grns WHERE grn_number = $1 AND ($2::BIGINT IS NULL OR id <> $2)",
            GRN_COLUMNS
        ))
        .bind(grn_number)
        .bind(exclude_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Grn::try_from).transpose()
    }

    async fn insert_grn(&mut self, grn: &NewGrn) -> AppResult<Grn> {
        let row = sqlx::query_as::<_, GrnRow>(&format!(
            r#"
            INSERT INTO grns
                (grn_number, supplier_id, received_by, received_date, total_amount, remarks, stock_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            GRN_COLUMNS
        ))
        .bind(&grn.grn_number)
        .bind(grn.supplier_id)
        .bind(grn.received_by)
        .bind(grn.received_date)
        .bind(grn.total_amount)
        .bind(&grn.remarks)
        .bind(grn.stock_id)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn insert_grn_detail(
        &mut self,
        grn_id: i64,
        detail: &NewGrnDetail,
    ) -> AppResult<GrnDetail> {
        let row = sqlx::query_as::<_, GrnDetailRow>(&format!(
            r#"
            INSERT INTO grn_details
                (grn_id, product_id, quantity_received, unit_cost, subtotal, location)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            GRN_DETAIL_COLUMNS
        ))
        .bind(grn_id)
        .bind(detail.product_id)
        .bind(detail.quantity_received)
        .bind(detail.unit_cost)
        .bind(detail.subtotal)
        .bind(&detail.location)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn update_grn(&mut self, grn: &Grn) -> AppResult<Grn> {
        let row = sqlx::query_as::<_, GrnRow>(&format!(
            r#"
            UPDATE grns SET remarks = $2, total_amount = $3, updated_at = $4
            WHERE id = $1
            RETURNING {}
            "#,
            GRN_COLUMNS
        ))
        .bind(grn.id)
        .bind(&grn.remarks)
        .bind(grn.total_amount)
        .bind(grn.updated_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("GRN".to_string()))?;

        row.try_into()
    }

    async fn grn_details(&mut self, grn_id: i64) -> AppResult<Vec<GrnDetail>> {
        let rows = sqlx::query_as::<_, GrnDetailRow>(&format!(
            "SELECT {} FROM grn_details WHERE grn_id = $1 ORDER BY id",
            GRN_DETAIL_COLUMNS
        ))
        .bind(grn_id)
        .fetch_all(&mut *self.tx)
        .await?;

        convert_all(rows)
    }

    async fn list_grns(&mut self, query: &GrnQuery) -> AppResult<Paginated<Grn>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM grns WHERE TRUE");
        push_grn_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *self.tx).await?;

        let mut select = QueryBuilder::new(format!("SELECT {} FROM grns WHERE TRUE", GRN_COLUMNS));
        push_grn_filters(&mut select, query);
        push_order_and_page(&mut select, query.sort.column(), query.order, &query.page);
        let rows: Vec<GrnRow> = select.build_query_as().fetch_all(&mut *self.tx).await?;

        Ok(page_of(convert_all(rows)?, total, &query.page))
    }

    async fn latest_bin_card(&mut self, variation_id: i64) -> AppResult<Option<BinCardEntry>> {
        let row = sqlx::query_as::<_, BinCardRow>(&format!(
            "SELECT {} FROM bin_cards WHERE variation_id = $1 ORDER BY id DESC LIMIT 1",
            BIN_CARD_COLUMNS
        ))
        .bind(variation_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(BinCardEntry::try_from).transpose()
    }

    async fn append_bin_card(&mut self, entry: &NewBinCardEntry) -> AppResult<BinCardEntry> {
        let row = sqlx::query_as::<_, BinCardRow>(&format!(
            r#"
            INSERT INTO bin_cards
                (variation_id, transaction_date, transaction_type, reference_id,
                 quantity_in, quantity_out, balance, stock_keeper_id, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            BIN_CARD_COLUMNS
        ))
        .bind(entry.variation_id)
        .bind(entry.transaction_date)
        .bind(entry.transaction_type.as_str())
        .bind(entry.reference_id)
        .bind(entry.quantity_in)
        .bind(entry.quantity_out)
        .bind(entry.balance)
        .bind(entry.stock_keeper_id)
        .bind(&entry.remarks)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn bin_card_page(
        &mut self,
        variation_id: i64,
        page: &PageRequest,
    ) -> AppResult<Paginated<BinCardEntry>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bin_cards WHERE variation_id = $1")
            .bind(variation_id)
            .fetch_one(&mut *self.tx)
            .await?;

        let rows = sqlx::query_as::<_, BinCardRow>(&format!(
            r#"
            SELECT {} FROM bin_cards WHERE variation_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
            BIN_CARD_COLUMNS
        ))
        .bind(variation_id)
        .bind(i64::from(page.limit))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(page_of(convert_all(rows)?, total, page))
    }

    async fn bin_card_entries(&mut self, variation_id: i64) -> AppResult<Vec<BinCardEntry>> {
        let rows = sqlx::query_as::<_, BinCardRow>(&format!(
            "SELECT {} FROM bin_cards WHERE variation_id = $1 ORDER BY id",
            BIN_CARD_COLUMNS
        ))
        .bind(variation_id)
        .fetch_all(&mut *self.tx)
        .await?;

        convert_all(rows)
    }

    async fn goods_return(&mut self, id: i64) -> AppResult<Option<Return>> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {} FROM returns WHERE id = $1",
            RETURN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Return::try_from).transpose()
    }

    async fn return_by_number(&mut self, return_number: &str) -> AppResult<Option<Return>> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {} FROM returns WHERE return_number = $1",
            RETURN_COLUMNS
        ))
        .bind(return_number)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Return::try_from).transpose()
    }

    async fn insert_return(&mut self, goods_return: &NewReturn) -> AppResult<Return> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            r#"
            INSERT INTO returns
                (return_number, supplier_id, returned_by, return_date, return_type,
                 status, approved, reason, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $8)
            RETURNING {}
            "#,
            RETURN_COLUMNS
        ))
        .bind(&goods_return.return_number)
        .bind(goods_return.supplier_id)
        .bind(goods_return.returned_by)
        .bind(goods_return.return_date)
        .bind(goods_return.return_type.as_str())
        .bind(ReturnStatus::Pending.as_str())
        .bind(&goods_return.reason)
        .bind(&goods_return.remarks)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn insert_return_detail(
        &mut self,
        return_id: i64,
        detail: &NewReturnDetail,
    ) -> AppResult<ReturnDetail> {
        let row = sqlx::query_as::<_, ReturnDetailRow>(&format!(
            r#"
            INSERT INTO return_details (return_id, variation_id, quantity_returned, remarks)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            RETURN_DETAIL_COLUMNS
        ))
        .bind(return_id)
        .bind(detail.variation_id)
        .bind(detail.quantity_returned)
        .bind(&detail.remarks)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn update_return(&mut self, goods_return: &Return) -> AppResult<Return> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            r#"
            UPDATE returns SET status = $2, approved = $3, remarks = $4, updated_at = $5
            WHERE id = $1
            RETURNING {}
            "#,
            RETURN_COLUMNS
        ))
        .bind(goods_return.id)
        .bind(goods_return.status.as_str())
        .bind(goods_return.approved)
        .bind(&goods_return.remarks)
        .bind(goods_return.updated_at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Return".to_string()))?;

        row.try_into()
    }

    async fn return_details(&mut self, return_id: i64) -> AppResult<Vec<ReturnDetail>> {
        let rows = sqlx::query_as::<_, ReturnDetailRow>(&format!(
            "SELECT {} FROM return_details WHERE return_id = $1 ORDER BY id",
            RETURN_DETAIL_COLUMNS
        ))
        .bind(return_id)
        .fetch_all(&mut *self.tx)
        .await?;

        convert_all(rows)
    }

    async fn list_returns(&mut self, query: &ReturnQuery) -> AppResult<Paginated<Return>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM returns WHERE TRUE");
        push_return_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *self.tx).await?;

        let mut select =
            QueryBuilder::new(format!("SELECT {} FROM returns WHERE TRUE", RETURN_COLUMNS));
        push_return_filters(&mut select, query);
        push_order_and_page(&mut select, query.sort.column(), query.order, &query.page);
        let rows: Vec<ReturnRow> = select.build_query_as().fetch_all(&mut *self.tx).await?;

        Ok(page_of(convert_all(rows)?, total, &query.page))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("blue"), "%blue%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}

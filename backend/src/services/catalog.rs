//! Catalog maintenance: employees, suppliers, products and variations
//!
//! Deletes are soft. A deleted entity stays readable by id for history but
//! no longer satisfies any reference check.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    normalize_text, validate_barcode, validate_positive_quantity, validate_price,
    validate_stock_levels, Employee, EmployeeInput, Lifecycle, Product, ProductInput,
    ProductVariation, RuleViolation, Supplier, SupplierInput, VariationInput, Visibility,
};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::access::{require_actor, Access};
use crate::store::{Store, UnitOfWork};

/// Service for catalog entities
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Employees
    // ========================================================================

    /// Register an employee. Not exposed over HTTP; sessions are issued elsewhere.
    pub async fn create_employee(&self, input: EmployeeInput) -> AppResult<Employee> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let employee = uow.insert_employee(&input).await?;
        uow.commit().await?;

        tracing::info!(
            "Registered employee {} ({}) as {}",
            employee.id,
            employee.name,
            employee.role
        );
        Ok(employee)
    }

    pub async fn get_employee(&self, acting_employee_id: i64, employee_id: i64) -> AppResult<Employee> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;

        uow.employee(employee_id, Visibility::NotDeleted)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {}", employee_id)))
    }

    // ========================================================================
    // Suppliers
    // ========================================================================

    pub async fn create_supplier(
        &self,
        acting_employee_id: i64,
        input: SupplierInput,
    ) -> AppResult<Supplier> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::ManageCatalog).await?;

        let supplier = uow.insert_supplier(&input, actor.id).await?;
        uow.commit().await?;

        tracing::info!("Created supplier {} ({})", supplier.id, supplier.name);
        Ok(supplier)
    }

    pub async fn get_supplier(&self, acting_employee_id: i64, supplier_id: i64) -> AppResult<Supplier> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;

        find_supplier(uow.as_mut(), supplier_id).await
    }

    pub async fn update_supplier(
        &self,
        acting_employee_id: i64,
        supplier_id: i64,
        input: SupplierInput,
    ) -> AppResult<Supplier> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::ManageCatalog).await?;

        let mut supplier = find_supplier(uow.as_mut(), supplier_id).await?;
        supplier.name = input.name.trim().to_string();
        supplier.contact_person = normalize_text(input.contact_person.as_deref());
        supplier.phone = normalize_text(input.phone.as_deref());
        supplier.email = normalize_text(input.email.as_deref());
        supplier.address = normalize_text(input.address.as_deref());
        if let Some(is_active) = input.is_active {
            supplier.is_active = is_active;
        }
        supplier.updated_by = Some(actor.id);
        supplier.updated_at = Utc::now();

        let supplier = uow.update_supplier(&supplier).await?;
        uow.commit().await?;

        tracing::info!("Updated supplier {}", supplier.id);
        Ok(supplier)
    }

    /// Soft delete a supplier no GRN or return refers to
    pub async fn delete_supplier(&self, acting_employee_id: i64, supplier_id: i64) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::ManageCatalog).await?;

        let mut supplier = find_supplier(uow.as_mut(), supplier_id).await?;

        let references = uow.supplier_reference_count(supplier_id).await?;
        if references > 0 {
            return Err(AppError::conflict(
                "Supplier",
                format!(
                    "Supplier is referenced by {} GRNs or returns and cannot be deleted",
                    references
                ),
            ));
        }

        let now = Utc::now();
        supplier.lifecycle = Lifecycle::Deleted {
            at: now,
            by: Some(actor.id),
        };
        supplier.updated_by = Some(actor.id);
        supplier.updated_at = now;

        uow.update_supplier(&supplier).await?;
        uow.commit().await?;

        tracing::info!("Deleted supplier {} by employee {}", supplier_id, actor.id);
        Ok(())
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub async fn create_product(
        &self,
        acting_employee_id: i64,
        input: ProductInput,
    ) -> AppResult<Product> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::ManageCatalog).await?;

        ensure_sku_free(uow.as_mut(), input.sku.trim(), None).await?;

        let product = uow.insert_product(&input, actor.id).await?;
        uow.commit().await?;

        tracing::info!("Created product {} (sku {})", product.id, product.sku);
        Ok(product)
    }

    pub async fn get_product(&self, acting_employee_id: i64, product_id: i64) -> AppResult<Product> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;

        find_product(uow.as_mut(), product_id).await
    }

    pub async fn update_product(
        &self,
        acting_employee_id: i64,
        product_id: i64,
        input: ProductInput,
    ) -> AppResult<Product> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::ManageCatalog).await?;

        let mut product = find_product(uow.as_mut(), product_id).await?;
        let sku = input.sku.trim().to_string();
        ensure_sku_free(uow.as_mut(), &sku, Some(product_id)).await?;

        product.name = input.name.trim().to_string();
        product.sku = sku;
        product.description = normalize_text(input.description.as_deref());
        if let Some(is_active) = input.is_active {
            product.is_active = is_active;
        }
        product.updated_by = Some(actor.id);
        product.updated_at = Utc::now();

        let product = uow.update_product(&product).await?;
        uow.commit().await?;

        tracing::info!("Updated product {}", product.id);
        Ok(product)
    }

    /// Soft delete a product that has no live variations
    pub async fn delete_product(&self, acting_employee_id: i64, product_id: i64) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::ManageCatalog).await?;

        let mut product = find_product(uow.as_mut(), product_id).await?;

        let variations = uow.live_variation_count(product_id).await?;
        if variations > 0 {
            return Err(AppError::conflict(
                "Product",
                format!(
                    "Product still has {} variations and cannot be deleted",
                    variations
                ),
            ));
        }

        let now = Utc::now();
        product.lifecycle = Lifecycle::Deleted {
            at: now,
            by: Some(actor.id),
        };
        product.updated_by = Some(actor.id);
        product.updated_at = now;

        uow.update_product(&product).await?;
        uow.commit().await?;

        tracing::info!("Deleted product {} by employee {}", product_id, actor.id);
        Ok(())
    }

    // ========================================================================
    // Product variations
    // ========================================================================

    pub async fn create_variation(
        &self,
        acting_employee_id: i64,
        input: VariationInput,
    ) -> AppResult<ProductVariation> {
        input.validate()?;
        check_variation_input(&input)?;

        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::ManageCatalog).await?;

        uow.product(input.product_id, Visibility::Active)
            .await?
            .ok_or_else(|| AppError::validation("product_id", "Invalid product ID"))?;

        if let Some(barcode) = input.barcode.as_deref() {
            ensure_barcode_free(uow.as_mut(), barcode, None).await?;
        }

        let variation = uow.insert_variation(&input, actor.id).await?;
        uow.commit().await?;

        tracing::info!(
            "Created variation {} of product {}",
            variation.id,
            variation.product_id
        );
        Ok(variation)
    }

    pub async fn get_variation(
        &self,
        acting_employee_id: i64,
        variation_id: i64,
    ) -> AppResult<ProductVariation> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;

        find_variation(uow.as_mut(), variation_id).await
    }

    pub async fn update_variation(
        &self,
        acting_employee_id: i64,
        variation_id: i64,
        input: VariationInput,
    ) -> AppResult<ProductVariation> {
        input.validate()?;
        check_variation_input(&input)?;

        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::ManageCatalog).await?;

        let mut variation = find_variation(uow.as_mut(), variation_id).await?;

        if input.product_id != variation.product_id {
            uow.product(input.product_id, Visibility::Active)
                .await?
                .ok_or_else(|| AppError::validation("product_id", "Invalid product ID"))?;
        }
        if let Some(barcode) = input.barcode.as_deref() {
            ensure_barcode_free(uow.as_mut(), barcode, Some(variation_id)).await?;
        }

        variation.product_id = input.product_id;
        variation.name = input.name.trim().to_string();
        variation.color = normalize_text(input.color.as_deref());
        variation.size = normalize_text(input.size.as_deref());
        variation.capacity = normalize_text(input.capacity.as_deref());
        variation.barcode = input.barcode.clone();
        variation.price = input.price;
        if let Some(quantity) = input.quantity {
            variation.quantity = quantity;
        }
        if let Some(min) = input.min_stock_level {
            variation.min_stock_level = min;
        }
        variation.max_stock_level = input.max_stock_level;
        if let Some(is_active) = input.is_active {
            variation.is_active = is_active;
        }
        validate_stock_levels(variation.min_stock_level, variation.max_stock_level)
            .map_err(|v| AppError::from_rule("variation", v))?;
        variation.updated_by = Some(actor.id);
        variation.updated_at = Utc::now();

        let variation = uow.update_variation(&variation).await?;
        uow.commit().await?;

        tracing::info!("Updated variation {}", variation.id);
        Ok(variation)
    }

    /// Soft delete a variation nothing in the ledger, returns or stock refers to
    pub async fn delete_variation(&self, acting_employee_id: i64, variation_id: i64) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::ManageCatalog).await?;

        let mut variation = find_variation(uow.as_mut(), variation_id).await?;

        let references = uow.variation_reference_count(variation_id).await?;
        if references > 0 {
            return Err(AppError::conflict(
                "Product variation",
                "Variation is referenced by bin card, return or stock records and cannot be deleted",
            ));
        }

        let now = Utc::now();
        variation.lifecycle = Lifecycle::Deleted {
            at: now,
            by: Some(actor.id),
        };
        variation.updated_by = Some(actor.id);
        variation.updated_at = now;

        uow.update_variation(&variation).await?;
        uow.commit().await?;

        tracing::info!("Deleted variation {} by employee {}", variation_id, actor.id);
        Ok(())
    }
}

async fn find_supplier(uow: &mut dyn UnitOfWork, id: i64) -> AppResult<Supplier> {
    uow.supplier(id, Visibility::NotDeleted)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Supplier {}", id)))
}

async fn find_product(uow: &mut dyn UnitOfWork, id: i64) -> AppResult<Product> {
    uow.product(id, Visibility::NotDeleted)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {}", id)))
}

async fn find_variation(uow: &mut dyn UnitOfWork, id: i64) -> AppResult<ProductVariation> {
    uow.variation(id, Visibility::NotDeleted)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product variation {}", id)))
}

async fn ensure_sku_free(uow: &mut dyn UnitOfWork, sku: &str, exclude: Option<i64>) -> AppResult<()> {
    if uow.product_by_sku(sku, exclude).await?.is_some() {
        return Err(AppError::conflict("Product", "SKU already exists"));
    }
    Ok(())
}

async fn ensure_barcode_free(
    uow: &mut dyn UnitOfWork,
    barcode: &str,
    exclude: Option<i64>,
) -> AppResult<()> {
    if uow.variation_by_barcode(barcode, exclude).await?.is_some() {
        return Err(AppError::conflict("Product variation", "Barcode already exists"));
    }
    Ok(())
}

fn check_variation_input(input: &VariationInput) -> AppResult<()> {
    let rule = |v: RuleViolation| AppError::from_rule("variation", v);

    validate_price(input.price).map_err(rule)?;
    if let Some(barcode) = input.barcode.as_deref() {
        validate_barcode(barcode).map_err(rule)?;
    }
    if let Some(quantity) = input.quantity {
        validate_positive_quantity("quantity", quantity).map_err(rule)?;
    }
    validate_stock_levels(input.min_stock_level.unwrap_or(0), input.max_stock_level)
        .map_err(rule)
}

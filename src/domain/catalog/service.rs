use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::errors::CatalogError;
use crate::domain::access::{AccessPolicy, Principal};
use crate::domain::inventory::{Product, ProductStatus};
use crate::store::{ProductFilter, StoreTransaction, TransactionalStore};

pub const DEFAULT_PAGE_LIMIT: i64 = 100;

/// Admin input for a new product; `status` defaults to active
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    ProductStatus::Active.as_str().to_string()
}

/// Partial update: only `Some` fields are applied
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub status: Option<String>,
}

pub struct CatalogService<S: TransactionalStore> {
    store: Arc<S>,
}

impl<S: TransactionalStore> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Public catalog: active products only
    pub async fn list_catalog(&self, offset: i64, limit: Option<i64>) -> Result<Vec<Product>, CatalogError> {
        let filter = ProductFilter::active().page(offset, limit.unwrap_or(DEFAULT_PAGE_LIMIT));
        self.list(&filter).await
    }

    pub async fn list_all(
        &self,
        principal: &Principal,
        offset: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Product>, CatalogError> {
        AccessPolicy::require_admin(principal, "list all products")?;
        let filter = ProductFilter::all().page(offset, limit.unwrap_or(DEFAULT_PAGE_LIMIT));
        self.list(&filter).await
    }

    /// Anonymous callers and customers only see active products
    pub async fn get_product(&self, principal: Option<&Principal>, id: Uuid) -> Result<Product, CatalogError> {
        let mut tx = self.store.begin().await?;
        let product = tx.find_product(id).await?;
        tx.commit().await?;

        let sees_inactive = principal.is_some_and(Principal::is_admin);
        match product {
            Some(product) if sees_inactive || product.is_active() => Ok(product),
            _ => Err(CatalogError::NotFound(id)),
        }
    }

    pub async fn create_product(&self, principal: &Principal, new: NewProduct) -> Result<Product, CatalogError> {
        AccessPolicy::require_admin(principal, "create products")?;

        let sku = new.sku.trim().to_string();
        if sku.is_empty() {
            return Err(CatalogError::Validation("sku must not be empty".to_string()));
        }
        if new.name.trim().is_empty() {
            return Err(CatalogError::Validation("name must not be empty".to_string()));
        }

        let product = Product {
            id: Uuid::new_v4(),
            sku,
            name: new.name.trim().to_string(),
            description: new.description,
            category: new.category,
            price: validate_price(new.price)?,
            stock: validate_stock(new.stock)?,
            status: parse_status(&new.status)?,
            created_at: Utc::now(),
        };

        let mut tx = self.store.begin().await?;
        if tx.find_product_by_sku(&product.sku).await?.is_some() {
            return Err(CatalogError::DuplicateSku(product.sku));
        }
        tx.insert_product(&product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, sku = %product.sku, "📦 Product created");
        Ok(product)
    }

    /// Applies the patch while holding the product row lock, so an edit never
    /// overwrites a concurrent reservation with a stale stock value.
    pub async fn update_product(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: ProductPatch,
    ) -> Result<Product, CatalogError> {
        AccessPolicy::require_admin(principal, "update products")?;

        let status = patch.status.as_deref().map(parse_status).transpose()?;
        let price = patch.price.map(validate_price).transpose()?;
        let stock = patch.stock.map(validate_stock).transpose()?;

        let mut tx = self.store.begin().await?;
        let mut product = tx.lock_product(id).await?.ok_or(CatalogError::NotFound(id))?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(CatalogError::Validation("name must not be empty".to_string()));
            }
            product.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            product.description = Some(description);
        }
        if let Some(category) = patch.category {
            product.category = Some(category);
        }
        if let Some(price) = price {
            product.price = price;
        }
        if let Some(stock) = stock {
            product.stock = stock;
        }
        if let Some(status) = status {
            product.status = status;
        }

        tx.update_product(&product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, stock = product.stock, status = %product.status, "Product updated");
        Ok(product)
    }

    pub async fn set_product_status(
        &self,
        principal: &Principal,
        id: Uuid,
        status: &str,
    ) -> Result<Product, CatalogError> {
        AccessPolicy::require_admin(principal, "change product status")?;
        let status = parse_status(status)?;

        let mut tx = self.store.begin().await?;
        let mut product = tx.lock_product(id).await?.ok_or(CatalogError::NotFound(id))?;
        product.status = status;
        tx.update_product(&product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, status = %status, "Product status changed");
        Ok(product)
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, CatalogError> {
        let mut tx = self.store.begin().await?;
        let products = tx.list_products(filter).await?;
        tx.commit().await?;
        Ok(products)
    }
}

fn parse_status(raw: &str) -> Result<ProductStatus, CatalogError> {
    raw.parse().map_err(CatalogError::Validation)
}

fn validate_price(price: Decimal) -> Result<Decimal, CatalogError> {
    if price < Decimal::ZERO {
        return Err(CatalogError::Validation(format!("price must not be negative, got {price}")));
    }
    Ok(price.round_dp(2))
}

fn validate_stock(stock: i32) -> Result<i32, CatalogError> {
    if stock < 0 {
        return Err(CatalogError::Validation(format!("stock must not be negative, got {stock}")));
    }
    Ok(stock)
}

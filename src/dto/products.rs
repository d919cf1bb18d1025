use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::{nullable, require_non_blank},
    error::{AppError, AppResult},
    models::Product,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub barcode: String,
    pub section: String,
    pub category: Option<String>,
    pub sale_price: i64,
    pub stock: i32,
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl CreateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        require_non_blank("name", &self.name)?;
        require_non_blank("barcode", &self.barcode)?;
        require_non_blank("section", &self.section)?;
        check_price_and_stock(Some(self.sale_price), Some(self.stock))?;
        check_images(&self.images)
    }
}

/// Absent fields are left unchanged; `null` clears `description`, `category`
/// and `expiration_date`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub barcode: Option<String>,
    pub section: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub category: Option<Option<String>>,
    pub sale_price: Option<i64>,
    pub stock: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<NaiveDate>)]
    pub expiration_date: Option<Option<NaiveDate>>,
    /// Replaces the whole image list when present.
    pub images: Option<Vec<String>>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        for (field, value) in [
            ("name", &self.name),
            ("barcode", &self.barcode),
            ("section", &self.section),
        ] {
            if let Some(value) = value {
                require_non_blank(field, value)?;
            }
        }
        check_price_and_stock(self.sale_price, self.stock)?;
        if let Some(images) = &self.images {
            check_images(images)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

fn check_price_and_stock(sale_price: Option<i64>, stock: Option<i32>) -> AppResult<()> {
    if sale_price.is_some_and(|p| p < 0) {
        return Err(AppError::BadRequest("sale_price must not be negative".into()));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }
    Ok(())
}

fn check_images(images: &[String]) -> AppResult<()> {
    if images.iter().any(|url| url.trim().is_empty()) {
        return Err(AppError::BadRequest("image urls must not be empty".into()));
    }
    Ok(())
}

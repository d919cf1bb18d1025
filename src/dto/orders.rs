use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Order, OrderStatus},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub items: Vec<OrderItemRequest>,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.items.is_empty() {
            return Err(AppError::BadRequest("Order must contain at least one item".into()));
        }
        for item in &self.items {
            if item.quantity < 1 {
                return Err(AppError::BadRequest(format!(
                    "Quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            if item.unit_price.is_some_and(|p| p < 0) {
                return Err(AppError::BadRequest(format!(
                    "Unit price for product {} must not be negative",
                    item.product_id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Defaults to the product's current sale price.
    pub unit_price: Option<i64>,
    /// Defaults to the product's section.
    pub section: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i32) -> OrderItemRequest {
        OrderItemRequest {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price: None,
            section: None,
        }
    }

    #[test]
    fn empty_order_is_rejected() {
        let request = CreateOrderRequest {
            customer_id: Uuid::new_v4(),
            items: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let request = CreateOrderRequest {
            customer_id: Uuid::new_v4(),
            items: vec![item(2), item(0)],
        };
        assert!(matches!(request.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn status_deserializes_from_snake_case() {
        let request: UpdateOrderRequest =
            serde_json::from_str(r#"{"status":"shipped"}"#).unwrap();
        assert_eq!(request.status, OrderStatus::Shipped);
    }
}

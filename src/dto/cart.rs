use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::CartItem;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    #[serde(alias = "mango_id")]
    pub category_id: Uuid,
    pub quantity: Option<i32>,
}

/// `quantity` is kept loose so a non-numeric value gets the same 400 as a
/// non-positive one instead of a deserialization rejection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    #[schema(value_type = Option<i64>)]
    pub quantity: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItem>,
    pub total_amount: i64,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub image_url: Option<String>,
    pub phone_number: Option<String>,
    pub additional_phone: Option<String>,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
}

/// A mango variety as shown in the catalog, with its rating roll-up.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub stock_quantity: i32,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub average_rating: f64,
    pub total_ratings: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub category: Category,
    pub quantity: i32,
    pub subtotal: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub total_amount: i64,
    pub status: String,
    pub order_date: DateTime<Utc>,
    pub billing_address: String,
    pub shipping_address: String,
    pub phone_number: String,
    pub additional_phone: Option<String>,
    pub payment_method: String,
}

/// Line item of a placed order. `price` is the category price at checkout.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub category_id: Uuid,
    pub mango_name: String,
    pub mango_image: Option<String>,
    pub description: String,
    pub quantity: i32,
    pub price: i64,
    pub subtotal: i64,
    pub can_give_feedback: bool,
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_date: DateTime<Utc>,
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Feedback {
    pub id: Uuid,
    pub order_item_id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Feedback;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SubmitFeedbackRequest {
    #[schema(value_type = Option<i32>)]
    pub rating: Option<Value>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewEntry {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryFeedbacks {
    pub category_id: Uuid,
    pub category_name: String,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub feedbacks: Vec<ReviewEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminFeedbackEntry {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub username: String,
    pub category_name: String,
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct AdminFeedbackList {
    #[schema(value_type = Vec<AdminFeedbackEntry>)]
    pub items: Vec<AdminFeedbackEntry>,
}

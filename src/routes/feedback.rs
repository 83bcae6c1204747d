use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::feedback::{AdminFeedbackList, CategoryFeedbacks, SubmitFeedbackRequest},
    error::AppResult,
    extract::{ApiJson, ApiPath},
    middleware::auth::AuthUser,
    models::Feedback,
    response::ApiResponse,
    services::feedback_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/order-item/{id}/feedback",
            post(submit_feedback).put(submit_feedback),
        )
        .route("/order-item/{id}/get-feedback", get(get_feedback))
        .route("/mango/{id}/feedbacks", get(category_feedbacks))
        .route("/admin/all-feedbacks", get(all_feedbacks))
}

#[utoipa::path(
    post,
    path = "/api/order-item/{id}/feedback",
    params(
        ("id" = Uuid, Path, description = "Order item ID")
    ),
    request_body = SubmitFeedbackRequest,
    responses(
        (status = 200, description = "Create or replace the rating", body = ApiResponse<Feedback>),
        (status = 400, description = "Order not delivered or rating out of range"),
        (status = 403, description = "Not the order owner"),
        (status = 404, description = "Order item not found")
    ),
    tag = "Feedback"
)]
pub async fn submit_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SubmitFeedbackRequest>,
) -> AppResult<Json<ApiResponse<Feedback>>> {
    let resp = feedback_service::submit_feedback(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/order-item/{id}/get-feedback",
    params(
        ("id" = Uuid, Path, description = "Order item ID")
    ),
    responses(
        (status = 200, description = "Feedback for the item", body = ApiResponse<Feedback>),
        (status = 404, description = "No feedback found for this item")
    ),
    tag = "Feedback"
)]
pub async fn get_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<Feedback>>> {
    let resp = feedback_service::get_feedback(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/mango/{id}/feedbacks",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Public reviews with rating stats", body = ApiResponse<CategoryFeedbacks>),
        (status = 404, description = "Category not found")
    ),
    security(()),
    tag = "Feedback"
)]
pub async fn category_feedbacks(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ApiResponse<CategoryFeedbacks>>> {
    let resp = feedback_service::list_category_feedbacks(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/all-feedbacks",
    responses(
        (status = 200, description = "Every feedback with context", body = ApiResponse<AdminFeedbackList>),
        (status = 403, description = "Staff only")
    ),
    tag = "Feedback"
)]
pub async fn all_feedbacks(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AdminFeedbackList>>> {
    let resp = feedback_service::list_all_feedbacks(&state, &user).await?;
    Ok(Json(resp))
}

use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::profile::{ProfileResponse, UpdateProfileRequest},
    error::AppResult,
    extract::ApiJson,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::profile_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/profile",
        get(get_profile).put(update_profile).patch(update_profile),
    )
}

#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Caller's profile, created on first access", body = ApiResponse<ProfileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Profile"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ProfileResponse>>> {
    let resp = profile_service::get_profile(&state, &user).await?;
    Ok(Json(resp))
}

/// Serves both PUT and PATCH; absent fields are left as they are.
#[utoipa::path(
    put,
    path = "/api/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Update profile", body = ApiResponse<ProfileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Profile"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<ProfileResponse>>> {
    let resp = profile_service::update_profile(&state, &user, payload).await?;
    Ok(Json(resp))
}

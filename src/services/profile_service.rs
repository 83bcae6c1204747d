use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    dto::{
        non_blank,
        profile::{ProfileResponse, UpdateProfileRequest},
    },
    entity::{
        Users,
        profiles::{
            ActiveModel as ProfileActive, Column as ProfileCol, Entity as Profiles,
            Model as ProfileModel,
        },
    },
    error::{AppError, AppResult},
    middleware::{
        auth::AuthUser,
        policy::{Action, Resource, authorize},
    },
    models::Profile,
    response::ApiResponse,
    state::AppState,
};

/// Returns the user's profile, inserting an empty one first if needed.
///
/// Idempotent: the insert is `ON CONFLICT (user_id) DO NOTHING`, so retries
/// and concurrent first requests all end up reading the same row.
pub async fn get_or_create_profile<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<ProfileModel> {
    let now = Utc::now();
    let active = ProfileActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        image_url: Set(None),
        phone_number: Set(None),
        additional_phone: Set(None),
        billing_address: Set(None),
        shipping_address: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    Profiles::insert(active)
        .on_conflict(
            OnConflict::column(ProfileCol::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Profiles::find()
        .filter(ProfileCol::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::internal("profile missing after upsert"))
}

pub async fn get_profile(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ProfileResponse>> {
    authorize(Some(user), Resource::Profile, Action::Retrieve, None)?;
    let account = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let profile = get_or_create_profile(&state.orm, user.user_id).await?;

    Ok(ApiResponse::ok(
        "Profile",
        ProfileResponse {
            username: account.username,
            email: account.email,
            profile: profile_from_entity(profile),
        },
    ))
}

/// Partial update: only provided fields change, an empty string clears one.
pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<ProfileResponse>> {
    authorize(Some(user), Resource::Profile, Action::Update, None)?;
    let account = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let existing = get_or_create_profile(&state.orm, user.user_id).await?;

    for phone in [&payload.phone_number, &payload.additional_phone]
        .into_iter()
        .flatten()
    {
        if phone.trim().chars().count() > 20 {
            return Err(AppError::bad_request(
                "Phone numbers must be at most 20 characters",
            ));
        }
    }

    let mut active: ProfileActive = existing.into();
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(non_blank(Some(image_url)));
    }
    if let Some(phone_number) = payload.phone_number {
        active.phone_number = Set(non_blank(Some(phone_number)));
    }
    if let Some(additional_phone) = payload.additional_phone {
        active.additional_phone = Set(non_blank(Some(additional_phone)));
    }
    if let Some(billing_address) = payload.billing_address {
        active.billing_address = Set(non_blank(Some(billing_address)));
    }
    if let Some(shipping_address) = payload.shipping_address {
        active.shipping_address = Set(non_blank(Some(shipping_address)));
    }
    active.updated_at = Set(Utc::now().into());
    let profile = active.update(&state.orm).await?;

    Ok(ApiResponse::ok(
        "Profile updated",
        ProfileResponse {
            username: account.username,
            email: account.email,
            profile: profile_from_entity(profile),
        },
    ))
}

fn profile_from_entity(model: ProfileModel) -> Profile {
    Profile {
        image_url: model.image_url,
        phone_number: model.phone_number,
        additional_phone: model.additional_phone,
        billing_address: model.billing_address,
        shipping_address: model.shipping_address,
    }
}

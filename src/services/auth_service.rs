use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit,
    config::JwtConfig,
    dto::{
        auth::{AuthResponse, Claims, LoginRequest, RegisterRequest},
        non_blank,
    },
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult, on_unique_violation},
    middleware::auth::ROLE_USER,
    response::ApiResponse,
    state::AppState,
};

const DUPLICATE_USERNAME: &str = "Username already exists.";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(e.to_string()))
}

fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::internal("Invalid password hash"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn issue_token(jwt: &JwtConfig, user: &UserModel) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(jwt.ttl_hours))
        .ok_or_else(|| AppError::internal("Failed to set expiration"))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(e.to_string()))
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let username = non_blank(payload.username);
    let password = payload.password.filter(|p| !p.is_empty());
    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::bad_request("Username and password are required."));
    };
    if username.chars().count() > 150 {
        return Err(AppError::bad_request("Username must be at most 150 characters"));
    }
    let email = payload
        .email
        .map(|e| e.trim().to_string())
        .unwrap_or_default();

    let exist = Users::find()
        .filter(UserCol::Username.eq(username.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::bad_request(DUPLICATE_USERNAME));
    }

    let password_hash = hash_password(&password)?;

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(ROLE_USER.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    // Two concurrent registrations can both pass the existence check.
    .map_err(|e| on_unique_violation(e, DUPLICATE_USERNAME))?;

    let token = issue_token(&state.jwt, &user)?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;
    tracing::info!(user_id = %user.id, "user registered");

    Ok(ApiResponse::ok(
        "User registered successfully",
        AuthResponse {
            token,
            username: user.username,
            email: user.email,
        },
    ))
}

async fn find_login_user(state: &AppState, identifier: &str) -> AppResult<Option<UserModel>> {
    if identifier.contains('@') {
        let by_email = Users::find()
            .filter(UserCol::Email.eq(identifier))
            .order_by_asc(UserCol::CreatedAt)
            .one(&state.orm)
            .await?;
        if by_email.is_some() {
            return Ok(by_email);
        }
    }

    let user = Users::find()
        .filter(UserCol::Username.eq(identifier))
        .one(&state.orm)
        .await?;
    Ok(user)
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let identifier = non_blank(payload.username).or_else(|| non_blank(payload.email));
    let (Some(identifier), Some(password)) = (identifier, payload.password) else {
        return Err(AppError::bad_request(INVALID_CREDENTIALS));
    };

    let user = match find_login_user(state, &identifier).await? {
        Some(u) => u,
        None => return Err(AppError::bad_request(INVALID_CREDENTIALS)),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::bad_request(INVALID_CREDENTIALS));
    }

    let token = issue_token(&state.jwt, &user)?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::ok(
        "Logged in",
        AuthResponse {
            token,
            username: user.username,
            email: user.email,
        },
    ))
}

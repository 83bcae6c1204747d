#![allow(dead_code)]

use chrono::Utc;
use mango_store_api::{
    config::JwtConfig,
    db::create_schema,
    dto::{cart::AddToCartRequest, orders::CreateOrderRequest, orders::UpdateOrderRequest},
    entity::{categories::ActiveModel as CategoryActive, users::ActiveModel as UserActive},
    error::AppError,
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_USER},
    services::{cart_service, order_service},
    state::AppState,
};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use uuid::Uuid;

/// Fresh in-memory database per test. A single connection keeps every
/// query on the same SQLite memory database.
pub async fn setup_state() -> anyhow::Result<AppState> {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let orm = Database::connect(opts).await?;
    create_schema(&orm).await?;

    Ok(AppState {
        orm,
        jwt: JwtConfig {
            secret: "test-secret".into(),
            ttl_hours: 1,
        },
    })
}

async fn insert_user(state: &AppState, username: &str, role: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        password_hash: Set("not-a-real-hash".to_string()),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_customer(state: &AppState, username: &str) -> anyhow::Result<AuthUser> {
    insert_user(state, username, ROLE_USER).await
}

pub async fn create_admin(state: &AppState, username: &str) -> anyhow::Result<AuthUser> {
    insert_user(state, username, ROLE_ADMIN).await
}

pub async fn create_category(
    state: &AppState,
    name: &str,
    price: i64,
    stock_quantity: i32,
) -> anyhow::Result<Uuid> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(format!("{name} mangoes")),
        price: Set(price),
        stock_quantity: Set(stock_quantity),
        image: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(category.id)
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    category_id: Uuid,
    quantity: i32,
) -> anyhow::Result<Uuid> {
    let resp = cart_service::add_to_cart(
        state,
        user,
        AddToCartRequest {
            category_id,
            quantity: Some(quantity),
        },
    )
    .await?;
    Ok(resp.data.expect("cart item").id)
}

pub fn shipping_details() -> CreateOrderRequest {
    CreateOrderRequest {
        phone_number: Some("01700000000".into()),
        additional_phone: None,
        billing_address: Some("12 Mango Lane".into()),
        shipping_address: Some("12 Mango Lane".into()),
        payment_method: None,
    }
}

pub async fn checkout(state: &AppState, user: &AuthUser) -> anyhow::Result<Uuid> {
    let resp = order_service::create_order(state, user, shipping_details()).await?;
    Ok(resp.data.expect("created order").order_id)
}

pub async fn set_status(
    state: &AppState,
    admin: &AuthUser,
    order_id: Uuid,
    status: &str,
) -> anyhow::Result<()> {
    order_service::update_order(
        state,
        admin,
        order_id,
        UpdateOrderRequest {
            status: Some(status.to_string()),
        },
    )
    .await?;
    Ok(())
}

pub fn bad_request_message(err: AppError) -> String {
    match err {
        AppError::BadRequest(msg) => msg,
        other => panic!("expected bad request, got {other:?}"),
    }
}

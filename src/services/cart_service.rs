use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        cart::{AddToCartRequest, CartList, UpdateCartItemRequest},
        parse_int,
    },
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
            Model as CartItemModel,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        categories::{Entity as Categories, Model as CategoryModel},
    },
    error::{AppError, AppResult},
    middleware::{
        auth::AuthUser,
        policy::{Action, Resource, authorize},
    },
    models::{CartItem, Category},
    response::{ApiResponse, Meta},
    services::category_service::{category_from_entity, rating_stats},
    state::AppState,
};

const INVALID_QUANTITY: &str = "Quantity must be a positive integer";
const QUANTITY_TOO_LARGE: &str = "Quantity is too large";

/// Returns the user's cart, inserting it first if the user has none.
///
/// Idempotent under retries and concurrent first requests: the insert is
/// `ON CONFLICT (user_id) DO NOTHING` and the row is read back afterwards.
pub async fn get_or_create_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<CartModel> {
    let active = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(Utc::now().into()),
    };
    Carts::insert(active)
        .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;

    find_cart(conn, user_id)
        .await?
        .ok_or_else(|| AppError::internal("cart missing after upsert"))
}

pub async fn find_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Option<CartModel>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?;
    Ok(cart)
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    authorize(Some(user), Resource::Cart, Action::Create, None)?;
    let quantity = payload.quantity.unwrap_or(1);
    if quantity <= 0 {
        return Err(AppError::bad_request(INVALID_QUANTITY));
    }

    let category = Categories::find_by_id(payload.category_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))?;

    let txn = state.orm.begin().await?;
    let cart = get_or_create_cart(&txn, user.user_id).await?;

    let current = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::CategoryId.eq(category.id))
        .one(&txn)
        .await?;
    if current.is_some_and(|c| c.quantity.checked_add(quantity).is_none()) {
        return Err(AppError::bad_request(QUANTITY_TOO_LARGE));
    }

    // Single statement increment keyed on the (cart_id, category_id) unique index,
    // so double submissions cannot create duplicate rows or lose an increment.
    let item = CartItemActive {
        id: Set(Uuid::new_v4()),
        cart_id: Set(cart.id),
        category_id: Set(category.id),
        quantity: Set(quantity),
        created_at: Set(Utc::now().into()),
    };
    let affected = CartItems::insert(item)
        .on_conflict(
            OnConflict::columns([CartItemCol::CartId, CartItemCol::CategoryId])
                .value(
                    CartItemCol::Quantity,
                    Expr::cust("cart_items.quantity + excluded.quantity"),
                )
                .action_and_where(Expr::cust(format!(
                    "cart_items.quantity <= {} - excluded.quantity",
                    i32::MAX
                )))
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;
    if affected == 0 {
        return Err(AppError::bad_request(QUANTITY_TOO_LARGE));
    }

    let item = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::CategoryId.eq(category.id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::internal("cart item missing after upsert"))?;
    let stats = rating_stats(&txn, &[category.id]).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_add",
        "cart_items",
        serde_json::json!({ "category_id": category.id, "quantity": quantity }),
    )
    .await;

    let stats = stats.get(&category.id).copied().unwrap_or_default();
    Ok(ApiResponse::ok(
        "Item added to cart",
        cart_item_from_entity(item, category_from_entity(category, stats)),
    ))
}

/// Lists the caller's cart. A user without a cart simply has no items.
pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    authorize(Some(user), Resource::Cart, Action::List, None)?;
    let cart = match find_cart(&state.orm, user.user_id).await? {
        Some(cart) => cart,
        None => {
            return Ok(ApiResponse::ok(
                "Cart",
                CartList {
                    items: Vec::new(),
                    total_amount: 0,
                },
            )
            .with_meta(Meta::total(0)));
        }
    };

    let rows: Vec<(CartItemModel, Option<CategoryModel>)> = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Categories)
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = rows.iter().map(|(item, _)| item.category_id).collect();
    let stats = rating_stats(&state.orm, &ids).await?;

    let items: Vec<CartItem> = rows
        .into_iter()
        .filter_map(|(item, category)| {
            let category = category?;
            let s = stats.get(&category.id).copied().unwrap_or_default();
            Some(cart_item_from_entity(item, category_from_entity(category, s)))
        })
        .collect();
    let total_amount = items.iter().map(|i| i.subtotal).sum();
    let meta = Meta::total(items.len());

    Ok(ApiResponse::ok("Cart", CartList { items, total_amount }).with_meta(meta))
}

async fn find_own_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<CartItemModel> {
    let cart = find_cart(&state.orm, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))?;

    let item = CartItems::find_by_id(item_id)
        .one(&state.orm)
        .await?
        .filter(|item| item.cart_id == cart.id)
        .ok_or_else(|| AppError::not_found("Cart item not found"))?;

    authorize(Some(user), Resource::Cart, Action::Update, Some(cart.user_id))?;
    Ok(item)
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let item = find_own_item(state, user, item_id).await?;

    let quantity = payload
        .quantity
        .as_ref()
        .and_then(parse_int)
        .filter(|q| *q > 0)
        .and_then(|q| i32::try_from(q).ok())
        .ok_or_else(|| AppError::bad_request(INVALID_QUANTITY))?;

    let category = Categories::find_by_id(item.category_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))?;

    if quantity > category.stock_quantity {
        return Err(AppError::bad_request(format!(
            "Only {} kg available in stock",
            category.stock_quantity
        )));
    }

    let mut active: CartItemActive = item.into();
    active.quantity = Set(quantity);
    let item = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_update",
        "cart_items",
        serde_json::json!({ "cart_item_id": item.id, "quantity": quantity }),
    )
    .await;

    let stats = rating_stats(&state.orm, &[category.id]).await?;
    let stats = stats.get(&category.id).copied().unwrap_or_default();
    Ok(ApiResponse::ok(
        "Cart item updated",
        cart_item_from_entity(item, category_from_entity(category, stats)),
    ))
}

pub async fn delete_cart_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let cart = find_cart(&state.orm, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item not found"))?;
    authorize(Some(user), Resource::Cart, Action::Delete, Some(cart.user_id))?;

    let result = CartItems::delete_many()
        .filter(CartItemCol::Id.eq(item_id))
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Cart item not found"));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::ok("Item removed from cart", serde_json::json!({})))
}

fn cart_item_from_entity(model: CartItemModel, category: Category) -> CartItem {
    let subtotal = category.price * i64::from(model.quantity);
    CartItem {
        id: model.id,
        category,
        quantity: model.quantity,
        subtotal,
    }
}

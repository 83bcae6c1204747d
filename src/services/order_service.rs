use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        non_blank,
        orders::{
            CreateOrderRequest, CreateOrderResponse, DEFAULT_PAYMENT_METHOD, OrderDetailsList,
            OrderList, OrderWithItems, UpdateOrderRequest,
        },
    },
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        categories::{Entity as Categories, Model as CategoryModel},
        feedbacks::{Column as FeedbackCol, Entity as Feedbacks},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        payments::{ActiveModel as PaymentActive, Entity as Payments},
        users::{Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::{
        auth::AuthUser,
        policy::{Action, Resource, authorize},
    },
    models::{Feedback, Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service::find_cart, feedback_service::feedback_from_entity},
    state::AppState,
};

pub const STATUS_PENDING: &str = "Pending";
const MAX_STATUS_LEN: usize = 20;
const MAX_PHONE_LEN: usize = 20;

/// Feedback is only accepted once an order reads "Delivered", in any casing.
pub fn is_delivered(status: &str) -> bool {
    status.trim().eq_ignore_ascii_case("delivered")
}

/// Turns the caller's cart into an order.
///
/// The order, its items (with the category price copied in), the payment
/// record and the cart clearing share one transaction.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CreateOrderResponse>> {
    authorize(Some(user), Resource::Order, Action::Create, None)?;

    let phone_number = non_blank(payload.phone_number);
    let billing_address = non_blank(payload.billing_address);
    let shipping_address = non_blank(payload.shipping_address);
    let (Some(phone_number), Some(billing_address), Some(shipping_address)) =
        (phone_number, billing_address, shipping_address)
    else {
        return Err(AppError::bad_request(
            "Phone number, billing address and shipping address are required",
        ));
    };
    let additional_phone = non_blank(payload.additional_phone);
    let too_long = |phone: &str| phone.chars().count() > MAX_PHONE_LEN;
    if too_long(&phone_number) || additional_phone.as_deref().is_some_and(too_long) {
        return Err(AppError::bad_request(format!(
            "Phone numbers must be at most {MAX_PHONE_LEN} characters"
        )));
    }
    let payment_method =
        non_blank(payload.payment_method).unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

    let txn = state.orm.begin().await?;

    let cart = match find_cart(&txn, user.user_id).await? {
        Some(cart) => cart,
        None => return Err(AppError::bad_request("Cart is empty")),
    };

    let rows: Vec<(_, Option<CategoryModel>)> = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Categories)
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&txn)
        .await?;

    if rows.is_empty() {
        return Err(AppError::bad_request("Cart is empty"));
    }

    let mut lines = Vec::with_capacity(rows.len());
    let mut total_amount: i64 = 0;
    for (item, category) in rows {
        let category = category
            .ok_or_else(|| AppError::internal(format!("cart item {} has no category", item.id)))?;
        let line_total = category
            .price
            .checked_mul(i64::from(item.quantity))
            .ok_or_else(|| AppError::bad_request("Order total is too large"))?;
        total_amount = total_amount
            .checked_add(line_total)
            .ok_or_else(|| AppError::bad_request("Order total is too large"))?;
        lines.push((category.id, item.quantity, category.price));
    }

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(STATUS_PENDING.to_string()),
        billing_address: Set(billing_address),
        shipping_address: Set(shipping_address),
        phone_number: Set(phone_number),
        additional_phone: Set(additional_phone),
        payment_method: Set(payment_method.clone()),
        order_date: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let items = lines
        .into_iter()
        .map(|(category_id, quantity, price)| OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            category_id: Set(category_id),
            quantity: Set(quantity),
            price: Set(price),
            created_at: Set(now.into()),
        });
    OrderItems::insert_many(items)
        .exec_without_returning(&txn)
        .await?;

    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        payment_method: Set(payment_method),
        payment_status: Set(STATUS_PENDING.to_string()),
        payment_date: Set(now.into()),
        updated_at: Set(now.into()),
    };
    Payments::insert(payment).exec_without_returning(&txn).await?;

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": total_amount }),
    )
    .await;
    tracing::info!(order_id = %order.id, total_amount, "order created");

    Ok(ApiResponse::ok(
        "Order created successfully",
        CreateOrderResponse {
            order_id: order.id,
            total_amount,
        },
    ))
}

async fn own_orders(state: &AppState, user: &AuthUser) -> AppResult<Vec<(OrderModel, Option<UserModel>)>> {
    let rows = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::OrderDate)
        .find_also_related(Users)
        .all(&state.orm)
        .await?;
    Ok(rows)
}

pub async fn list_user_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    authorize(Some(user), Resource::Order, Action::List, None)?;
    let items: Vec<Order> = own_orders(state, user)
        .await?
        .into_iter()
        .map(|(order, owner)| order_from_entity(order, owner.as_ref()))
        .collect();
    let meta = Meta::total(items.len());
    Ok(ApiResponse::ok("Orders", OrderList { items }).with_meta(meta))
}

pub async fn list_user_orders_with_items(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderDetailsList>> {
    authorize(Some(user), Resource::Order, Action::List, None)?;
    let orders = own_orders(state, user).await?;
    let items = attach_items(&state.orm, orders).await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::ok("Orders", OrderDetailsList { items }).with_meta(meta))
}

/// Owner or staff only. Anyone else gets the same 404 as a missing order.
pub async fn get_order_details(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let row = Orders::find_by_id(id)
        .find_also_related(Users)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    authorize(Some(user), Resource::Order, Action::Retrieve, Some(row.0.user_id))
        .map_err(|_| AppError::not_found("Order not found"))?;

    let mut details = attach_items(&state.orm, vec![row]).await?;
    let order = details
        .pop()
        .ok_or_else(|| AppError::internal("order vanished while loading items"))?;
    Ok(ApiResponse::ok("Order", order))
}

pub async fn list_all_orders_with_details(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderDetailsList>> {
    authorize(Some(user), Resource::Order, Action::ListAll, None)?;
    let orders = Orders::find()
        .order_by_desc(OrderCol::OrderDate)
        .find_also_related(Users)
        .all(&state.orm)
        .await?;
    let items = attach_items(&state.orm, orders).await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::ok("Orders", OrderDetailsList { items }).with_meta(meta))
}

/// Generic order listing: customers see their own orders, staff see all.
pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    authorize(Some(user), Resource::Order, Action::List, None)?;
    let mut condition = Condition::all();
    if !user.is_staff() {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::OrderDate),
        SortOrder::Desc => finder.order_by_desc(OrderCol::OrderDate),
    };

    let items: Vec<Order> = finder
        .find_also_related(Users)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(order, owner)| order_from_entity(order, owner.as_ref()))
        .collect();
    let meta = Meta::total(items.len());
    Ok(ApiResponse::ok("Orders", OrderList { items }).with_meta(meta))
}

/// Status is free text; any value is accepted from staff, including moving
/// an order back from "Delivered".
pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    authorize(Some(user), Resource::Order, Action::Update, None)?;
    let status = non_blank(payload.status)
        .ok_or_else(|| AppError::bad_request("Status is required"))?;
    if status.chars().count() > MAX_STATUS_LEN {
        return Err(AppError::bad_request(format!(
            "Status must be at most {MAX_STATUS_LEN} characters"
        )));
    }

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    let mut active: OrderActive = existing.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    let owner = Users::find_by_id(order.user_id).one(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.status }),
    )
    .await;

    Ok(ApiResponse::ok(
        "Order updated",
        order_from_entity(order, owner.as_ref()),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    authorize(Some(user), Resource::Order, Action::Delete, None)?;
    let result = Orders::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Order not found"));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_delete",
        "orders",
        serde_json::json!({ "order_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Order deleted", serde_json::json!({})))
}

/// Loads items, their categories and feedback for a batch of orders in
/// three queries regardless of how many orders there are.
async fn attach_items<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<(OrderModel, Option<UserModel>)>,
) -> AppResult<Vec<OrderWithItems>> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let order_ids: Vec<Uuid> = orders.iter().map(|(o, _)| o.id).collect();

    let rows: Vec<(OrderItemModel, Option<CategoryModel>)> = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .find_also_related(Categories)
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?;

    let item_ids: Vec<Uuid> = rows.iter().map(|(item, _)| item.id).collect();
    let mut feedbacks: HashMap<Uuid, Feedback> = HashMap::new();
    if !item_ids.is_empty() {
        for fb in Feedbacks::find()
            .filter(FeedbackCol::OrderItemId.is_in(item_ids))
            .all(conn)
            .await?
        {
            feedbacks.insert(fb.order_item_id, feedback_from_entity(fb));
        }
    }

    let delivered: HashMap<Uuid, bool> = orders
        .iter()
        .map(|(o, _)| (o.id, is_delivered(&o.status)))
        .collect();

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for (item, category) in rows {
        let can_give_feedback = delivered.get(&item.order_id).copied().unwrap_or(false);
        let feedback = feedbacks.remove(&item.id);
        by_order
            .entry(item.order_id)
            .or_default()
            .push(order_item_from_entity(item, category, can_give_feedback, feedback));
    }

    Ok(orders
        .into_iter()
        .map(|(order, owner)| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems {
                order: order_from_entity(order, owner.as_ref()),
                items,
            }
        })
        .collect())
}

pub fn order_from_entity(model: OrderModel, owner: Option<&UserModel>) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        user_name: owner.map(|u| u.username.clone()).unwrap_or_default(),
        user_email: owner.map(|u| u.email.clone()).unwrap_or_default(),
        total_amount: model.total_amount,
        status: model.status,
        order_date: model.order_date.with_timezone(&Utc),
        billing_address: model.billing_address,
        shipping_address: model.shipping_address,
        phone_number: model.phone_number,
        additional_phone: model.additional_phone,
        payment_method: model.payment_method,
    }
}

fn order_item_from_entity(
    model: OrderItemModel,
    category: Option<CategoryModel>,
    can_give_feedback: bool,
    feedback: Option<Feedback>,
) -> OrderItem {
    let (mango_name, mango_image, description) = match category {
        Some(c) => (c.name, c.image, c.description),
        None => (String::new(), None, String::new()),
    };
    OrderItem {
        id: model.id,
        category_id: model.category_id,
        mango_name,
        mango_image,
        description,
        quantity: model.quantity,
        price: model.price,
        subtotal: model.price * i64::from(model.quantity),
        can_give_feedback,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_check_ignores_case_and_padding() {
        assert!(is_delivered("Delivered"));
        assert!(is_delivered("delivered"));
        assert!(is_delivered(" DELIVERED "));
        for status in ["Pending", "pending", "shipped", "Cancelled", "in_transit", ""] {
            assert!(!is_delivered(status), "{status} should not count as delivered");
        }
    }
}

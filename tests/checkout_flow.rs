mod common;

use mango_store_api::{
    entity::{OrderItems, Orders},
    dto::{
        categories::UpdateCategoryRequest,
        orders::{CreateOrderRequest, UpdateOrderRequest},
    },
    error::AppError,
    routes::params::OrderListQuery,
    services::{cart_service, category_service, order_service, payment_service},
};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};

// add 2 + 3 of a 100 priced category, checkout, then change the price.
#[tokio::test]
async fn checkout_snapshots_prices_and_clears_cart() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;
    let user = common::create_customer(&state, "alice").await?;
    let category_id = common::create_category(&state, "Himsagar", 100, 50).await?;

    common::add_to_cart(&state, &user, category_id, 2).await?;
    common::add_to_cart(&state, &user, category_id, 3).await?;

    let created = order_service::create_order(&state, &user, common::shipping_details()).await?;
    assert_eq!(created.message, "Order created successfully");
    let created = created.data.expect("order");
    assert_eq!(created.total_amount, 500);

    let cart = cart_service::list_cart(&state, &user).await?.data.expect("cart");
    assert!(cart.items.is_empty());

    category_service::update_category(
        &state,
        &admin,
        category_id,
        UpdateCategoryRequest {
            price: Some(250),
            ..Default::default()
        },
    )
    .await?;

    let details = order_service::get_order_details(&state, &user, created.order_id)
        .await?
        .data
        .expect("details");
    assert_eq!(details.order.total_amount, 500);
    assert_eq!(details.order.status, "Pending");
    assert_eq!(details.order.payment_method, "cash_on_delivery");
    assert_eq!(details.order.user_name, "alice");
    assert_eq!(details.items.len(), 1);
    let item = &details.items[0];
    assert_eq!((item.price, item.quantity, item.subtotal), (100, 5, 500));
    assert_eq!(item.mango_name, "Himsagar");
    assert!(!item.can_give_feedback);
    assert!(item.feedback.is_none());

    // Checkout records a pending payment alongside the order.
    let payments = payment_service::list_payments(&state, &admin)
        .await?
        .data
        .expect("payments");
    assert_eq!(payments.items.len(), 1);
    assert_eq!(payments.items[0].order_id, created.order_id);
    assert_eq!(payments.items[0].payment_status, "Pending");
    assert_eq!(payments.items[0].amount, Some(500));
    Ok(())
}

#[tokio::test]
async fn checkout_requires_shipping_details_and_items() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::create_customer(&state, "alice").await?;
    let category_id = common::create_category(&state, "Langra", 80, 50).await?;

    let err = order_service::create_order(&state, &user, common::shipping_details())
        .await
        .unwrap_err();
    assert_eq!(common::bad_request_message(err), "Cart is empty");

    common::add_to_cart(&state, &user, category_id, 1).await?;
    let err = order_service::create_order(
        &state,
        &user,
        CreateOrderRequest {
            shipping_address: Some("  ".into()),
            ..common::shipping_details()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(
        common::bad_request_message(err),
        "Phone number, billing address and shipping address are required"
    );

    // The rejected checkout leaves the cart alone.
    let cart = cart_service::list_cart(&state, &user).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);

    common::checkout(&state, &user).await?;
    let err = order_service::create_order(&state, &user, common::shipping_details())
        .await
        .unwrap_err();
    assert_eq!(common::bad_request_message(err), "Cart is empty");
    Ok(())
}

#[tokio::test]
async fn orders_are_visible_to_owner_and_staff_only() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;
    let alice = common::create_customer(&state, "alice").await?;
    let bob = common::create_customer(&state, "bob").await?;
    let category_id = common::create_category(&state, "Fazli", 60, 50).await?;

    common::add_to_cart(&state, &alice, category_id, 2).await?;
    let alice_order = common::checkout(&state, &alice).await?;
    common::add_to_cart(&state, &bob, category_id, 1).await?;
    common::checkout(&state, &bob).await?;

    let err = order_service::get_order_details(&state, &bob, alice_order)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Order not found"));
    order_service::get_order_details(&state, &admin, alice_order).await?;

    let own = order_service::list_user_orders(&state, &alice)
        .await?
        .data
        .expect("orders");
    assert_eq!(own.items.len(), 1);
    assert_eq!(own.items[0].id, alice_order);

    let with_items = order_service::list_user_orders_with_items(&state, &alice)
        .await?
        .data
        .expect("orders");
    assert_eq!(with_items.items.len(), 1);
    assert_eq!(with_items.items[0].items[0].quantity, 2);

    let err = order_service::list_all_orders_with_details(&state, &alice)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let all = order_service::list_all_orders_with_details(&state, &admin)
        .await?
        .data
        .expect("orders");
    assert_eq!(all.items.len(), 2);

    let generic = order_service::list_orders(&state, &alice, OrderListQuery::default())
        .await?
        .data
        .expect("orders");
    assert_eq!(generic.items.len(), 1);
    let generic = order_service::list_orders(&state, &admin, OrderListQuery::default())
        .await?
        .data
        .expect("orders");
    assert_eq!(generic.items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn staff_update_and_delete_orders() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;
    let user = common::create_customer(&state, "alice").await?;
    let category_id = common::create_category(&state, "Alphonso", 120, 50).await?;
    common::add_to_cart(&state, &user, category_id, 1).await?;
    let order_id = common::checkout(&state, &user).await?;

    let err = order_service::update_order(
        &state,
        &user,
        order_id,
        UpdateOrderRequest {
            status: Some("Delivered".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = order_service::update_order(
        &state,
        &admin,
        order_id,
        UpdateOrderRequest {
            status: Some("x".repeat(21)),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    common::set_status(&state, &admin, order_id, "Shipped").await?;
    let shipped = order_service::list_orders(
        &state,
        &admin,
        OrderListQuery {
            status: Some("Shipped".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("orders");
    assert_eq!(shipped.items.len(), 1);

    let err = order_service::delete_order(&state, &user, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    order_service::delete_order(&state, &admin, order_id).await?;
    let err = order_service::get_order_details(&state, &admin, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

// Payment insert is the last write before the cart is cleared; losing its
// table makes checkout fail after the order and items were written.
#[tokio::test]
async fn failed_checkout_rolls_back_everything() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let user = common::create_customer(&state, "alice").await?;
    let category_id = common::create_category(&state, "Langra", 80, 50).await?;
    common::add_to_cart(&state, &user, category_id, 3).await?;

    state.orm.execute_unprepared("DROP TABLE payments").await?;

    let err = order_service::create_order(&state, &user, common::shipping_details())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OrmError(_)));

    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    assert_eq!(OrderItems::find().count(&state.orm).await?, 0);
    let cart = cart_service::list_cart(&state, &user).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    Ok(())
}

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        non_blank,
        payments::{CreatePaymentRequest, PaymentList, UpdatePaymentRequest},
    },
    entity::{
        orders::Entity as Orders,
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
    },
    error::{AppError, AppResult, on_unique_violation},
    middleware::{
        auth::AuthUser,
        policy::{Action, Resource, authorize},
    },
    models::Payment,
    response::{ApiResponse, Meta},
    services::order_service::STATUS_PENDING,
    state::AppState,
};

const PAYMENT_EXISTS: &str = "Payment already exists for this order";

/// Records a payment for one of the caller's own orders.
pub async fn create_payment(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    let order = Orders::find_by_id(payload.order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;
    authorize(Some(user), Resource::Payment, Action::Create, Some(order.user_id))
        .map_err(|_| AppError::not_found("Order not found"))?;

    let existing = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::bad_request(PAYMENT_EXISTS));
    }

    let method = non_blank(payload.payment_method).unwrap_or_else(|| order.payment_method.clone());
    let now = Utc::now();
    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        payment_method: Set(method),
        payment_status: Set(STATUS_PENDING.to_string()),
        payment_date: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await
    .map_err(|e| on_unique_violation(e, PAYMENT_EXISTS))?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "payment_create",
        "payments",
        serde_json::json!({ "payment_id": payment.id, "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::ok(
        "Payment recorded",
        payment_from_entity(payment, Some(order.total_amount)),
    ))
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PaymentList>> {
    authorize(Some(user), Resource::Payment, Action::List, None)?;
    let items: Vec<Payment> = Payments::find()
        .order_by_desc(PaymentCol::PaymentDate)
        .find_also_related(Orders)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(payment, order)| payment_from_entity(payment, order.map(|o| o.total_amount)))
        .collect();
    let meta = Meta::total(items.len());
    Ok(ApiResponse::ok("Payments", PaymentList { items }).with_meta(meta))
}

pub async fn get_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    authorize(Some(user), Resource::Payment, Action::Retrieve, None)?;
    let (payment, order) = Payments::find_by_id(id)
        .find_also_related(Orders)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Payment not found"))?;
    Ok(ApiResponse::ok(
        "Payment",
        payment_from_entity(payment, order.map(|o| o.total_amount)),
    ))
}

pub async fn update_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    authorize(Some(user), Resource::Payment, Action::Update, None)?;
    let existing = Payments::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Payment not found"))?;

    let mut active: PaymentActive = existing.into();
    if let Some(status) = payload.payment_status {
        let status = non_blank(Some(status))
            .ok_or_else(|| AppError::bad_request("Payment status must not be empty"))?;
        if status.chars().count() > 20 {
            return Err(AppError::bad_request(
                "Payment status must be at most 20 characters",
            ));
        }
        active.payment_status = Set(status);
    }
    if let Some(method) = payload.payment_method {
        let method = non_blank(Some(method))
            .ok_or_else(|| AppError::bad_request("Payment method must not be empty"))?;
        if method.chars().count() > 50 {
            return Err(AppError::bad_request(
                "Payment method must be at most 50 characters",
            ));
        }
        active.payment_method = Set(method);
    }
    active.updated_at = Set(Utc::now().into());
    let payment = active.update(&state.orm).await?;

    let order = Orders::find_by_id(payment.order_id).one(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "payment_update",
        "payments",
        serde_json::json!({ "payment_id": payment.id, "status": payment.payment_status }),
    )
    .await;

    Ok(ApiResponse::ok(
        "Payment updated",
        payment_from_entity(payment, order.map(|o| o.total_amount)),
    ))
}

pub async fn delete_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    authorize(Some(user), Resource::Payment, Action::Delete, None)?;
    let result = Payments::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Payment not found"));
    }

    audit::record(
        &state.orm,
        Some(user.user_id),
        "payment_delete",
        "payments",
        serde_json::json!({ "payment_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Payment deleted", serde_json::json!({})))
}

fn payment_from_entity(model: PaymentModel, amount: Option<i64>) -> Payment {
    Payment {
        id: model.id,
        order_id: model.order_id,
        payment_method: model.payment_method,
        payment_status: model.payment_status,
        payment_date: model.payment_date.with_timezone(&Utc),
        amount,
    }
}

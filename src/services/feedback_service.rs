use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        feedback::{
            AdminFeedbackEntry, AdminFeedbackList, CategoryFeedbacks, ReviewEntry,
            SubmitFeedbackRequest,
        },
        parse_int,
    },
    entity::{
        categories::{Column as CategoryCol, Entity as Categories},
        feedbacks::{
            ActiveModel as FeedbackActive, Column as FeedbackCol, Entity as Feedbacks,
            Model as FeedbackModel,
        },
        order_items::{Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{Entity as Orders, Model as OrderModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::{
        auth::AuthUser,
        policy::{Action, Resource, authorize},
    },
    models::Feedback,
    response::{ApiResponse, Meta},
    services::{category_service::RatingStats, order_service::is_delivered},
    state::AppState,
};

async fn load_order_item(
    state: &AppState,
    order_item_id: Uuid,
) -> AppResult<(OrderItemModel, OrderModel)> {
    let (item, order) = OrderItems::find_by_id(order_item_id)
        .find_also_related(Orders)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order item not found"))?;
    let order = order.ok_or_else(|| AppError::not_found("Order item not found"))?;
    Ok((item, order))
}

/// Creates or replaces the caller's rating for one delivered order item.
pub async fn submit_feedback(
    state: &AppState,
    user: &AuthUser,
    order_item_id: Uuid,
    payload: SubmitFeedbackRequest,
) -> AppResult<ApiResponse<Feedback>> {
    let (item, order) = load_order_item(state, order_item_id).await?;

    authorize(Some(user), Resource::Feedback, Action::Create, Some(order.user_id)).map_err(
        |_| AppError::Forbidden("You can only give feedback on your own orders".into()),
    )?;

    if !is_delivered(&order.status) {
        return Err(AppError::bad_request(
            "Feedback can only be submitted for delivered orders",
        ));
    }

    let rating = payload
        .rating
        .as_ref()
        .and_then(parse_int)
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::bad_request("Rating must be between 1 and 5"))?
        as i32;
    let comment = payload
        .comment
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    let existing = Feedbacks::find()
        .filter(FeedbackCol::OrderItemId.eq(item.id))
        .filter(FeedbackCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;

    let now = Utc::now();
    let active = FeedbackActive {
        id: Set(Uuid::new_v4()),
        order_item_id: Set(item.id),
        user_id: Set(user.user_id),
        category_id: Set(item.category_id),
        rating: Set(rating),
        comment: Set(comment),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    // The order item's unique index turns a second submission into an in-place update.
    Feedbacks::insert(active)
        .on_conflict(
            OnConflict::column(FeedbackCol::OrderItemId)
                .update_columns([
                    FeedbackCol::Rating,
                    FeedbackCol::Comment,
                    FeedbackCol::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&state.orm)
        .await?;

    let feedback = Feedbacks::find()
        .filter(FeedbackCol::OrderItemId.eq(item.id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::internal("feedback missing after upsert"))?;

    let (message, action) = if existing.is_some() {
        ("Feedback updated successfully", "feedback_update")
    } else {
        ("Feedback submitted successfully", "feedback_create")
    };

    audit::record(
        &state.orm,
        Some(user.user_id),
        action,
        "feedbacks",
        serde_json::json!({ "order_item_id": item.id, "rating": rating }),
    )
    .await;

    Ok(ApiResponse::ok(message, feedback_from_entity(feedback)))
}

pub async fn get_feedback(
    state: &AppState,
    user: &AuthUser,
    order_item_id: Uuid,
) -> AppResult<ApiResponse<Feedback>> {
    let (item, order) = load_order_item(state, order_item_id).await?;
    authorize(Some(user), Resource::Feedback, Action::Retrieve, Some(order.user_id))?;

    let feedback = Feedbacks::find()
        .filter(FeedbackCol::OrderItemId.eq(item.id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("No feedback found for this item"))?;

    Ok(ApiResponse::ok("Feedback", feedback_from_entity(feedback)))
}

/// Public reviews for one category, newest first, with the rating roll-up.
pub async fn list_category_feedbacks(
    state: &AppState,
    category_id: Uuid,
) -> AppResult<ApiResponse<CategoryFeedbacks>> {
    authorize(None, Resource::Feedback, Action::List, None)?;
    let category = Categories::find_by_id(category_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))?;

    let rows = Feedbacks::find()
        .filter(FeedbackCol::CategoryId.eq(category.id))
        .order_by_desc(FeedbackCol::CreatedAt)
        .find_also_related(Users)
        .all(&state.orm)
        .await?;

    let sum: i64 = rows.iter().map(|(fb, _)| i64::from(fb.rating)).sum();
    let stats = RatingStats::from_totals(sum, rows.len() as i64);

    let feedbacks: Vec<ReviewEntry> = rows
        .into_iter()
        .map(|(fb, author)| ReviewEntry {
            feedback: feedback_from_entity(fb),
            username: author.map(|u| u.username).unwrap_or_default(),
        })
        .collect();
    let meta = Meta::total(feedbacks.len());

    Ok(ApiResponse::ok(
        "Feedbacks",
        CategoryFeedbacks {
            category_id: category.id,
            category_name: category.name,
            average_rating: stats.average,
            total_ratings: stats.count,
            feedbacks,
        },
    )
    .with_meta(meta))
}

pub async fn list_all_feedbacks(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AdminFeedbackList>> {
    authorize(Some(user), Resource::Feedback, Action::ListAll, None)?;

    let rows = Feedbacks::find()
        .order_by_desc(FeedbackCol::CreatedAt)
        .find_also_related(Users)
        .all(&state.orm)
        .await?;

    let category_ids: Vec<Uuid> = rows.iter().map(|(fb, _)| fb.category_id).collect();
    let item_ids: Vec<Uuid> = rows.iter().map(|(fb, _)| fb.order_item_id).collect();

    let mut category_names: HashMap<Uuid, String> = HashMap::new();
    let mut item_orders: HashMap<Uuid, Uuid> = HashMap::new();
    if !rows.is_empty() {
        category_names = Categories::find()
            .filter(CategoryCol::Id.is_in(category_ids))
            .all(&state.orm)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        item_orders = OrderItems::find()
            .filter(OrderItemCol::Id.is_in(item_ids))
            .all(&state.orm)
            .await?
            .into_iter()
            .map(|i| (i.id, i.order_id))
            .collect();
    }

    let items: Vec<AdminFeedbackEntry> = rows
        .into_iter()
        .map(|(fb, author)| AdminFeedbackEntry {
            username: author.map(|u| u.username).unwrap_or_default(),
            category_name: category_names.get(&fb.category_id).cloned().unwrap_or_default(),
            order_id: item_orders.get(&fb.order_item_id).copied().unwrap_or_default(),
            feedback: feedback_from_entity(fb),
        })
        .collect();
    let meta = Meta::total(items.len());

    Ok(ApiResponse::ok("Feedbacks", AdminFeedbackList { items }).with_meta(meta))
}

pub fn feedback_from_entity(model: FeedbackModel) -> Feedback {
    Feedback {
        id: model.id,
        order_item_id: model.order_item_id,
        user_id: model.user_id,
        category_id: model.category_id,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

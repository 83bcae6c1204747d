use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
    entity::{
        categories::{ActiveModel, Column, Entity as Categories, Model as CategoryModel},
        feedbacks::{Column as FeedbackCol, Entity as Feedbacks},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
    },
    error::{AppError, AppResult, on_foreign_key_violation},
    middleware::{
        auth::AuthUser,
        policy::{Action, Resource, authorize},
    },
    models::Category,
    response::{ApiResponse, Meta},
    routes::params::{CategoryQuery, CategorySortBy, SortOrder},
    state::AppState,
};

const CATEGORY_IN_USE: &str = "Category is referenced by existing orders";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingStats {
    pub average: f64,
    pub count: i64,
}

impl RatingStats {
    pub fn from_totals(sum: i64, count: i64) -> Self {
        Self {
            average: round_rating(sum, count),
            count,
        }
    }
}

/// Mean rating rounded to one decimal, 0 when there are no ratings.
pub fn round_rating(sum: i64, count: i64) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    let mean = sum as f64 / count as f64;
    (mean * 10.0).round() / 10.0
}

/// Rating roll-up for the given categories in a single grouped query.
/// Categories without feedback are absent from the map.
pub async fn rating_stats<C: ConnectionTrait>(
    conn: &C,
    category_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, RatingStats>> {
    if category_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, i64, i64)> = Feedbacks::find()
        .select_only()
        .column(FeedbackCol::CategoryId)
        .column_as(Expr::col(FeedbackCol::Rating).sum(), "rating_sum")
        .column_as(Expr::col(FeedbackCol::Id).count(), "rating_count")
        .filter(FeedbackCol::CategoryId.is_in(category_ids.iter().copied()))
        .group_by(FeedbackCol::CategoryId)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id, sum, count)| (id, RatingStats::from_totals(sum, count)))
        .collect())
}

pub async fn category_stats<C: ConnectionTrait>(
    conn: &C,
    category_id: Uuid,
) -> AppResult<RatingStats> {
    let stats = rating_stats(conn, &[category_id]).await?;
    Ok(stats.get(&category_id).copied().unwrap_or_default())
}

/// Builds catalog entries for a batch of category rows.
pub async fn with_ratings<C: ConnectionTrait>(
    conn: &C,
    models: Vec<CategoryModel>,
) -> AppResult<Vec<Category>> {
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let stats = rating_stats(conn, &ids).await?;
    Ok(models
        .into_iter()
        .map(|m| {
            let s = stats.get(&m.id).copied().unwrap_or_default();
            category_from_entity(m, s)
        })
        .collect())
}

pub async fn list_categories(
    state: &AppState,
    query: CategoryQuery,
) -> AppResult<ApiResponse<CategoryList>> {
    authorize(None, Resource::Category, Action::List, None)?;
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        condition = condition.add(
            Condition::any()
                .add(Column::Name.contains(search))
                .add(Column::Description.contains(search)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or(CategorySortBy::CreatedAt) {
        CategorySortBy::CreatedAt => Column::CreatedAt,
        CategorySortBy::Price => Column::Price,
        CategorySortBy::Name => Column::Name,
    };

    let mut finder = Categories::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_ratings(&state.orm, models).await?;

    Ok(ApiResponse::ok("Categories", CategoryList { items })
        .with_meta(Meta::paged(page, limit, total)))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Category>> {
    authorize(None, Resource::Category, Action::Retrieve, None)?;
    let model = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))?;
    let stats = category_stats(&state.orm, id).await?;
    Ok(ApiResponse::ok("Category", category_from_entity(model, stats)))
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::bad_request("Price must not be negative"));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::bad_request("Stock quantity must not be negative"));
    }
    Ok(())
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    if name.chars().count() > 100 {
        return Err(AppError::bad_request("Name must be at most 100 characters"));
    }
    Ok(name.to_string())
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    authorize(Some(user), Resource::Category, Action::Create, None)?;
    let name = validate_name(&payload.name)?;
    validate_price(payload.price)?;
    validate_stock(payload.stock_quantity)?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description.unwrap_or_default()),
        price: Set(payload.price),
        stock_quantity: Set(payload.stock_quantity),
        image: Set(payload.image),
        created_at: Set(Utc::now().into()),
    };
    let category = active.insert(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::ok(
        "Category created",
        category_from_entity(category, RatingStats::default()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    authorize(Some(user), Resource::Category, Action::Update, None)?;
    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(validate_name(&name)?);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock_quantity {
        validate_stock(stock)?;
        active.stock_quantity = Set(stock);
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }

    let category = active.update(&state.orm).await?;
    let stats = category_stats(&state.orm, category.id).await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_update",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::ok(
        "Category updated",
        category_from_entity(category, stats),
    ))
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    authorize(Some(user), Resource::Category, Action::Delete, None)?;

    let txn = state.orm.begin().await?;
    let referenced = OrderItems::find()
        .filter(OrderItemCol::CategoryId.eq(id))
        .count(&txn)
        .await?;
    if referenced > 0 {
        return Err(AppError::bad_request(CATEGORY_IN_USE));
    }

    // The FK mapping still covers an order placed between the count and the delete.
    let result = Categories::delete_by_id(id)
        .exec(&txn)
        .await
        .map_err(|e| on_foreign_key_violation(e, CATEGORY_IN_USE))?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Category not found"));
    }
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;

    Ok(ApiResponse::ok("Category deleted", serde_json::json!({})))
}

pub fn category_from_entity(model: CategoryModel, stats: RatingStats) -> Category {
    Category {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock_quantity: model.stock_quantity,
        image: model.image,
        created_at: model.created_at.with_timezone(&Utc),
        average_rating: stats.average,
        total_ratings: stats.count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_rating_handles_empty_and_rounds_to_one_decimal() {
        assert_eq!(round_rating(0, 0), 0.0);
        assert_eq!(round_rating(4, 1), 4.0);
        // 13 / 3 = 4.333...
        assert_eq!(round_rating(13, 3), 4.3);
        // 14 / 3 = 4.666...
        assert_eq!(round_rating(14, 3), 4.7);
    }

    #[test]
    fn validation_rejects_negative_values_and_blank_names() {
        assert!(validate_price(-1).is_err());
        assert!(validate_price(0).is_ok());
        assert!(validate_stock(-5).is_err());
        assert!(validate_name("   ").is_err());
        assert_eq!(validate_name(" Himsagar ").unwrap(), "Himsagar");
    }
}

mod common;

use mango_store_api::{
    dto::categories::{CreateCategoryRequest, UpdateCategoryRequest},
    error::AppError,
    routes::params::{CategoryQuery, CategorySortBy, SortOrder},
    services::category_service,
};
use uuid::Uuid;

fn new_category(name: &str, price: i64) -> CreateCategoryRequest {
    CreateCategoryRequest {
        name: name.into(),
        description: Some(format!("{name} from Rajshahi")),
        price,
        stock_quantity: 50,
        image: None,
    }
}

#[tokio::test]
async fn staff_manage_categories_and_customers_cannot() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;
    let customer = common::create_customer(&state, "dave").await?;

    let err = category_service::create_category(&state, &customer, new_category("Langra", 700))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let created = category_service::create_category(&state, &admin, new_category("Langra", 700))
        .await?
        .data
        .expect("category");
    assert_eq!(created.price, 700);
    assert_eq!(created.average_rating, 0.0);
    assert_eq!(created.total_ratings, 0);

    let updated = category_service::update_category(
        &state,
        &admin,
        created.id,
        UpdateCategoryRequest {
            price: Some(800),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("category");
    assert_eq!(updated.price, 800);
    assert_eq!(updated.name, "Langra");

    let err = category_service::update_category(
        &state,
        &admin,
        created.id,
        UpdateCategoryRequest {
            price: Some(-1),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    category_service::delete_category(&state, &admin, created.id).await?;
    let err = category_service::get_category(&state, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Category not found"));
    Ok(())
}

#[tokio::test]
async fn unknown_category_is_not_found() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;

    let err = category_service::get_category(&state, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = category_service::delete_category(&state, &admin, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn listing_filters_sorts_and_paginates() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    common::create_category(&state, "Alphonso", 1200, 10).await?;
    common::create_category(&state, "Himsagar", 900, 10).await?;
    common::create_category(&state, "Fazli", 600, 10).await?;

    let by_price = category_service::list_categories(
        &state,
        CategoryQuery {
            sort_by: Some(CategorySortBy::Price),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await?;
    let meta = by_price.meta.clone().expect("meta");
    assert_eq!(meta.total, 3);
    let prices: Vec<i64> = by_price
        .data
        .expect("categories")
        .items
        .iter()
        .map(|c| c.price)
        .collect();
    assert_eq!(prices, vec![600, 900, 1200]);

    let page = category_service::list_categories(
        &state,
        CategoryQuery {
            page: Some(2),
            per_page: Some(2),
            sort_by: Some(CategorySortBy::Name),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        },
    )
    .await?;
    let meta = page.meta.clone().expect("meta");
    assert_eq!((meta.page, meta.per_page, meta.total), (Some(2), Some(2), 3));
    let names: Vec<String> = page
        .data
        .expect("categories")
        .items
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Himsagar".to_string()]);

    let cheap = category_service::list_categories(
        &state,
        CategoryQuery {
            max_price: Some(900),
            q: Some("sagar".into()),
            ..Default::default()
        },
    )
    .await?;
    let items = cheap.data.expect("categories").items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Himsagar");
    Ok(())
}

#[tokio::test]
async fn category_with_orders_cannot_be_deleted() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;
    let customer = common::create_customer(&state, "erin").await?;
    let category_id = common::create_category(&state, "Fazli", 600, 20).await?;

    common::add_to_cart(&state, &customer, category_id, 1).await?;
    common::checkout(&state, &customer).await?;

    let err = category_service::delete_category(&state, &admin, category_id)
        .await
        .unwrap_err();
    assert_eq!(
        common::bad_request_message(err),
        "Category is referenced by existing orders"
    );
    let kept = category_service::get_category(&state, category_id).await?;
    assert_eq!(kept.data.expect("category").id, category_id);
    Ok(())
}

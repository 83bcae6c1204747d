mod common;

use mango_store_api::{
    dto::feedback::SubmitFeedbackRequest,
    error::AppError,
    services::{category_service, feedback_service, order_service},
    state::AppState,
};
use serde_json::json;
use uuid::Uuid;

fn rating(value: serde_json::Value, comment: &str) -> SubmitFeedbackRequest {
    SubmitFeedbackRequest {
        rating: Some(value),
        comment: Some(comment.into()),
    }
}

async fn first_item_id(
    state: &AppState,
    user: &mango_store_api::middleware::auth::AuthUser,
    order_id: Uuid,
) -> anyhow::Result<Uuid> {
    let details = order_service::get_order_details(state, user, order_id)
        .await?
        .data
        .expect("details");
    Ok(details.items[0].id)
}

#[tokio::test]
async fn feedback_requires_delivered_order() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;
    let user = common::create_customer(&state, "alice").await?;
    let category_id = common::create_category(&state, "Himsagar", 100, 50).await?;
    common::add_to_cart(&state, &user, category_id, 1).await?;
    let order_id = common::checkout(&state, &user).await?;
    let item_id = first_item_id(&state, &user, order_id).await?;

    for status in ["pending", "shipped", "cancelled"] {
        common::set_status(&state, &admin, order_id, status).await?;
        let err = feedback_service::submit_feedback(&state, &user, item_id, rating(json!(4), ""))
            .await
            .unwrap_err();
        assert_eq!(
            common::bad_request_message(err),
            "Feedback can only be submitted for delivered orders"
        );
    }

    common::set_status(&state, &admin, order_id, "DELIVERED").await?;
    for bad in [json!(6), json!(0), json!("five")] {
        let err = feedback_service::submit_feedback(&state, &user, item_id, rating(bad, ""))
            .await
            .unwrap_err();
        assert_eq!(
            common::bad_request_message(err),
            "Rating must be between 1 and 5"
        );
    }

    let resp =
        feedback_service::submit_feedback(&state, &user, item_id, rating(json!("4"), " sweet "))
            .await?;
    assert_eq!(resp.message, "Feedback submitted successfully");
    let feedback = resp.data.expect("feedback");
    assert_eq!(feedback.rating, 4);
    assert_eq!(feedback.comment, "sweet");
    assert_eq!(feedback.category_id, category_id);
    Ok(())
}

#[tokio::test]
async fn resubmitting_updates_in_place() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;
    let user = common::create_customer(&state, "alice").await?;
    let category_id = common::create_category(&state, "Langra", 90, 50).await?;
    common::add_to_cart(&state, &user, category_id, 1).await?;
    let order_id = common::checkout(&state, &user).await?;
    common::set_status(&state, &admin, order_id, "Delivered").await?;
    let item_id = first_item_id(&state, &user, order_id).await?;

    let first = feedback_service::submit_feedback(&state, &user, item_id, rating(json!(2), "meh"))
        .await?
        .data
        .expect("feedback");
    let second =
        feedback_service::submit_feedback(&state, &user, item_id, rating(json!(5), "great"))
            .await?;
    assert_eq!(second.message, "Feedback updated successfully");
    let second = second.data.expect("feedback");
    assert_eq!(second.id, first.id);
    assert_eq!(second.rating, 5);

    let fetched = feedback_service::get_feedback(&state, &user, item_id)
        .await?
        .data
        .expect("feedback");
    assert_eq!(fetched.comment, "great");

    let reviews = feedback_service::list_category_feedbacks(&state, category_id)
        .await?
        .data
        .expect("reviews");
    assert_eq!(reviews.total_ratings, 1);
    assert_eq!(reviews.average_rating, 5.0);
    assert_eq!(reviews.feedbacks.len(), 1);
    assert_eq!(reviews.feedbacks[0].username, "alice");

    let details = order_service::get_order_details(&state, &user, order_id)
        .await?
        .data
        .expect("details");
    assert!(details.items[0].can_give_feedback);
    assert_eq!(details.items[0].feedback.as_ref().map(|f| f.rating), Some(5));
    Ok(())
}

#[tokio::test]
async fn average_rating_is_rounded_mean() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;
    let category_id = common::create_category(&state, "Alphonso", 300, 50).await?;

    for (name, stars) in [("u1", 4), ("u2", 4), ("u3", 5)] {
        let user = common::create_customer(&state, name).await?;
        common::add_to_cart(&state, &user, category_id, 1).await?;
        let order_id = common::checkout(&state, &user).await?;
        common::set_status(&state, &admin, order_id, "Delivered").await?;
        let item_id = first_item_id(&state, &user, order_id).await?;
        feedback_service::submit_feedback(&state, &user, item_id, rating(json!(stars), ""))
            .await?;
    }

    let category = category_service::get_category(&state, category_id)
        .await?
        .data
        .expect("category");
    // 13 / 3 = 4.33
    assert_eq!(category.average_rating, 4.3);
    assert_eq!(category.total_ratings, 3);

    let all = feedback_service::list_all_feedbacks(&state, &admin)
        .await?
        .data
        .expect("feedbacks");
    assert_eq!(all.items.len(), 3);
    assert!(all.items.iter().all(|f| f.category_name == "Alphonso"));
    Ok(())
}

#[tokio::test]
async fn feedback_access_rules() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::create_admin(&state, "admin").await?;
    let alice = common::create_customer(&state, "alice").await?;
    let mallory = common::create_customer(&state, "mallory").await?;
    let category_id = common::create_category(&state, "Fazli", 60, 50).await?;
    common::add_to_cart(&state, &alice, category_id, 1).await?;
    let order_id = common::checkout(&state, &alice).await?;
    common::set_status(&state, &admin, order_id, "Delivered").await?;
    let item_id = first_item_id(&state, &alice, order_id).await?;

    let err = feedback_service::submit_feedback(&state, &mallory, item_id, rating(json!(1), ""))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = feedback_service::submit_feedback(
        &state,
        &alice,
        Uuid::new_v4(),
        rating(json!(3), ""),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Order item not found"));

    let err = feedback_service::get_feedback(&state, &alice, item_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref msg) if msg == "No feedback found for this item"));

    feedback_service::submit_feedback(&state, &alice, item_id, rating(json!(3), "ok")).await?;
    let err = feedback_service::get_feedback(&state, &mallory, item_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    feedback_service::get_feedback(&state, &admin, item_id).await?;

    let err = feedback_service::list_all_feedbacks(&state, &alice)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = feedback_service::list_category_feedbacks(&state, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, CartList, UpdateCartItemRequest},
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        feedback::{
            AdminFeedbackEntry, AdminFeedbackList, CategoryFeedbacks, ReviewEntry,
            SubmitFeedbackRequest,
        },
        orders::{
            CreateOrderRequest, CreateOrderResponse, OrderDetailsList, OrderList,
            OrderWithItems, UpdateOrderRequest,
        },
        payments::{CreatePaymentRequest, PaymentList, UpdatePaymentRequest},
        profile::{ProfileResponse, UpdateProfileRequest},
    },
    error::ErrorBody,
    models::{CartItem, Category, Feedback, Order, OrderItem, Payment, Profile},
    response::{ApiResponse, Meta},
    routes::{auth, cart, categories, feedback, health, orders, params, payments, profile},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        profile::get_profile,
        profile::update_profile,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        cart::add_to_cart,
        cart::cart_list,
        cart::update_cart_item,
        cart::remove_cart_item,
        orders::create_order,
        orders::user_orders,
        orders::user_orders_with_items,
        orders::order_details,
        orders::admin_orders_details,
        orders::list_orders,
        orders::update_order,
        orders::delete_order,
        payments::list_payments,
        payments::create_payment,
        payments::get_payment,
        payments::update_payment,
        payments::delete_payment,
        feedback::submit_feedback,
        feedback::get_feedback,
        feedback::category_feedbacks,
        feedback::all_feedbacks
    ),
    components(
        schemas(
            Profile,
            Category,
            CartItem,
            Order,
            OrderItem,
            Payment,
            Feedback,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            ProfileResponse,
            UpdateProfileRequest,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartList,
            CreateOrderRequest,
            CreateOrderResponse,
            UpdateOrderRequest,
            OrderWithItems,
            OrderList,
            OrderDetailsList,
            CreatePaymentRequest,
            UpdatePaymentRequest,
            PaymentList,
            SubmitFeedbackRequest,
            ReviewEntry,
            CategoryFeedbacks,
            AdminFeedbackEntry,
            AdminFeedbackList,
            params::Pagination,
            params::CategoryQuery,
            params::OrderListQuery,
            ErrorBody,
            Meta,
            ApiResponse<AuthResponse>,
            ApiResponse<Category>,
            ApiResponse<CategoryList>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Profile", description = "Customer profile"),
        (name = "Catalog", description = "Mango categories"),
        (name = "Cart", description = "Shopping cart"),
        (name = "Orders", description = "Checkout and order management"),
        (name = "Payments", description = "Payment records"),
        (name = "Feedback", description = "Ratings on delivered order items"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

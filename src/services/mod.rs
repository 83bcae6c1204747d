pub mod auth_service;
pub mod cart_service;
pub mod category_service;
pub mod feedback_service;
pub mod order_service;
pub mod payment_service;
pub mod profile_service;

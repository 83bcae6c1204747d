pub mod audit_logs;
pub mod cart_items;
pub mod carts;
pub mod categories;
pub mod feedbacks;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod profiles;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use categories::Entity as Categories;
pub use feedbacks::Entity as Feedbacks;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use profiles::Entity as Profiles;
pub use users::Entity as Users;

pub use super::category::Entity as Category;
pub use super::customer::Entity as Customer;
pub use super::order::Entity as Order;
pub use super::product::Entity as Product;

//! Demo storefront schema: categories of products, customers and their
//! orders.

pub mod prelude;

pub mod category;
pub mod customer;
pub mod order;
pub mod product;

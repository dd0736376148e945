pub mod jwt;
pub mod middleware;
pub mod permissions;
pub mod roles;
pub mod types;

pub use jwt::*;
pub use middleware::*;
pub use permissions::*;
pub use roles::*;
pub use types::*;

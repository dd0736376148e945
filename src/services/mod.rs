pub mod admin;
pub mod decode;
pub mod dispatch;
pub mod search;
pub mod view;

pub use admin::*;
pub use search::{build_query, resolve_scopes};
pub use view::*;

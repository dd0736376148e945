//! Admin interface generator: register model types, get a management UI and
//! a mirrored JSON API driven by one set of metadata.

pub mod auth;
pub mod backend;
pub mod config;
pub mod demo;
pub mod entities;
pub mod error;
pub mod http;
pub mod registry;
pub mod resource;
pub mod services;

pub use error::{AdminError, AdminResult};
pub use registry::Registry;
pub use services::AdminService;

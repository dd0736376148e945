//! The admin's HTTP surface: HTML pages and the mirrored JSON API share
//! handlers, authorization and metadata.

pub mod handlers;
pub mod html;
pub mod payload;

use axum::{
    http::{header::ACCEPT, HeaderMap},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::auth::{optional_auth_middleware, JwtService};
use crate::services::AdminService;

pub use payload::Payload;

#[derive(Clone)]
pub struct AdminState {
    pub admin: AdminService,
    /// Mount point, used to build links in HTML pages.
    pub prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Json,
}

impl Format {
    /// `.json` on the last segment wins; otherwise the `Accept` header
    /// decides. Strips the suffix from `segment`.
    pub fn detect(segment: &mut String, headers: &HeaderMap) -> Format {
        if let Some(stripped) = segment.strip_suffix(".json") {
            *segment = stripped.to_string();
            return Format::Json;
        }
        Format::from_headers(headers)
    }

    pub fn from_headers(headers: &HeaderMap) -> Format {
        let wants_json = headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("application/json") && !accept.contains("text/html"));
        if wants_json {
            Format::Json
        } else {
            Format::Html
        }
    }
}

async fn health() -> impl IntoResponse {
    "OK"
}

/// Admin routes, relative to the mount point.
pub fn admin_routes(state: AdminState) -> Router {
    Router::new()
        .route("/", get(handlers::menu))
        .route("/search", get(handlers::search))
        .route("/search.json", get(handlers::search))
        .route("/{resource}", get(handlers::list).post(handlers::create))
        .route("/{resource}/new", get(handlers::new_form))
        .route("/{resource}/new.json", get(handlers::new_form))
        .route(
            "/{resource}/{id}",
            get(handlers::show)
                .put(handlers::update)
                .post(handlers::update)
                .delete(handlers::delete),
        )
        .route("/{resource}/{id}/edit", get(handlers::edit))
        .route("/{resource}/{id}/delete", post(handlers::delete))
        .route("/{resource}/actions/{name}", post(handlers::bulk_action))
        .route("/{resource}/{id}/actions/{name}", post(handlers::record_action))
        .with_state(state)
}

/// Full application router: admin under `prefix`, `/health` outside it,
/// optional bearer-token authentication on everything.
pub fn router(admin: AdminService, jwt_service: JwtService, prefix: &str) -> Router {
    let state = AdminState {
        admin,
        prefix: prefix.trim_end_matches('/').to_string(),
    };
    let routes = admin_routes(state);

    let app = Router::new().route("/health", get(health));
    let app = if prefix.trim_matches('/').is_empty() {
        app.merge(routes)
    } else {
        app.nest(prefix, routes)
    };

    app.layer(middleware::from_fn_with_state(
        jwt_service,
        optional_auth_middleware,
    ))
}

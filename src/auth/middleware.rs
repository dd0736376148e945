use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::{JwtService, Subject};

/// Resolves the current subject from a bearer token, if any.
///
/// Always inserts an `Option<Subject>` extension; an invalid token is
/// treated the same as no token so handlers decide what anonymous callers
/// may do.
pub async fn optional_auth_middleware(
    State(jwt_service): State<JwtService>,
    mut request: Request,
    next: Next,
) -> Response {
    let subject = current_subject(&jwt_service, &request);
    request.extensions_mut().insert(subject);
    next.run(request).await
}

pub fn current_subject(jwt_service: &JwtService, request: &Request) -> Option<Subject> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))?;

    match jwt_service.verify_token(token) {
        Ok(claims) => Some(Subject::from(claims)),
        Err(e) => {
            debug!("Ignoring invalid bearer token: {}", e);
            None
        }
    }
}

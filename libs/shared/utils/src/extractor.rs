use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::debug;

use shared_models::auth::Session;
use shared_models::error::AppError;

/// Requires a bearer token and exposes it to handlers as a per-request
/// `Arc<Session>` extension. The token is forwarded to the remote API,
/// which is the one that validates it.
pub async fn session_middleware(
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(auth) = auth.ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let token = auth.token().trim();
    if token.is_empty() {
        return Err(AppError::Auth("Empty bearer token".to_string()));
    }

    debug!("Attaching session to {}", request.uri().path());
    request.extensions_mut().insert(Arc::new(Session::with_token(token)));

    Ok(next.run(request).await)
}

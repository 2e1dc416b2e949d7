use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::auth::jwt::{verify_token, TokenType};
use crate::auth::session::{Principal, Session};
use crate::AppState;

/// Resolve the bearer token into a [`Session`] extension.
///
/// Never rejects: a missing, malformed or expired token yields an anonymous
/// session, and the journal turns every operation on it into a no-op.
pub async fn resolve_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let session = match token {
        None => Session::anonymous(),
        Some(token) => match verify_token(token, &state.config) {
            Ok(data) if data.claims.token_type == TokenType::Access => {
                Session::authenticated(Principal::new(data.claims.sub))
            }
            Ok(_) => {
                tracing::debug!("Refresh token presented as access token");
                Session::anonymous()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected");
                Session::anonymous()
            }
        },
    };

    req.extensions_mut().insert(session);
    next.run(req).await
}

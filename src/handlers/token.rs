use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::db::AppState;
use crate::extractors::Json;
use crate::security::csrf;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// GET /token - issue a double-submit CSRF token.
///
/// Always 200; idempotent in the sense that every call simply issues a
/// fresh token and cookie.
pub async fn issue_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<TokenResponse>) {
    let token = csrf::generate_token();
    let jar = jar.add(csrf::build_cookie(&token, !state.dev_mode));
    (jar, Json(TokenResponse { token }))
}

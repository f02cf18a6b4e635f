//! Double-submit CSRF tokens.
//!
//! `GET /token` sets a random token in a script-readable cookie; the
//! mutating endpoint must echo the same token in the `x-csrf-token` header.
//! Equality proves the request originated from a page that could read the
//! cookie (same-origin). The cookie is deliberately not HttpOnly - the
//! double-submit pattern requires the page to read it back.

use axum_extra::extract::cookie::{Cookie, SameSite};
use rand::RngCore;
use subtle::ConstantTimeEq;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// 256 bits of entropy, hex-encoded to 64 chars.
const TOKEN_BYTES: usize = 32;

/// Cookie lifetime. Tokens are cheap to reissue; an hour bounds the damage
/// of a leaked one.
const TOKEN_TTL_SECS: i64 = 3600;

/// Generate a fresh CSRF token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Build the double-submit cookie for a token.
///
/// SameSite=Lax still permits top-level navigation but blocks cross-site
/// script-initiated requests. `secure` is relaxed only in dev mode so local
/// http testing works.
pub fn build_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE, token.to_owned()))
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(false)
        .secure(secure)
        .max_age(time::Duration::seconds(TOKEN_TTL_SECS))
        .build()
}

/// Verify the header token against the cookie token.
///
/// Fails closed if either side is absent. Lengths are compared first (a
/// length mismatch can only leak a binary accept/reject, which the response
/// reveals anyway); equal-length values are compared in constant time.
pub fn verify_double_submit(from_cookie: &str, from_header: &str) -> bool {
    if from_cookie.is_empty() || from_header.is_empty() {
        return false;
    }

    let a = from_cookie.as_bytes();
    let b = from_header.as_bytes();
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_has_256_bits_of_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_matching_tokens_accepted() {
        let token = generate_token();
        assert!(verify_double_submit(&token, &token));
    }

    #[test]
    fn test_mismatched_tokens_rejected() {
        assert!(!verify_double_submit(&generate_token(), &generate_token()));
    }

    #[test]
    fn test_absent_sides_fail_closed() {
        let token = generate_token();
        assert!(!verify_double_submit("", &token));
        assert!(!verify_double_submit(&token, ""));
        assert!(!verify_double_submit("", ""));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let token = generate_token();
        assert!(!verify_double_submit(&token, &token[..32]));
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = build_cookie("abc", true);
        assert_eq!(cookie.name(), CSRF_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.http_only(), Some(false));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::seconds(TOKEN_TTL_SECS))
        );
    }
}

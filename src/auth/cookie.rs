use axum::http::{header, HeaderMap};

/// Cookie that carries the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Build the `Set-Cookie` value for a refresh token. Always HTTP-only
/// and same-site strict; `Secure` is added in production.
pub fn refresh_cookie(token: &str, max_age_minutes: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        REFRESH_COOKIE,
        token,
        max_age_minutes * 60
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Pull the refresh token out of the `Cookie` header, if any.
pub fn read_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|part| {
            part.trim()
                .strip_prefix(REFRESH_COOKIE)?
                .strip_prefix('=')
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_carries_required_attributes() {
        let cookie = refresh_cookie("tok123", 60, false);
        assert!(cookie.starts_with("refreshToken=tok123"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn production_cookie_is_secure() {
        let cookie = refresh_cookie("tok123", 60, true);
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn read_finds_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; refreshToken=tok123; lang=en".parse().unwrap(),
        );
        assert_eq!(read_refresh_cookie(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn read_ignores_prefix_collisions() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "refreshTokenOld=stale".parse().unwrap(),
        );
        assert_eq!(read_refresh_cookie(&headers), None);
    }

    #[test]
    fn read_without_cookie_header_is_none() {
        assert_eq!(read_refresh_cookie(&HeaderMap::new()), None);
    }
}

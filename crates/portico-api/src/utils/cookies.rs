//! Request cookie lookup and `Set-Cookie` construction.

use axum::http::{header, HeaderMap, HeaderValue};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped in cookie values (RFC 6265 cookie-octet excludes these).
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| {
            percent_decode_str(value.trim_matches('"'))
                .decode_utf8()
                .ok()
                .map(|v| v.into_owned())
        })
}

/// `Set-Cookie` value for a session-scoped, script-inaccessible cookie.
pub fn http_only_cookie(name: &str, value: &str, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/",
        name,
        utf8_percent_encode(value, COOKIE_VALUE)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

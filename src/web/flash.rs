//! One-shot notices carried to the next rendered page in a cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub category: String,
    pub message: String,
}

fn encode(messages: &[FlashMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}={}", urlencoding::encode(&m.category), urlencoding::encode(&m.message)))
        .collect::<Vec<_>>()
        .join("&")
}

fn decode(value: &str) -> Vec<FlashMessage> {
    value
        .split('&')
        .filter_map(|pair| {
            let (category, message) = pair.split_once('=')?;
            Some(FlashMessage {
                category: urlencoding::decode(category).ok()?.into_owned(),
                message: urlencoding::decode(message).ok()?.into_owned(),
            })
        })
        .collect()
}

fn flash_cookie(value: String) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Queues a notice, keeping any that have not been shown yet.
pub fn push(jar: CookieJar, category: &str, message: &str) -> CookieJar {
    let mut pending = jar.get(FLASH_COOKIE).map(|c| decode(c.value())).unwrap_or_default();
    pending.push(FlashMessage {
        category: category.to_string(),
        message: message.to_string(),
    });
    jar.add(flash_cookie(encode(&pending)))
}

/// Drains queued notices; the returned jar clears the cookie.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<FlashMessage>) {
    match jar.get(FLASH_COOKIE).map(|c| decode(c.value())) {
        Some(messages) => (jar.remove(flash_cookie(String::new())), messages),
        None => (jar, Vec::new()),
    }
}

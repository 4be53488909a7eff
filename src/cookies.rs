//! Cookie names and builders for the login state and the token set.
//!
//! The browser cookie jar is the only session store. Every cookie is written
//! `HttpOnly` and `SameSite=Strict`, `Secure` unless disabled in the
//! configuration, with an explicit lifetime. `AUTH_STATE` may be relaxed to
//! `SameSite=Lax` so it survives the provider's cross-site redirect back.
use cookie::CookieBuilder;
use rocket::http::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};

use crate::config::CookieSettings;
use crate::token::TokenSet;

pub const AUTH_STATE: &str = "AUTH_STATE";
pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const ID_TOKEN: &str = "ID_TOKEN";
pub const REFRESH_TOKEN: &str = "REFRESH_TOKEN";

/// How long a login attempt may take before the state cookie expires.
pub const STATE_TTL: Duration = Duration::minutes(5);

fn with_attributes(
    builder: CookieBuilder<'static>,
    settings: &CookieSettings,
) -> CookieBuilder<'static> {
    let builder = builder
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Strict);
    match &settings.domain {
        Some(domain) => builder.domain(domain.clone()),
        None => builder,
    }
}

pub(crate) fn state_cookie(state: &str, settings: &CookieSettings) -> Cookie<'static> {
    with_attributes(Cookie::build((AUTH_STATE, state.to_string())), settings)
        .same_site(settings.state_same_site)
        .path(settings.state_path.clone())
        .max_age(STATE_TTL)
        .build()
}

pub(crate) fn token_cookie(
    name: &'static str,
    value: &str,
    max_age: Duration,
    settings: &CookieSettings,
) -> Cookie<'static> {
    with_attributes(Cookie::build((name, value.to_string())), settings)
        .path("/")
        .max_age(max_age)
        .build()
}

/// A cookie that tells the browser to drop `name` at `path`.
pub(crate) fn removal_cookie(
    name: &'static str,
    path: &str,
    settings: &CookieSettings,
) -> Cookie<'static> {
    with_attributes(Cookie::build((name, "")), settings)
        .path(path.to_string())
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

// `CookieJar::remove` only emits a removal when the request carried the
// cookie, and `AUTH_STATE` is never sent outside its path, so removals are
// added explicitly.
pub(crate) fn clear_state(jar: &CookieJar<'_>, settings: &CookieSettings) {
    jar.add(removal_cookie(AUTH_STATE, &settings.state_path, settings));
}

pub(crate) fn store_tokens(jar: &CookieJar<'_>, tokens: &TokenSet, settings: &CookieSettings) {
    let access_ttl = tokens.expires_in().unwrap_or(settings.default_ttl);
    let refresh_ttl = tokens.refresh_expires_in().unwrap_or(settings.default_ttl);

    jar.add(token_cookie(ACCESS_TOKEN, tokens.access_token(), access_ttl, settings));
    jar.add(token_cookie(ID_TOKEN, tokens.id_token(), access_ttl, settings));
    jar.add(token_cookie(REFRESH_TOKEN, tokens.refresh_token(), refresh_ttl, settings));
}

pub(crate) fn clear_all(jar: &CookieJar<'_>, settings: &CookieSettings) {
    for name in [ID_TOKEN, ACCESS_TOKEN, REFRESH_TOKEN] {
        jar.add(removal_cookie(name, "/", settings));
    }
    clear_state(jar, settings);
}

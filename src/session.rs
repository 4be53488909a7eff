//! The per-browser login state, recovered from cookies on every request.
use rocket::Request;
use rocket::http::CookieJar;
use rocket::request::{FromRequest, Outcome};
use std::convert::Infallible;

use crate::cookies::{ACCESS_TOKEN, AUTH_STATE, ID_TOKEN, REFRESH_TOKEN};

/// Value of a cookie the browser sent, `None` when absent or empty.
pub fn cookie_value(jar: &CookieJar<'_>, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Token values read back from the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCookies {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Where a browser is in the authorization code flow.
///
/// `AUTH_STATE` takes precedence: it is scoped to the callback path, so it is
/// only visible while a login is being completed, even for a browser that
/// still holds tokens from an earlier login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    LoginInitiated { state: String },
    Authenticated(TokenCookies),
}

impl SessionState {
    pub fn from_values(
        state: Option<&str>,
        id_token: Option<&str>,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Self {
        let present = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_string);

        if let Some(state) = present(state) {
            return SessionState::LoginInitiated { state };
        }
        match (present(id_token), present(access_token)) {
            (Some(id_token), Some(access_token)) => SessionState::Authenticated(TokenCookies {
                id_token,
                access_token,
                refresh_token: present(refresh_token),
            }),
            _ => SessionState::Anonymous,
        }
    }

    pub fn from_jar(jar: &CookieJar<'_>) -> Self {
        let value = |name: &str| cookie_value(jar, name);
        Self::from_values(
            value(AUTH_STATE).as_deref(),
            value(ID_TOKEN).as_deref(),
            value(ACCESS_TOKEN).as_deref(),
            value(REFRESH_TOKEN).as_deref(),
        )
    }

    pub fn pending_state(&self) -> Option<&str> {
        match self {
            SessionState::LoginInitiated { state } => Some(state.as_str()),
            _ => None,
        }
    }

    pub fn tokens(&self) -> Option<&TokenCookies> {
        match self {
            SessionState::Authenticated(tokens) => Some(tokens),
            _ => None,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionState {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(SessionState::from_jar(req.cookies()))
    }
}

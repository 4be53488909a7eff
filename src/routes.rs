//! Authorization code flow against keycloak, plus the page it protects.
use crate::AuthState;
use crate::client::ClaimPair;
use crate::cookies::{self, ID_TOKEN};
use crate::errors::{OIDCError, TokenKind, TokenRejection};
use crate::session::{SessionState, cookie_value};
use openidconnect::CsrfToken;
use rocket::http::CookieJar;
use rocket::serde::json::Json;
use rocket::{Route, State, response::Redirect, routes};

/// Entropy of the login `state` value, 43 characters once base64url encoded.
const STATE_BYTES: u32 = 32;

#[get("/")]
pub async fn index() -> &'static str {
    "OIDC relying party. Sign in at /auth/login, your claims are shown at /my."
}

#[get("/login")]
pub async fn login(jar: &CookieJar<'_>, auth_state: &State<AuthState>) -> Redirect {
    let state = CsrfToken::new_random_len(STATE_BYTES);
    jar.add(cookies::state_cookie(
        state.secret(),
        &auth_state.client.config().cookies,
    ));

    tracing::debug!("login initiated, redirecting to authorization endpoint");
    Redirect::found(auth_state.client.authorize_url(&state).to_string())
}

#[get("/callback?<code>&<state>&<error>&<error_description>")]
pub async fn callback(
    jar: &CookieJar<'_>,
    auth_state: &State<AuthState>,
    session: SessionState,
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
) -> Result<Redirect, OIDCError> {
    let config = auth_state.client.config();
    // the state is single use whatever happens next
    cookies::clear_state(jar, &config.cookies);

    match (session.pending_state(), state.as_deref()) {
        (Some(expected), Some(received)) if expected == received => {}
        (expected, received) => {
            tracing::warn!(
                has_cookie = expected.is_some(),
                has_query = received.is_some(),
                "login state mismatch"
            );
            return Err(OIDCError::AuthStateMismatch);
        }
    }

    if let Some(error) = error {
        tracing::warn!(error = %error, description = ?error_description, "authorization server returned an error");
        return Err(OIDCError::AuthorizationDenied {
            error,
            description: error_description,
        });
    }

    let code = code
        .filter(|code| !code.is_empty())
        .ok_or(OIDCError::MissingAuthorizationCode)?;
    let tokens = auth_state.client.exchange_code(&code).await?;

    cookies::store_tokens(jar, &tokens, &config.cookies);
    tracing::info!("login completed");
    Ok(Redirect::found(config.post_login_redirect.clone()))
}

#[get("/my")]
pub async fn my(
    jar: &CookieJar<'_>,
    auth_state: &State<AuthState>,
    session: SessionState,
) -> Result<Json<ClaimPair>, OIDCError> {
    let tokens = session.tokens().ok_or_else(|| {
        let kind = match cookie_value(jar, ID_TOKEN) {
            Some(_) => TokenKind::Access,
            None => TokenKind::Id,
        };
        OIDCError::token_invalid(kind, TokenRejection::Missing)
    })?;

    match auth_state.validator.verify_pair(tokens) {
        Ok(claims) => Ok(Json(claims)),
        Err(err) => {
            tracing::warn!(error = %err, "rejected token on protected page");
            Err(err)
        }
    }
}

#[get("/logout")]
pub async fn logout(jar: &CookieJar<'_>, auth_state: &State<AuthState>) -> Redirect {
    let hint = cookie_value(jar, ID_TOKEN);
    if hint.is_none() {
        tracing::debug!("logout without an ID token, provider will ask for confirmation");
    }
    Redirect::found(
        auth_state
            .client
            .end_session_url(hint.as_deref())
            .to_string(),
    )
}

/// Where the provider sends the browser after ending its session.
#[get("/logout/callback")]
pub async fn logout_callback(jar: &CookieJar<'_>, auth_state: &State<AuthState>) -> Redirect {
    cookies::clear_all(jar, &auth_state.client.config().cookies);
    tracing::info!("logout completed");
    Redirect::found("/")
}

/// Routes mounted under `/auth`.
pub fn get_routes() -> Vec<Route> {
    routes![login, callback, logout, logout_callback]
}

/// Routes mounted at the root.
pub fn app_routes() -> Vec<Route> {
    routes![index, my]
}

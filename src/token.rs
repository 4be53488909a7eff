use reqwest::Client;
use reqwest::Url;
use serde_derive::Deserialize;
use std::fmt;

use crate::errors::TokenExchangeError;

/// Token endpoint response, including the extra lifetimes keycloak reports.
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    access_token: String,
    token_type: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    refresh_expires_in: Option<u64>,
    scope: Option<String>,
}

impl TokenResponse {
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn scope(&self) -> &Option<String> {
        &self.scope
    }
}

/// OAuth error body returned alongside a non-2xx status.
#[derive(Deserialize, Debug)]
struct ProviderError {
    error: Option<String>,
    error_description: Option<String>,
}

/// The tokens stored in the browser after a successful login. All three are
/// required so the cookies are written together or not at all.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    access_token: String,
    id_token: String,
    refresh_token: String,
    expires_in: Option<u64>,
    refresh_expires_in: Option<u64>,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .finish_non_exhaustive()
    }
}

impl TryFrom<TokenResponse> for TokenSet {
    type Error = TokenExchangeError;
    fn try_from(response: TokenResponse) -> Result<TokenSet, Self::Error> {
        let required = |value: Option<String>, name| match value {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(TokenExchangeError::MissingToken(name)),
        };
        if response.access_token.is_empty() {
            return Err(TokenExchangeError::MissingToken("access_token"));
        }
        Ok(TokenSet {
            id_token: required(response.id_token, "id_token")?,
            refresh_token: required(response.refresh_token, "refresh_token")?,
            access_token: response.access_token,
            expires_in: response.expires_in,
            refresh_expires_in: response.refresh_expires_in,
        })
    }
}

impl TokenSet {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// `None` when the provider reports no lifetime, or zero.
    pub fn expires_in(&self) -> Option<time::Duration> {
        self.expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| time::Duration::seconds(secs as i64))
    }

    pub fn refresh_expires_in(&self) -> Option<time::Duration> {
        self.refresh_expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| time::Duration::seconds(secs as i64))
    }
}

///
/// # Arguments
/// client: shared HTTP client, built with certificate verification on and a timeout
/// token_endpoint: realm token endpoint
/// client_id, client_secret: confidential client credentials
/// redirect_uri: must equal the one sent with the authorization request
/// code: authorization code from the callback
pub(crate) async fn perform_code_exchange(
    client: &Client,
    token_endpoint: &Url,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
    code: &str,
) -> Result<TokenSet, TokenExchangeError> {
    let params = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri),
        ("code", code),
    ];

    let resp = client
        .post(token_endpoint.clone())
        .form(&params)
        .send()
        .await?;
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let provider = serde_json::from_str::<ProviderError>(&body).ok();
        return Err(TokenExchangeError::Rejected {
            status: status.as_u16(),
            error: provider.as_ref().and_then(|p| p.error.clone()),
            description: provider.and_then(|p| p.error_description),
        });
    }

    let response: TokenResponse = serde_json::from_str(&body)?;
    tracing::debug!(
        token_type = response.token_type(),
        scope = ?response.scope(),
        "token endpoint answered"
    );
    response.try_into()
}

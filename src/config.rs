//! Relying party configuration.
//!
//! [`OIDCConfig`] holds the raw values as they appear in the environment (or
//! a `.env` file loaded by the binary). [`WorkingConfig`] is the validated
//! form the routes use: URLs are parsed, the provider endpoints derived from
//! the Keycloak base url and realm, and numeric settings converted.

use cookie::SameSite;
use openidconnect::url::Url;
use openidconnect::{AuthUrl, ClientId, ClientSecret, IssuerUrl, RedirectUrl, TokenUrl};
use serde_derive::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::OIDCError;

const DEFAULT_POST_LOGIN: &str = "/my";
const DEFAULT_EXCHANGE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LEEWAY_SECS: u64 = 60;
const DEFAULT_TOKEN_COOKIE_TTL_SECS: u64 = 1800;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OIDCConfig {
    pub app_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub post_login_redirect: Option<String>,
    pub post_logout_redirect_uri: Option<String>,
    pub keycloak_base_url: String,
    pub realm: String,
    pub issuer: Option<String>,
    /// Base64 body of the realm's RSA public key, or a complete PEM document.
    pub public_key: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: Option<String>,
    /// `strict` (default) or `lax`; lax is needed when keycloak is on another site.
    pub state_cookie_same_site: Option<String>,
    pub exchange_timeout_secs: Option<String>,
    pub leeway_secs: Option<String>,
    pub token_cookie_ttl_secs: Option<String>,
}

/// please note this is just an example for a local keycloak, the public key
/// is a placeholder and `from_env` should be used instead.
impl Default for OIDCConfig {
    fn default() -> OIDCConfig {
        Self {
            app_base_url: "http://localhost:8000".to_string(),
            client_id: "demo-app".to_string(),
            client_secret: "change-me".to_string(),
            redirect_uri: "http://localhost:8000/auth/callback".to_string(),
            post_login_redirect: None,
            post_logout_redirect_uri: None,
            keycloak_base_url: "http://localhost:8080".to_string(),
            realm: "master".to_string(),
            issuer: None,
            public_key: String::new(),
            cookie_domain: None,
            cookie_secure: None,
            state_cookie_same_site: None,
            exchange_timeout_secs: None,
            leeway_secs: None,
            token_cookie_ttl_secs: None,
        }
    }
}

impl OIDCConfig {
    pub fn from_env() -> Result<Self, OIDCError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source, `from_env` passes
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OIDCError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| match lookup(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(OIDCError::MissingConfig(key)),
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            app_base_url: required("APP_BASE_URL")?,
            client_id: required("APP_CLIENT_ID")?,
            client_secret: required("APP_CLIENT_SECRET")?,
            redirect_uri: required("APP_REDIRECT_URI")?,
            post_login_redirect: optional("APP_POST_LOGIN_REDIRECT"),
            post_logout_redirect_uri: optional("APP_POST_LOGOUT_REDIRECT_URI"),
            keycloak_base_url: required("KEYCLOAK_BASE_URL_LOCALHOST")?,
            realm: required("KEYCLOAK_REALM")?,
            issuer: optional("KEYCLOAK_ISSUER"),
            public_key: required("RSA_PUBLIC_KEY_BODY")?,
            cookie_domain: optional("COOKIE_DOMAIN"),
            cookie_secure: optional("COOKIE_SECURE"),
            state_cookie_same_site: optional("STATE_COOKIE_SAMESITE"),
            exchange_timeout_secs: optional("TOKEN_EXCHANGE_TIMEOUT_SECS"),
            leeway_secs: optional("JWT_LEEWAY_SECS"),
            token_cookie_ttl_secs: optional("TOKEN_COOKIE_TTL_SECS"),
        })
    }
}

/// Attributes shared by every cookie the relying party writes.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub domain: Option<String>,
    pub secure: bool,
    /// Path the `AUTH_STATE` cookie is scoped to, taken from the redirect uri.
    pub state_path: String,
    pub state_same_site: SameSite,
    /// Lifetime of token cookies when the provider does not report one.
    pub default_ttl: time::Duration,
}

/// Validated configuration, built once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct WorkingConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub redirect_uri: RedirectUrl,
    pub post_login_redirect: String,
    pub post_logout_redirect_uri: Url,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub end_session_url: Url,
    pub issuer: Option<IssuerUrl>,
    pub public_key: String,
    pub cookies: CookieSettings,
    pub exchange_timeout: Duration,
    pub leeway: u64,
}

impl TryFrom<&OIDCConfig> for WorkingConfig {
    type Error = OIDCError;
    fn try_from(config: &OIDCConfig) -> Result<WorkingConfig, Self::Error> {
        WorkingConfig::from_oidc_config(config)
    }
}

impl TryFrom<OIDCConfig> for WorkingConfig {
    type Error = OIDCError;
    fn try_from(config: OIDCConfig) -> Result<WorkingConfig, Self::Error> {
        (&config).try_into()
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, OIDCError> {
    Url::parse(value).map_err(|source| OIDCError::InvalidUrl { var, source })
}

fn parse_number<T: FromStr>(var: &'static str, value: &Option<String>, default: T) -> Result<T, OIDCError> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| OIDCError::InvalidValue {
            var,
            value: raw.clone(),
        }),
        None => Ok(default),
    }
}

fn parse_same_site(var: &'static str, value: &Option<String>) -> Result<SameSite, OIDCError> {
    match value.as_deref().map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(SameSite::Strict),
        Some(raw) => match raw.as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            _ => Err(OIDCError::InvalidValue { var, value: raw }),
        },
    }
}

fn parse_flag(var: &'static str, value: &Option<String>, default: bool) -> Result<bool, OIDCError> {
    match value.as_deref().map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(raw) => match raw.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(OIDCError::InvalidValue { var, value: raw }),
        },
    }
}

impl WorkingConfig {
    pub fn from_oidc_config(config: &OIDCConfig) -> Result<Self, OIDCError> {
        let realm_base = format!(
            "{}/realms/{}/protocol/openid-connect",
            config.keycloak_base_url.trim_end_matches('/'),
            config.realm
        );
        let endpoint = |name: &str| parse_url("KEYCLOAK_BASE_URL_LOCALHOST", &format!("{realm_base}/{name}"));

        let redirect_uri = RedirectUrl::new(config.redirect_uri.clone()).map_err(|source| {
            OIDCError::InvalidUrl {
                var: "APP_REDIRECT_URI",
                source,
            }
        })?;
        let state_path = redirect_uri.url().path().to_string();

        let post_logout_redirect_uri = match &config.post_logout_redirect_uri {
            Some(uri) => parse_url("APP_POST_LOGOUT_REDIRECT_URI", uri)?,
            None => parse_url("APP_BASE_URL", &config.app_base_url)?
                .join("/auth/logout/callback")
                .map_err(|source| OIDCError::InvalidUrl {
                    var: "APP_BASE_URL",
                    source,
                })?,
        };

        let issuer = match &config.issuer {
            Some(iss) => Some(IssuerUrl::new(iss.clone()).map_err(|source| OIDCError::InvalidUrl {
                var: "KEYCLOAK_ISSUER",
                source,
            })?),
            None => None,
        };

        let ttl_secs = parse_number(
            "TOKEN_COOKIE_TTL_SECS",
            &config.token_cookie_ttl_secs,
            DEFAULT_TOKEN_COOKIE_TTL_SECS,
        )?;
        let cookies = CookieSettings {
            domain: config.cookie_domain.clone(),
            secure: parse_flag("COOKIE_SECURE", &config.cookie_secure, true)?,
            state_path,
            state_same_site: parse_same_site("STATE_COOKIE_SAMESITE", &config.state_cookie_same_site)?,
            default_ttl: time::Duration::seconds(ttl_secs as i64),
        };

        Ok(Self {
            client_id: ClientId::new(config.client_id.clone()),
            client_secret: ClientSecret::new(config.client_secret.trim_end().to_string()),
            redirect_uri,
            post_login_redirect: config
                .post_login_redirect
                .clone()
                .unwrap_or_else(|| DEFAULT_POST_LOGIN.to_string()),
            post_logout_redirect_uri,
            auth_url: AuthUrl::from_url(endpoint("auth")?),
            token_url: TokenUrl::from_url(endpoint("token")?),
            end_session_url: endpoint("logout")?,
            issuer,
            public_key: config.public_key.clone(),
            cookies,
            exchange_timeout: Duration::from_secs(parse_number(
                "TOKEN_EXCHANGE_TIMEOUT_SECS",
                &config.exchange_timeout_secs,
                DEFAULT_EXCHANGE_TIMEOUT_SECS,
            )?),
            leeway: parse_number("JWT_LEEWAY_SECS", &config.leeway_secs, DEFAULT_LEEWAY_SECS)?,
        })
    }
}

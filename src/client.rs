use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation, decode, decode_header};
use openidconnect::CsrfToken;
use openidconnect::url::Url;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::config::WorkingConfig;
use crate::errors::{OIDCError, TokenExchangeError, TokenKind, TokenRejection};
use crate::session::TokenCookies;
use crate::token::{TokenSet, perform_code_exchange};

/// Claims of a verified token, kept as the raw JSON object.
pub type Claims = serde_json::Map<String, Value>;

/// Audience keycloak puts in access tokens for its default `account` client.
pub const ACCESS_TOKEN_AUDIENCE: &str = "account";

/// Decoded claims of both tokens, as returned by the protected page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimPair {
    pub id_token: Claims,
    pub access_token: Claims,
}

/// Wraps the base64 body keycloak shows for a realm key into a PEM document.
/// Input that already is PEM is passed through.
pub fn pem_from_body(body: &str) -> String {
    let body = body.trim();
    if body.starts_with("-----BEGIN") {
        return format!("{}\n", body);
    }

    let compact: String = body.split_whitespace().collect();
    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for line in compact.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}

/// Validation rules and key for one kind of token.
#[derive(Clone)]
pub struct Endpoint {
    validation: Validation,
    pubkey: DecodingKey,
}

impl Endpoint {
    pub fn new(validation: Validation, pubkey: DecodingKey) -> Self {
        Self { validation, pubkey }
    }
}

/// Verifies ID and access tokens against the realm's static RSA key.
///
/// Only RS256 is accepted. The ID token must be addressed to this client,
/// the access token to [`ACCESS_TOKEN_AUDIENCE`]. Expiry is mandatory and,
/// together with `nbf`, checked with the configured leeway.
#[derive(Clone)]
pub struct Validator {
    id_token: Endpoint,
    access_token: Endpoint,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("id_token", &self.id_token.validation)
            .field("access_token", &self.access_token.validation)
            .finish_non_exhaustive()
    }
}

impl Validator {
    /// * `pem` - RSA public key in PEM format (PKCS#1 or SubjectPublicKeyInfo).
    /// * `client_id` - expected audience of ID tokens.
    /// * `issuer` - expected `iss`, not checked when `None`.
    /// * `leeway` - clock skew tolerance in seconds.
    pub fn from_rsa_pubkey_pem(
        pem: &str,
        client_id: &str,
        issuer: Option<&str>,
        leeway: u64,
    ) -> Result<Self, OIDCError> {
        let pubkey = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(OIDCError::InvalidPublicKey)?;
        Ok(Self {
            id_token: Endpoint::new(
                Self::default_validation(client_id, issuer, leeway),
                pubkey.clone(),
            ),
            access_token: Endpoint::new(
                Self::default_validation(ACCESS_TOKEN_AUDIENCE, issuer, leeway),
                pubkey,
            ),
        })
    }

    pub fn from_config(config: &WorkingConfig) -> Result<Self, OIDCError> {
        Self::from_rsa_pubkey_pem(
            &pem_from_body(&config.public_key),
            config.client_id.as_str(),
            config.issuer.as_ref().map(|iss| iss.as_str()),
            config.leeway,
        )
    }

    fn default_validation(audience: &str, issuer: Option<&str>, leeway: u64) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = leeway;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = true;
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    /// Decodes and validates one token.
    ///
    /// The header algorithm is checked before the key is touched, so a token
    /// claiming e.g. HS256 is refused outright instead of being verified with
    /// the public key as an HMAC secret.
    pub fn decode(&self, kind: TokenKind, token: &str) -> Result<TokenData<Claims>, OIDCError> {
        let endpoint = match kind {
            TokenKind::Id => &self.id_token,
            TokenKind::Access => &self.access_token,
        };

        let header = decode_header(token).map_err(|err| OIDCError::token_invalid(kind, err))?;
        if header.alg != Algorithm::RS256 {
            return Err(OIDCError::token_invalid(
                kind,
                TokenRejection::AlgorithmMismatch(header.alg),
            ));
        }

        decode::<Claims>(token, &endpoint.pubkey, &endpoint.validation)
            .map_err(|err| OIDCError::token_invalid(kind, err))
    }

    /// Verifies both tokens read from the browser, ID token first.
    pub fn verify_pair(&self, tokens: &TokenCookies) -> Result<ClaimPair, OIDCError> {
        let id_token = self.decode(TokenKind::Id, &tokens.id_token)?.claims;
        let access_token = self.decode(TokenKind::Access, &tokens.access_token)?.claims;
        Ok(ClaimPair {
            id_token,
            access_token,
        })
    }
}

/// Talks to the keycloak realm: builds the browser-facing authorization and
/// end-session urls and performs the back channel code exchange.
///
/// The reqwest client keeps certificate verification on, does not follow
/// redirects and bounds every exchange with the configured timeout.
#[derive(Debug, Clone)]
pub struct OIDCClient {
    reqwest_client: reqwest::Client,
    config: WorkingConfig,
}

impl OIDCClient {
    pub fn new(config: WorkingConfig) -> Result<Self, OIDCError> {
        let reqwest_client = reqwest::ClientBuilder::new()
            // Following redirects opens the client up to SSRF vulnerabilities.
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.exchange_timeout)
            .build()?;

        Ok(Self {
            reqwest_client,
            config,
        })
    }

    pub fn config(&self) -> &WorkingConfig {
        &self.config
    }

    /// Authorization endpoint url for a fresh login attempt.
    pub fn authorize_url(&self, state: &CsrfToken) -> Url {
        let mut url = self.config.auth_url.url().clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.config.client_id.as_str())
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", "openid")
            .append_pair("state", state.secret())
            .append_pair("response_type", "code");
        url
    }

    /// End-session url; `id_token_hint` is left out when the browser has no ID token.
    pub fn end_session_url(&self, id_token_hint: Option<&str>) -> Url {
        let mut url = self.config.end_session_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", self.config.client_id.as_str())
                .append_pair(
                    "post_logout_redirect_uri",
                    self.config.post_logout_redirect_uri.as_str(),
                );
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
        }
        url
    }

    /// Exchanges an authorization code for the token set.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, TokenExchangeError> {
        perform_code_exchange(
            &self.reqwest_client,
            self.config.token_url.url(),
            self.config.client_id.as_str(),
            self.config.client_secret.secret(),
            self.config.redirect_uri.as_str(),
            code,
        )
        .await
    }
}

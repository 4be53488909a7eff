use rocket::Request;
use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response;
use serde_json::json;
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

/// Which member of the token set a verification error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Id,
    Access,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Id => f.write_str("ID token"),
            TokenKind::Access => f.write_str("access token"),
        }
    }
}

/// Why a token failed verification. All of these render as 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("token cookie is missing")]
    Missing,
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("signature does not match the configured key")]
    BadSignature,
    #[error("audience does not match")]
    WrongAudience,
    #[error("issuer does not match")]
    WrongIssuer,
    #[error("token has expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("token is signed with {0:?}, only RS256 is accepted")]
    AlgorithmMismatch(jsonwebtoken::Algorithm),
}

impl From<jsonwebtoken::errors::Error> for TokenRejection {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidSignature => TokenRejection::BadSignature,
            ErrorKind::InvalidAudience => TokenRejection::WrongAudience,
            ErrorKind::InvalidIssuer => TokenRejection::WrongIssuer,
            ErrorKind::ExpiredSignature => TokenRejection::Expired,
            ErrorKind::ImmatureSignature => TokenRejection::NotYetValid,
            _ => TokenRejection::Malformed(err.to_string()),
        }
    }
}

/// Failure modes of the authorization code exchange.
#[derive(Debug, Error)]
pub enum TokenExchangeError {
    #[error("token endpoint did not answer in time")]
    Timeout,
    #[error("request to token endpoint failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error(
        "token endpoint responded with {status}: {} {}",
        .error.as_deref().unwrap_or("no error code"),
        .description.as_deref().unwrap_or("")
    )]
    Rejected {
        status: u16,
        error: Option<String>,
        description: Option<String>,
    },
    #[error("token endpoint returned an unexpected body: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("token response is missing {0}")]
    MissingToken(&'static str),
}

impl From<reqwest::Error> for TokenExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TokenExchangeError::Timeout
        } else {
            TokenExchangeError::Network(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum OIDCError {
    #[error("state verification failed")]
    AuthStateMismatch,

    #[error(
        "authorization server returned {error}: {}",
        .description.as_deref().unwrap_or("no description")
    )]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("missing authorization code")]
    MissingAuthorizationCode,

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(#[from] TokenExchangeError),

    #[error("{kind} rejected: {reason}")]
    TokenInvalid {
        kind: TokenKind,
        reason: TokenRejection,
    },

    #[error("missing configuration value {0}")]
    MissingConfig(&'static str),

    #[error("invalid url in {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: openidconnect::url::ParseError,
    },

    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },

    #[error("invalid RSA public key: {0}")]
    InvalidPublicKey(#[source] jsonwebtoken::errors::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl OIDCError {
    pub fn token_invalid(kind: TokenKind, reason: impl Into<TokenRejection>) -> Self {
        OIDCError::TokenInvalid {
            kind,
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            OIDCError::AuthStateMismatch
            | OIDCError::AuthorizationDenied { .. }
            | OIDCError::MissingAuthorizationCode => Status::BadRequest,
            OIDCError::TokenExchangeFailed(_) => Status::BadGateway,
            OIDCError::TokenInvalid { .. } => Status::Unauthorized,
            OIDCError::MissingConfig(_)
            | OIDCError::InvalidUrl { .. }
            | OIDCError::InvalidValue { .. }
            | OIDCError::InvalidPublicKey(_)
            | OIDCError::HttpClient(_) => Status::InternalServerError,
        }
    }

    /// OAuth style error code placed in the response body.
    pub fn code(&self) -> &str {
        match self {
            OIDCError::AuthStateMismatch => "state_verification_failed",
            OIDCError::AuthorizationDenied { error, .. } => error.as_str(),
            OIDCError::MissingAuthorizationCode => "invalid_request",
            OIDCError::TokenExchangeFailed(_) => "token_exchange_failed",
            OIDCError::TokenInvalid { .. } => "invalid_token",
            _ => "server_error",
        }
    }
}

impl<'r> response::Responder<'r, 'static> for OIDCError {
    fn respond_to(self, _request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            tracing::error!(error = %self, "request failed");
        }

        let body = json!({
            "error": self.code(),
            "error_description": self.to_string(),
        })
        .to_string();

        response::Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

/*!
A minimal OpenID Connect relying party for keycloak, built on rocket.

The authorization code flow is driven by four routes under `/auth`, the
resulting tokens live in `HttpOnly` cookies and `/my` shows the verified
claims of the ID and access token. Tokens are checked with RS256 against the
realm's public key from the configuration, no discovery or JWKS fetching
takes place.

```rust,no_run
use rocket_oidc_rp::OIDCConfig;

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = OIDCConfig::from_env()?;
    rocket_oidc_rp::setup(rocket::build(), config)?
        .launch()
        .await?;
    Ok(())
}
```
*/
#[macro_use]
extern crate rocket;

pub mod client;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod routes;
pub mod session;
pub mod token;

#[cfg(test)]
mod sign;

use rocket::{Build, Rocket};

pub use client::{ClaimPair, Claims, OIDCClient, Validator};
pub use config::{OIDCConfig, WorkingConfig};
pub use errors::OIDCError;
pub use session::SessionState;
pub use token::TokenSet;

/// Everything the routes need, managed by rocket.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub client: OIDCClient,
    pub validator: Validator,
}

impl AuthState {
    /// Validates the configuration, parses the public key and builds the
    /// HTTP client used for the token exchange.
    pub fn from_config(config: OIDCConfig) -> Result<AuthState, OIDCError> {
        let working = WorkingConfig::try_from(config)?;
        let validator = Validator::from_config(&working)?;
        let client = OIDCClient::new(working)?;
        Ok(AuthState { client, validator })
    }
}

/// Manages the auth state and mounts the login routes at `/auth`, the index
/// and the protected page at `/`.
pub fn setup(rocket: Rocket<Build>, config: OIDCConfig) -> Result<Rocket<Build>, OIDCError> {
    let auth_state = AuthState::from_config(config)?;
    tracing::info!(
        client_id = auth_state.client.config().client_id.as_str(),
        token_endpoint = auth_state.client.config().token_url.as_str(),
        "relying party configured"
    );
    Ok(rocket
        .manage(auth_state)
        .mount("/", routes::app_routes())
        .mount("/auth", routes::get_routes()))
}

//! Token signing for tests: stands in for the keycloak realm key.
//!
//! Key pairs are generated once per test binary since 2048 bit RSA generation
//! dominates the run time otherwise.
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rand::rngs::OsRng;
use rsa::{
    RsaPrivateKey,
    pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) struct KeyPair {
    pub private_pem: String,
    pub public_pem: String,
}

pub(crate) fn generate_rsa_pkcs8_pair() -> KeyPair {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate key");

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .expect("failed to encode private key");
    let public_pem = private_key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("failed to encode public key");

    KeyPair {
        private_pem: private_pem.to_string(),
        public_pem,
    }
}

/// The key the relying party under test trusts.
pub(crate) fn test_keys() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(generate_rsa_pkcs8_pair)
}

/// A key nobody trusts, for forged signatures.
pub(crate) fn other_keys() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(generate_rsa_pkcs8_pair)
}

/// Public key body as keycloak shows it: base64 without PEM armour.
pub(crate) fn public_key_body() -> String {
    test_keys()
        .public_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect()
}

pub(crate) fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Keycloak-like claims for `aud`, expiring `expires_in` seconds from now
/// (negative for an already expired token).
pub(crate) fn claims(aud: &str, expires_in: i64) -> Value {
    let now = now();
    json!({
        "sub": "f3b1c2d4-user",
        "iss": "http://localhost:8080/realms/demo",
        "aud": aud,
        "azp": "demo-app",
        "typ": "Bearer",
        "preferred_username": "alice",
        "iat": now,
        "exp": now + expires_in,
    })
}

/// Signs claims verbatim with a PEM private key, emitting `kid` in the header.
#[derive(Clone)]
pub(crate) struct OidcSigner {
    pub key: EncodingKey,
    pub kid: String,
    pub algorithm: Algorithm,
}

impl OidcSigner {
    pub fn from_rsa_pem(pem: &str, kid: impl Into<String>) -> jsonwebtoken::errors::Result<Self> {
        Ok(Self {
            key: EncodingKey::from_rsa_pem(pem.as_bytes())?,
            kid: kid.into(),
            algorithm: Algorithm::RS256,
        })
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> jsonwebtoken::errors::Result<String> {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.key)
    }
}

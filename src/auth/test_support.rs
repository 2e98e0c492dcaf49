//! Token minting helpers shared by the gate tests.

#![cfg(test)]

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};

use crate::auth::anchor::TrustAnchor;

/// Self-signed RSA issuer certificate checked in for RS256 coverage.
pub const RSA_CERT_PEM: &str = include_str!("testdata/rsa_cert.pem");

/// PKCS#8 private key matching [`RSA_CERT_PEM`].
pub const RSA_KEY_PEM: &str = include_str!("testdata/rsa_key.pem");

/// Self-signed certificate on the secp256k1 curve, which the gate refuses.
pub const SECP256K1_CERT_PEM: &str = include_str!("testdata/secp256k1_cert.pem");

/// A credential issuer: certificate for the gate, private key for signing.
pub struct IssuerKey {
    pub cert_pem: String,
    pub key_pem: String,
    pub algorithm: Algorithm,
}

impl IssuerKey {
    /// Fresh P-256 issuer with a self-signed certificate.
    pub fn generate_ec() -> Self {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["gameon-test-issuer".to_string()]).unwrap();
        let cert = params.self_signed(&key_pair).unwrap();
        Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
            algorithm: Algorithm::ES256,
        }
    }

    /// The checked-in RSA issuer.
    pub fn rsa() -> Self {
        Self {
            cert_pem: RSA_CERT_PEM.to_string(),
            key_pem: RSA_KEY_PEM.to_string(),
            algorithm: Algorithm::RS256,
        }
    }

    pub fn anchor(&self) -> TrustAnchor {
        TrustAnchor::from_pem(&self.cert_pem).unwrap()
    }

    /// Sign arbitrary claims with this issuer's key.
    pub fn sign(&self, claims: &Value) -> String {
        let key = match self.algorithm {
            Algorithm::ES256 | Algorithm::ES384 => {
                EncodingKey::from_ec_pem(self.key_pem.as_bytes()).unwrap()
            }
            _ => EncodingKey::from_rsa_pem(self.key_pem.as_bytes()).unwrap(),
        };
        encode(&Header::new(self.algorithm), claims, &key).unwrap()
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Claims carrying every required field for player `sub`.
pub fn player_claims(sub: &str, exp: i64) -> Value {
    json!({
        "sub": sub,
        "aud": "x",
        "exp": exp,
        "iat": now(),
        "name": "n",
        "id": sub,
    })
}

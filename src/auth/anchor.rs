//! Trust anchor loading.
//!
//! The trust anchor is the public key of the credential issuer, delivered as
//! a PEM-encoded X.509 certificate. It is parsed once, on first use, and then
//! shared read-only by every validator for the lifetime of the process.

use std::fmt;
use std::sync::{Arc, OnceLock};

use jsonwebtoken::{Algorithm, DecodingKey};
use sha2::{Digest, Sha256};
use tracing::{error, info};
use x509_parser::pem::parse_x509_pem;
use x509_parser::public_key::PublicKey;

/// Named-curve OID of NIST P-256 (prime256v1).
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";

/// Named-curve OID of NIST P-384 (secp384r1).
const OID_CURVE_P384: &str = "1.3.132.0.34";

/// Public key material used to verify token signatures.
#[derive(Clone)]
pub struct TrustAnchor {
    decoding_key: DecodingKey,
    algorithms: Vec<Algorithm>,
    subject: String,
    fingerprint: String,
}

impl TrustAnchor {
    /// Parse a PEM-encoded X.509 certificate into a trust anchor.
    pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
        let (_, pem) = parse_x509_pem(pem.as_bytes())
            .map_err(|e| CertificateError::InvalidPem(e.to_string()))?;

        if pem.label != "CERTIFICATE" {
            return Err(CertificateError::InvalidPem(format!(
                "expected a CERTIFICATE block, found {}",
                pem.label
            )));
        }

        let cert = pem
            .parse_x509()
            .map_err(|e| CertificateError::InvalidCertificate(e.to_string()))?;

        let spki = cert.public_key();
        let parsed = spki
            .parsed()
            .map_err(|e| CertificateError::InvalidCertificate(e.to_string()))?;

        let (decoding_key, algorithms) = match parsed {
            PublicKey::RSA(rsa) => (
                DecodingKey::from_rsa_raw_components(rsa.modulus, rsa.exponent),
                vec![
                    Algorithm::RS256,
                    Algorithm::RS384,
                    Algorithm::RS512,
                    Algorithm::PS256,
                    Algorithm::PS384,
                    Algorithm::PS512,
                ],
            ),
            PublicKey::EC(point) => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .and_then(|p| p.as_oid().ok())
                    .map(|oid| oid.to_id_string())
                    .ok_or_else(|| {
                        CertificateError::UnsupportedKey("EC key without named curve".to_string())
                    })?;
                let algorithm = match curve.as_str() {
                    OID_CURVE_P256 => Algorithm::ES256,
                    OID_CURVE_P384 => Algorithm::ES384,
                    _ => {
                        return Err(CertificateError::UnsupportedKey(format!(
                            "EC curve {}",
                            curve
                        )));
                    }
                };
                (DecodingKey::from_ec_der(point.data()), vec![algorithm])
            }
            _ => {
                return Err(CertificateError::UnsupportedKey(
                    spki.algorithm.algorithm.to_id_string(),
                ));
            }
        };

        let mut hasher = Sha256::new();
        hasher.update(&pem.contents);
        let fingerprint = format!("{:x}", hasher.finalize());

        Ok(Self {
            decoding_key,
            algorithms,
            subject: cert.subject().to_string(),
            fingerprint,
        })
    }

    /// Key used to check token signatures.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Signature algorithms compatible with this anchor's key.
    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Whether a token header algorithm may be verified with this anchor.
    pub fn accepts(&self, algorithm: Algorithm) -> bool {
        self.algorithms.contains(&algorithm)
    }

    /// Subject distinguished name of the certificate.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Hex SHA-256 fingerprint of the certificate DER.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("subject", &self.subject)
            .field("fingerprint", &self.fingerprint)
            .field("algorithms", &self.algorithms)
            .finish()
    }
}

/// One-shot holder of the process trust anchor.
///
/// The raw certificate is fixed at construction. The first call to
/// [`TrustAnchorService::ensure_loaded`] parses it; concurrent callers block
/// until that parse finishes and then observe the same result. A parse
/// failure is remembered as well, so a bad certificate is reported rather
/// than re-parsed on every request.
pub struct TrustAnchorService {
    raw_pem: String,
    anchor: OnceLock<Result<Arc<TrustAnchor>, CertificateError>>,
}

impl TrustAnchorService {
    /// Create a service for the configured certificate. Nothing is parsed yet.
    pub fn new(raw_pem: impl Into<String>) -> Self {
        Self {
            raw_pem: raw_pem.into(),
            anchor: OnceLock::new(),
        }
    }

    /// Load the anchor if needed and return it.
    pub fn ensure_loaded(&self) -> Result<Arc<TrustAnchor>, CertificateError> {
        self.anchor
            .get_or_init(|| match TrustAnchor::from_pem(&self.raw_pem) {
                Ok(anchor) => {
                    info!(
                        subject = %anchor.subject(),
                        fingerprint = %anchor.fingerprint(),
                        algorithms = ?anchor.algorithms(),
                        "Trust anchor loaded"
                    );
                    Ok(Arc::new(anchor))
                }
                Err(e) => {
                    error!("Trust anchor could not be loaded: {}", e);
                    Err(e)
                }
            })
            .clone()
    }

    /// Load state without triggering a load: `None` if nobody asked yet.
    pub fn status(&self) -> Option<Result<Arc<TrustAnchor>, CertificateError>> {
        self.anchor.get().cloned()
    }
}

/// Errors raised while turning configured material into a trust anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// Configured text is not a PEM certificate block.
    InvalidPem(String),
    /// PEM decoded but the DER is not a valid X.509 certificate.
    InvalidCertificate(String),
    /// Certificate key type cannot verify tokens.
    UnsupportedKey(String),
}

impl fmt::Display for CertificateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPem(msg) => write!(f, "Invalid PEM certificate: {}", msg),
            Self::InvalidCertificate(msg) => write!(f, "Invalid X.509 certificate: {}", msg),
            Self::UnsupportedKey(kind) => write!(f, "Unsupported certificate key: {}", kind),
        }
    }
}

impl std::error::Error for CertificateError {}

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::auth::{
    DEFAULT_PASS_THROUGH_CLAIMS, DEFAULT_PROTECTED_MARKER, DEFAULT_TOKEN_HEADER,
    DEFAULT_TOKEN_QUERY_PARAM,
};

/// Value deployments use to mean "certificate not set".
const CERT_PLACEHOLDER: &str = "x";

/// Settings for the admission gate and the player routes behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Header carrying the token
    #[serde(default = "default_header_name")]
    pub header_name: String,
    /// Query parameter carrying the token
    #[serde(default = "default_query_param")]
    pub query_param: String,
    /// Paths containing this marker are protected
    #[serde(default = "default_protected_marker")]
    pub protected_marker: String,
    /// Claims copied onto the request identity for downstream handlers
    #[serde(default = "default_pass_through_claims")]
    pub pass_through_claims: Vec<String>,
    /// Identity allowed to act on any player record
    #[serde(default)]
    pub system_id: Option<String>,
}

fn default_header_name() -> String {
    DEFAULT_TOKEN_HEADER.to_string()
}

fn default_query_param() -> String {
    DEFAULT_TOKEN_QUERY_PARAM.to_string()
}

fn default_protected_marker() -> String {
    DEFAULT_PROTECTED_MARKER.to_string()
}

fn default_pass_through_claims() -> Vec<String> {
    DEFAULT_PASS_THROUGH_CLAIMS
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            header_name: default_header_name(),
            query_param: default_query_param(),
            protected_marker: default_protected_marker(),
            pass_through_claims: default_pass_through_claims(),
            system_id: None,
        }
    }
}

/// Undo the escaping PEM text picks up when passed through an env var.
///
/// Literal `\n` sequences become newlines and surrounding whitespace is
/// dropped.
pub fn normalize_pem(raw: &str) -> String {
    raw.replace("\\n", "\n").trim().to_string()
}

fn is_unset(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == CERT_PLACEHOLDER
}

/// Resolve the trust-anchor certificate text.
///
/// An inline value wins over a file path. The placeholder `x` counts as
/// unset, as does an empty string.
pub fn resolve_certificate_pem(
    inline: Option<&str>,
    path: Option<&Path>,
) -> anyhow::Result<String> {
    if let Some(pem) = inline.filter(|v| !is_unset(v)) {
        return Ok(normalize_pem(pem));
    }

    if let Some(path) = path {
        let raw = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Could not read certificate file {}: {}", path.display(), e)
        })?;
        if is_unset(&raw) {
            return Err(anyhow::anyhow!(
                "Certificate file {} is empty",
                path.display()
            ));
        }
        return Ok(normalize_pem(&raw));
    }

    Err(anyhow::anyhow!(
        "No trust anchor configured (set JWT_PUBLIC_CERT or JWT_PUBLIC_CERT_FILE)"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_gate_config_default() {
        let config = GateConfig::default();
        assert_eq!(config.header_name, "gameon-jwt");
        assert_eq!(config.query_param, "jwt");
        assert_eq!(config.protected_marker, "account");
        assert_eq!(config.pass_through_claims, vec!["story", "playerMode", "aud"]);
        assert!(config.system_id.is_none());
    }

    #[test]
    fn test_gate_config_deserialize_partial() {
        let config: GateConfig =
            serde_json::from_str(r#"{ "systemId": "game-on.org", "passThroughClaims": [] }"#)
                .unwrap();
        assert_eq!(config.system_id.as_deref(), Some("game-on.org"));
        assert!(config.pass_through_claims.is_empty());
        assert_eq!(config.header_name, "gameon-jwt");
    }

    #[test]
    fn test_normalize_pem_unescapes_newlines() {
        let raw = "  -----BEGIN CERTIFICATE-----\\nABC\\n-----END CERTIFICATE-----\n";
        assert_eq!(
            normalize_pem(raw),
            "-----BEGIN CERTIFICATE-----\nABC\n-----END CERTIFICATE-----"
        );
    }

    #[test]
    fn test_inline_wins_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "from-file").unwrap();

        let pem = resolve_certificate_pem(Some("inline"), Some(file.path())).unwrap();
        assert_eq!(pem, "inline");
    }

    #[test]
    fn test_placeholder_falls_back_to_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "from-file\n").unwrap();

        let pem = resolve_certificate_pem(Some("x"), Some(file.path())).unwrap();
        assert_eq!(pem, "from-file");
    }

    #[test]
    fn test_missing_configuration_is_an_error() {
        let err = resolve_certificate_pem(Some(""), None).unwrap_err();
        assert!(err.to_string().contains("JWT_PUBLIC_CERT"));
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pem");
        assert!(resolve_certificate_pem(None, Some(&missing)).is_err());
    }

    #[test]
    fn test_empty_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = resolve_certificate_pem(None, Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }
}

//! Credential extraction for HTTP requests.
//!
//! A token may arrive in a dedicated header or in a query parameter. Each
//! carrier may appear at most once: duplicate values are rejected outright,
//! even when identical, so that a proxy and the gate can never disagree about
//! which credential a request carries.

use std::fmt;

use http::HeaderMap;

use crate::types::CandidateToken;

/// Default header carrying the token.
pub const DEFAULT_TOKEN_HEADER: &str = "gameon-jwt";

/// Default query parameter carrying the token.
pub const DEFAULT_TOKEN_QUERY_PARAM: &str = "jwt";

/// Where a credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Header,
    QueryParameter,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::QueryParameter => write!(f, "query parameter"),
        }
    }
}

/// A request supplied more than one value for a credential carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbiguousSource {
    pub source: CredentialSource,
    pub count: usize,
}

impl fmt::Display for AmbiguousSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ambiguous credential: {} values supplied in {}",
            self.count, self.source
        )
    }
}

impl std::error::Error for AmbiguousSource {}

/// Pick at most one candidate token from the header and query values.
///
/// Rules, in order:
/// 1. more than one header value is ambiguous
/// 2. more than one query value is ambiguous
/// 3. a non-empty header value wins
/// 4. otherwise a non-empty query value
/// 5. otherwise the request is anonymous
pub fn select<H, Q>(
    header_values: &[H],
    query_values: &[Q],
) -> Result<Option<CandidateToken>, AmbiguousSource>
where
    H: AsRef<str>,
    Q: AsRef<str>,
{
    if header_values.len() > 1 {
        return Err(AmbiguousSource {
            source: CredentialSource::Header,
            count: header_values.len(),
        });
    }
    if query_values.len() > 1 {
        return Err(AmbiguousSource {
            source: CredentialSource::QueryParameter,
            count: query_values.len(),
        });
    }

    let header = header_values.first().map(AsRef::as_ref);
    let query = query_values.first().map(AsRef::as_ref);

    let token = header
        .filter(|v| !v.is_empty())
        .or_else(|| query.filter(|v| !v.is_empty()))
        .map(CandidateToken::new);

    Ok(token)
}

/// Collect every value of `name` in the header map.
///
/// Values that are not valid UTF-8 are kept (lossily converted) so that they
/// still count towards the duplicate check and later fail verification.
pub fn header_values(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect()
}

/// Collect every decoded value of parameter `name` in a raw query string.
pub fn query_values(query: Option<&str>, name: &str) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };

    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .collect()
}

/// Extracts the candidate token from request parts using configured names.
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    header_name: String,
    query_param: String,
}

impl Default for TokenExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_HEADER, DEFAULT_TOKEN_QUERY_PARAM)
    }
}

impl TokenExtractor {
    pub fn new(header_name: impl Into<String>, query_param: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
            query_param: query_param.into(),
        }
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn query_param(&self) -> &str {
        &self.query_param
    }

    /// Select the candidate token for a request.
    pub fn extract(
        &self,
        headers: &HeaderMap,
        query: Option<&str>,
    ) -> Result<Option<CandidateToken>, AmbiguousSource> {
        let headers = header_values(headers, &self.header_name);
        let params = query_values(query, &self.query_param);
        select(&headers, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    const NONE: &[&str] = &[];

    fn selected(header: &[&str], query: &[&str]) -> Option<String> {
        select(header, query)
            .unwrap()
            .map(|t| t.as_str().to_string())
    }

    #[test]
    fn test_no_sources_is_anonymous() {
        assert_eq!(selected(NONE, NONE), None);
    }

    #[test]
    fn test_single_header_is_selected() {
        assert_eq!(selected(&["h"], NONE), Some("h".to_string()));
    }

    #[test]
    fn test_single_query_is_selected() {
        assert_eq!(selected(NONE, &["q"]), Some("q".to_string()));
    }

    #[test]
    fn test_header_wins_over_query() {
        assert_eq!(selected(&["h"], &["q"]), Some("h".to_string()));
    }

    #[test]
    fn test_empty_header_falls_back_to_query() {
        assert_eq!(selected(&[""], &["q"]), Some("q".to_string()));
    }

    #[test]
    fn test_both_empty_is_anonymous() {
        assert_eq!(selected(&[""], &[""]), None);
    }

    #[test]
    fn test_duplicate_headers_are_ambiguous_even_if_identical() {
        let err = select(&["same", "same"], NONE).unwrap_err();
        assert_eq!(err.source, CredentialSource::Header);
        assert_eq!(err.count, 2);
    }

    #[test]
    fn test_duplicate_query_values_are_ambiguous_even_with_a_header() {
        let err = select(&["h"], &["q", "q"]).unwrap_err();
        assert_eq!(err.source, CredentialSource::QueryParameter);
    }

    #[test]
    fn test_duplicate_empty_headers_are_still_ambiguous() {
        assert!(select(&["", ""], &["q"]).is_err());
    }

    #[test]
    fn test_header_values_collects_all_occurrences() {
        let mut headers = HeaderMap::new();
        headers.append("gameon-jwt", HeaderValue::from_static("a"));
        headers.append("gameon-jwt", HeaderValue::from_static("b"));
        headers.append("other", HeaderValue::from_static("c"));

        assert_eq!(header_values(&headers, "gameon-jwt"), vec!["a", "b"]);
        assert!(header_values(&headers, "missing").is_empty());
    }

    #[test]
    fn test_query_values_decodes_and_filters() {
        let values = query_values(Some("jwt=a%2Bb&x=1&jwt=c"), "jwt");
        assert_eq!(values, vec!["a+b", "c"]);
        assert!(query_values(None, "jwt").is_empty());
        assert!(query_values(Some(""), "jwt").is_empty());
    }

    #[test]
    fn test_extractor_uses_configured_names() {
        let extractor = TokenExtractor::new("x-token", "token");
        let mut headers = HeaderMap::new();
        headers.insert("gameon-jwt", HeaderValue::from_static("ignored"));

        let token = extractor.extract(&headers, Some("token=t1")).unwrap();
        assert_eq!(token.unwrap().as_str(), "t1");
    }

    #[test]
    fn test_extractor_rejects_duplicate_params() {
        let extractor = TokenExtractor::default();
        let err = extractor
            .extract(&HeaderMap::new(), Some("jwt=a&jwt=a"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Ambiguous credential: 2 values supplied in query parameter"
        );
    }
}

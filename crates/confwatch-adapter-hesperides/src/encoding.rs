//! Wire encodings used by the Hesperides REST API.
//!
//! - Property paths use `#` as separator where callers use `/`
//! - Query values and path segments are percent-encoded
//! - Credentials travel as an HTTP basic `Authorization` header

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except the RFC 3986 unreserved characters.
const COMPONENT_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Rewrite a slash-delimited prefix into a Hesperides property path.
///
/// # Examples
///
/// ```
/// use confwatch_adapter_hesperides::properties_path;
///
/// assert_eq!(properties_path("a/b"), "a#b");
/// assert_eq!(properties_path("/module/1.0/"), "#module#1.0#");
/// ```
#[must_use]
pub fn properties_path(prefix: &str) -> String {
    prefix.replace('/', "#")
}

/// Percent-encode a query value or path segment.
///
/// # Examples
///
/// ```
/// use confwatch_adapter_hesperides::query_escape;
///
/// assert_eq!(query_escape("a#b"), "a%23b");
/// assert_eq!(query_escape("my-app_1.0~rc"), "my-app_1.0~rc");
/// ```
#[must_use]
pub fn query_escape(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT_ESCAPE).to_string()
}

/// Build the `Authorization` header value for basic authentication.
///
/// # Examples
///
/// ```
/// use confwatch_adapter_hesperides::basic_auth;
///
/// assert_eq!(basic_auth("user", "secret"), "Basic dXNlcjpzZWNyZXQ=");
/// ```
#[must_use]
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_path_replaces_every_slash() {
        assert_eq!(properties_path("a/b/c"), "a#b#c");
        assert_eq!(properties_path("plain"), "plain");
        assert_eq!(properties_path(""), "");
    }

    #[test]
    fn query_escape_encodes_separator() {
        assert_eq!(query_escape(&properties_path("a/b")), "a%23b");
    }

    #[test]
    fn query_escape_reserved_chars() {
        assert_eq!(query_escape("a b"), "a%20b");
        assert_eq!(query_escape("a&b=c"), "a%26b%3Dc");
        assert_eq!(query_escape("a/b?c"), "a%2Fb%3Fc");
        assert_eq!(query_escape("é"), "%C3%A9");
    }

    #[test]
    fn basic_auth_keeps_colons_in_password() {
        assert_eq!(basic_auth("admin", "p@ss:word"), "Basic YWRtaW46cEBzczp3b3Jk");
    }
}

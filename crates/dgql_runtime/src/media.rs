//! Response media type negotiation.

use std::borrow::Cow;
use std::fmt;

/// A `type/subtype` media type, without parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(Cow<'static, str>);

impl MediaType {
    pub const APPLICATION_GRAPHQL_RESPONSE_JSON: MediaType =
        MediaType(Cow::Borrowed("application/graphql-response+json"));
    pub const APPLICATION_JSON: MediaType = MediaType(Cow::Borrowed("application/json"));
    /// Legacy GraphQL media type, still sent by some clients.
    pub const APPLICATION_GRAPHQL: MediaType = MediaType(Cow::Borrowed("application/graphql"));

    /// Parses a single media range. Parameters (`q`, `charset`, ...) are
    /// dropped and the essence is lowercased.
    pub fn parse(value: &str) -> Option<Self> {
        let essence = value.split(';').next()?.trim();
        let (ty, subtype) = essence.split_once('/')?;
        if !is_token(ty) || !is_token(subtype) {
            return None;
        }
        Some(Self(Cow::Owned(essence.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Media types a simple result can be sent as, in server preference order.
pub const SUPPORTED_MEDIA_TYPES: [MediaType; 3] = [
    MediaType::APPLICATION_GRAPHQL_RESPONSE_JSON,
    MediaType::APPLICATION_JSON,
    MediaType::APPLICATION_GRAPHQL,
];

/// Parses an `Accept` header into media types, keeping header order.
/// Malformed entries are skipped.
pub fn parse_accept(header: &str) -> Vec<MediaType> {
    header.split(',').filter_map(MediaType::parse).collect()
}

/// Picks the first accepted media type the server supports, or
/// `application/json` if there is none.
pub fn negotiate(accepted: &[MediaType], supported: &[MediaType]) -> MediaType {
    accepted
        .iter()
        .find(|media_type| supported.contains(media_type))
        .cloned()
        .unwrap_or(MediaType::APPLICATION_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_preserves_client_order() {
        let accepted = parse_accept("text/html, application/json");
        let supported = [
            MediaType::APPLICATION_JSON,
            MediaType::APPLICATION_GRAPHQL_RESPONSE_JSON,
        ];
        assert_eq!(negotiate(&accepted, &supported), MediaType::APPLICATION_JSON);

        let accepted = parse_accept("application/json, application/graphql-response+json");
        assert_eq!(
            negotiate(&accepted, &SUPPORTED_MEDIA_TYPES),
            MediaType::APPLICATION_JSON
        );
    }

    #[test]
    fn test_negotiate_ignores_parameters_and_case() {
        let accepted = parse_accept("Application/GraphQL-Response+JSON;charset=utf-8;q=0.9");
        assert_eq!(
            negotiate(&accepted, &SUPPORTED_MEDIA_TYPES),
            MediaType::APPLICATION_GRAPHQL_RESPONSE_JSON
        );
    }

    #[test]
    fn test_negotiate_defaults_to_json() {
        assert_eq!(
            negotiate(&[], &SUPPORTED_MEDIA_TYPES),
            MediaType::APPLICATION_JSON
        );
        assert_eq!(
            negotiate(&parse_accept("*/*, text/plain"), &SUPPORTED_MEDIA_TYPES),
            MediaType::APPLICATION_JSON
        );
    }

    #[test]
    fn test_legacy_graphql_type() {
        assert_eq!(
            negotiate(&parse_accept("application/graphql"), &SUPPORTED_MEDIA_TYPES),
            MediaType::APPLICATION_GRAPHQL
        );
    }

    #[test]
    fn test_parse_skips_malformed_entries() {
        let parsed = parse_accept("garbage, , text/, application/json");
        assert_eq!(parsed, vec![MediaType::APPLICATION_JSON]);
    }
}

//! Request extractors for caller identity and conditional headers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderName},
};
use trackwise_core::ExpectedVersion;

use crate::error::ApiError;

/// Header carrying the authenticated subject, set by the fronting identity
/// provider.
pub const SUBJECT_HEADER: &str = "x-subject-id";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Subject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SUBJECT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Subject(value.to_string()))
            .ok_or_else(|| ApiError::unauthorized("Missing caller identity"))
    }
}

/// Parsed `If-Match` header, if present.
#[derive(Debug, Clone, Default)]
pub struct IfMatch(pub Option<ExpectedVersion>);

/// Parsed `If-None-Match` header, if present. Weak tags are kept.
#[derive(Debug, Clone, Default)]
pub struct IfNoneMatch(pub Option<ExpectedVersion>);

fn conditional(
    headers: &HeaderMap,
    name: HeaderName,
    parse: fn(&str) -> Option<ExpectedVersion>,
) -> Result<Option<ExpectedVersion>, ApiError> {
    match headers.get(&name) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| ApiError::invalid_input(format!("{} is not valid text", name)))?;
            Ok(parse(raw))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for IfMatch
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        conditional(&parts.headers, header::IF_MATCH, ExpectedVersion::parse).map(IfMatch)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for IfNoneMatch
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        conditional(&parts.headers, header::IF_NONE_MATCH, ExpectedVersion::parse_weak)
            .map(IfNoneMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use trackwise_core::VersionTag;

    async fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn test_subject_required() {
        let mut p = parts(&[]).await;
        let err = Subject::from_request_parts(&mut p, &()).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Unauthorized);

        let mut p = parts(&[(SUBJECT_HEADER, " o1 ")]).await;
        let subject = Subject::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(subject, Subject("o1".into()));
    }

    #[tokio::test]
    async fn test_if_match_parsing() {
        let mut p = parts(&[]).await;
        assert!(IfMatch::from_request_parts(&mut p, &()).await.unwrap().0.is_none());

        let mut p = parts(&[("if-match", "\"abc\"")]).await;
        let IfMatch(expected) = IfMatch::from_request_parts(&mut p, &()).await.unwrap();
        let expected = expected.unwrap();
        assert!(expected.admits(&VersionTag::from_client("\"abc\"")));
        assert!(!expected.admits(&VersionTag::from_client("\"abd\"")));

        let mut p = parts(&[("if-none-match", "*")]).await;
        let IfNoneMatch(expected) = IfNoneMatch::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(expected, Some(ExpectedVersion::Any));
    }

    #[tokio::test]
    async fn test_weak_tags_only_count_for_reads() {
        let tag = VersionTag::from_client("\"abc\"");

        let mut p = parts(&[("if-none-match", "W/\"abc\"")]).await;
        let IfNoneMatch(expected) = IfNoneMatch::from_request_parts(&mut p, &()).await.unwrap();
        assert!(expected.unwrap().admits(&tag));

        let mut p = parts(&[("if-match", "W/\"abc\"")]).await;
        let IfMatch(expected) = IfMatch::from_request_parts(&mut p, &()).await.unwrap();
        assert!(!expected.unwrap().admits(&tag));
    }
}

//! Purpose: Resolve authenticated sessions from request headers.
//! Exports: `Session`, `User`, `SessionResolver`, `TokenSessions`.
//! Role: Pluggable auth seam; the endpoint never inspects headers itself.
//! Invariants: An absent or unknown credential is `Ok(None)`, never an error.
//! Invariants: Resolver errors are reserved for broken lookups, not bad tokens.

use crate::core::error::{Error, ErrorKind};
use axum::http::HeaderMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct User {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub user: User,
}

pub trait SessionResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>, Error>;
}

/// Bearer-token session table loaded from a JSON file:
/// `{ "tokens": { "<token>": { "email": "...", "name": "..." } } }`.
#[derive(Clone, Debug, Default)]
pub struct TokenSessions {
    tokens: HashMap<String, User>,
}

#[derive(Deserialize)]
struct SessionsFile {
    tokens: HashMap<String, User>,
}

impl TokenSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: impl Into<String>, user: User) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::new(map_io_error_kind(&err))
                .with_message("failed to read sessions file")
                .with_path(path)
                .with_source(err)
        })?;
        let file: SessionsFile = serde_json::from_str(&raw).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid sessions file json")
                .with_path(path)
                .with_source(err)
        })?;
        Ok(Self {
            tokens: file.tokens,
        })
    }
}

impl SessionResolver for TokenSessions {
    fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>, Error> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };
        Ok(self
            .tokens
            .get(token)
            .map(|user| Session { user: user.clone() }))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn map_io_error_kind(err: &std::io::Error) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound,
        std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionResolver, TokenSessions, User, bearer_token};
    use axum::http::{HeaderMap, HeaderValue};

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).expect("header value"),
        );
        headers
    }

    fn user(email: Option<&str>) -> User {
        User {
            email: email.map(str::to_string),
            name: None,
        }
    }

    #[test]
    fn bearer_token_requires_scheme_prefix() {
        assert_eq!(
            bearer_token(&headers_with_auth("Bearer abc")),
            Some("abc")
        );
        assert_eq!(bearer_token(&headers_with_auth("Basic abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn known_token_resolves_session() {
        let sessions = TokenSessions::new().with_user("abc", user(Some("alice@example.com")));
        let session = sessions
            .resolve(&headers_with_auth("Bearer abc"))
            .expect("resolve")
            .expect("session");
        assert_eq!(session.user.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn unknown_token_is_no_session_not_error() {
        let sessions = TokenSessions::new();
        let resolved = sessions
            .resolve(&headers_with_auth("Bearer nope"))
            .expect("resolve");
        assert!(resolved.is_none());
    }

    #[test]
    fn token_without_email_resolves_emailless_session() {
        let sessions = TokenSessions::new().with_user("svc", user(None));
        let session = sessions
            .resolve(&headers_with_auth("Bearer svc"))
            .expect("resolve")
            .expect("session");
        assert!(session.user.email.is_none());
    }

    #[test]
    fn from_file_parses_token_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        std::fs::write(
            &path,
            r#"{ "tokens": { "abc": { "email": "alice@example.com", "name": "Alice" } } }"#,
        )
        .expect("write");

        let sessions = TokenSessions::from_file(&path).expect("sessions");
        let session = sessions
            .resolve(&headers_with_auth("Bearer abc"))
            .expect("resolve")
            .expect("session");
        assert_eq!(session.user.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn from_file_rejects_malformed_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{ not json").expect("write");

        let err = TokenSessions::from_file(&path).expect_err("err");
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Usage);
    }
}

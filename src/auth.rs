//! Request authentication for mutating and per-user API routes.
//!
//! A request is authorized either by presenting the configured edit token
//! (scripts and automation) or a backend session token (signed-in users).
//! Rejections are returned as [`AuthFailure`] values, never as errors.

use std::fmt;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};

use crate::errors::BackendError;

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Anything that can resolve a session token to a user.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// `Ok(None)` means the token was rejected.
    async fn verify_session(&self, token: &str) -> Result<Option<SessionUser>, BackendError>;
}

#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub allowed_emails: Vec<String>,
    pub allowed_user_ids: Vec<String>,
    pub require_auth: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            allowed_emails: Vec::new(),
            allowed_user_ids: Vec::new(),
            require_auth: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthIdentity {
    /// Caller presented the edit token.
    Service,
    Anonymous,
    User { id: String, email: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    ServerMisconfigured,
    NoToken,
    InvalidToken,
    EmailNotAllowed,
    UserNotAllowed,
    VerificationFailed,
    /// Authorized, but the route needs a signed-in user.
    UserRequired,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            AuthFailure::ServerMisconfigured => "Server is not configured for authentication",
            AuthFailure::NoToken => "No authorization token provided",
            AuthFailure::InvalidToken => "Invalid or expired session token",
            AuthFailure::EmailNotAllowed => "User email not authorized",
            AuthFailure::UserNotAllowed => "User not authorized",
            AuthFailure::VerificationFailed => "Failed to verify authentication",
            AuthFailure::UserRequired => "Authentication required",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authorized(AuthIdentity),
    Denied(AuthFailure),
}

impl AuthOutcome {
    /// The signed-in user, or the reason there is none.
    pub fn require_user(self) -> Result<(String, Option<String>), AuthFailure> {
        match self {
            AuthOutcome::Authorized(AuthIdentity::User { id, email }) => Ok((id, email)),
            AuthOutcome::Authorized(_) => Err(AuthFailure::UserRequired),
            AuthOutcome::Denied(failure) => Err(failure),
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`. The scheme is
/// matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, rest) = value.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then(|| token.to_string())
}

pub async fn authenticate_request<V>(
    headers: &HeaderMap,
    options: &AuthOptions,
    edit_token: Option<&str>,
    verifier: Option<&V>,
) -> AuthOutcome
where
    V: SessionVerifier + ?Sized,
{
    let provided = bearer_token(headers);

    if let (Some(expected), Some(token)) = (edit_token, provided.as_deref())
        && !expected.is_empty()
        && token == expected
    {
        return AuthOutcome::Authorized(AuthIdentity::Service);
    }

    let Some(verifier) = verifier else {
        return AuthOutcome::Denied(AuthFailure::ServerMisconfigured);
    };

    let Some(token) = provided else {
        return if options.require_auth {
            AuthOutcome::Denied(AuthFailure::NoToken)
        } else {
            AuthOutcome::Authorized(AuthIdentity::Anonymous)
        };
    };

    let user = match verifier.verify_session(&token).await {
        Ok(Some(user)) => user,
        Ok(None) => return AuthOutcome::Denied(AuthFailure::InvalidToken),
        Err(e) => {
            tracing::error!("Auth verification error: {}", e);
            return AuthOutcome::Denied(AuthFailure::VerificationFailed);
        }
    };

    if !options.allowed_emails.is_empty() {
        let email = user.email.as_deref().map(str::to_lowercase);
        let allowed = email.is_some_and(|email| {
            options
                .allowed_emails
                .iter()
                .any(|candidate| candidate.to_lowercase() == email)
        });
        if !allowed {
            return AuthOutcome::Denied(AuthFailure::EmailNotAllowed);
        }
    }

    if !options.allowed_user_ids.is_empty() && !options.allowed_user_ids.contains(&user.id) {
        return AuthOutcome::Denied(AuthFailure::UserNotAllowed);
    }

    AuthOutcome::Authorized(AuthIdentity::User {
        id: user.id,
        email: user.email,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    struct FakeVerifier;

    #[async_trait]
    impl SessionVerifier for FakeVerifier {
        async fn verify_session(&self, token: &str) -> Result<Option<SessionUser>, BackendError> {
            match token {
                "good" => Ok(Some(SessionUser {
                    id: "user-1".into(),
                    email: Some("Cook@Example.com".into()),
                })),
                "boom" => Err(BackendError::Status {
                    status: 502,
                    body: "bad gateway".into(),
                }),
                _ => Ok(None),
            }
        }
    }

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    async fn run(headers: &HeaderMap, options: &AuthOptions) -> AuthOutcome {
        authenticate_request(headers, options, Some("edit-secret"), Some(&FakeVerifier)).await
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc".into()));
        assert_eq!(bearer_token(&headers("bearer   abc  ")), Some("abc".into()));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_edit_token_wins_even_without_backend() {
        let outcome = authenticate_request::<FakeVerifier>(
            &headers("Bearer edit-secret"),
            &AuthOptions::default(),
            Some("edit-secret"),
            None,
        )
        .await;
        assert_eq!(outcome, AuthOutcome::Authorized(AuthIdentity::Service));
    }

    #[tokio::test]
    async fn test_missing_backend_is_misconfiguration() {
        let outcome = authenticate_request::<FakeVerifier>(
            &headers("Bearer good"),
            &AuthOptions::default(),
            None,
            None,
        )
        .await;
        assert_eq!(outcome, AuthOutcome::Denied(AuthFailure::ServerMisconfigured));
    }

    #[tokio::test]
    async fn test_no_token_respects_require_auth() {
        let empty = HeaderMap::new();
        assert_eq!(
            run(&empty, &AuthOptions::default()).await,
            AuthOutcome::Denied(AuthFailure::NoToken)
        );
        let optional = AuthOptions {
            require_auth: false,
            ..Default::default()
        };
        assert_eq!(
            run(&empty, &optional).await,
            AuthOutcome::Authorized(AuthIdentity::Anonymous)
        );
    }

    #[tokio::test]
    async fn test_session_verification_outcomes() {
        let options = AuthOptions::default();
        assert_eq!(
            run(&headers("Bearer nope"), &options).await,
            AuthOutcome::Denied(AuthFailure::InvalidToken)
        );
        assert_eq!(
            run(&headers("Bearer boom"), &options).await,
            AuthOutcome::Denied(AuthFailure::VerificationFailed)
        );
        let (id, email) = run(&headers("Bearer good"), &options)
            .await
            .require_user()
            .unwrap();
        assert_eq!(id, "user-1");
        assert_eq!(email.as_deref(), Some("Cook@Example.com"));
    }

    #[tokio::test]
    async fn test_allow_lists() {
        let by_email = AuthOptions {
            allowed_emails: vec!["cook@example.COM".into()],
            ..Default::default()
        };
        assert!(matches!(
            run(&headers("Bearer good"), &by_email).await,
            AuthOutcome::Authorized(AuthIdentity::User { .. })
        ));

        let wrong_email = AuthOptions {
            allowed_emails: vec!["chef@example.com".into()],
            ..Default::default()
        };
        assert_eq!(
            run(&headers("Bearer good"), &wrong_email).await,
            AuthOutcome::Denied(AuthFailure::EmailNotAllowed)
        );

        let wrong_id = AuthOptions {
            allowed_user_ids: vec!["user-2".into()],
            ..Default::default()
        };
        assert_eq!(
            run(&headers("Bearer good"), &wrong_id).await,
            AuthOutcome::Denied(AuthFailure::UserNotAllowed)
        );
    }

    #[test]
    fn test_service_identity_is_not_a_user() {
        let outcome = AuthOutcome::Authorized(AuthIdentity::Service);
        assert_eq!(outcome.require_user(), Err(AuthFailure::UserRequired));
        assert_eq!(
            AuthFailure::NoToken.to_string(),
            "No authorization token provided"
        );
    }
}

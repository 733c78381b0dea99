//! Authentication facade
//!
//! Staff and patients sign in with their hospital ID number; identifiers
//! without an '@' are rewritten to a synthetic address on the fixed auth
//! domain before being sent to the backend. Everything else is a direct
//! forward to the hosted auth API: the session lives in memory, and every
//! change to it is published on a watch channel so the UI layer can react
//! without polling.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::errors::FlowError;
use crate::logger::{self, LogTag};
use crate::models::{NewUserProfile, Role, UserProfile};
use crate::supabase::query::Query;
use crate::supabase::SupabaseClient;

const PROFILES_TABLE: &str = "user_profiles";

// =============================================================================
// TYPES
// =============================================================================

/// Authenticated user as reported by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Access session returned by the password grant
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

/// Result of a successful sign-in: the session plus the profile row
/// (profile resolution failure degrades to `None`, it never blocks sign-in)
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub user: AuthUser,
    pub session: Session,
    pub profile: Option<UserProfile>,
}

/// Registration payload (admin operation)
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Hospital ID number; doubles as the email local part
    pub id_number: String,
    pub password: String,
    /// Explicit email; defaults to the normalized identifier
    pub email: Option<String>,
    pub full_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SignUpResponse {
    // Some deployments return the user at the top level, others nested
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

// =============================================================================
// IDENTIFIER NORMALIZATION
// =============================================================================

/// Rewrite an identifier lacking an '@' into `<identifier>@<domain>`;
/// identifiers that already carry an '@' pass through unchanged.
pub fn normalize_identifier(identifier: &str, domain: &str) -> String {
    if identifier.contains('@') {
        identifier.to_string()
    } else {
        format!("{}@{}", identifier, domain)
    }
}

// =============================================================================
// FACADE
// =============================================================================

pub struct AuthService {
    client: Arc<SupabaseClient>,
    email_domain: String,
    session: RwLock<Option<Session>>,
    session_tx: watch::Sender<Option<Session>>,
}

impl AuthService {
    pub fn new(client: Arc<SupabaseClient>, email_domain: impl Into<String>) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            client,
            email_domain: email_domain.into(),
            session: RwLock::new(None),
            session_tx,
        }
    }

    fn normalize(&self, identifier: &str) -> String {
        normalize_identifier(identifier, &self.email_domain)
    }

    /// Sign in with an ID number (or full email) and password
    pub async fn sign_in(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<SignInOutcome, FlowError> {
        let email = self.normalize(identifier);
        let body = json!({ "email": email, "password": password });

        let session: Session = self
            .client
            .auth_post("token?grant_type=password", &body, None)
            .await
            .map_err(|e| {
                logger::error(LogTag::Auth, &format!("Sign in failed: {}", e));
                e
            })?;

        self.client
            .set_access_token(Some(session.access_token.clone()))
            .await;

        // Role/department resolution; absence is not a sign-in failure
        let profile = match self.fetch_profile(&session.user.id).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                logger::warning(LogTag::Auth, &format!("Profile fetch failed: {}", e));
                None
            }
        };

        self.store_session(Some(session.clone())).await;
        logger::info(
            LogTag::Auth,
            &format!("Signed in user {}", session.user.id),
        );

        Ok(SignInOutcome {
            user: session.user.clone(),
            session,
            profile,
        })
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, FlowError> {
        let query = Query::table(PROFILES_TABLE).eq("user_id", user_id);
        self.client.select_single(&query).await
    }

    /// Sign out and clear the in-memory session
    pub async fn sign_out(&self) -> Result<(), FlowError> {
        let had_session = self.session.read().await.is_some();
        if had_session {
            self.client
                .auth_post_empty("logout", &json!({}), None)
                .await
                .map_err(|e| {
                    logger::error(LogTag::Auth, &format!("Sign out failed: {}", e));
                    e
                })?;
        }

        self.client.set_access_token(None).await;
        self.store_session(None).await;
        logger::info(LogTag::Auth, "Signed out");
        Ok(())
    }

    /// Create an auth identity plus its profile row (admin operation)
    pub async fn register(&self, new_user: &NewUser) -> Result<AuthUser, FlowError> {
        let email = new_user
            .email
            .clone()
            .unwrap_or_else(|| self.normalize(&new_user.id_number));
        let body = json!({
            "email": email,
            "password": new_user.password,
            "data": {
                "id_number": new_user.id_number,
                "full_name": new_user.full_name,
                "role": new_user.role,
            },
        });

        let response: SignUpResponse = self
            .client
            .auth_post("signup", &body, None)
            .await
            .map_err(|e| {
                logger::error(LogTag::Auth, &format!("Registration failed: {}", e));
                e
            })?;

        let user = match response.user {
            Some(user) => user,
            None => AuthUser {
                id: response.id.ok_or_else(|| {
                    FlowError::parse("signup response carried no user id")
                })?,
                email: response.email,
                user_metadata: serde_json::Value::Null,
            },
        };

        let profile = NewUserProfile {
            user_id: user.id.clone(),
            id_number: new_user.id_number.clone(),
            full_name: new_user.full_name.clone(),
            role: new_user.role,
            department: new_user.department.clone(),
            phone: new_user.phone.clone(),
            created_at: chrono::Utc::now(),
        };
        let _: UserProfile = self
            .client
            .insert(PROFILES_TABLE, &profile)
            .await
            .map_err(|e| {
                logger::error(LogTag::Auth, &format!("Profile creation failed: {}", e));
                e
            })?;

        logger::info(LogTag::Auth, &format!("Registered user {}", user.id));
        Ok(user)
    }

    /// Validate a persisted access token on startup and adopt its session.
    /// An invalid or expired token yields `Ok(None)`, not an error.
    pub async fn restore_session(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthUser>, FlowError> {
        let user: AuthUser = match self.client.auth_get("user", access_token).await {
            Ok(user) => user,
            Err(FlowError::Auth { message }) => {
                logger::debug(
                    LogTag::Auth,
                    &format!("Stored session rejected: {}", message),
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.client
            .set_access_token(Some(access_token.to_string()))
            .await;
        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_in: None,
            user: user.clone(),
        };
        self.store_session(Some(session)).await;
        Ok(Some(user))
    }

    /// Request a password-reset email
    pub async fn reset_password(&self, email: &str) -> Result<(), FlowError> {
        self.client
            .auth_post_empty("recover", &json!({ "email": email }), None)
            .await
            .map_err(|e| {
                logger::error(LogTag::Auth, &format!("Password reset failed: {}", e));
                e
            })
    }

    /// Change the signed-in user's password
    pub async fn update_password(&self, new_password: &str) -> Result<(), FlowError> {
        let token = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => return Err(FlowError::auth("not signed in")),
        };
        let _: AuthUser = self
            .client
            .auth_put("user", &json!({ "password": new_password }), Some(&token))
            .await
            .map_err(|e| {
                logger::error(LogTag::Auth, &format!("Password update failed: {}", e));
                e
            })?;
        Ok(())
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<AuthUser> {
        self.session.read().await.as_ref().map(|s| s.user.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Passive session-change feed: receives every sign-in, sign-out and
    /// restore as it happens
    pub fn watch_session(&self) -> watch::Receiver<Option<Session>> {
        self.session_tx.subscribe()
    }

    async fn store_session(&self, session: Option<Session>) {
        *self.session.write().await = session.clone();
        self.session_tx.send_replace(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;

    fn service() -> AuthService {
        let config = SupabaseConfig {
            url: "https://example.supabase.co".to_string(),
            anon_key: "public-anon-key".to_string(),
            ..Default::default()
        };
        let client = Arc::new(SupabaseClient::new(&config).unwrap());
        AuthService::new(client, "medihack.local")
    }

    #[test]
    fn test_identifier_without_at_gets_domain() {
        assert_eq!(
            normalize_identifier("12345", "medihack.local"),
            "12345@medihack.local"
        );
    }

    #[test]
    fn test_identifier_with_at_passes_through() {
        assert_eq!(
            normalize_identifier("doc@hospital.org", "medihack.local"),
            "doc@hospital.org"
        );
    }

    #[tokio::test]
    async fn test_session_watch_publishes_changes() {
        let auth = service();
        let mut feed = auth.watch_session();
        assert!(feed.borrow().is_none());
        assert!(!auth.is_authenticated().await);

        let session = Session {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_in: None,
            user: AuthUser {
                id: "u1".to_string(),
                email: None,
                user_metadata: serde_json::Value::Null,
            },
        };
        auth.store_session(Some(session)).await;

        feed.changed().await.unwrap();
        assert_eq!(
            feed.borrow().as_ref().map(|s| s.user.id.clone()),
            Some("u1".to_string())
        );
        assert!(auth.is_authenticated().await);
        assert_eq!(auth.current_user().await.unwrap().id, "u1");
    }
}

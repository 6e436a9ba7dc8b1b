//! User service
//!
//! Registration, login/logout and session authentication.
//!
//! Each user has at most one live session: login stores the freshly issued
//! token on the user row, and a presented token is only accepted while it is
//! byte-identical to the stored one. A second login is refused while a token
//! is stored, so the first device has to log out (or an operator has to run
//! `reset_sessions`) before another can log in.

use crate::db::repositories::UserRepository;
use crate::models::{CreateUserInput, User};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{TokenError, TokenService};
use anyhow::Context;
use std::sync::Arc;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 100;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 100;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Username already exists")]
    UserExists,

    /// Unknown username or wrong password; the two are not distinguished
    #[error("Invalid username/password")]
    InvalidCredentials,

    /// A session token is already stored for this user
    #[error("User is already logged in on another device")]
    SessionConflict,

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Why a presented bearer token was not accepted
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Signature, format or expiry check failed
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token's subject no longer exists
    #[error("User not found")]
    UserNotFound,

    /// The token is not the user's current session
    #[error("Session expired. Please login again.")]
    SessionSuperseded,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// User service for accounts and sessions
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: TokenService,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, tokens: TokenService) -> Self {
        Self { user_repo, tokens }
    }

    /// Register a new user.
    ///
    /// The password is hashed here, once, before the row is written.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let input = input.into_create_input();
        validate_register_input(&input)?;

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists);
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(input.username, input.email.unwrap_or_default(), password_hash);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, "User registered");
        Ok(created)
    }

    /// Log in and start the user's only session.
    ///
    /// An already-stored session is reported before the password is checked,
    /// so a correct password cannot be probed while another device is logged in.
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, UserServiceError> {
        let user = match self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to get user by username")?
        {
            Some(user) => user,
            None => {
                tracing::debug!("Login failed: unknown username");
                return Err(UserServiceError::InvalidCredentials);
            }
        };

        if user.has_active_session() {
            tracing::debug!(user_id = user.id, "Login refused: session already active");
            return Err(UserServiceError::SessionConflict);
        }

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            tracing::debug!(user_id = user.id, "Login failed: wrong password");
            return Err(UserServiceError::InvalidCredentials);
        }

        let token = self
            .tokens
            .issue(user.id, &user.username)
            .map_err(|e| anyhow::anyhow!(e))?;
        self.user_repo
            .set_token(user.id, &token)
            .await
            .context("Failed to store session")?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome {
            user: User {
                token: Some(token.clone()),
                ..user
            },
            token,
        })
    }

    /// End the user's session. Clearing an already empty session is not an error.
    pub async fn logout(&self, user_id: i64) -> Result<(), UserServiceError> {
        self.user_repo
            .clear_token(user_id)
            .await
            .context("Failed to clear session")?;

        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    /// Resolve a bearer token to its user.
    ///
    /// The token must verify, its subject must exist, and it must be the
    /// session currently stored for that subject.
    pub async fn authenticate(&self, token: &str) -> Result<User, GuardError> {
        let claims = self.tokens.validate(token).map_err(|_| GuardError::InvalidToken)?;
        let user_id = claims.user_id().map_err(|_: TokenError| GuardError::InvalidToken)?;

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to load session user")?
            .ok_or(GuardError::UserNotFound)?;

        if !user.session_matches(token) {
            return Err(GuardError::SessionSuperseded);
        }

        Ok(user)
    }

    /// Clear every stored session. Returns how many were cleared.
    pub async fn reset_sessions(&self) -> Result<u64, UserServiceError> {
        let cleared = self
            .user_repo
            .clear_all_tokens()
            .await
            .context("Failed to reset sessions")?;

        tracing::info!(cleared, "Session tokens reset");
        Ok(cleared)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn list(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list().await.context("Failed to list users")?)
    }
}

fn validate_register_input(input: &CreateUserInput) -> Result<(), UserServiceError> {
    let username_len = input.username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&username_len) {
        return Err(UserServiceError::ValidationError(format!(
            "username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }

    let password_len = input.password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&password_len) {
        return Err(UserServiceError::ValidationError(format!(
            "password must be between {} and {} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }

    if let Some(email) = &input.email {
        if !is_valid_email(email) {
            return Err(UserServiceError::ValidationError(
                "email must be a valid email address".to_string(),
            ));
        }
    }

    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

impl RegisterInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: None,
            password: password.into(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Trim the username and treat a blank email as absent
    fn into_create_input(self) -> CreateUserInput {
        CreateUserInput {
            username: self.username.trim().to_string(),
            email: self
                .email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
            password: self.password,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool);
        UserService::new(user_repo, TokenService::new("test-secret", Duration::hours(24)))
    }

    async fn register_alice(service: &UserService) -> User {
        service
            .register(RegisterInput::new("alice", "pw123456"))
            .await
            .expect("Registration should succeed")
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let service = setup_test_service().await;

        let user = register_alice(&service).await;

        assert!(user.id > 0);
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert!(verify_password("pw123456", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let service = setup_test_service().await;
        register_alice(&service).await;

        let result = service.register(RegisterInput::new("alice", "other-pass")).await;

        assert!(matches!(result, Err(UserServiceError::UserExists)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = setup_test_service().await;

        let short_name = service.register(RegisterInput::new("al", "pw123456")).await;
        let short_pass = service.register(RegisterInput::new("alice", "12345")).await;
        let bad_email = service
            .register(RegisterInput::new("alice", "pw123456").with_email("not-an-email"))
            .await;

        assert!(matches!(short_name, Err(UserServiceError::ValidationError(_))));
        assert!(matches!(short_pass, Err(UserServiceError::ValidationError(_))));
        assert!(matches!(bad_email, Err(UserServiceError::ValidationError(_))));

        let with_email = service
            .register(RegisterInput::new("alice", "pw123456").with_email("a@example.com"))
            .await
            .expect("Valid email should be accepted");
        assert_eq!(with_email.email, "a@example.com");
    }

    #[tokio::test]
    async fn test_login_success_stores_token() {
        let service = setup_test_service().await;
        let user = register_alice(&service).await;

        let outcome = service
            .login(LoginInput::new("alice", "pw123456"))
            .await
            .expect("Login should succeed");

        assert_eq!(outcome.user.id, user.id);
        let stored = service.get_by_id(user.id).await.unwrap();
        assert_eq!(stored.token.as_deref(), Some(outcome.token.as_str()));
    }

    #[tokio::test]
    async fn test_login_invalid_credentials() {
        let service = setup_test_service().await;
        register_alice(&service).await;

        let unknown = service.login(LoginInput::new("bob", "pw123456")).await;
        let wrong = service.login(LoginInput::new("alice", "wrong-password")).await;

        assert!(matches!(unknown, Err(UserServiceError::InvalidCredentials)));
        assert!(matches!(wrong, Err(UserServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_second_login_conflicts_before_password_check() {
        let service = setup_test_service().await;
        register_alice(&service).await;
        service.login(LoginInput::new("alice", "pw123456")).await.unwrap();

        let right = service.login(LoginInput::new("alice", "pw123456")).await;
        let wrong = service.login(LoginInput::new("alice", "wrong-password")).await;

        assert!(matches!(right, Err(UserServiceError::SessionConflict)));
        assert!(matches!(wrong, Err(UserServiceError::SessionConflict)));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let service = setup_test_service().await;
        let user = register_alice(&service).await;
        let outcome = service.login(LoginInput::new("alice", "pw123456")).await.unwrap();

        let authed = service
            .authenticate(&outcome.token)
            .await
            .expect("Current token should authenticate");

        assert_eq!(authed.id, user.id);
        assert!(matches!(
            service.authenticate("garbage").await,
            Err(GuardError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_supersedes_token() {
        let service = setup_test_service().await;
        register_alice(&service).await;
        let outcome = service.login(LoginInput::new("alice", "pw123456")).await.unwrap();

        service.logout(outcome.user.id).await.expect("Logout should succeed");

        assert!(service.tokens.validate(&outcome.token).is_ok());
        assert!(matches!(
            service.authenticate(&outcome.token).await,
            Err(GuardError::SessionSuperseded)
        ));
        service
            .login(LoginInput::new("alice", "pw123456"))
            .await
            .expect("Login after logout should succeed");
    }

    #[tokio::test]
    async fn test_token_for_missing_user() {
        let service = setup_test_service().await;
        let token = service.tokens.issue(999, "ghost").unwrap();

        assert!(matches!(
            service.authenticate(&token).await,
            Err(GuardError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_reset_sessions() {
        let service = setup_test_service().await;
        register_alice(&service).await;
        let outcome = service.login(LoginInput::new("alice", "pw123456")).await.unwrap();

        assert_eq!(service.reset_sessions().await.unwrap(), 1);

        assert!(matches!(
            service.authenticate(&outcome.token).await,
            Err(GuardError::SessionSuperseded)
        ));
        service
            .login(LoginInput::new("alice", "pw123456"))
            .await
            .expect("Login after reset should succeed");
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("a@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@example"));
        assert!(!is_valid_email("a@@example.com"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("plain"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;
    use proptest::prelude::*;

    async fn setup_property_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        UserService::new(
            SqlxUserRepository::boxed(pool),
            TokenService::new("test-secret", Duration::hours(24)),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// While a session is stored, login is refused whatever password is given.
        #[test]
        fn property_login_refused_while_session_active(
            password in "[a-zA-Z0-9]{6,20}",
            guess in "[a-zA-Z0-9]{0,20}"
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let service = setup_property_test_service().await;
                service.register(RegisterInput::new("alice", password.clone())).await
                    .expect("Registration should succeed");
                service.login(LoginInput::new("alice", password.clone())).await
                    .expect("First login should succeed");

                let second = service.login(LoginInput::new("alice", guess.clone())).await;
                prop_assert!(matches!(second, Err(UserServiceError::SessionConflict)));
                Ok(())
            });
            result?;
        }

        /// Across any sequence of logins and logouts, only the most recently
        /// issued token authenticates, and only while it is still stored.
        #[test]
        fn property_single_live_session(ops in prop::collection::vec(any::<bool>(), 1..8)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let service = setup_property_test_service().await;
                let user = service.register(RegisterInput::new("alice", "pw123456")).await
                    .expect("Registration should succeed");

                let mut issued: Vec<String> = Vec::new();
                let mut live: Option<String> = None;

                for login in ops {
                    if login {
                        match service.login(LoginInput::new("alice", "pw123456")).await {
                            Ok(outcome) => {
                                prop_assert!(live.is_none());
                                issued.push(outcome.token.clone());
                                live = Some(outcome.token);
                            }
                            Err(UserServiceError::SessionConflict) => prop_assert!(live.is_some()),
                            Err(e) => return Err(TestCaseError::fail(e.to_string())),
                        }
                    } else {
                        service.logout(user.id).await.expect("Logout should succeed");
                        live = None;
                    }

                    for token in &issued {
                        let accepted = service.authenticate(token).await.is_ok();
                        prop_assert_eq!(accepted, live.as_deref() == Some(token.as_str()));
                    }
                }
                Ok(())
            });
            result?;
        }
    }
}

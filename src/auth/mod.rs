//! Login state machine
//!
//! Email one-time-code login with a team selection step for new users.
//! Code delivery, verification, and profile persistence are delegated to an
//! [`AuthProvider`]; this module only decides which state comes next.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::team::Team;

/// Wrong codes allowed before the flow fails
pub const MAX_OTP_ATTEMPTS: u8 = 3;

/// Authentication errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Incorrect code, {remaining} attempts remaining")]
    WrongCode { remaining: u8 },

    #[error("Too many incorrect codes")]
    TooManyAttempts,

    #[error("Auth provider error: {0}")]
    Provider(String),
}

/// A user the provider has verified
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedUser {
    pub user_id: String,
    /// Team already on the user's profile, if any
    pub existing_team: Option<Team>,
}

/// External identity service
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn send_code(&self, email: &str) -> Result<(), AuthError>;

    /// `Ok(None)` means the code was wrong
    async fn verify_code(&self, email: &str, code: &str)
        -> Result<Option<VerifiedUser>, AuthError>;

    async fn persist_team(&self, user_id: &str, team: Team) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginState {
    AwaitingEmail,
    AwaitingOtp {
        email: String,
        attempts: u8,
    },
    AwaitingTeamSelection {
        user_id: String,
        email: String,
    },
    Authenticated {
        user_id: String,
        email: String,
        team: Team,
    },
    Failed {
        reason: String,
    },
}

impl LoginState {
    fn name(&self) -> &'static str {
        match self {
            LoginState::AwaitingEmail => "awaiting email",
            LoginState::AwaitingOtp { .. } => "awaiting code",
            LoginState::AwaitingTeamSelection { .. } => "awaiting team selection",
            LoginState::Authenticated { .. } => "authenticated",
            LoginState::Failed { .. } => "failed",
        }
    }
}

fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
        {
            Ok(email.to_lowercase())
        }
        _ => Err(AuthError::InvalidEmail(email.to_string())),
    }
}

pub struct LoginFlow<P: AuthProvider> {
    provider: P,
    state: LoginState,
}

impl<P: AuthProvider> LoginFlow<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            state: LoginState::AwaitingEmail,
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    fn invalid(&self, action: &'static str) -> AuthError {
        AuthError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }

    /// Move to `Failed` and hand back the error
    fn fail(&mut self, err: AuthError) -> AuthError {
        tracing::warn!("Login failed: {}", err);
        self.state = LoginState::Failed {
            reason: err.to_string(),
        };
        err
    }

    pub async fn submit_email(&mut self, email: &str) -> Result<&LoginState, AuthError> {
        if self.state != LoginState::AwaitingEmail {
            return Err(self.invalid("submit email"));
        }
        let email = validate_email(email)?;

        if let Err(e) = self.provider.send_code(&email).await {
            return Err(self.fail(e));
        }

        tracing::debug!("Sent login code to {}", email);
        self.state = LoginState::AwaitingOtp { email, attempts: 0 };
        Ok(&self.state)
    }

    pub async fn submit_code(&mut self, code: &str) -> Result<&LoginState, AuthError> {
        let (email, attempts) = match &self.state {
            LoginState::AwaitingOtp { email, attempts } => (email.clone(), *attempts),
            _ => return Err(self.invalid("submit code")),
        };

        let verified = match self.provider.verify_code(&email, code.trim()).await {
            Ok(verified) => verified,
            Err(e) => return Err(self.fail(e)),
        };

        match verified {
            Some(VerifiedUser {
                user_id,
                existing_team: Some(team),
            }) => {
                tracing::info!("User {} signed in to team {}", user_id, team);
                self.state = LoginState::Authenticated {
                    user_id,
                    email,
                    team,
                };
            }
            Some(VerifiedUser {
                user_id,
                existing_team: None,
            }) => {
                self.state = LoginState::AwaitingTeamSelection { user_id, email };
            }
            None => {
                let attempts = attempts + 1;
                if attempts >= MAX_OTP_ATTEMPTS {
                    return Err(self.fail(AuthError::TooManyAttempts));
                }
                self.state = LoginState::AwaitingOtp { email, attempts };
                return Err(AuthError::WrongCode {
                    remaining: MAX_OTP_ATTEMPTS - attempts,
                });
            }
        }

        Ok(&self.state)
    }

    pub async fn select_team(&mut self, team: Team) -> Result<&LoginState, AuthError> {
        let (user_id, email) = match &self.state {
            LoginState::AwaitingTeamSelection { user_id, email } => {
                (user_id.clone(), email.clone())
            }
            _ => return Err(self.invalid("select team")),
        };

        if let Err(e) = self.provider.persist_team(&user_id, team).await {
            return Err(self.fail(e));
        }

        tracing::info!("User {} joined team {}", user_id, team);
        self.state = LoginState::Authenticated {
            user_id,
            email,
            team,
        };
        Ok(&self.state)
    }

    /// Start over from any state
    pub fn reset(&mut self) -> &LoginState {
        self.state = LoginState::AwaitingEmail;
        &self.state
    }
}

//! Login flow.
//!
//! Credentials, then an optional verification code, then a redirect that
//! confirms the session. Each step waits for page state with a bounded
//! poll; the only open-ended wait is the operator typing the code.

use crate::config::{Credentials, LoginConfig};
use crate::driver::{self, Driver};
use crate::{wait, Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

/// Where the login flow is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingCredentials,
    CredentialsSubmitted,
    AwaitingChallenge,
    ChallengeSubmitted,
    AwaitingRedirect,
    Authenticated,
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::AwaitingCredentials => write!(f, "awaiting credentials"),
            SessionState::CredentialsSubmitted => write!(f, "credentials submitted"),
            SessionState::AwaitingChallenge => write!(f, "awaiting verification code"),
            SessionState::ChallengeSubmitted => write!(f, "verification code submitted"),
            SessionState::AwaitingRedirect => write!(f, "awaiting redirect"),
            SessionState::Authenticated => write!(f, "authenticated"),
            SessionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Source of the verification code when the site asks for one.
#[async_trait(?Send)]
pub trait CodePrompt {
    async fn read_code(&self, message: &str) -> Result<String>;
}

/// Asks on stderr, reads one line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

#[async_trait(?Send)]
impl CodePrompt for ConsolePrompt {
    async fn read_code(&self, message: &str) -> Result<String> {
        warn!("verification code required, waiting for operator input");
        eprint!("{}: ", message);
        std::io::stderr().flush()?;

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(line.trim().to_string())
    }
}

/// Drives one login attempt.
pub struct Authenticator<'a, D: Driver> {
    driver: &'a D,
    config: &'a LoginConfig,
    prompt: &'a dyn CodePrompt,
    state: SessionState,
    history: Vec<SessionState>,
}

impl<'a, D: Driver> Authenticator<'a, D> {
    pub fn new(driver: &'a D, config: &'a LoginConfig, prompt: &'a dyn CodePrompt) -> Self {
        Self {
            driver,
            config,
            prompt,
            state: SessionState::AwaitingCredentials,
            history: vec![SessionState::AwaitingCredentials],
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Log in. Ends in [`SessionState::Authenticated`] on success and in
    /// [`SessionState::Failed`] with the error's message otherwise.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        match self.attempt(credentials).await {
            Ok(()) => {
                self.enter(SessionState::Authenticated);
                info!("logged in as {}", credentials.username);
                Ok(())
            }
            Err(e) => {
                self.enter(SessionState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn enter(&mut self, state: SessionState) {
        debug!("login: {} -> {}", self.state, state);
        self.state = state.clone();
        self.history.push(state);
    }

    async fn attempt(&mut self, credentials: &Credentials) -> Result<()> {
        if credentials.username.is_empty() || credentials.password.is_empty() {
            return Err(Error::Config("username and password must not be empty".into()));
        }

        info!("opening login page");
        self.driver.navigate(&self.config.url).await?;

        let username = self.field("username", &self.config.username_field).await?;
        driver::fill(self.driver, &username, &credentials.username).await?;
        let password = self.field("password", &self.config.password_field).await?;
        driver::fill(self.driver, &password, &credentials.password).await?;

        self.driver.submit_key(&password).await?;
        self.enter(SessionState::CredentialsSubmitted);
        tokio::time::sleep(self.config.submit_settle()).await;

        if let Some(code_field) = self.look_for_challenge().await? {
            self.enter(SessionState::AwaitingChallenge);
            let code = self.prompt.read_code("Enter the verification code").await?;
            let code = code.trim();
            if code.is_empty() {
                return Err(Error::LoginFailed("empty verification code".into()));
            }
            driver::fill(self.driver, &code_field, code).await?;
            self.driver.submit_key(&code_field).await?;
            self.enter(SessionState::ChallengeSubmitted);
        }

        self.enter(SessionState::AwaitingRedirect);
        let prefix = &self.config.landing_prefix;
        match wait::location_prefix(self.driver, prefix, self.config.redirect_poll()).await {
            Ok(location) => {
                debug!("landed on {}", location);
                Ok(())
            }
            Err(Error::Timeout { .. }) => Err(Error::LoginNotConfirmed {
                expected: prefix.clone(),
                last_location: self.driver.current_location().await.unwrap_or_default(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn field(&self, name: &str, locator: &str) -> Result<D::Node> {
        wait::node(self.driver, locator, self.config.field_poll())
            .await
            .map_err(|e| match e {
                Error::Timeout { elapsed, .. } => Error::FieldNotFound {
                    field: name.to_string(),
                    waited: elapsed,
                },
                other => other,
            })
    }

    /// Short look for the verification-code field. Not finding it is the
    /// common case.
    async fn look_for_challenge(&self) -> Result<Option<D::Node>> {
        match wait::node(self.driver, &self.config.code_field, self.config.challenge_poll()).await
        {
            Ok(node) => Ok(Some(node)),
            Err(Error::Timeout { .. }) => {
                debug!("no verification challenge");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

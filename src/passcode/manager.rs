//! One-time passcodes proving control of a member account

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info, info_span, warn, Span};

use super::error::PasscodeError;
use super::mailer::Mailer;
use crate::cache::{Cache, CacheError};

/// Number of digits in a passcode
pub const CODE_LEN: usize = 6;

/// Longest accepted account name
pub const MAX_ACCOUNT_LEN: usize = 64;

/// Placeholder replaced by the passcode in the message template
pub const CODE_PLACEHOLDER: &str = "{code}";

const KEY_PREFIX: &str = "passcode:";

/// Passcode manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasscodeConfig {
    /// How long an issued code stays valid
    pub ttl: Duration,
    /// Mail domain appended to account names
    pub domain: String,
    /// Message body; must contain [`CODE_PLACEHOLDER`]
    pub template: String,
}

impl Default for PasscodeConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            domain: "example.edu".to_string(),
            template: "Your Cealgull verification code is {code}.".to_string(),
        }
    }
}

impl PasscodeConfig {
    pub fn validate(&self) -> Result<(), PasscodeError> {
        let mut errors = Vec::new();
        if self.ttl.as_secs() == 0 {
            errors.push("passcode TTL must be at least one second".to_string());
        }
        if self.domain.is_empty()
            || !self
                .domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            errors.push(format!("invalid account domain: {:?}", self.domain));
        }
        if !self.template.contains(CODE_PLACEHOLDER) {
            errors.push(format!("template must contain {}", CODE_PLACEHOLDER));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PasscodeError::Config(errors))
        }
    }
}

fn valid_account(account: &str) -> bool {
    !account.is_empty()
        && account.len() <= MAX_ACCOUNT_LEN
        && account
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn valid_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

/// Issues and checks single-use passcodes
pub struct PasscodeManager {
    config: PasscodeConfig,
    cache: Arc<dyn Cache>,
    mailer: Arc<dyn Mailer>,
    span: Span,
}

impl PasscodeManager {
    pub fn new(
        config: PasscodeConfig,
        cache: Arc<dyn Cache>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, PasscodeError> {
        config.validate()?;
        Ok(Self {
            config,
            cache,
            mailer,
            span: info_span!("passcode"),
        })
    }

    pub fn config(&self) -> &PasscodeConfig {
        &self.config
    }

    fn key(account: &str) -> String {
        format!("{}{}", KEY_PREFIX, account)
    }

    /// Send a fresh code to `account`.
    ///
    /// The code is stored only once delivery succeeded, so a failed send can
    /// be retried immediately.
    pub fn issue(&self, account: &str) -> Result<(), PasscodeError> {
        let _enter = self.span.enter();

        if !valid_account(account) {
            warn!("Rejected malformed account");
            return Err(PasscodeError::AccountFormat);
        }

        let key = Self::key(account);
        let live = self.cache.exists(&[key.as_str()]).map_err(|e| {
            error!(error = %e, "Passcode lookup failed");
            PasscodeError::Internal
        })?;
        if live > 0 {
            debug!(account = account, "Passcode already outstanding");
            return Err(PasscodeError::Duplicate);
        }

        let code = format!(
            "{:0width$}",
            rand::thread_rng().gen_range(0..1_000_000u32),
            width = CODE_LEN
        );
        let recipient = format!("{}@{}", account, self.config.domain);
        let body = self.config.template.replace(CODE_PLACEHOLDER, &code);

        self.mailer.send(&recipient, &body).map_err(|e| {
            error!(error = %e, "Passcode delivery failed");
            PasscodeError::Internal
        })?;

        self.cache.set(&key, &code, self.config.ttl).map_err(|e| {
            error!(error = %e, "Failed to store passcode");
            PasscodeError::Internal
        })?;

        info!(account = account, "Passcode issued");
        Ok(())
    }

    /// Check `code` against the outstanding code for `account`.
    ///
    /// The stored code is consumed by any well-formed guess.
    pub fn verify(&self, account: &str, code: &str) -> Result<(), PasscodeError> {
        let _enter = self.span.enter();

        if !valid_account(account) {
            return Err(PasscodeError::AccountFormat);
        }
        if !valid_code(code) {
            return Err(PasscodeError::CodeFormat);
        }

        let expected = self.cache.get_del(&Self::key(account)).map_err(|e| match e {
            CacheError::Key(_) => PasscodeError::NotFound,
            other => {
                error!(error = %other, "Passcode lookup failed");
                PasscodeError::Internal
            }
        })?;

        if expected == code {
            info!(account = account, "Passcode verified");
            Ok(())
        } else {
            debug!(account = account, "Passcode mismatch");
            Err(PasscodeError::Mismatch)
        }
    }
}

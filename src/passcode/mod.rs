//! Email passcodes gating credential dispatch

pub mod error;
pub mod mailer;
pub mod manager;

pub use error::{MailError, PasscodeError};
pub use mailer::{LogMailer, Mailer};
pub use manager::{PasscodeConfig, PasscodeManager};

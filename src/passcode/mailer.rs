//! Passcode delivery

use tracing::info;

use super::error::MailError;

/// Delivers a rendered passcode message to one recipient
pub trait Mailer: Send + Sync {
    fn send(&self, recipient: &str, body: &str) -> Result<(), MailError>;
}

/// Writes messages to the log instead of sending them.
///
/// The body (and with it the passcode) is only logged when `reveal_body` is
/// set, which the binary does in development mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer {
    reveal_body: bool,
}

impl LogMailer {
    pub fn new(reveal_body: bool) -> Self {
        Self { reveal_body }
    }
}

impl Mailer for LogMailer {
    fn send(&self, recipient: &str, body: &str) -> Result<(), MailError> {
        if self.reveal_body {
            info!(recipient = recipient, body = body, "Passcode delivered to log");
        } else {
            info!(recipient = recipient, "Passcode delivered to log (body withheld)");
        }
        Ok(())
    }
}

//! Notification error types.

use thiserror::Error;

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Invalid email message: {0}")]
    InvalidEmail(String),

    /// The SMS gateway rejected the credentials.
    #[error("SMS gateway authentication failed (status {status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("SMS gateway returned status {status}: {body}")]
    GatewayStatus { status: u16, body: String },

    /// The gateway answered but did not list any recipient.
    #[error("SMS gateway error: {0}")]
    NoRecipients(String),

    /// A recipient came back with a status code outside the accepted set.
    #[error("SMS failed for {number}: {status} (code: {code})")]
    Rejected {
        number: String,
        status: String,
        code: i64,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Message could not be built: {0}")]
    Message(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The channel is temporarily unreachable.
    #[error("Channel unavailable: {0}")]
    Unavailable(String),
}

impl NotificationError {
    /// Whether another attempt may succeed.
    ///
    /// Transport failures, HTTP 429/5xx and transient SMTP replies are
    /// retried. Validation failures and rejected receipts are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotificationError::Http(err) => err.is_timeout() || err.is_connect(),
            NotificationError::GatewayStatus { status, .. } => is_retryable_status(*status),
            NotificationError::Smtp(err) => err.is_transient() || err.is_timeout(),
            NotificationError::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// 429 and 5xx are worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub type Result<T> = std::result::Result<T, NotificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_status_codes() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn test_final_errors_are_not_retried() {
        assert!(!NotificationError::InvalidPhone("0712".into()).is_retryable());
        assert!(
            !NotificationError::Rejected {
                number: "+254712345678".into(),
                status: "InvalidPhoneNumber".into(),
                code: 403,
            }
            .is_retryable()
        );
        assert!(
            !NotificationError::Authentication {
                status: 401,
                body: String::new(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_transient_errors_are_retried() {
        assert!(NotificationError::Unavailable("down".into()).is_retryable());
        assert!(
            NotificationError::GatewayStatus {
                status: 502,
                body: "bad gateway".into(),
            }
            .is_retryable()
        );
    }
}

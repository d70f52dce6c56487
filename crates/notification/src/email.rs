//! Email transport port, the SMTP mailer and in-memory transports.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{NotificationError, Result};

/// An HTML email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

impl EmailMessage {
    pub fn validate(&self) -> Result<()> {
        if self.to.is_empty() {
            return Err(NotificationError::InvalidEmail(
                "recipient list cannot be empty".to_string(),
            ));
        }
        if let Some(bad) = self.to.iter().find(|a| !is_valid_email(a)) {
            return Err(NotificationError::InvalidEmail(format!(
                "invalid email address: {bad}"
            )));
        }
        if self.subject.trim().is_empty() {
            return Err(NotificationError::InvalidEmail(
                "email subject cannot be empty".to_string(),
            ));
        }
        if self.html_body.trim().is_empty() {
            return Err(NotificationError::InvalidEmail(
                "email body cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn is_valid_email(address: &str) -> bool {
    address.contains('@') && address.contains('.')
}

/// Delivers email.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// SMTP settings. The connection uses implicit TLS.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    /// Where order notifications go.
    pub admin_email: String,
    pub timeout: Duration,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 465,
            username: String::new(),
            password: String::new(),
            from_email: "orders@localhost.localdomain".to_string(),
            from_name: "POS Orders".to_string(),
            admin_email: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl EmailConfig {
    /// Reads `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`,
    /// `EMAIL_FROM`, `EMAIL_FROM_NAME` and `ADMIN_EMAIL`.
    ///
    /// Returns `Ok(None)` when `SMTP_HOST` is unset.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(smtp_host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };
        let defaults = Self::default();

        let smtp_port = match std::env::var("SMTP_PORT") {
            Ok(port) => port
                .parse()
                .map_err(|_| NotificationError::Config(format!("invalid SMTP_PORT: {port}")))?,
            Err(_) => defaults.smtp_port,
        };
        let admin_email = std::env::var("ADMIN_EMAIL").map_err(|_| {
            NotificationError::Config("ADMIN_EMAIL is required when SMTP_HOST is set".to_string())
        })?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_email: std::env::var("EMAIL_FROM").unwrap_or(defaults.from_email),
            from_name: std::env::var("EMAIL_FROM_NAME").unwrap_or(defaults.from_name),
            admin_email,
            timeout: defaults.timeout,
        }))
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.smtp_host = host.into();
        self.smtp_port = port;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_sender(mut self, email: impl Into<String>, name: impl Into<String>) -> Self {
        self.from_email = email.into();
        self.from_name = name.into();
        self
    }

    pub fn with_admin_email(mut self, admin_email: impl Into<String>) -> Self {
        self.admin_email = admin_email.into();
        self
    }
}

/// SMTP mailer over an authenticated, TLS-wrapped session.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        if config.smtp_host.is_empty() {
            return Err(NotificationError::Config("SMTP host is required".to_string()));
        }

        let from = Mailbox::new(
            Some(config.from_name.clone()),
            config
                .from_email
                .parse()
                .map_err(|e| NotificationError::Config(format!("invalid sender address: {e}")))?,
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self { transport, from })
    }
}

/// Turns an [`EmailMessage`] into a MIME message sent from `from`.
pub fn build_message(from: &Mailbox, message: &EmailMessage) -> Result<Message> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(message.subject.clone())
        .header(ContentType::TEXT_HTML);

    for address in &message.to {
        let mailbox: Mailbox = address.parse().map_err(|e| {
            NotificationError::InvalidEmail(format!("invalid email address {address}: {e}"))
        })?;
        builder = builder.to(mailbox);
    }

    builder
        .body(message.html_body.clone())
        .map_err(|e| NotificationError::Message(e.to_string()))
}

#[async_trait]
impl EmailTransport for SmtpMailer {
    #[tracing::instrument(skip(self, message), fields(subject = %message.subject))]
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        message.validate()?;
        let email = build_message(&self.from, message)?;
        self.transport.send(email).await?;
        Ok(())
    }
}

/// Transport that only logs, used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEmailTransport;

#[async_trait]
impl EmailTransport for LoggingEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        message.validate()?;
        tracing::info!(
            to = ?message.to,
            subject = %message.subject,
            "smtp not configured; email logged"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryEmailState {
    sent: Vec<EmailMessage>,
    attempts: usize,
    fail_on_send: bool,
    stall: Option<Duration>,
}

/// In-memory email transport for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmailTransport {
    state: Arc<RwLock<InMemoryEmailState>>,
}

impl InMemoryEmailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail with a retryable error.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.write().fail_on_send = fail;
    }

    pub fn set_stall(&self, stall: Option<Duration>) {
        self.write().stall = stall;
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.read().sent.clone()
    }

    pub fn attempts(&self) -> usize {
        self.read().attempts
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryEmailState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryEmailState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EmailTransport for InMemoryEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        message.validate()?;
        let stall = {
            let mut state = self.write();
            state.attempts += 1;
            state.stall
        };
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }

        let mut state = self.write();
        if state.fail_on_send {
            return Err(NotificationError::Unavailable(
                "smtp server unreachable".to_string(),
            ));
        }
        state.sent.push(message.clone());
        Ok(())
    }
}

//! SMS gateway port, the Africa's Talking client and in-memory gateways.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use crate::error::{NotificationError, Result};

/// Provider status codes that count as delivered: processed, sent, queued.
pub const ACCEPTED_STATUS_CODES: [i64; 3] = [100, 101, 102];

/// Gateway answer to a send request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    #[serde(rename = "SMSMessageData")]
    pub data: SmsMessageData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessageData {
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Recipients", default)]
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "statusCode")]
    pub status_code: i64,
    pub number: String,
    pub status: String,
    #[serde(default)]
    pub cost: String,
    #[serde(rename = "messageId", default)]
    pub message_id: String,
}

impl DeliveryReceipt {
    /// A receipt listing `number` as sent.
    pub fn sent_to(number: &str) -> Self {
        Self::with_status(number, 101, "Success")
    }

    pub fn with_status(number: &str, status_code: i64, status: &str) -> Self {
        Self {
            data: SmsMessageData {
                message: "Sent to 1/1".to_string(),
                recipients: vec![Recipient {
                    status_code,
                    number: number.to_string(),
                    status: status.to_string(),
                    cost: "KES 0.8000".to_string(),
                    message_id: format!("ATXid_{number}"),
                }],
            },
        }
    }

    /// Checks that every recipient was accepted by the provider.
    pub fn validate(&self) -> Result<()> {
        if self.data.recipients.is_empty() {
            let message = match self.data.message.as_str() {
                "" | "Sent" => "no recipients in response".to_string(),
                other => other.to_string(),
            };
            return Err(NotificationError::NoRecipients(message));
        }

        match self
            .data
            .recipients
            .iter()
            .find(|r| !ACCEPTED_STATUS_CODES.contains(&r.status_code))
        {
            Some(r) => Err(NotificationError::Rejected {
                number: r.number.clone(),
                status: r.status.clone(),
                code: r.status_code,
            }),
            None => Ok(()),
        }
    }
}

/// `+` followed by 10 to 15 digits; spaces between digits are ignored.
pub fn is_valid_phone_number(phone: &str) -> bool {
    let Some(rest) = phone.strip_prefix('+') else {
        return false;
    };
    let digits: String = rest.chars().filter(|c| *c != ' ').collect();
    (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Country code assumed for numbers written without one.
pub const DEFAULT_COUNTRY_CODE: &str = "254";

/// Rewrites a phone number into `+<country><subscriber>` form.
///
/// Spaces, dashes and parentheses are dropped. Local numbers without a `+`
/// get the default country code: ten digits with a leading `0` lose the
/// `0`, nine digits are taken as they are. The result must pass
/// [`is_valid_phone_number`].
pub fn normalize_phone_number(raw: &str) -> Result<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let normalized = if cleaned.starts_with('+') {
        cleaned
    } else if cleaned.len() == 10 && cleaned.starts_with('0') {
        format!("+{DEFAULT_COUNTRY_CODE}{}", &cleaned[1..])
    } else if cleaned.len() == 9 {
        format!("+{DEFAULT_COUNTRY_CODE}{cleaned}")
    } else {
        return Err(NotificationError::InvalidPhone(raw.to_string()));
    };

    if !is_valid_phone_number(&normalized) {
        return Err(NotificationError::InvalidPhone(raw.to_string()));
    }
    Ok(normalized)
}

/// Sends text messages.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, to: &str, message: &str) -> Result<DeliveryReceipt>;
}

/// Settings for the Africa's Talking messaging API.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub base_url: String,
    pub api_key: String,
    pub username: String,
    /// `sandbox` or `production`.
    pub env: String,
    pub timeout: Duration,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.sandbox.africastalking.com/version1/messaging".to_string(),
            api_key: String::new(),
            username: "sandbox".to_string(),
            env: "sandbox".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl SmsConfig {
    /// Reads `SMS_BASE_URL`, `SMS_API_KEY`, `SMS_USERNAME` and `SMS_ENV`.
    ///
    /// Returns `Ok(None)` when none of the first three are set and an error
    /// when only some of them are.
    pub fn from_env() -> Result<Option<Self>> {
        let base_url = std::env::var("SMS_BASE_URL").ok();
        let api_key = std::env::var("SMS_API_KEY").ok();
        let username = std::env::var("SMS_USERNAME").ok();

        match (base_url, api_key, username) {
            (None, None, None) => Ok(None),
            (Some(base_url), Some(api_key), Some(username)) => {
                let mut config = Self::default()
                    .with_base_url(base_url)
                    .with_api_key(api_key)
                    .with_username(username);
                if let Ok(env) = std::env::var("SMS_ENV") {
                    config.env = env;
                }
                Ok(Some(config))
            }
            _ => Err(NotificationError::Config(
                "SMS_BASE_URL, SMS_API_KEY and SMS_USERNAME must be set together".to_string(),
            )),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Africa's Talking messaging client.
pub struct AfricasTalkingGateway {
    client: Client,
    config: SmsConfig,
}

impl AfricasTalkingGateway {
    pub fn new(config: SmsConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(NotificationError::Config(
                "SMS base URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent("pos-backend/0.1")
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SmsConfig {
        &self.config
    }
}

#[async_trait]
impl SmsGateway for AfricasTalkingGateway {
    #[tracing::instrument(skip(self, message), fields(env = %self.config.env))]
    async fn send(&self, to: &str, message: &str) -> Result<DeliveryReceipt> {
        if to.is_empty() || message.is_empty() {
            return Err(NotificationError::InvalidPhone(
                "phone number and message cannot be empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.config.base_url)
            .header("apiKey", &self.config.api_key)
            .header(ACCEPT, "application/json")
            .form(&[
                ("username", self.config.username.as_str()),
                ("to", to),
                ("message", message),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        if status == 401 {
            return Err(NotificationError::Authentication { status, body });
        }
        if !(200..300).contains(&status) {
            return Err(NotificationError::GatewayStatus { status, body });
        }

        serde_json::from_str(&body)
            .map_err(|e| NotificationError::Message(format!("unreadable gateway response: {e}")))
    }
}

/// Gateway that only logs, used when no SMS provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSmsGateway;

#[async_trait]
impl SmsGateway for LoggingSmsGateway {
    async fn send(&self, to: &str, message: &str) -> Result<DeliveryReceipt> {
        tracing::info!(to, message, "sms gateway not configured; message logged");
        Ok(DeliveryReceipt::sent_to(to))
    }
}

/// A message accepted by [`InMemorySmsGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub to: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct InMemorySmsState {
    sent: Vec<SentSms>,
    attempts: usize,
    fail_on_send: bool,
    reject_with: Option<i64>,
    stall: Option<Duration>,
}

/// In-memory SMS gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemorySmsGateway {
    state: Arc<RwLock<InMemorySmsState>>,
}

impl InMemorySmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail with a retryable error.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.write().fail_on_send = fail;
    }

    /// Makes every send come back with the given provider status code.
    pub fn set_reject_with(&self, code: Option<i64>) {
        self.write().reject_with = code;
    }

    /// Makes every send wait before answering.
    pub fn set_stall(&self, stall: Option<Duration>) {
        self.write().stall = stall;
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.read().sent.clone()
    }

    /// Number of send calls, including failed ones.
    pub fn attempts(&self) -> usize {
        self.read().attempts
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemorySmsState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemorySmsState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SmsGateway for InMemorySmsGateway {
    async fn send(&self, to: &str, message: &str) -> Result<DeliveryReceipt> {
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
                "sms gateway unreachable".to_string(),
            ));
        }
        if let Some(code) = state.reject_with {
            return Ok(DeliveryReceipt::with_status(to, code, "Rejected"));
        }

        state.sent.push(SentSms {
            to: to.to_string(),
            message: message.to_string(),
        });
        Ok(DeliveryReceipt::sent_to(to))
    }
}

//! Order notification delivery.
//!
//! This crate provides:
//! - `NotificationDispatcher`, the `OrderNotifier` that queues committed orders
//! - `NotificationWorker`, which sends the SMS and the email with retry/backoff
//! - the Africa's Talking SMS gateway and the SMTP mailer
//! - in-memory and logging channels for tests and unconfigured deployments

pub mod dispatcher;
pub mod email;
pub mod error;
pub mod sms;
pub mod templates;

pub use dispatcher::{
    Channels, DispatcherConfig, NotificationDispatcher, NotificationWorker, deliver_email,
    deliver_sms,
};
pub use email::{
    EmailConfig, EmailMessage, EmailTransport, InMemoryEmailTransport, LoggingEmailTransport,
    SmtpMailer, build_message, is_valid_email,
};
pub use error::{NotificationError, Result, is_retryable_status};
pub use sms::{
    ACCEPTED_STATUS_CODES, AfricasTalkingGateway, DEFAULT_COUNTRY_CODE, DeliveryReceipt,
    InMemorySmsGateway, LoggingSmsGateway, Recipient, SentSms, SmsConfig, SmsGateway,
    SmsMessageData, is_valid_phone_number, normalize_phone_number,
};
pub use templates::{order_email, order_email_body, order_email_subject, order_sms};

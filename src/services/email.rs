//! Outgoing email.
//!
//! Delivery goes through the [`Mailer`] trait so the transport can be chosen
//! from configuration: log only, an HTTP mail relay, or an in-memory outbox.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use tracing::{error, info};
use url::Url;

use crate::config::{MailConfig, MailTransport};
use crate::error::{Error, Result};

pub const VERIFICATION_SUBJECT: &str = "Email Verification for StackMentor.io";

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<()>;
}

/// Writes mail to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            text = %message.text,
            "Outgoing email (log transport)"
        );
        Ok(())
    }
}

/// POSTs mail as JSON to an HTTP relay.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpMailer {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Internal(format!("Invalid mail endpoint {}: {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("StackMentor/1.0")
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .json(&message);

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Mail(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Mail(format!("Mail relay error {}: {}", status, text)));
        }

        info!(to = %message.to, subject = %message.subject, "Email delivered to relay");
        Ok(())
    }
}

/// Keeps every sent message in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<MailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        self.outbox
            .lock()
            .map_err(|_| Error::Internal("Mail outbox lock poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

/// Build the mailer selected by configuration.
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.transport {
        MailTransport::Log => Ok(Arc::new(LogMailer)),
        MailTransport::Http => {
            let endpoint = config.http_endpoint.clone().ok_or_else(|| {
                Error::Internal("MAIL_HTTP_ENDPOINT is required for the http transport".into())
            })?;
            Ok(Arc::new(HttpMailer::new(&endpoint, config.http_api_key.clone())?))
        }
    }
}

/// Composes and sends application emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    from: String,
    public_url: String,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>, public_url: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            public_url: public_url.into(),
        }
    }

    /// Link a user follows to verify their email.
    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/api/auth/verify?token={}",
            self.public_url.trim_end_matches('/'),
            urlencoding::encode(token)
        )
    }

    pub fn verification_message(&self, to: &str, token: &str) -> MailMessage {
        MailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: VERIFICATION_SUBJECT.to_string(),
            text: format!(
                "Please verify your email by clicking the following link: {}",
                self.verification_link(token)
            ),
        }
    }

    pub async fn send_verification_email(&self, to: &str, token: &str) -> Result<()> {
        self.mailer.send(self.verification_message(to, token)).await
    }

    /// Send the verification email on a background task. Failures are logged.
    pub fn dispatch_verification_email(&self, to: &str, token: &str) {
        let service = self.clone();
        let to = to.to_string();
        let token = token.to_string();

        tokio::spawn(async move {
            if let Err(e) = service.send_verification_email(&to, &token).await {
                error!(to = %to, error = %e, "Failed to send verification email");
            }
        });
    }
}

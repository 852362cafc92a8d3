/// Push notifications via Pushover.
use crate::config::PushoverConfig;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Pushover token and user are not configured")]
    MissingCredentials,
    #[error("notification request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification rejected with HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

/// Delivers a text message to a person.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Body Pushover returns for both accepted and rejected messages.
#[derive(Debug, Default, Deserialize)]
struct PushoverReply {
    #[serde(default)]
    request: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

pub struct PushoverNotifier {
    client: reqwest::Client,
    config: PushoverConfig,
}

impl PushoverNotifier {
    pub fn new(client: reqwest::Client, config: PushoverConfig) -> Self {
        Self { client, config }
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let (Some(token), Some(user)) = (&self.config.token, &self.config.user) else {
            return Err(NotifyError::MissingCredentials);
        };
        if !self.config.has_credentials() {
            return Err(NotifyError::MissingCredentials);
        }

        let form = [
            ("token", token.as_str()),
            ("user", user.as_str()),
            ("message", message),
        ];
        let resp = self
            .client
            .post(&self.config.api_url)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let reply: PushoverReply = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() {
            let detail = if reply.errors.is_empty() {
                body
            } else {
                reply.errors.join("; ")
            };
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        tracing::debug!(request = ?reply.request, "pushover accepted message");
        Ok(())
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        match self.send(message).await {
            Ok(()) => {
                tracing::info!("push notification sent");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to send push notification");
                Err(e)
            }
        }
    }
}

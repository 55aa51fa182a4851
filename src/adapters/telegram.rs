use crate::domain::ports::Notifier;
use crate::utils::error::{ReserverError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Sends every message to each configured chat through the Bot API.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: Option<String>,
    chat_ids: Vec<String>,
}

impl TelegramNotifier {
    pub fn new(
        api_base: impl Into<String>,
        bot_token: Option<String>,
        chat_ids: Vec<String>,
        timeout: Duration,
    ) -> Result<Self> {
        // 卡住的通知不能拖住後面的預約
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token,
            chat_ids,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && !self.chat_ids.is_empty()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let Some(bot_token) = self.bot_token.as_deref().filter(|_| !self.chat_ids.is_empty())
        else {
            tracing::debug!("📨 Telegram not configured, skipping: {}", message);
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, bot_token);
        let mut last_error = None;

        // 每個 chat 都要試過，只回報最後一個錯誤
        for chat_id in &self.chat_ids {
            let sent = self
                .client
                .post(&url)
                .form(&[("chat_id", chat_id.as_str()), ("text", message)])
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("📨 Notified chat {}", chat_id);
                }
                Ok(response) => {
                    tracing::warn!(
                        "📨 Telegram returned {} for chat {}",
                        response.status(),
                        chat_id
                    );
                    last_error = Some(ReserverError::NotificationError {
                        message: format!("API returned status: {}", response.status()),
                    });
                }
                Err(e) => {
                    tracing::warn!("📨 Telegram request for chat {} failed: {}", chat_id, e);
                    last_error = Some(ReserverError::NotificationError {
                        message: e.to_string(),
                    });
                }
            }
        }

        last_error.map_or(Ok(()), Err)
    }
}

/// Drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        tracing::trace!("Notification dropped: {}", message);
        Ok(())
    }
}

//! Telegram implementation of [`Delivery`] on top of teloxide and reqwest.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, KeyboardButton, KeyboardMarkup};
use tracing::{debug, info, warn};

use crate::config::DeliveryConfig;
use crate::session::SenderId;

use super::delivery::Delivery;
use super::inbound::{InboundMessage, MessageContent, PhotoVariant};
use super::ui_builder::Keyboard;

/// Exponential backoff for the given retry attempt (1-based), with up to 10% random jitter
pub fn calculate_retry_delay(attempt: u32, config: &DeliveryConfig) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay_ms = config
        .base_retry_delay_ms
        .saturating_mul(1 << exponent)
        .min(config.max_retry_delay_ms);

    let jitter_ms = if delay_ms >= 10 {
        rand::thread_rng().gen_range(0..=delay_ms / 10)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter_ms)
}

fn to_markup(keyboard: &Keyboard) -> KeyboardMarkup {
    KeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|label| KeyboardButton::new(label.clone()))
            .collect::<Vec<_>>()
    }))
    .resize_keyboard()
}

/// Convert a teloxide message into the transport-independent form
pub fn inbound_from_telegram(msg: &Message) -> InboundMessage {
    let content = if let Some(text) = msg.text() {
        MessageContent::Text(text.to_string())
    } else if let Some(photos) = msg.photo() {
        MessageContent::Photo(
            photos
                .iter()
                .map(|photo| PhotoVariant {
                    file_id: photo.file.id.to_string(),
                    unique_id: photo.file.unique_id.to_string(),
                    width: photo.width,
                    height: photo.height,
                    file_size: u64::from(photo.file.size),
                })
                .collect(),
        )
    } else {
        MessageContent::Other
    };

    InboundMessage {
        sender: SenderId(msg.chat.id.0),
        language_code: msg
            .from
            .as_ref()
            .and_then(|user| user.language_code.clone()),
        content,
    }
}

pub struct TelegramDelivery {
    bot: Bot,
    client: reqwest::Client,
    config: DeliveryConfig,
}

impl TelegramDelivery {
    pub fn new(bot: Bot, config: DeliveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.download_timeout())
            .build()
            .context("failed to build download client")?;

        Ok(Self {
            bot,
            client,
            config,
        })
    }

    /// Run `operation` until it succeeds or the retry budget is spent
    async fn with_retries<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = calculate_retry_delay(attempt, &self.config);
                    warn!(
                        operation = what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %format!("{e:#}"),
                        "Retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(e.context(format!("{what} failed after {} attempts", attempt + 1)))
                }
            }
        }
    }

    async fn download_bytes(&self, remote_path: &str) -> Result<Vec<u8>> {
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            remote_path
        );

        // Strip the URL from errors: it carries the bot token
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!(e.without_url()))?
            .error_for_status()
            .map_err(|e| anyhow!(e.without_url()))?;
        let bytes = response.bytes().await.map_err(|e| anyhow!(e.without_url()))?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Delivery for TelegramDelivery {
    async fn fetch_file(&self, file_id: &str, destination: &Path) -> Result<u64> {
        let file = self
            .with_retries("getFile", || async {
                Ok::<_, anyhow::Error>(self.bot.get_file(FileId(file_id.to_string())).await?)
            })
            .await?;

        let size = u64::from(file.meta.size);
        if size > self.config.max_file_size {
            bail!(
                "file is {size} bytes, download limit is {}",
                self.config.max_file_size
            );
        }

        let bytes = self
            .with_retries("file download", || self.download_bytes(&file.path))
            .await?;

        tokio::fs::write(destination, &bytes)
            .await
            .with_context(|| format!("failed to write {}", destination.display()))?;

        debug!(bytes = bytes.len(), destination = %destination.display(), "File downloaded");
        Ok(bytes.len() as u64)
    }

    async fn send_text(
        &self,
        sender: SenderId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(sender.0), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        request.await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        sender: SenderId,
        photo: &Path,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let mut request = self
            .bot
            .send_photo(ChatId(sender.0), InputFile::file(photo.to_path_buf()))
            .caption(caption);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        request.await?;
        info!(user_id = %sender, photo = %photo.display(), "Photo sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_grows_and_caps() {
        let config = DeliveryConfig {
            base_retry_delay_ms: 100,
            max_retry_delay_ms: 1000,
            ..Default::default()
        };

        let first = calculate_retry_delay(1, &config);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(110));

        let second = calculate_retry_delay(2, &config);
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(220));

        let capped = calculate_retry_delay(30, &config);
        assert!(capped >= Duration::from_millis(1000) && capped <= Duration::from_millis(1100));
    }

    #[test]
    fn test_markup_keeps_rows() {
        let keyboard = Keyboard {
            rows: vec![vec!["A".to_string()], vec!["B".to_string()]],
        };
        let markup = to_markup(&keyboard);
        assert_eq!(markup.keyboard.len(), 2);
        assert_eq!(markup.keyboard[1][0].text, "B");
    }
}
